//! [`Database`]-related implementations.

pub mod in_mem;
#[cfg(feature = "postgres")]
pub mod postgres;

use derive_more::{Display, Error as StdError, From};

pub use self::in_mem::InMem;
#[cfg(feature = "postgres")]
pub use self::postgres::Postgres;

/// Database operation handler.
pub use common::Handler as Database;

/// [`Database`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    #[cfg(feature = "postgres")]
    /// [`Postgres`] error.
    Postgres(postgres::Error),
}
