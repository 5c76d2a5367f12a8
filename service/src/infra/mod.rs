//! Infrastructure implementations.

pub mod database;
pub mod notify;

#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
pub use self::{
    database::{Database, InMem},
    notify::Notifier,
};
