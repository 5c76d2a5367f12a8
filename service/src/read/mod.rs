//! Read models of the domain entities.

pub mod booking;

pub use self::booking::{Holding, Honored, Stale};
