//! Domain entities of the booking engine.

pub mod booking;
pub mod listing;
pub mod rating;
pub mod user;

pub use self::{booking::Booking, listing::Listing, rating::Rating};
