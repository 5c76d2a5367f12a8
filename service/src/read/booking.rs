//! [`Booking`] read model definitions.

#[cfg(doc)]
use crate::domain::{booking::Status, Booking};

/// Wrapper around a [`Booking`] indicating that its [`Status`]
/// [`holds_period()`]: it blocks its dates for other bookings of the same
/// listing.
///
/// [`holds_period()`]: Status::holds_period
#[derive(Clone, Debug)]
pub struct Holding<T>(pub T);

/// Wrapper around a [`Booking`] indicating that its [`Status`]
/// [`is_honored()`]: it counts toward the listing earnings aggregates.
///
/// [`is_honored()`]: Status::is_honored
#[derive(Clone, Debug)]
pub struct Honored<T>(pub T);

/// Wrapper around a [`Booking`] indicating that it's still [`Pending`]
/// while its deadline has already passed.
///
/// [`Pending`]: Status::Pending
#[derive(Clone, Debug)]
pub struct Stale<T>(pub T);
