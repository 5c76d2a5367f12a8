//! [`Query`] collection related to multiple [`Booking`]s.

use common::operations::By;

use crate::domain::{listing, user, Booking};
#[cfg(doc)]
use crate::{domain::Listing, Query};

use super::DatabaseQuery;

/// Queries all the [`Booking`]s of a [`Listing`], oldest first.
pub type ByListing = DatabaseQuery<By<Vec<Booking>, listing::Id>>;

/// Queries all the [`Booking`]s requested by a renter, oldest first.
pub type ByRenter = DatabaseQuery<By<Vec<Booking>, user::Id>>;
