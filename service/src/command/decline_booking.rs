//! [`Command`] for declining a [`Booking`].

use std::fmt;

use common::operations::{By, Select, UpdateIf};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking, listing, user, Booking, Listing},
    infra::{database, notify, Database, Notifier},
    Service,
};

use super::Command;

/// [`Command`] for declining a [`Pending`] [`Booking`] by the [`Listing`]
/// owner.
///
/// [`Pending`]: booking::Status::Pending
#[derive(Clone, Copy, Debug)]
pub struct DeclineBooking {
    /// ID of the [`Booking`] to decline.
    pub booking_id: booking::Id,

    /// ID of the user declining the [`Booking`].
    pub owner_id: user::Id,
}

impl<Db, Nt, Ck> Command<DeclineBooking> for Service<Db, Nt, Ck>
where
    Db: Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            UpdateIf<Booking, booking::Status>,
            Ok = bool,
            Err = Traced<database::Error>,
        >,
    Nt: Notifier<notify::Dispatch, Ok = (), Err: fmt::Display>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: DeclineBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let DeclineBooking {
            booking_id,
            owner_id,
        } = cmd;

        let booking = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;

        let listing = self
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(
                booking.listing_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(booking.listing_id))
            .map_err(tracerr::wrap!())?;

        if listing.owner_id != owner_id {
            return Err(tracerr::new!(E::NotOwner(owner_id)));
        }
        if booking.status != booking::Status::Pending {
            return Err(tracerr::new!(E::NotPending(booking_id)));
        }

        let mut declined = booking.clone();
        declined.status = booking::Status::Cancelled;

        let applied = self
            .database()
            .execute(UpdateIf(declined.clone(), booking::Status::Pending))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !applied {
            return Err(tracerr::new!(E::ConcurrentUpdate(booking_id)));
        }

        self.notify(notify::Intent {
            kind: notify::Kind::Declined,
            recipient: declined.renter_id,
            booking_id: declined.id,
            listing_id: listing.id,
        })
        .await;

        Ok(declined)
    }
}

/// Error of [`DeclineBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Booking`] was updated concurrently.
    #[display("`Booking(id: {_0})` was updated concurrently")]
    ConcurrentUpdate(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] of the [`Booking`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// User is not the owner of the [`Listing`].
    #[display("`User(id: {_0})` is not the owner of the `Listing`")]
    NotOwner(#[error(not(source))] user::Id),

    /// [`Booking`] is not [`Pending`] anymore.
    ///
    /// [`Pending`]: booking::Status::Pending
    #[display("`Booking(id: {_0})` is not pending")]
    NotPending(#[error(not(source))] booking::Id),
}
