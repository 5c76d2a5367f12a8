//! [`Command`] for requesting an [`Amendment`] to a [`Booking`].

use std::fmt;

use common::operations::{By, Select, Update, UpdateIf};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, Amendment, Party},
        listing, user, Booking, Listing,
    },
    infra::{database, notify, Database, Notifier},
    read::Honored,
    Service,
};

use super::Command;

/// [`Command`] for proposing an [`Amendment`] to a [`Booking`] by the
/// [`Listing`] owner.
///
/// Suspends the [`Booking`] until the renter revises it: a suspended
/// [`Confirmed`] booking stops holding its dates and contributing to the
/// earnings until re-confirmed.
///
/// [`Confirmed`]: booking::Status::Confirmed
#[derive(Clone, Debug)]
pub struct RequestAmendment {
    /// ID of the [`Booking`] to amend.
    pub booking_id: booking::Id,

    /// ID of the user proposing the [`Amendment`].
    pub owner_id: user::Id,

    /// [`booking::Field`]s proposed to change.
    pub fields: Vec<booking::Field>,

    /// Free-form explanation of the proposal.
    pub message: booking::Message,
}

impl<Db, Nt, Ck> Command<RequestAmendment> for Service<Db, Nt, Ck>
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
        > + Database<
            Select<By<Vec<Honored<Booking>>, listing::Id>>,
            Ok = Vec<Honored<Booking>>,
            Err = Traced<database::Error>,
        > + Database<
            Update<(listing::Id, listing::Stats)>,
            Ok = (),
            Err = Traced<database::Error>,
        >,
    Nt: Notifier<notify::Dispatch, Ok = (), Err: fmt::Display>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RequestAmendment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RequestAmendment {
            booking_id,
            owner_id,
            fields,
            message,
        } = cmd;

        if fields.is_empty() {
            return Err(tracerr::new!(E::NoFields(booking_id)));
        }

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

        let observed = booking.status;
        if !observed.is_amendable() {
            return Err(tracerr::new!(E::NotAmendable(booking_id)));
        }

        let mut amended = booking.clone();
        amended.status = booking::Status::AmendmentRequested;
        amended.amendment = Some(Amendment {
            fields,
            message,
            requested_by: Party::Owner,
        });

        let applied = self
            .database()
            .execute(UpdateIf(amended.clone(), observed))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !applied {
            return Err(tracerr::new!(E::ConcurrentUpdate(booking_id)));
        }

        if observed.is_honored() {
            // The suspended booking left the honored set.
            _ = self
                .refresh_booking_stats(listing.id)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
        }

        self.notify(notify::Intent {
            kind: notify::Kind::AmendmentRequested,
            recipient: amended.renter_id,
            booking_id: amended.id,
            listing_id: listing.id,
        })
        .await;

        Ok(amended)
    }
}

/// Error of [`RequestAmendment`] [`Command`] execution.
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

    /// Proposed [`Amendment`] changes no fields.
    #[display("amendment of `Booking(id: {_0})` changes no fields")]
    NoFields(#[error(not(source))] booking::Id),

    /// [`Booking`] cannot be amended in its current status.
    #[display("`Booking(id: {_0})` cannot be amended")]
    NotAmendable(#[error(not(source))] booking::Id),

    /// User is not the owner of the [`Listing`].
    #[display("`User(id: {_0})` is not the owner of the `Listing`")]
    NotOwner(#[error(not(source))] user::Id),
}
