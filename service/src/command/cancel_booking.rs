//! [`Command`] for cancelling a [`Booking`].

use std::fmt;

use common::operations::{By, Select, Update, UpdateIf};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, Party},
        listing, user, Booking, Listing,
    },
    infra::{database, notify, Database, Notifier},
    read::Honored,
    Service,
};

use super::Command;

/// [`Command`] for cancelling a [`Booking`] by one of its parties.
///
/// A renter may cancel their own [`Pending`] request or a [`Confirmed`]
/// booking; the owner may cancel a [`Confirmed`] one (a [`Pending`] request
/// is declined instead). The renter can never move a [`Booking`] anywhere
/// but [`Cancelled`].
///
/// [`Cancelled`]: booking::Status::Cancelled
/// [`Confirmed`]: booking::Status::Confirmed
/// [`Pending`]: booking::Status::Pending
#[derive(Clone, Copy, Debug)]
pub struct CancelBooking {
    /// ID of the [`Booking`] to cancel.
    pub booking_id: booking::Id,

    /// ID of the user cancelling the [`Booking`].
    pub initiator_id: user::Id,
}

impl<Db, Nt, Ck> Command<CancelBooking> for Service<Db, Nt, Ck>
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
        cmd: CancelBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelBooking {
            booking_id,
            initiator_id,
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

        let party = if listing.owner_id == initiator_id {
            Party::Owner
        } else if booking.renter_id == initiator_id {
            Party::Renter
        } else {
            return Err(tracerr::new!(E::NotParticipant(initiator_id)));
        };

        let observed = booking.status;
        match (observed, party) {
            (booking::Status::Confirmed, Party::Owner | Party::Renter)
            | (booking::Status::Pending, Party::Renter) => {}
            (booking::Status::Pending, Party::Owner)
            | (
                booking::Status::Paid
                | booking::Status::Active
                | booking::Status::Completed
                | booking::Status::Cancelled
                | booking::Status::Expired
                | booking::Status::AmendmentRequested
                | booking::Status::Disputed,
                Party::Owner | Party::Renter,
            ) => {
                return Err(tracerr::new!(E::NotCancellable(booking_id)));
            }
        }

        let mut cancelled = booking.clone();
        cancelled.status = booking::Status::Cancelled;
        cancelled.amendment = None;

        let applied = self
            .database()
            .execute(UpdateIf(cancelled.clone(), observed))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !applied {
            return Err(tracerr::new!(E::ConcurrentUpdate(booking_id)));
        }

        if observed.is_honored() {
            // The booking left the honored set.
            _ = self
                .refresh_booking_stats(listing.id)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
        }

        match party {
            Party::Owner => {
                self.notify(notify::Intent {
                    kind: notify::Kind::Declined,
                    recipient: cancelled.renter_id,
                    booking_id: cancelled.id,
                    listing_id: listing.id,
                })
                .await;
            }
            Party::Renter if observed == booking::Status::Confirmed => {
                self.notify(notify::Intent {
                    kind: notify::Kind::CancelledByRenter,
                    recipient: listing.owner_id,
                    booking_id: cancelled.id,
                    listing_id: listing.id,
                })
                .await;
            }
            // A renter withdrawing their own undecided request doesn't
            // bother the owner.
            Party::Renter => {}
        }

        Ok(cancelled)
    }
}

/// Error of [`CancelBooking`] [`Command`] execution.
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

    /// [`Booking`] cannot be cancelled by this party in its current status.
    #[display("`Booking(id: {_0})` cannot be cancelled")]
    NotCancellable(#[error(not(source))] booking::Id),

    /// User is not a party of the [`Booking`].
    #[display("`User(id: {_0})` is not a party of the `Booking`")]
    NotParticipant(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::{
        clock,
        operations::{By, Insert, Select},
        DateTime,
    };
    use rust_decimal::Decimal;

    use crate::{
        command::{ConfirmBooking, RequestBooking},
        domain::{booking, listing, user, Booking, Listing},
        infra::{database::InMem, notify},
        Command as _, Config, Service,
    };

    use super::{CancelBooking, ExecutionError as E};

    fn at(secs: i64) -> DateTime {
        DateTime::from_unix_timestamp(secs).unwrap()
    }

    async fn setup() -> (
        Service<InMem, notify::Memory, clock::Manual>,
        notify::Memory,
        Listing,
        Booking,
    ) {
        let notifier = notify::Memory::default();
        let (service, _bg) = Service::new(
            Config::default(),
            InMem::new(),
            notifier.clone(),
            clock::Manual::new(at(0)),
        );

        let l = Listing {
            id: listing::Id::new(),
            owner_id: user::Id::new(),
            title: "Scaffolding set".parse().unwrap(),
            price_per_day: "150MUR".parse().unwrap(),
            deposit: None,
            is_active: true,
            stats: listing::Stats::default(),
            rating: listing::RatingStats::default(),
            created_at: at(0).coerce(),
        };
        service.database().execute(Insert(l.clone())).await.unwrap();

        let b = service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: user::Id::new(),
                period: booking::Period::new(at(0), at(2 * 86_400)).unwrap(),
            })
            .await
            .unwrap();

        (service, notifier, l, b)
    }

    async fn confirm(
        service: &Service<InMem, notify::Memory, clock::Manual>,
        l: &Listing,
        b: &Booking,
    ) {
        service
            .execute(ConfirmBooking {
                booking_id: b.id,
                owner_id: l.owner_id,
                pickup_time: None,
                return_time: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn renter_withdraws_pending_request_silently() {
        let (service, notifier, _, b) = setup().await;

        let cancelled = service
            .execute(CancelBooking {
                booking_id: b.id,
                initiator_id: b.renter_id,
            })
            .await
            .unwrap();
        assert_eq!(cancelled.status, booking::Status::Cancelled);

        assert!(notifier
            .recorded()
            .iter()
            .all(|i| i.kind == notify::Kind::RequestReceived));
    }

    #[tokio::test]
    async fn renter_cancelling_confirmed_booking_notifies_owner() {
        let (service, notifier, l, b) = setup().await;
        confirm(&service, &l, &b).await;

        service
            .execute(CancelBooking {
                booking_id: b.id,
                initiator_id: b.renter_id,
            })
            .await
            .unwrap();

        assert!(notifier
            .recorded()
            .iter()
            .any(|i| i.kind == notify::Kind::CancelledByRenter
                && i.recipient == l.owner_id));

        // The booking left the honored set, so the earnings are gone.
        let stored = service
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(l.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.stats.booking_count, 0);
        assert_eq!(stored.stats.total_earnings, Decimal::ZERO);
    }

    #[tokio::test]
    async fn owner_cancelling_confirmed_booking_notifies_renter() {
        let (service, notifier, l, b) = setup().await;
        confirm(&service, &l, &b).await;

        service
            .execute(CancelBooking {
                booking_id: b.id,
                initiator_id: l.owner_id,
            })
            .await
            .unwrap();

        assert!(notifier
            .recorded()
            .iter()
            .any(|i| i.kind == notify::Kind::Declined
                && i.recipient == b.renter_id));
    }

    #[tokio::test]
    async fn owner_cannot_cancel_pending_and_strangers_cannot_cancel() {
        let (service, _, l, b) = setup().await;

        let err = service
            .execute(CancelBooking {
                booking_id: b.id,
                initiator_id: l.owner_id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::NotCancellable(_)));

        let err = service
            .execute(CancelBooking {
                booking_id: b.id,
                initiator_id: user::Id::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::NotParticipant(_)));
    }
}
