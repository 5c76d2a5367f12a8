//! [`Command`] for confirming a [`Booking`].

use std::fmt;

use common::operations::{
    By, Commit, Lock, Select, Transact, Transacted, Update, UpdateIf,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking, listing, user, Booking, Listing},
    infra::{database, notify, Database, Notifier},
    read::{Holding, Honored},
    Service,
};

use super::Command;

/// [`Command`] for confirming a [`Pending`] [`Booking`] by the [`Listing`]
/// owner.
///
/// Admissibility of the rental period is re-checked at confirmation time
/// under a [`Listing`]-level lock: out of several [`Pending`] requests on
/// overlapping dates, only the first confirmation wins, and the losing
/// ones stay [`Pending`] for the owner to decline explicitly.
///
/// [`Pending`]: booking::Status::Pending
#[derive(Clone, Debug)]
pub struct ConfirmBooking {
    /// ID of the [`Booking`] to confirm.
    pub booking_id: booking::Id,

    /// ID of the user confirming the [`Booking`].
    pub owner_id: user::Id,

    /// Pickup arrangement for the renter.
    pub pickup_time: Option<booking::PickupTime>,

    /// Return arrangement for the renter.
    pub return_time: Option<booking::ReturnTime>,
}

impl<Db, Nt, Ck> Command<ConfirmBooking> for Service<Db, Nt, Ck>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
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
    Transacted<Db>: Database<
            Lock<By<Listing, listing::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Holding<Booking>>, listing::Id>>,
            Ok = Vec<Holding<Booking>>,
            Err = Traced<database::Error>,
        > + Database<
            UpdateIf<Booking, booking::Status>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>,
    Nt: Notifier<notify::Dispatch, Ok = (), Err: fmt::Display>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ConfirmBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ConfirmBooking {
            booking_id,
            owner_id,
            pickup_time,
            return_time,
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

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent decisions upon the same `Listing`.
        tx.execute(Lock(By::new(listing.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;
        if booking.status != booking::Status::Pending {
            return Err(tracerr::new!(E::NotPending(booking_id)));
        }

        let holding = tx
            .execute(Select(By::<Vec<Holding<Booking>>, _>::new(listing.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if holding.iter().any(|Holding(other)| {
            other.id != booking.id && other.period.overlaps(&booking.period)
        }) {
            return Err(tracerr::new!(E::PeriodUnavailable(listing.id)));
        }

        let mut confirmed = booking.clone();
        confirmed.status = booking::Status::Confirmed;
        confirmed.pickup_time = pickup_time;
        confirmed.return_time = return_time;

        let applied = tx
            .execute(UpdateIf(confirmed.clone(), booking::Status::Pending))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !applied {
            return Err(tracerr::new!(E::ConcurrentUpdate(booking_id)));
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        // The booking entered the honored set.
        _ = self
            .refresh_booking_stats(listing.id)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        self.notify(notify::Intent {
            kind: notify::Kind::Confirmed,
            recipient: confirmed.renter_id,
            booking_id: confirmed.id,
            listing_id: listing.id,
        })
        .await;

        Ok(confirmed)
    }
}

/// Error of [`ConfirmBooking`] [`Command`] execution.
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

    /// Period of the [`Booking`] overlaps an already confirmed one.
    #[display("period of `Listing(id: {_0})` is already taken")]
    PeriodUnavailable(#[error(not(source))] listing::Id),
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
        command::RequestBooking,
        domain::{booking, listing, user, Booking, Listing},
        infra::{database::InMem, notify},
        Command as _, Config, Service,
    };

    use super::{ConfirmBooking, ExecutionError as E};

    fn at(secs: i64) -> DateTime {
        DateTime::from_unix_timestamp(secs).unwrap()
    }

    fn period(starts_at: i64, ends_at: i64) -> booking::Period {
        booking::Period::new(at(starts_at), at(ends_at)).unwrap()
    }

    fn listing(owner_id: user::Id) -> Listing {
        Listing {
            id: listing::Id::new(),
            owner_id,
            title: "Pressure washer".parse().unwrap(),
            price_per_day: "100MUR".parse().unwrap(),
            deposit: None,
            is_active: true,
            stats: listing::Stats::default(),
            rating: listing::RatingStats::default(),
            created_at: at(0).coerce(),
        }
    }

    async fn setup() -> (
        Service<InMem, notify::Memory, clock::Manual>,
        notify::Memory,
        Listing,
    ) {
        let notifier = notify::Memory::default();
        let (service, _bg) = Service::new(
            Config::default(),
            InMem::new(),
            notifier.clone(),
            clock::Manual::new(at(0)),
        );
        let l = listing(user::Id::new());
        service.database().execute(Insert(l.clone())).await.unwrap();
        (service, notifier, l)
    }

    async fn request(
        service: &Service<InMem, notify::Memory, clock::Manual>,
        l: &Listing,
        period: booking::Period,
    ) -> Booking {
        service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: user::Id::new(),
                period,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn confirms_pending_booking_and_refreshes_stats() {
        let (service, notifier, l) = setup().await;
        let b = request(&service, &l, period(0, 2 * 86_400)).await;

        let confirmed = service
            .execute(ConfirmBooking {
                booking_id: b.id,
                owner_id: l.owner_id,
                pickup_time: Some("Saturday 9 AM".parse().unwrap()),
                return_time: Some("Monday evening".parse().unwrap()),
            })
            .await
            .unwrap();

        assert_eq!(confirmed.status, booking::Status::Confirmed);
        assert_eq!(
            confirmed.pickup_time,
            Some("Saturday 9 AM".parse().unwrap()),
        );

        let stored = service
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(l.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.stats.booking_count, 1);
        assert_eq!(stored.stats.total_earnings, Decimal::from(200));
        assert_eq!(stored.stats.avg_duration_days, Decimal::from(2));

        assert!(notifier
            .recorded()
            .iter()
            .any(|i| i.kind == notify::Kind::Confirmed
                && i.recipient == b.renter_id));
    }

    #[tokio::test]
    async fn losing_confirmation_leaves_booking_pending() {
        let (service, _, l) = setup().await;
        let first = request(&service, &l, period(0, 2 * 86_400)).await;
        let second = request(&service, &l, period(86_400, 3 * 86_400)).await;

        service
            .execute(ConfirmBooking {
                booking_id: first.id,
                owner_id: l.owner_id,
                pickup_time: None,
                return_time: None,
            })
            .await
            .unwrap();

        let err = service
            .execute(ConfirmBooking {
                booking_id: second.id,
                owner_id: l.owner_id,
                pickup_time: None,
                return_time: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::PeriodUnavailable(_)));

        // The loser is untouched, awaiting an explicit decision.
        let stored = service
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(second.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, booking::Status::Pending);
    }

    #[tokio::test]
    async fn concurrent_confirmations_admit_exactly_one() {
        let (service, _, l) = setup().await;
        let first = request(&service, &l, period(0, 2 * 86_400)).await;
        let second = request(&service, &l, period(86_400, 3 * 86_400)).await;

        let (a, b) = tokio::join!(
            service.execute(ConfirmBooking {
                booking_id: first.id,
                owner_id: l.owner_id,
                pickup_time: None,
                return_time: None,
            }),
            service.execute(ConfirmBooking {
                booking_id: second.id,
                owner_id: l.owner_id,
                pickup_time: None,
                return_time: None,
            }),
        );

        assert!(
            a.is_ok() != b.is_ok(),
            "exactly one of the overlapping confirmations must win",
        );

        let stored = service
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(l.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.stats.booking_count, 1);
    }

    #[tokio::test]
    async fn only_the_owner_confirms() {
        let (service, _, l) = setup().await;
        let b = request(&service, &l, period(0, 86_400)).await;

        let err = service
            .execute(ConfirmBooking {
                booking_id: b.id,
                owner_id: user::Id::new(),
                pickup_time: None,
                return_time: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::NotOwner(_)));

        let err = service
            .execute(ConfirmBooking {
                booking_id: booking::Id::new(),
                owner_id: l.owner_id,
                pickup_time: None,
                return_time: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::BookingNotExists(_)));
    }
}
