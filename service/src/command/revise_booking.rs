//! [`Command`] for revising an amended [`Booking`].

use std::fmt;

use common::{
    operations::{By, Select, UpdateIf},
    Clock,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking, listing, user, Booking, Listing},
    infra::{database, notify, Database, Notifier},
    read::Holding,
    Service,
};

use super::Command;

/// [`Command`] for answering an [`Amendment`] by the renter.
///
/// Applies the updated values, clears the [`Amendment`], re-arms the
/// decision deadline and returns the [`Booking`] to [`Pending`], so the
/// owner decides on it anew.
///
/// [`Amendment`]: booking::Amendment
/// [`Pending`]: booking::Status::Pending
#[derive(Clone, Copy, Debug)]
pub struct ReviseBooking {
    /// ID of the [`Booking`] to revise.
    pub booking_id: booking::Id,

    /// ID of the user revising the [`Booking`].
    pub renter_id: user::Id,

    /// Updated rental [`booking::Period`], if changed.
    pub period: Option<booking::Period>,
}

impl<Db, Nt, Ck> Command<ReviseBooking> for Service<Db, Nt, Ck>
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
            Select<By<Vec<Holding<Booking>>, listing::Id>>,
            Ok = Vec<Holding<Booking>>,
            Err = Traced<database::Error>,
        > + Database<
            UpdateIf<Booking, booking::Status>,
            Ok = bool,
            Err = Traced<database::Error>,
        >,
    Nt: Notifier<notify::Dispatch, Ok = (), Err: fmt::Display>,
    Ck: Clock,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ReviseBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ReviseBooking {
            booking_id,
            renter_id,
            period,
        } = cmd;

        let booking = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;

        if booking.renter_id != renter_id {
            return Err(tracerr::new!(E::NotRenter(renter_id)));
        }
        if booking.status != booking::Status::AmendmentRequested {
            return Err(tracerr::new!(E::NotAmended(booking_id)));
        }

        let listing = self
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(
                booking.listing_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(booking.listing_id))
            .map_err(tracerr::wrap!())?;

        let revised_period = period.unwrap_or(booking.period);
        let holding = self
            .database()
            .execute(Select(By::<Vec<Holding<Booking>>, _>::new(listing.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if holding.iter().any(|Holding(other)| {
            other.id != booking.id
                && other.period.overlaps(&revised_period)
        }) {
            return Err(tracerr::new!(E::PeriodUnavailable(listing.id)));
        }

        let mut revised = booking.clone();
        revised.period = revised_period;
        revised.status = booking::Status::Pending;
        revised.amendment = None;
        revised.expires_at =
            Some((self.clock().now() + self.config().request_ttl).coerce());

        let applied = self
            .database()
            .execute(UpdateIf(
                revised.clone(),
                booking::Status::AmendmentRequested,
            ))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !applied {
            return Err(tracerr::new!(E::ConcurrentUpdate(booking_id)));
        }

        self.notify(notify::Intent {
            kind: notify::Kind::BookingUpdated,
            recipient: listing.owner_id,
            booking_id: revised.id,
            listing_id: listing.id,
        })
        .await;

        Ok(revised)
    }
}

/// Error of [`ReviseBooking`] [`Command`] execution.
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

    /// [`Booking`] has no pending amendment to answer.
    #[display("`Booking(id: {_0})` has no pending amendment")]
    NotAmended(#[error(not(source))] booking::Id),

    /// User is not the renter of the [`Booking`].
    #[display("`User(id: {_0})` is not the renter of the `Booking`")]
    NotRenter(#[error(not(source))] user::Id),

    /// Revised period overlaps a confirmed [`Booking`].
    #[display("revised period of `Listing(id: {_0})` is unavailable")]
    PeriodUnavailable(#[error(not(source))] listing::Id),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        clock,
        operations::{By, Insert, Select},
        DateTime,
    };

    use crate::{
        command::{ConfirmBooking, RequestAmendment, RequestBooking},
        domain::{booking, listing, user, Booking, Listing},
        infra::{database::InMem, notify},
        Command as _, Config, Service,
    };

    use super::{ExecutionError as E, ReviseBooking};

    fn at(secs: i64) -> DateTime {
        DateTime::from_unix_timestamp(secs).unwrap()
    }

    fn period(starts_at: i64, ends_at: i64) -> booking::Period {
        booking::Period::new(at(starts_at), at(ends_at)).unwrap()
    }

    async fn setup() -> (
        Service<InMem, notify::Memory, clock::Manual>,
        notify::Memory,
        clock::Manual,
        Listing,
        Booking,
    ) {
        let notifier = notify::Memory::default();
        let clock = clock::Manual::new(at(0));
        let (service, _bg) = Service::new(
            Config::default(),
            InMem::new(),
            notifier.clone(),
            clock.clone(),
        );

        let l = Listing {
            id: listing::Id::new(),
            owner_id: user::Id::new(),
            title: "Extension ladder".parse().unwrap(),
            price_per_day: "60MUR".parse().unwrap(),
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
                period: period(0, 2 * 86_400),
            })
            .await
            .unwrap();
        service
            .execute(ConfirmBooking {
                booking_id: b.id,
                owner_id: l.owner_id,
                pickup_time: None,
                return_time: None,
            })
            .await
            .unwrap();
        service
            .execute(RequestAmendment {
                booking_id: b.id,
                owner_id: l.owner_id,
                fields: vec![booking::Field::StartDate],
                message: "Not available that week".parse().unwrap(),
            })
            .await
            .unwrap();

        (service, notifier, clock, l, b)
    }

    #[tokio::test]
    async fn returns_amended_booking_to_pending_with_fresh_deadline() {
        let (service, notifier, clock, l, b) = setup().await;

        clock.advance(Duration::from_secs(3_600));
        let revised = service
            .execute(ReviseBooking {
                booking_id: b.id,
                renter_id: b.renter_id,
                period: Some(period(3 * 86_400, 5 * 86_400)),
            })
            .await
            .unwrap();

        assert_eq!(revised.status, booking::Status::Pending);
        assert_eq!(revised.amendment, None);
        assert_eq!(revised.period, period(3 * 86_400, 5 * 86_400));
        // The decision deadline is re-armed from the revision instant.
        assert_eq!(
            revised.expires_at,
            Some(at(3_600 + 24 * 3_600).coerce()),
        );
        // The price was frozen at the original request.
        assert_eq!(revised.total_price, "120MUR".parse().unwrap());

        let stored = service
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(b.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, booking::Status::Pending);
        assert_eq!(stored.amendment, None);

        assert!(notifier
            .recorded()
            .iter()
            .any(|i| i.kind == notify::Kind::BookingUpdated
                && i.recipient == l.owner_id));
    }

    #[tokio::test]
    async fn keeps_the_original_period_when_no_update_is_supplied() {
        let (service, _, _, _, b) = setup().await;

        let revised = service
            .execute(ReviseBooking {
                booking_id: b.id,
                renter_id: b.renter_id,
                period: None,
            })
            .await
            .unwrap();
        assert_eq!(revised.period, b.period);
        assert_eq!(revised.status, booking::Status::Pending);
    }

    #[tokio::test]
    async fn refuses_foreign_and_unamended_bookings() {
        let (service, _, _, _, b) = setup().await;

        let err = service
            .execute(ReviseBooking {
                booking_id: b.id,
                renter_id: user::Id::new(),
                period: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::NotRenter(_)));

        service
            .execute(ReviseBooking {
                booking_id: b.id,
                renter_id: b.renter_id,
                period: None,
            })
            .await
            .unwrap();
        let err = service
            .execute(ReviseBooking {
                booking_id: b.id,
                renter_id: b.renter_id,
                period: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::NotAmended(_)));
    }

    #[tokio::test]
    async fn revised_period_must_stay_admissible() {
        let (service, _, _, l, b) = setup().await;

        // Another booking takes days 5..7 meanwhile.
        let other = service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: user::Id::new(),
                period: period(5 * 86_400, 7 * 86_400),
            })
            .await
            .unwrap();
        service
            .execute(ConfirmBooking {
                booking_id: other.id,
                owner_id: l.owner_id,
                pickup_time: None,
                return_time: None,
            })
            .await
            .unwrap();

        let err = service
            .execute(ReviseBooking {
                booking_id: b.id,
                renter_id: b.renter_id,
                period: Some(period(6 * 86_400, 8 * 86_400)),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::PeriodUnavailable(_)));
    }
}
