//! [`ExpireBookings`] [`Task`].

use std::{convert::Infallible, error::Error, fmt, time};

use common::{
    operations::{By, Perform, Select, Start, UpdateIf},
    Clock, DateTime,
};
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, Booking},
    infra::{database, notify, Database, Notifier},
    read::Stale,
    Service,
};

use super::Task;

/// Configuration of the [`ExpireBookings`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between expiry sweeps.
    pub interval: time::Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: time::Duration::from_secs(5 * 60),
        }
    }
}

/// [`Task`] sweeping [`Pending`] [`Booking`]s whose deadline has passed
/// into [`Expired`].
///
/// Safe under arbitrary, possibly overlapping invocations: every expiry is
/// a conditioned write, so a [`Booking`] simultaneously swept twice (or
/// swept while being confirmed) resolves to exactly one outcome, and the
/// renter is notified exactly once.
///
/// [`Expired`]: booking::Status::Expired
/// [`Pending`]: booking::Status::Pending
#[derive(Clone, Debug)]
pub struct ExpireBookings<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Nt, Ck> Task<Start<By<ExpireBookings<Self>, Config>>>
    for Service<Db, Nt, Ck>
where
    ExpireBookings<Self>:
        Task<Perform<DateTime>, Ok = Vec<booking::Id>, Err: Error>,
    Ck: Clock,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<ExpireBookings<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = ExpireBookings {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            let now = self.clock().now();
            _ = task.execute(Perform(now)).await.map_err(|e| {
                log::error!("`task::ExpireBookings` failed: {e}");
            });
        }
    }
}

impl<Db, Nt, Ck> Task<Perform<DateTime>>
    for ExpireBookings<Service<Db, Nt, Ck>>
where
    Db: Database<
            Select<By<Vec<Stale<Booking>>, booking::ExpirationDateTime>>,
            Ok = Vec<Stale<Booking>>,
            Err = Traced<database::Error>,
        > + Database<
            UpdateIf<Booking, booking::Status>,
            Ok = bool,
            Err = Traced<database::Error>,
        >,
    Nt: Notifier<notify::Dispatch, Ok = (), Err: fmt::Display>,
{
    type Ok = Vec<booking::Id>;
    type Err = ExecutionError;

    async fn execute(
        &self,
        Perform(now): Perform<DateTime>,
    ) -> Result<Self::Ok, Self::Err> {
        let stale = self
            .service
            .database()
            .execute(Select(By::<Vec<Stale<Booking>>, _>::new(now.coerce())))
            .await
            .map_err(tracerr::wrap!())?;

        let mut swept = Vec::with_capacity(stale.len());
        for Stale(b) in stale {
            let mut expired = b.clone();
            expired.status = booking::Status::Expired;

            let applied = match self
                .service
                .database()
                .execute(UpdateIf(expired, booking::Status::Pending))
                .await
            {
                Ok(applied) => applied,
                Err(e) => {
                    // One failed expiry must not abort the whole sweep.
                    log::warn!(
                        "failed to expire `Booking(id: {})`: {e}",
                        b.id,
                    );
                    continue;
                }
            };

            if applied {
                self.service
                    .notify(notify::Intent {
                        kind: notify::Kind::Expired,
                        recipient: b.renter_id,
                        booking_id: b.id,
                        listing_id: b.listing_id,
                    })
                    .await;
                swept.push(b.id);
            }
        }

        Ok(swept)
    }
}

/// Error of [`ExpireBookings`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        clock,
        operations::{By, Insert, Perform, Select},
        Clock, DateTime,
    };

    use crate::{
        command::{ConfirmBooking, RequestBooking},
        domain::{booking, listing, user, Booking, Listing},
        infra::{database::InMem, notify},
        Command as _, Config, Service,
    };

    use super::ExpireBookings;

    fn at(secs: i64) -> DateTime {
        DateTime::from_unix_timestamp(secs).unwrap()
    }

    fn listing(owner_id: user::Id) -> Listing {
        Listing {
            id: listing::Id::new(),
            owner_id,
            title: "Tile cutter".parse().unwrap(),
            price_per_day: "80MUR".parse().unwrap(),
            deposit: None,
            is_active: true,
            stats: listing::Stats::default(),
            rating: listing::RatingStats::default(),
            created_at: at(0).coerce(),
        }
    }

    async fn pending_booking(
        service: &Service<InMem, notify::Memory, clock::Manual>,
        l: &Listing,
    ) -> Booking {
        service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: user::Id::new(),
                period: booking::Period::new(at(0), at(2 * 86_400)).unwrap(),
            })
            .await
            .unwrap()
    }

    fn sweeper(
        service: &Service<InMem, notify::Memory, clock::Manual>,
    ) -> ExpireBookings<Service<InMem, notify::Memory, clock::Manual>> {
        ExpireBookings {
            config: super::Config::default(),
            service: service.clone(),
        }
    }

    async fn setup() -> (
        Service<InMem, notify::Memory, clock::Manual>,
        notify::Memory,
        clock::Manual,
        Listing,
    ) {
        let notifier = notify::Memory::default();
        let clock = clock::Manual::new(at(0));
        let (service, _bg) = Service::new(
            Config::default(),
            InMem::new(),
            notifier.clone(),
            clock.clone(),
        );
        let l = listing(user::Id::new());
        service.database().execute(Insert(l.clone())).await.unwrap();
        (service, notifier, clock, l)
    }

    #[tokio::test]
    async fn expires_stale_pending_booking_once() {
        let (service, notifier, clock, l) = setup().await;
        let b = pending_booking(&service, &l).await;

        // One minute past the 24h deadline.
        clock.advance(Duration::from_secs(24 * 3_600 + 60));
        let now = clock.now();

        let swept =
            sweeper(&service).execute(Perform(now)).await.unwrap();
        assert_eq!(swept, vec![b.id]);

        let stored = service
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(b.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, booking::Status::Expired);

        // Re-sweeping at the same instant finds nothing new.
        let swept =
            sweeper(&service).execute(Perform(now)).await.unwrap();
        assert_eq!(swept, vec![]);

        let expiries = notifier
            .recorded()
            .into_iter()
            .filter(|i| i.kind == notify::Kind::Expired)
            .count();
        assert_eq!(expiries, 1);
    }

    #[tokio::test]
    async fn keeps_undecided_bookings_before_deadline() {
        let (service, notifier, clock, l) = setup().await;
        let b = pending_booking(&service, &l).await;

        clock.advance(Duration::from_secs(23 * 3_600));
        let swept = sweeper(&service)
            .execute(Perform(clock.now()))
            .await
            .unwrap();
        assert_eq!(swept, vec![]);

        let stored = service
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(b.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, booking::Status::Pending);
        assert!(notifier
            .recorded()
            .iter()
            .all(|i| i.kind != notify::Kind::Expired));
    }

    #[tokio::test]
    async fn racing_confirmation_and_sweep_resolve_to_one_outcome() {
        let (service, notifier, clock, l) = setup().await;
        let b = pending_booking(&service, &l).await;

        clock.advance(Duration::from_secs(24 * 3_600 + 60));
        let now = clock.now();

        let task = sweeper(&service);
        let confirm = service.execute(ConfirmBooking {
            booking_id: b.id,
            owner_id: l.owner_id,
            pickup_time: None,
            return_time: None,
        });
        let sweep = task.execute(Perform(now));
        let (confirmed, swept) = tokio::join!(confirm, sweep);
        let swept = swept.unwrap();

        let stored = service
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(b.id)))
            .await
            .unwrap()
            .unwrap();
        match stored.status {
            booking::Status::Confirmed => {
                assert!(confirmed.is_ok());
                assert_eq!(swept, vec![]);
            }
            booking::Status::Expired => {
                assert!(confirmed.is_err());
                assert_eq!(swept, vec![b.id]);
            }
            unexpected @ (booking::Status::Pending
            | booking::Status::Paid
            | booking::Status::Active
            | booking::Status::Completed
            | booking::Status::Cancelled
            | booking::Status::AmendmentRequested
            | booking::Status::Disputed) => {
                panic!("unexpected status: {unexpected}")
            }
        }

        // Never both a confirmation and an expiry notification.
        let kinds = notifier
            .recorded()
            .into_iter()
            .map(|i| i.kind)
            .collect::<Vec<_>>();
        assert!(
            !(kinds.contains(&notify::Kind::Confirmed)
                && kinds.contains(&notify::Kind::Expired)),
        );
    }
}
