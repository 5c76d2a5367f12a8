//! [`Command`] for requesting a new [`Booking`].

use std::fmt;

use common::{
    operations::{By, Insert, Select},
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

/// [`Command`] for requesting a new [`Booking`] of a [`Listing`].
///
/// The created [`Booking`] is [`Pending`] and awaits the owner's decision
/// until its deadline. Other [`Pending`] requests on the same dates don't
/// block each other: whichever the owner confirms first wins the range.
///
/// [`Pending`]: booking::Status::Pending
#[derive(Clone, Copy, Debug)]
pub struct RequestBooking {
    /// ID of the [`Listing`] to book.
    pub listing_id: listing::Id,

    /// ID of the renting user.
    pub renter_id: user::Id,

    /// Desired rental [`booking::Period`].
    pub period: booking::Period,
}

impl<Db, Nt, Ck> Command<RequestBooking> for Service<Db, Nt, Ck>
where
    Db: Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Holding<Booking>>, listing::Id>>,
            Ok = Vec<Holding<Booking>>,
            Err = Traced<database::Error>,
        > + Database<Insert<Booking>, Ok = (), Err = Traced<database::Error>>,
    Nt: Notifier<notify::Dispatch, Ok = (), Err: fmt::Display>,
    Ck: Clock,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RequestBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RequestBooking {
            listing_id,
            renter_id,
            period,
        } = cmd;

        let listing = self
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;

        if !listing.is_active {
            return Err(tracerr::new!(E::ListingInactive(listing_id)));
        }
        if listing.owner_id == renter_id && !self.config().allow_self_booking
        {
            return Err(tracerr::new!(E::OwnListing(renter_id)));
        }

        let holding = self
            .database()
            .execute(Select(By::<Vec<Holding<Booking>>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if holding.iter().any(|Holding(b)| b.period.overlaps(&period)) {
            return Err(tracerr::new!(E::PeriodUnavailable(listing_id)));
        }

        let total_price = booking::total_price(
            listing.price_per_day,
            period,
            listing.deposit,
        )
        .ok_or(E::DepositCurrencyMismatch(listing_id))
        .map_err(tracerr::wrap!())?;

        let now = self.clock().now();
        let booking = Booking {
            id: booking::Id::new(),
            listing_id: listing.id,
            renter_id,
            period,
            total_price,
            status: booking::Status::Pending,
            pickup_time: None,
            return_time: None,
            amendment: None,
            created_at: now.coerce(),
            expires_at: Some((now + self.config().request_ttl).coerce()),
        };
        self.database()
            .execute(Insert(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.notify(notify::Intent {
            kind: notify::Kind::RequestReceived,
            recipient: listing.owner_id,
            booking_id: booking.id,
            listing_id: listing.id,
        })
        .await;

        Ok(booking)
    }
}

/// Error of [`RequestBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Deposit of the [`Listing`] is kept in a different currency than its
    /// daily price.
    #[display(
        "deposit of `Listing(id: {_0})` mismatches its price currency"
    )]
    DepositCurrencyMismatch(#[error(not(source))] listing::Id),

    /// [`Listing`] doesn't accept new bookings.
    #[display("`Listing(id: {_0})` doesn't accept new bookings")]
    ListingInactive(#[error(not(source))] listing::Id),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// Renter is the owner of the [`Listing`].
    #[display("`User(id: {_0})` cannot book their own listing")]
    OwnListing(#[error(not(source))] user::Id),

    /// Requested period overlaps a confirmed [`Booking`].
    #[display("requested period of `Listing(id: {_0})` is unavailable")]
    PeriodUnavailable(#[error(not(source))] listing::Id),
}

#[cfg(test)]
mod spec {
    use common::{
        clock,
        money::Currency,
        operations::{By, Insert, Select},
        DateTime, Money,
    };
    use rust_decimal::Decimal;

    use crate::{
        command::ConfirmBooking,
        domain::{booking, listing, user, Booking, Listing},
        infra::{database::InMem, notify},
        Command as _, Config, Service,
    };

    use super::{ExecutionError as E, RequestBooking};

    fn at(secs: i64) -> DateTime {
        DateTime::from_unix_timestamp(secs).unwrap()
    }

    fn period(starts_at: i64, ends_at: i64) -> booking::Period {
        booking::Period::new(at(starts_at), at(ends_at)).unwrap()
    }

    fn mur(amount: u32) -> Money {
        Money {
            amount: Decimal::from(amount),
            currency: Currency::Mur,
        }
    }

    fn listing(owner_id: user::Id) -> Listing {
        Listing {
            id: listing::Id::new(),
            owner_id,
            title: "Angle grinder".parse().unwrap(),
            price_per_day: mur(100),
            deposit: None,
            is_active: true,
            stats: listing::Stats::default(),
            rating: listing::RatingStats::default(),
            created_at: at(0).coerce(),
        }
    }

    fn service(
        config: Config,
    ) -> (
        Service<InMem, notify::Memory, clock::Manual>,
        notify::Memory,
    ) {
        let notifier = notify::Memory::default();
        let (service, _bg) = Service::new(
            config,
            InMem::new(),
            notifier.clone(),
            clock::Manual::new(at(0)),
        );
        (service, notifier)
    }

    #[tokio::test]
    async fn creates_pending_booking_with_deadline_and_frozen_price() {
        let (service, notifier) = service(Config::default());
        let owner = user::Id::new();
        let l = listing(owner);
        service.database().execute(Insert(l.clone())).await.unwrap();

        let renter = user::Id::new();
        let b = service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: renter,
                period: period(0, 2 * 86_400),
            })
            .await
            .unwrap();

        assert_eq!(b.status, booking::Status::Pending);
        assert_eq!(b.total_price, mur(200));
        assert_eq!(b.expires_at, Some(at(24 * 3_600).coerce()));
        assert_eq!(
            notifier.recorded(),
            vec![notify::Intent {
                kind: notify::Kind::RequestReceived,
                recipient: owner,
                booking_id: b.id,
                listing_id: l.id,
            }],
        );

        let stored = service
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(b.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, booking::Status::Pending);
        assert_eq!(stored.total_price, mur(200));
    }

    #[tokio::test]
    async fn includes_deposit_into_total_price() {
        let (service, _) = service(Config::default());
        let mut l = listing(user::Id::new());
        l.deposit = Some(mur(50));
        service.database().execute(Insert(l.clone())).await.unwrap();

        let b = service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: user::Id::new(),
                period: period(0, 2 * 86_400),
            })
            .await
            .unwrap();

        assert_eq!(b.total_price, mur(250));
    }

    #[tokio::test]
    async fn pending_requests_dont_block_each_other() {
        let (service, _) = service(Config::default());
        let l = listing(user::Id::new());
        service.database().execute(Insert(l.clone())).await.unwrap();

        let first = service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: user::Id::new(),
                period: period(0, 2 * 86_400),
            })
            .await
            .unwrap();
        let second = service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: user::Id::new(),
                period: period(86_400, 3 * 86_400),
            })
            .await
            .unwrap();

        assert_eq!(first.status, booking::Status::Pending);
        assert_eq!(second.status, booking::Status::Pending);
    }

    #[tokio::test]
    async fn confirmed_booking_blocks_overlapping_requests() {
        let (service, _) = service(Config::default());
        let owner = user::Id::new();
        let l = listing(owner);
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
                owner_id: owner,
                pickup_time: None,
                return_time: None,
            })
            .await
            .unwrap();

        let err = service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: user::Id::new(),
                period: period(86_400, 3 * 86_400),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::PeriodUnavailable(_)));

        // A disjoint period is still admissible.
        let after = service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: user::Id::new(),
                period: period(5 * 86_400, 6 * 86_400),
            })
            .await;
        assert!(after.is_ok());
    }

    #[tokio::test]
    async fn self_booking_is_a_policy() {
        let owner = user::Id::new();

        let (service, _) = service(Config::default());
        let l = listing(owner);
        service.database().execute(Insert(l.clone())).await.unwrap();
        let err = service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: owner,
                period: period(0, 86_400),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::OwnListing(_)));

        let (service, _) = self::service(Config {
            allow_self_booking: true,
            ..Config::default()
        });
        let l = listing(owner);
        service.database().execute(Insert(l.clone())).await.unwrap();
        let b = service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: owner,
                period: period(0, 86_400),
            })
            .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn rejects_inactive_and_unknown_listings() {
        let (service, _) = service(Config::default());

        let err = service
            .execute(RequestBooking {
                listing_id: listing::Id::new(),
                renter_id: user::Id::new(),
                period: period(0, 86_400),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::ListingNotExists(_)));

        let mut l = listing(user::Id::new());
        l.is_active = false;
        service.database().execute(Insert(l.clone())).await.unwrap();
        let err = service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: user::Id::new(),
                period: period(0, 86_400),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::ListingInactive(_)));
    }
}
