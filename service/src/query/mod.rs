//! [`Query`] definition.

pub mod booking;
pub mod bookings;
pub mod listing;

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    infra::{database, Database},
    Service,
};

/// [`Query`] of the [`Service`].
pub use common::Handler as Query;

/// [`Query`] [`Select`]ing a `T`ype from a [`Database`].
#[derive(Clone, Copy, Debug)]
#[expect(clippy::module_name_repetitions, reason = "more readable")]
pub struct DatabaseQuery<T>(T);

impl<W, B> DatabaseQuery<By<W, B>> {
    /// Creates a new [`DatabaseQuery`] selecting a `W` by the provided `B`.
    #[must_use]
    pub fn by(by: B) -> Self {
        Self(By::new(by))
    }
}

impl<Db, Nt, Ck, W, B> Query<DatabaseQuery<By<W, B>>> for Service<Db, Nt, Ck>
where
    Db: Database<Select<By<W, B>>, Ok = W, Err = Traced<database::Error>>,
{
    type Ok = W;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        DatabaseQuery(by): DatabaseQuery<By<W, B>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.database()
            .execute(Select(by))
            .await
            .map_err(tracerr::wrap!())
    }
}

#[cfg(test)]
mod spec {
    use common::{clock, operations::Insert, DateTime};

    use crate::{
        command::RequestBooking,
        domain::{booking, listing, user, Listing},
        infra::{database::InMem, notify},
        Command as _, Config, Service,
    };

    use crate::query;

    fn at(secs: i64) -> DateTime {
        DateTime::from_unix_timestamp(secs).unwrap()
    }

    #[tokio::test]
    async fn selects_bookings_by_id_listing_and_renter() {
        let (service, _bg) = Service::new(
            Config::default(),
            InMem::new(),
            notify::Memory::default(),
            clock::Manual::new(at(0)),
        );

        let l = Listing {
            id: listing::Id::new(),
            owner_id: user::Id::new(),
            title: "Rotary hammer".parse().unwrap(),
            price_per_day: "70MUR".parse().unwrap(),
            deposit: None,
            is_active: true,
            stats: listing::Stats::default(),
            rating: listing::RatingStats::default(),
            created_at: at(0).coerce(),
        };
        service.database().execute(Insert(l.clone())).await.unwrap();

        let renter = user::Id::new();
        let b = service
            .execute(RequestBooking {
                listing_id: l.id,
                renter_id: renter,
                period: booking::Period::new(at(0), at(86_400)).unwrap(),
            })
            .await
            .unwrap();

        let by_id = service
            .execute(query::booking::ById::by(b.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id.id, b.id);

        let by_listing = service
            .execute(query::bookings::ByListing::by(l.id))
            .await
            .unwrap();
        assert_eq!(by_listing.len(), 1);

        let by_renter = service
            .execute(query::bookings::ByRenter::by(renter))
            .await
            .unwrap();
        assert_eq!(by_renter.len(), 1);
        assert!(service
            .execute(query::bookings::ByRenter::by(user::Id::new()))
            .await
            .unwrap()
            .is_empty());

        let stored = service
            .execute(query::listing::ById::by(l.id))
            .await
            .unwrap();
        assert!(stored.is_some());
    }
}
