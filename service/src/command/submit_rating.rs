//! [`Command`] for submitting a [`Rating`].

use common::{
    operations::{By, Insert, Select, Update},
    Clock,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{listing, rating, user, Listing, Rating},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for submitting a new [`Rating`] of a [`Listing`] by a
/// renter.
///
/// Rolls the submitted score up into the cached
/// [`listing::RatingStats`] right away.
#[derive(Clone, Debug)]
pub struct SubmitRating {
    /// ID of the rated [`Listing`].
    pub listing_id: listing::Id,

    /// ID of the reviewing renter.
    pub renter_id: user::Id,

    /// [`rating::Score`] given to the [`Listing`].
    pub score: rating::Score,

    /// Optional [`rating::Comment`] accompanying the score.
    pub comment: Option<rating::Comment>,
}

impl<Db, Nt, Ck> Command<SubmitRating> for Service<Db, Nt, Ck>
where
    Db: Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<Insert<Rating>, Ok = (), Err = Traced<database::Error>>
        + Database<
            Select<By<Vec<Rating>, listing::Id>>,
            Ok = Vec<Rating>,
            Err = Traced<database::Error>,
        > + Database<
            Update<(listing::Id, listing::RatingStats)>,
            Ok = (),
            Err = Traced<database::Error>,
        >,
    Ck: Clock,
{
    type Ok = Rating;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: SubmitRating,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SubmitRating {
            listing_id,
            renter_id,
            score,
            comment,
        } = cmd;

        self.database()
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())
            .map(drop)?;

        let rating = Rating {
            id: rating::Id::new(),
            listing_id,
            renter_id,
            score,
            comment,
            created_at: self.clock().now().coerce(),
        };
        self.database()
            .execute(Insert(rating.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        _ = self
            .refresh_rating_stats(listing_id)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(rating)
    }
}

/// Error of [`SubmitRating`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),
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
        domain::{listing, rating, user, Listing},
        infra::{database::InMem, notify},
        Command as _, Config, Service,
    };

    use super::{ExecutionError as E, SubmitRating};

    fn at(secs: i64) -> DateTime {
        DateTime::from_unix_timestamp(secs).unwrap()
    }

    async fn setup() -> (
        Service<InMem, notify::Memory, clock::Manual>,
        Listing,
    ) {
        let (service, _bg) = Service::new(
            Config::default(),
            InMem::new(),
            notify::Memory::default(),
            clock::Manual::new(at(0)),
        );

        let l = Listing {
            id: listing::Id::new(),
            owner_id: user::Id::new(),
            title: "Wet vacuum".parse().unwrap(),
            price_per_day: "90MUR".parse().unwrap(),
            deposit: None,
            is_active: true,
            stats: listing::Stats::default(),
            rating: listing::RatingStats::default(),
            created_at: at(0).coerce(),
        };
        service.database().execute(Insert(l.clone())).await.unwrap();
        (service, l)
    }

    #[tokio::test]
    async fn rolls_scores_up_into_listing_rating() {
        let (service, l) = setup().await;

        service
            .execute(SubmitRating {
                listing_id: l.id,
                renter_id: user::Id::new(),
                score: rating::Score::new(4).unwrap(),
                comment: Some("Did the job".parse().unwrap()),
            })
            .await
            .unwrap();
        service
            .execute(SubmitRating {
                listing_id: l.id,
                renter_id: user::Id::new(),
                score: rating::Score::new(5).unwrap(),
                comment: None,
            })
            .await
            .unwrap();

        let stored = service
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(l.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.rating.review_count, 2);
        assert_eq!(stored.rating.rating, Decimal::new(45, 1));
    }

    #[tokio::test]
    async fn refuses_unknown_listings() {
        let (service, _) = setup().await;

        let err = service
            .execute(SubmitRating {
                listing_id: listing::Id::new(),
                renter_id: user::Id::new(),
                score: rating::Score::new(3).unwrap(),
                comment: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::ListingNotExists(_)));
    }
}
