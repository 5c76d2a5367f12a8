//! Recomputation of the cached [`Listing`] aggregates.
//!
//! Always a full re-derivation from the authoritative sets, never an
//! incremental counter update: the folds stay idempotent and self-heal
//! after crashed or out-of-order writes.

use common::operations::{By, Select, Update};
use tracerr::Traced;

use crate::{
    domain::{listing, Booking, Rating},
    infra::{database, Database},
    read::Honored,
    Service,
};
#[cfg(doc)]
use crate::domain::Listing;

impl<Db, Nt, Ck> Service<Db, Nt, Ck> {
    /// Recomputes the cached earnings [`listing::Stats`] of a [`Listing`]
    /// from its honored [`Booking`]s, and stores them.
    ///
    /// Must run after every transition entering or leaving the honored set.
    ///
    /// # Errors
    ///
    /// If a [`Database`] operation fails. Safe to retry: the recomputation
    /// is idempotent.
    pub async fn refresh_booking_stats(
        &self,
        listing_id: listing::Id,
    ) -> Result<listing::Stats, Traced<database::Error>>
    where
        Db: Database<
                Select<By<Vec<Honored<Booking>>, listing::Id>>,
                Ok = Vec<Honored<Booking>>,
                Err = Traced<database::Error>,
            > + Database<
                Update<(listing::Id, listing::Stats)>,
                Ok = (),
                Err = Traced<database::Error>,
            >,
    {
        let honored = self
            .database()
            .execute(Select(By::<Vec<Honored<Booking>>, _>::new(listing_id)))
            .await
            .map_err(tracerr::wrap!())?;

        let stats = listing::Stats::derive(honored.iter().map(|Honored(b)| b));
        self.database()
            .execute(Update((listing_id, stats)))
            .await
            .map_err(tracerr::wrap!())
            .map(drop)?;

        Ok(stats)
    }

    /// Recomputes the cached [`listing::RatingStats`] of a [`Listing`] from
    /// its [`Rating`]s, and stores them.
    ///
    /// Must run after every [`Rating`] submission.
    ///
    /// # Errors
    ///
    /// If a [`Database`] operation fails. Safe to retry: the recomputation
    /// is idempotent.
    pub async fn refresh_rating_stats(
        &self,
        listing_id: listing::Id,
    ) -> Result<listing::RatingStats, Traced<database::Error>>
    where
        Db: Database<
                Select<By<Vec<Rating>, listing::Id>>,
                Ok = Vec<Rating>,
                Err = Traced<database::Error>,
            > + Database<
                Update<(listing::Id, listing::RatingStats)>,
                Ok = (),
                Err = Traced<database::Error>,
            >,
    {
        let ratings = self
            .database()
            .execute(Select(By::<Vec<Rating>, _>::new(listing_id)))
            .await
            .map_err(tracerr::wrap!())?;

        let stats = listing::RatingStats::derive(&ratings);
        self.database()
            .execute(Update((listing_id, stats)))
            .await
            .map_err(tracerr::wrap!())
            .map(drop)?;

        Ok(stats)
    }
}
