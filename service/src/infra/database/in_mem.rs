//! In-memory [`Database`] implementation.
//!
//! Backs the test suite and local development runs; data lives only as long
//! as the process does.

use std::{collections::HashMap, sync::Arc};

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Update, UpdateIf,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracerr::Traced;

use crate::{
    domain::{booking, listing, rating, user, Booking, Listing, Rating},
    infra::{database, Database},
    read::{Holding, Honored, Stale},
};

/// In-memory [`Database`] client.
#[derive(Clone, Debug)]
pub struct InMem<C = NonTx> {
    /// Shared [`State`] of the storage.
    state: Arc<State>,

    /// Client mode of this handle.
    client: C,
}

impl InMem {
    /// Creates a new empty [`InMem`] database.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(State::default()),
            client: NonTx,
        }
    }
}

impl Default for InMem {
    fn default() -> Self {
        Self::new()
    }
}

/// Tables of an [`InMem`] database.
#[derive(Debug, Default)]
struct State {
    /// Stored [`Listing`]s.
    listings: RwLock<HashMap<listing::Id, Listing>>,

    /// Stored [`Booking`]s.
    bookings: RwLock<HashMap<booking::Id, Booking>>,

    /// Stored [`Rating`]s.
    ratings: RwLock<HashMap<rating::Id, Rating>>,

    /// Per-[`Listing`] locks serializing transactions.
    locks: Mutex<HashMap<listing::Id, Arc<Mutex<()>>>>,
}

/// Mode of an [`InMem`] client outside of a transaction.
#[derive(Clone, Copy, Debug, Default)]
pub struct NonTx;

/// Mode of an [`InMem`] client inside a transaction.
///
/// Writes apply immediately; the transaction only scopes the [`Lock`]s it
/// acquired, released on [`Commit`] (or when the client is dropped).
#[derive(Clone, Debug, Default)]
pub struct Tx {
    /// [`Lock`] guards held by this transaction.
    held: Arc<Mutex<Vec<OwnedMutexGuard<()>>>>,
}

impl Database<Transact> for InMem<NonTx> {
    type Ok = InMem<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(InMem {
            state: Arc::clone(&self.state),
            client: Tx::default(),
        })
    }
}

impl Database<Transact> for InMem<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for InMem<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.client.held.lock().await.clear();
        Ok(())
    }
}

impl Database<Lock<By<Listing, listing::Id>>> for InMem<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Listing, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        // Clone the entry out, so the registry itself isn't blocked while
        // this transaction awaits the lock.
        let entry = {
            let mut locks = self.state.locks.lock().await;
            Arc::clone(locks.entry(id).or_default())
        };
        let guard = entry.lock_owned().await;
        self.client.held.lock().await.push(guard);
        Ok(())
    }
}

impl<C> Database<Insert<Listing>> for InMem<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(l): Insert<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        _ = self.state.listings.write().await.insert(l.id, l);
        Ok(())
    }
}

impl<C> Database<Select<By<Option<Listing>, listing::Id>>> for InMem<C> {
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.state.listings.read().await.get(&by.into_inner()).cloned())
    }
}

impl<C> Database<Update<(listing::Id, listing::Stats)>> for InMem<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update((id, stats)): Update<(listing::Id, listing::Stats)>,
    ) -> Result<Self::Ok, Self::Err> {
        if let Some(l) = self.state.listings.write().await.get_mut(&id) {
            l.stats = stats;
        }
        Ok(())
    }
}

impl<C> Database<Update<(listing::Id, listing::RatingStats)>> for InMem<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update((id, stats)): Update<(listing::Id, listing::RatingStats)>,
    ) -> Result<Self::Ok, Self::Err> {
        if let Some(l) = self.state.listings.write().await.get_mut(&id) {
            l.rating = stats;
        }
        Ok(())
    }
}

impl<C> Database<Insert<Booking>> for InMem<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(b): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        _ = self.state.bookings.write().await.insert(b.id, b);
        Ok(())
    }
}

impl<C> Database<Select<By<Option<Booking>, booking::Id>>> for InMem<C> {
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.state.bookings.read().await.get(&by.into_inner()).cloned())
    }
}

impl<C> Database<Select<By<Vec<Booking>, listing::Id>>> for InMem<C> {
    type Ok = Vec<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Booking>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let listing_id = by.into_inner();
        let mut bookings = self
            .state
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.listing_id == listing_id)
            .cloned()
            .collect::<Vec<_>>();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }
}

impl<C> Database<Select<By<Vec<Booking>, user::Id>>> for InMem<C> {
    type Ok = Vec<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Booking>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let renter_id = by.into_inner();
        let mut bookings = self
            .state
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.renter_id == renter_id)
            .cloned()
            .collect::<Vec<_>>();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }
}

impl<C> Database<Select<By<Vec<Holding<Booking>>, listing::Id>>> for InMem<C> {
    type Ok = Vec<Holding<Booking>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Holding<Booking>>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let listing_id = by.into_inner();
        Ok(self
            .state
            .bookings
            .read()
            .await
            .values()
            .filter(|b| {
                b.listing_id == listing_id && b.status.holds_period()
            })
            .cloned()
            .map(Holding)
            .collect())
    }
}

impl<C> Database<Select<By<Vec<Honored<Booking>>, listing::Id>>> for InMem<C> {
    type Ok = Vec<Honored<Booking>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Honored<Booking>>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let listing_id = by.into_inner();
        Ok(self
            .state
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.listing_id == listing_id && b.status.is_honored())
            .cloned()
            .map(Honored)
            .collect())
    }
}

impl<C> Database<Select<By<Vec<Stale<Booking>>, booking::ExpirationDateTime>>>
    for InMem<C>
{
    type Ok = Vec<Stale<Booking>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<Stale<Booking>>, booking::ExpirationDateTime>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline = by.into_inner();
        let mut stale = self
            .state
            .bookings
            .read()
            .await
            .values()
            .filter(|b| {
                b.status == booking::Status::Pending
                    && b.expires_at.is_some_and(|at| at < deadline)
            })
            .cloned()
            .collect::<Vec<_>>();
        stale.sort_by_key(|b| b.created_at);
        Ok(stale.into_iter().map(Stale).collect())
    }
}

impl<C> Database<UpdateIf<Booking, booking::Status>> for InMem<C> {
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        UpdateIf(b, expected): UpdateIf<Booking, booking::Status>,
    ) -> Result<Self::Ok, Self::Err> {
        match self.state.bookings.write().await.get_mut(&b.id) {
            Some(stored) if stored.status == expected => {
                *stored = b;
                Ok(true)
            }
            Some(_) | None => Ok(false),
        }
    }
}

impl<C> Database<Insert<Rating>> for InMem<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(r): Insert<Rating>,
    ) -> Result<Self::Ok, Self::Err> {
        _ = self.state.ratings.write().await.insert(r.id, r);
        Ok(())
    }
}

impl<C> Database<Select<By<Vec<Rating>, listing::Id>>> for InMem<C> {
    type Ok = Vec<Rating>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Rating>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let listing_id = by.into_inner();
        let mut ratings = self
            .state
            .ratings
            .read()
            .await
            .values()
            .filter(|r| r.listing_id == listing_id)
            .cloned()
            .collect::<Vec<_>>();
        ratings.sort_by_key(|r| r.created_at);
        Ok(ratings)
    }
}
