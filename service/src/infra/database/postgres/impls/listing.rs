//! [`Listing`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{listing, Listing},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of the `listings` table, in the [`decode()`] order.
const COLUMNS: &str = "\
    id, owner_id, title, \
    price_per_day, price_currency, \
    deposit, deposit_currency, \
    is_active, \
    booking_count, total_earnings, avg_earnings, avg_duration_days, \
    review_count, rating, \
    created_at";

/// Decodes a [`Listing`] out of the provided [`Row`].
fn decode(row: &Row) -> Listing {
    Listing {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        price_per_day: Money {
            amount: row.get("price_per_day"),
            currency: row.get("price_currency"),
        },
        deposit: row.get::<_, Option<_>>("deposit").map(|amount| Money {
            amount,
            currency: row.get("deposit_currency"),
        }),
        is_active: row.get("is_active"),
        stats: listing::Stats {
            booking_count: u32::try_from(
                row.get::<_, i32>("booking_count"),
            )
            .unwrap_or_default(),
            total_earnings: row.get("total_earnings"),
            avg_earnings: row.get("avg_earnings"),
            avg_duration_days: row.get("avg_duration_days"),
        },
        rating: listing::RatingStats {
            review_count: u32::try_from(row.get::<_, i32>("review_count"))
                .unwrap_or_default(),
            rating: row.get("rating"),
        },
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Insert<Listing>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(l): Insert<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO listings (id, owner_id, title, \
                                  price_per_day, price_currency, \
                                  deposit, deposit_currency, \
                                  is_active, \
                                  booking_count, total_earnings, \
                                  avg_earnings, avg_duration_days, \
                                  review_count, rating, \
                                  created_at) \
            VALUES ($1, $2, $3, $4, $5::INT2, $6, $7::INT2, $8, \
                    $9::INT4, $10, $11, $12, $13::INT4, $14, $15)";

        self.exec(
            SQL,
            &[
                &l.id,
                &l.owner_id,
                &l.title,
                &l.price_per_day.amount,
                &l.price_per_day.currency,
                &l.deposit.map(|d| d.amount),
                &l.deposit.map(|d| d.currency),
                &l.is_active,
                &i32::try_from(l.stats.booking_count).unwrap_or(i32::MAX),
                &l.stats.total_earnings,
                &l.stats.avg_earnings,
                &l.stats.avg_duration_days,
                &i32::try_from(l.rating.review_count).unwrap_or(i32::MAX),
                &l.rating.rating,
                &l.created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Option<Listing>, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM listings \
             WHERE id = $1::UUID \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&by.into_inner()])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(decode))
    }
}

impl<C> Database<Update<(listing::Id, listing::Stats)>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update((id, stats)): Update<(listing::Id, listing::Stats)>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE listings \
            SET booking_count = $2::INT4, \
                total_earnings = $3, \
                avg_earnings = $4, \
                avg_duration_days = $5 \
            WHERE id = $1::UUID";

        self.exec(
            SQL,
            &[
                &id,
                &i32::try_from(stats.booking_count).unwrap_or(i32::MAX),
                &stats.total_earnings,
                &stats.avg_earnings,
                &stats.avg_duration_days,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<(listing::Id, listing::RatingStats)>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update((id, stats)): Update<(listing::Id, listing::RatingStats)>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE listings \
            SET review_count = $2::INT4, \
                rating = $3 \
            WHERE id = $1::UUID";

        self.exec(
            SQL,
            &[
                &id,
                &i32::try_from(stats.review_count).unwrap_or(i32::MAX),
                &stats.rating,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Listing, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Listing, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT id \
            FROM listings \
            WHERE id = $1::UUID \
            FOR UPDATE";

        self.query(SQL, &[&by.into_inner()])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
