//! [`Rating`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{listing, rating, Rating},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of the `ratings` table, in the [`decode()`] order.
const COLUMNS: &str = "\
    id, listing_id, renter_id, score, comment, created_at";

/// Decodes a [`Rating`] out of the provided [`Row`].
fn decode(row: &Row) -> Rating {
    let score = u8::try_from(row.get::<_, i16>("score")).unwrap_or_default();
    Rating {
        id: row.get("id"),
        listing_id: row.get("listing_id"),
        renter_id: row.get("renter_id"),
        score: rating::Score::new(score)
            .expect("enforced by the `ratings_score_check` constraint"),
        comment: row.get("comment"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Insert<Rating>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(r): Insert<Rating>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO ratings (id, listing_id, renter_id, \
                                 score, comment, created_at) \
            VALUES ($1, $2, $3, $4::INT2, $5, $6)";

        self.exec(
            SQL,
            &[
                &r.id,
                &r.listing_id,
                &r.renter_id,
                &i16::from(r.score.u8()),
                &r.comment,
                &r.created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Vec<Rating>, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Rating>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Rating>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM ratings \
             WHERE listing_id = $1::UUID \
             ORDER BY created_at",
        );
        self.query(&sql, &[&by.into_inner()])
            .await
            .map_err(tracerr::wrap!())
            .map(|rows| rows.iter().map(decode).collect())
    }
}
