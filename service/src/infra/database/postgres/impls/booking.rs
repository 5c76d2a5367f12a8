//! [`Booking`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Select, UpdateIf},
    Money,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{booking, listing, user, Booking},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read::{Holding, Honored, Stale},
};

/// Columns of the `bookings` table, in the [`decode()`] order.
const COLUMNS: &str = "\
    id, listing_id, renter_id, \
    starts_at, ends_at, \
    total_price, total_price_currency, \
    status, \
    pickup_time, return_time, \
    amendment_fields, amendment_message, amendment_requested_by, \
    created_at, expires_at";

/// Decodes a [`Booking`] out of the provided [`Row`].
fn decode(row: &Row) -> Booking {
    let amendment = row
        .get::<_, Option<booking::Party>>("amendment_requested_by")
        .map(|requested_by| booking::Amendment {
            fields: row
                .get::<_, Option<Vec<booking::Field>>>("amendment_fields")
                .unwrap_or_default(),
            message: row.get("amendment_message"),
            requested_by,
        });
    Booking {
        id: row.get("id"),
        listing_id: row.get("listing_id"),
        renter_id: row.get("renter_id"),
        period: booking::Period::new(row.get("starts_at"), row.get("ends_at"))
            .expect("enforced by the `bookings_period_check` constraint"),
        total_price: Money {
            amount: row.get("total_price"),
            currency: row.get("total_price_currency"),
        },
        status: row.get("status"),
        pickup_time: row.get("pickup_time"),
        return_time: row.get("return_time"),
        amendment,
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
    }
}

impl<C> Database<Insert<Booking>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(b): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO bookings (id, listing_id, renter_id, \
                                  starts_at, ends_at, \
                                  total_price, total_price_currency, \
                                  status, \
                                  pickup_time, return_time, \
                                  amendment_fields, amendment_message, \
                                  amendment_requested_by, \
                                  created_at, expires_at) \
            VALUES ($1, $2, $3, $4, $5, $6, $7::INT2, $8::INT2, \
                    $9, $10, $11, $12, $13::INT2, $14, $15)";

        let fields = b.amendment.as_ref().map(|a| a.fields.clone());
        let message = b.amendment.as_ref().map(|a| a.message.clone());
        let requested_by = b.amendment.as_ref().map(|a| a.requested_by);

        self.exec(
            SQL,
            &[
                &b.id,
                &b.listing_id,
                &b.renter_id,
                &b.period.starts_at(),
                &b.period.ends_at(),
                &b.total_price.amount,
                &b.total_price.currency,
                &b.status,
                &b.pickup_time,
                &b.return_time,
                &fields,
                &message,
                &requested_by,
                &b.created_at,
                &b.expires_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Option<Booking>, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE id = $1::UUID \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&by.into_inner()])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(decode))
    }
}

impl<C> Database<Select<By<Vec<Booking>, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Booking>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE listing_id = $1::UUID \
             ORDER BY created_at",
        );
        self.query(&sql, &[&by.into_inner()])
            .await
            .map_err(tracerr::wrap!())
            .map(|rows| rows.iter().map(decode).collect())
    }
}

impl<C> Database<Select<By<Vec<Booking>, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Booking>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE renter_id = $1::UUID \
             ORDER BY created_at",
        );
        self.query(&sql, &[&by.into_inner()])
            .await
            .map_err(tracerr::wrap!())
            .map(|rows| rows.iter().map(decode).collect())
    }
}

impl<C> Database<Select<By<Vec<Holding<Booking>>, listing::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Holding<Booking>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Holding<Booking>>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE listing_id = $1::UUID \
               AND status = $2::INT2 \
             ORDER BY created_at",
        );
        self.query(
            &sql,
            &[&by.into_inner(), &booking::Status::Confirmed],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|rows| rows.iter().map(|r| Holding(decode(r))).collect())
    }
}

impl<C> Database<Select<By<Vec<Honored<Booking>>, listing::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Honored<Booking>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Honored<Booking>>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE listing_id = $1::UUID \
               AND status IN ($2::INT2, $3::INT2, $4::INT2, $5::INT2) \
             ORDER BY created_at",
        );
        self.query(
            &sql,
            &[
                &by.into_inner(),
                &booking::Status::Confirmed,
                &booking::Status::Paid,
                &booking::Status::Active,
                &booking::Status::Completed,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|rows| rows.iter().map(|r| Honored(decode(r))).collect())
    }
}

impl<C> Database<Select<By<Vec<Stale<Booking>>, booking::ExpirationDateTime>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Stale<Booking>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Vec<Stale<Booking>>, booking::ExpirationDateTime>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM bookings \
             WHERE status = $1::INT2 \
               AND expires_at IS NOT NULL \
               AND expires_at < $2 \
             ORDER BY created_at",
        );
        self.query(&sql, &[&booking::Status::Pending, &by.into_inner()])
            .await
            .map_err(tracerr::wrap!())
            .map(|rows| rows.iter().map(|r| Stale(decode(r))).collect())
    }
}

impl<C> Database<UpdateIf<Booking, booking::Status>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        UpdateIf(b, expected): UpdateIf<Booking, booking::Status>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE bookings \
            SET starts_at = $3, \
                ends_at = $4, \
                status = $5::INT2, \
                pickup_time = $6, \
                return_time = $7, \
                amendment_fields = $8, \
                amendment_message = $9, \
                amendment_requested_by = $10::INT2, \
                expires_at = $11 \
            WHERE id = $1::UUID \
              AND status = $2::INT2";

        let fields = b.amendment.as_ref().map(|a| a.fields.clone());
        let message = b.amendment.as_ref().map(|a| a.message.clone());
        let requested_by = b.amendment.as_ref().map(|a| a.requested_by);

        let affected = self
            .exec(
                SQL,
                &[
                    &b.id,
                    &expected,
                    &b.period.starts_at(),
                    &b.period.ends_at(),
                    &b.status,
                    &b.pickup_time,
                    &b.return_time,
                    &fields,
                    &message,
                    &requested_by,
                    &b.expires_at,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?;
        Ok(affected == 1)
    }
}
