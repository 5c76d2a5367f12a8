//! [`Listing`] definitions.

use common::{unit, DateTimeOf, Money};
#[cfg(doc)]
use common::DateTime;
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{user, Booking, Rating};

/// Item listed for rent.
///
/// Listings are created and edited by the listing-management collaborator;
/// the engine reads them to admit bookings and writes back the cached
/// aggregates.
#[derive(Clone, Debug)]
pub struct Listing {
    /// ID of this [`Listing`].
    pub id: Id,

    /// ID of the owning user.
    pub owner_id: user::Id,

    /// [`Title`] of this [`Listing`].
    pub title: Title,

    /// Price of renting this [`Listing`] for one day.
    pub price_per_day: Money,

    /// Deposit to be paid at the beginning of the rental, if required.
    ///
    /// Held in the same currency as the daily price.
    pub deposit: Option<Money>,

    /// Indicates whether this [`Listing`] accepts new bookings.
    pub is_active: bool,

    /// Cached earnings [`Stats`] of this [`Listing`].
    pub stats: Stats,

    /// Cached [`RatingStats`] of this [`Listing`].
    pub rating: RatingStats,

    /// [`DateTime`] when this [`Listing`] was created.
    pub created_at: CreationDateTime,
}

/// ID of a [`Listing`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Title of a [`Listing`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Title(String);

impl Title {
    /// Creates a new [`Title`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `title` is not empty.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(title: impl Into<String>) -> Self {
        Self(title.into())
    }

    /// Creates a new [`Title`] if the given `title` is valid.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Option<Self> {
        let title = title.into();
        Self::check(&title).then_some(Self(title))
    }

    /// Checks whether the given `title` is a valid [`Title`].
    fn check(title: impl AsRef<str>) -> bool {
        let title = title.as_ref();
        title.trim() == title && !title.is_empty() && title.len() <= 512
    }
}

impl FromStr for Title {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Title`")
    }
}

/// Cached earnings aggregates of a [`Listing`].
///
/// Derived, never authoritative: always reproducible via [`Stats::derive()`]
/// from the honored [`Booking`]s of the [`Listing`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Stats {
    /// Number of honored [`Booking`]s.
    pub booking_count: u32,

    /// Sum of the [`Booking::total_price`] amounts.
    pub total_earnings: Decimal,

    /// Mean of the [`Booking::total_price`] amounts, or zero without any
    /// honored [`Booking`]s.
    pub avg_earnings: Decimal,

    /// Mean rental duration in days, or zero without any honored
    /// [`Booking`]s.
    pub avg_duration_days: Decimal,
}

impl Stats {
    /// Derives the [`Stats`] from the honored [`Booking`]s of a [`Listing`].
    ///
    /// A pure, idempotent fold: feeding the same set yields the same
    /// [`Stats`].
    #[must_use]
    pub fn derive<'b>(
        bookings: impl IntoIterator<Item = &'b Booking>,
    ) -> Self {
        let mut count = 0_u32;
        let mut earnings = Decimal::ZERO;
        let mut days = Decimal::ZERO;
        for b in bookings {
            count += 1;
            earnings += b.total_price.amount;
            days += Decimal::from(b.period.days());
        }

        if count == 0 {
            return Self::default();
        }
        Self {
            booking_count: count,
            total_earnings: earnings,
            avg_earnings: round2(earnings / Decimal::from(count)),
            avg_duration_days: round2(days / Decimal::from(count)),
        }
    }
}

/// Cached rating aggregates of a [`Listing`].
///
/// Derived, never authoritative: always reproducible via
/// [`RatingStats::derive()`] from the [`Rating`]s of the [`Listing`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RatingStats {
    /// Number of received [`Rating`]s.
    pub review_count: u32,

    /// Mean of the received scores, or zero without any [`Rating`]s.
    pub rating: Decimal,
}

impl RatingStats {
    /// Derives the [`RatingStats`] from the [`Rating`]s of a [`Listing`].
    ///
    /// A pure, idempotent fold.
    #[must_use]
    pub fn derive<'r>(ratings: impl IntoIterator<Item = &'r Rating>) -> Self {
        let mut count = 0_u32;
        let mut sum = Decimal::ZERO;
        for r in ratings {
            count += 1;
            sum += Decimal::from(r.score.u8());
        }

        if count == 0 {
            return Self::default();
        }
        Self {
            review_count: count,
            rating: round2(sum / Decimal::from(count)),
        }
    }
}

/// Rounds the provided aggregate to 2 decimal places.
fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// [`DateTime`] when a [`Listing`] was created.
pub type CreationDateTime = DateTimeOf<(Listing, unit::Creation)>;
