//! [`Booking`] definitions.

use common::{define_kind, unit, DateTime, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{listing, user};
#[cfg(doc)]
use crate::domain::Listing;

/// Reservation of a [`Listing`] by a renter for a [`Period`] of days.
#[derive(Clone, Debug)]
pub struct Booking {
    /// ID of this [`Booking`].
    pub id: Id,

    /// ID of the reserved [`Listing`].
    pub listing_id: listing::Id,

    /// ID of the renting user.
    pub renter_id: user::Id,

    /// Rental [`Period`] of this [`Booking`].
    pub period: Period,

    /// Total price of this [`Booking`].
    ///
    /// Frozen at creation time: later changes of the [`Listing`] price (or
    /// of the [`Period`] via an [`Amendment`]) don't touch it.
    pub total_price: Money,

    /// Current [`Status`] of this [`Booking`].
    pub status: Status,

    /// [`PickupTime`] arranged by the owner upon confirmation.
    pub pickup_time: Option<PickupTime>,

    /// [`ReturnTime`] arranged by the owner upon confirmation.
    pub return_time: Option<ReturnTime>,

    /// Pending [`Amendment`], present only while the [`Status`] is
    /// [`AmendmentRequested`].
    ///
    /// [`AmendmentRequested`]: Status::AmendmentRequested
    pub amendment: Option<Amendment>,

    /// [`DateTime`] when this [`Booking`] was created.
    pub created_at: CreationDateTime,

    /// Deadline for the owner's decision.
    ///
    /// Armed while the [`Status`] is [`Pending`]; meaningless otherwise.
    ///
    /// [`Pending`]: Status::Pending
    pub expires_at: Option<ExpirationDateTime>,
}

/// ID of a [`Booking`].
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

/// Rental interval of a [`Booking`].
///
/// The end is guaranteed to be strictly after the start.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Period {
    /// [`DateTime`] when the rental starts.
    starts_at: DateTime,

    /// [`DateTime`] when the rental ends.
    ends_at: DateTime,
}

impl Period {
    /// Number of seconds in a day.
    const DAY: i64 = 86_400;

    /// Creates a new [`Period`] if the provided `ends_at` is strictly after
    /// the provided `starts_at`.
    #[must_use]
    pub fn new(starts_at: DateTime, ends_at: DateTime) -> Option<Self> {
        (starts_at < ends_at).then_some(Self { starts_at, ends_at })
    }

    /// Creates a new [`Period`] without validating it.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `ends_at` is strictly after `starts_at`.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(starts_at: DateTime, ends_at: DateTime) -> Self {
        Self { starts_at, ends_at }
    }

    /// Returns the [`DateTime`] when the rental starts.
    #[must_use]
    pub fn starts_at(&self) -> DateTime {
        self.starts_at
    }

    /// Returns the [`DateTime`] when the rental ends.
    #[must_use]
    pub fn ends_at(&self) -> DateTime {
        self.ends_at
    }

    /// Indicates whether this [`Period`] overlaps the `other` one.
    ///
    /// Endpoints are compared inclusively: touching [`Period`]s overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.starts_at <= other.ends_at && other.starts_at <= self.ends_at
    }

    /// Number of rental days of this [`Period`]: the count of UTC calendar
    /// days it touches.
    ///
    /// A started day is charged as a whole one, so 10:00 till 09:00 of the
    /// next day makes 2 days, while midnight till midnight 2 days later
    /// also makes 2 days.
    #[must_use]
    pub fn days(&self) -> u32 {
        let first = self.starts_at.unix_timestamp().div_euclid(Self::DAY);
        let last = (self.ends_at.unix_timestamp() - 1).div_euclid(Self::DAY);
        u32::try_from(last - first + 1).unwrap_or(u32::MAX)
    }
}

/// Computes the total price of renting for the provided [`Period`].
///
/// The result is `price_per_day × days + deposit`, rounded to 2 decimal
/// places, and is meant to be computed exactly once, when a [`Booking`] is
/// created.
///
/// [`None`] is returned if the deposit [`Currency`] differs from the daily
/// price one.
///
/// [`Currency`]: common::money::Currency
#[must_use]
pub fn total_price(
    price_per_day: Money,
    period: Period,
    deposit: Option<Money>,
) -> Option<Money> {
    let rent = price_per_day.scale(period.days());
    deposit.map_or(Some(rent), |d| rent.checked_add(d))
}

define_kind! {
    #[doc = "Status of a [`Booking`]."]
    enum Status {
        #[doc = "Awaiting the owner's decision."]
        Pending = 1,

        #[doc = "Approved by the owner; holds its [`Period`] against \
                 other bookings."]
        Confirmed = 2,

        #[doc = "Paid by the renter (driven by the external fulfillment \
                 collaborator)."]
        Paid = 3,

        #[doc = "Item handed over to the renter (driven by the external \
                 fulfillment collaborator)."]
        Active = 4,

        #[doc = "Item returned, rental finished (driven by the external \
                 fulfillment collaborator)."]
        Completed = 5,

        #[doc = "Declined by the owner or withdrawn by either party."]
        Cancelled = 6,

        #[doc = "Deadline passed without the owner's decision."]
        Expired = 7,

        #[doc = "Owner proposed an [`Amendment`] awaiting the renter's \
                 approval."]
        AmendmentRequested = 8,

        #[doc = "Escalated to a dispute (driven by the external dispute \
                 collaborator)."]
        Disputed = 9,
    }
}

impl Status {
    /// Indicates whether a [`Booking`] in this [`Status`] blocks its
    /// [`Period`] for other bookings of the same [`Listing`].
    #[must_use]
    pub const fn holds_period(self) -> bool {
        matches!(self, Self::Confirmed)
    }

    /// Indicates whether a [`Booking`] in this [`Status`] counts toward the
    /// [`Listing`] earnings aggregates.
    ///
    /// Broader than [`holds_period()`]: a fulfilled rental stops blocking
    /// dates but keeps contributing to the earnings history.
    ///
    /// [`holds_period()`]: Status::holds_period
    #[must_use]
    pub const fn is_honored(self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::Paid | Self::Active | Self::Completed,
        )
    }

    /// Indicates whether the owner may propose an [`Amendment`] to a
    /// [`Booking`] in this [`Status`].
    #[must_use]
    pub const fn is_amendable(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Confirmed | Self::AmendmentRequested,
        )
    }
}

/// Owner-proposed change to a [`Booking`], awaiting the renter's approval.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Amendment {
    /// [`Field`]s proposed to change.
    pub fields: Vec<Field>,

    /// Free-form explanation of the proposal.
    pub message: Message,

    /// [`Party`] that requested the change.
    pub requested_by: Party,
}

define_kind! {
    #[doc = "Field of a [`Booking`] changeable via an [`Amendment`]."]
    enum Field {
        #[doc = "Start of the rental [`Period`]."]
        StartDate = 1,

        #[doc = "End of the rental [`Period`]."]
        EndDate = 2,

        #[doc = "[`PickupTime`] of a [`Booking`]."]
        PickupTime = 3,

        #[doc = "[`ReturnTime`] of a [`Booking`]."]
        ReturnTime = 4,
    }
}

define_kind! {
    #[doc = "Side of a [`Booking`]."]
    enum Party {
        #[doc = "Owner of the reserved [`Listing`]."]
        Owner = 1,

        #[doc = "Renter of the reserved [`Listing`]."]
        Renter = 2,
    }
}

/// Message attached to an [`Amendment`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Message(String);

impl Message {
    /// Creates a new [`Message`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `message` is not empty.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Creates a new [`Message`] if the given `message` is valid.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Option<Self> {
        let message = message.into();
        Self::check(&message).then_some(Self(message))
    }

    /// Checks whether the given `message` is a valid [`Message`].
    fn check(message: impl AsRef<str>) -> bool {
        let message = message.as_ref();
        message.trim() == message
            && !message.is_empty()
            && message.len() <= 512
    }
}

impl FromStr for Message {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Message`")
    }
}

/// Pickup arrangement of a [`Booking`], in the owner's words.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct PickupTime(String);

impl PickupTime {
    /// Creates a new [`PickupTime`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `time` is not empty.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(time: impl Into<String>) -> Self {
        Self(time.into())
    }

    /// Creates a new [`PickupTime`] if the given `time` is valid.
    #[must_use]
    pub fn new(time: impl Into<String>) -> Option<Self> {
        let time = time.into();
        Self::check(&time).then_some(Self(time))
    }

    /// Checks whether the given `time` is a valid [`PickupTime`].
    fn check(time: impl AsRef<str>) -> bool {
        let time = time.as_ref();
        time.trim() == time && !time.is_empty() && time.len() <= 512
    }
}

impl FromStr for PickupTime {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `PickupTime`")
    }
}

/// Return arrangement of a [`Booking`], in the owner's words.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct ReturnTime(String);

impl ReturnTime {
    /// Creates a new [`ReturnTime`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `time` is not empty.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(time: impl Into<String>) -> Self {
        Self(time.into())
    }

    /// Creates a new [`ReturnTime`] if the given `time` is valid.
    #[must_use]
    pub fn new(time: impl Into<String>) -> Option<Self> {
        let time = time.into();
        Self::check(&time).then_some(Self(time))
    }

    /// Checks whether the given `time` is a valid [`ReturnTime`].
    fn check(time: impl AsRef<str>) -> bool {
        let time = time.as_ref();
        time.trim() == time && !time.is_empty() && time.len() <= 512
    }
}

impl FromStr for ReturnTime {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `ReturnTime`")
    }
}

/// [`DateTime`] when a [`Booking`] was created.
pub type CreationDateTime = DateTimeOf<(Booking, unit::Creation)>;

/// [`DateTime`] when a [`Booking`] request expires.
pub type ExpirationDateTime = DateTimeOf<(Booking, unit::Expiration)>;
