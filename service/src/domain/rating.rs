//! [`Rating`] definitions.

use common::{unit, DateTimeOf};
#[cfg(doc)]
use common::DateTime;
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{listing, user};
#[cfg(doc)]
use crate::domain::Listing;

/// Review left by a renter for a [`Listing`].
#[derive(Clone, Debug)]
pub struct Rating {
    /// ID of this [`Rating`].
    pub id: Id,

    /// ID of the rated [`Listing`].
    pub listing_id: listing::Id,

    /// ID of the reviewing renter.
    pub renter_id: user::Id,

    /// [`Score`] given to the [`Listing`].
    pub score: Score,

    /// Optional [`Comment`] accompanying the [`Score`].
    pub comment: Option<Comment>,

    /// [`DateTime`] when this [`Rating`] was submitted.
    pub created_at: CreationDateTime,
}

/// ID of a [`Rating`].
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

/// Score of a [`Rating`]: an integer from 1 to 5.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub struct Score(u8);

impl Score {
    /// Creates a new [`Score`] if the given `score` lies within the 1..=5
    /// range.
    #[must_use]
    pub fn new(score: u8) -> Option<Self> {
        (1..=5).contains(&score).then_some(Self(score))
    }

    /// Returns the [`u8`] representation of this [`Score`].
    #[must_use]
    pub const fn u8(self) -> u8 {
        self.0
    }
}

/// Comment of a [`Rating`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Comment(String);

impl Comment {
    /// Creates a new [`Comment`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `comment` is not empty.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(comment: impl Into<String>) -> Self {
        Self(comment.into())
    }

    /// Creates a new [`Comment`] if the given `comment` is valid.
    #[must_use]
    pub fn new(comment: impl Into<String>) -> Option<Self> {
        let comment = comment.into();
        Self::check(&comment).then_some(Self(comment))
    }

    /// Checks whether the given `comment` is a valid [`Comment`].
    fn check(comment: impl AsRef<str>) -> bool {
        let comment = comment.as_ref();
        comment.trim() == comment
            && !comment.is_empty()
            && comment.len() <= 512
    }
}

impl FromStr for Comment {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Comment`")
    }
}

/// [`DateTime`] when a [`Rating`] was submitted.
pub type CreationDateTime = DateTimeOf<(Rating, unit::Creation)>;

#[cfg(test)]
mod spec {
    use super::Score;

    #[test]
    fn score_bounds() {
        assert!(Score::new(0).is_none());
        assert!(Score::new(1).is_some());
        assert!(Score::new(5).is_some());
        assert!(Score::new(6).is_none());
    }
}
