//! Notification port definitions.
//!
//! The engine only emits notification *intents*; rendering and delivering
//! the actual e-mails is the job of the external notification collaborator.
//! Delivery failures never roll a state transition back.

use std::{
    convert::Infallible,
    sync::{Arc, Mutex, PoisonError},
};

use common::define_kind;
use tracing as log;

use crate::domain::{booking, listing, user};
#[cfg(doc)]
use crate::domain::Booking;

/// Port delivering [`Intent`]s to the outer notification transport.
pub use common::Handler as Notifier;

/// Operation to dispatch a notification [`Intent`].
#[derive(Clone, Copy, Debug)]
pub struct Dispatch(pub Intent);

/// Intent to notify a user about a [`Booking`] event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Intent {
    /// [`Kind`] of this [`Intent`].
    pub kind: Kind,

    /// ID of the user to be notified.
    pub recipient: user::Id,

    /// ID of the [`Booking`] the event happened to.
    pub booking_id: booking::Id,

    /// ID of the listing the [`Booking`] refers to.
    pub listing_id: listing::Id,
}

define_kind! {
    #[doc = "Kind of a notification [`Intent`]."]
    enum Kind {
        #[doc = "A new [`Booking`] request arrived (to the owner)."]
        RequestReceived = 1,

        #[doc = "The [`Booking`] was confirmed (to the renter)."]
        Confirmed = 2,

        #[doc = "The [`Booking`] was declined or cancelled by the owner \
                 (to the renter)."]
        Declined = 3,

        #[doc = "The [`Booking`] was cancelled by the renter (to the \
                 owner)."]
        CancelledByRenter = 4,

        #[doc = "The [`Booking`] request expired undecided (to the \
                 renter)."]
        Expired = 5,

        #[doc = "The owner proposed an amendment (to the renter)."]
        AmendmentRequested = 6,

        #[doc = "The renter revised the [`Booking`] (to the owner)."]
        BookingUpdated = 7,
    }
}

/// [`Notifier`] logging the dispatched [`Intent`]s.
///
/// The default for deployments where delivery is wired up externally.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

impl Notifier<Dispatch> for Log {
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Dispatch(intent): Dispatch,
    ) -> Result<Self::Ok, Self::Err> {
        let Intent {
            kind,
            recipient,
            booking_id,
            listing_id,
        } = intent;
        log::info!(
            %kind, %recipient, %booking_id, %listing_id,
            "notification intent emitted",
        );
        Ok(())
    }
}

/// [`Notifier`] recording the dispatched [`Intent`]s in memory.
///
/// Lets tests assert on what exactly was emitted, and when.
#[derive(Clone, Debug, Default)]
pub struct Memory(Arc<Mutex<Vec<Intent>>>);

impl Memory {
    /// Returns all the [`Intent`]s dispatched so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<Intent> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier<Dispatch> for Memory {
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Dispatch(intent): Dispatch,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(intent);
        Ok(())
    }
}
