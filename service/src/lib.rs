//! Service contains the business logic of the booking engine.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;
mod stats;
pub mod task;

use std::{error::Error, fmt, time};

use common::{
    clock,
    operations::{By, Start},
};
use tracing as log;

#[cfg(doc)]
use common::Clock;
#[cfg(doc)]
use infra::Database;

use infra::{notify, Notifier};

pub use self::{command::Command, query::Query, task::Task};

/// [`Service`] configuration.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Time a newly requested booking awaits the owner's decision before
    /// expiring.
    pub request_ttl: time::Duration,

    /// Policy allowing owners to book their own listings.
    pub allow_self_booking: bool,

    /// [`task::ExpireBookings`] configuration.
    pub expire_bookings: task::expire_bookings::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_ttl: time::Duration::from_secs(24 * 60 * 60),
            allow_self_booking: false,
            expire_bookings: task::expire_bookings::Config::default(),
        }
    }
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Nt = notify::Log, Ck = clock::System> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Notifier`] of this [`Service`].
    notifier: Nt,

    /// [`Clock`] of this [`Service`].
    clock: Ck,
}

impl<Db, Nt, Ck> Service<Db, Nt, Ck> {
    /// Creates a new [`Service`] with the provided parameters, spawning its
    /// background [`Task`]s.
    pub fn new(
        config: Config,
        database: Db,
        notifier: Nt,
        clock: Ck,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::ExpireBookings<Self>,
                        task::expire_bookings::Config,
                    >,
                >,
                Ok = (),
                Err: Error + 'static,
            > + Clone
            + 'static,
    {
        let this = Self {
            config,
            database,
            notifier,
            clock,
        };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn(async move {
            svc.execute(Start(By::new(svc.config().expire_bookings))).await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`Notifier`] of this [`Service`].
    #[must_use]
    pub fn notifier(&self) -> &Nt {
        &self.notifier
    }

    /// Returns [`Clock`] of this [`Service`].
    #[must_use]
    pub fn clock(&self) -> &Ck {
        &self.clock
    }

    /// Emits the provided notification [`notify::Intent`].
    ///
    /// Fire-and-forget: a delivery failure is logged and never affects the
    /// outcome of the transition emitting the intent.
    pub(crate) async fn notify(&self, intent: notify::Intent)
    where
        Nt: Notifier<notify::Dispatch, Ok = (), Err: fmt::Display>,
    {
        _ = self
            .notifier
            .execute(notify::Dispatch(intent))
            .await
            .map_err(|e| {
                log::warn!("failed to dispatch notification intent: {e}");
            });
    }
}
