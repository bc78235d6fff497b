//! Service contains the transaction lifecycle engine of the equipment
//! marketplace: bookings and sales from creation to completion or
//! cancellation.
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
pub mod task;

use std::{error::Error, fmt};

use common::{
    operations::{By, Notify, Publish, Start},
    DateTime, Money,
};
use smart_default::SmartDefault;
use tracing as log;

#[cfg(doc)]
use infra::Database;
use infra::{
    fanout::{Channel, Signal},
    Fanout, Notifier,
};

pub use self::{command::Command, query::Query, task::Task};
use self::{domain::Notification, task::Dispatcher};

/// [`Service`] configuration.
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// [`task::AutoComplete`] configuration.
    pub auto_complete: task::auto_complete::Config,

    /// [`task::DeliverNotifications`] configuration.
    pub deliver_notifications: task::deliver_notifications::Config,

    /// Number of attempts to draw a unique reference number for a new
    /// transaction.
    #[default = 10]
    pub reference_attempts: u8,

    /// Rate per kilometer of delivering sold equipment.
    ///
    /// [`None`] if delivery is not offered.
    pub transport_rate: Option<Money>,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Bus> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Fanout`] of this [`Service`].
    fanout: Bus,

    /// [`Dispatcher`] of [`Notification`]s.
    dispatcher: Dispatcher,
}

impl<Db, Bus> Service<Db, Bus> {
    /// Creates a new [`Service`] with the provided parameters, delivering
    /// [`Notification`]s via the provided [`Notifier`].
    pub fn new<N>(
        config: Config,
        database: Db,
        fanout: Bus,
        notifier: N,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<task::AutoComplete<Self>, task::auto_complete::Config>,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
        N: Notifier<Notify<Notification>, Ok = (), Err: fmt::Display>
            + 'static,
    {
        let (dispatcher, queue) = Dispatcher::channel();
        let this = Service {
            config,
            database,
            fanout,
            dispatcher,
        };

        let mut bg = task::Background::default();

        let deliver = task::DeliverNotifications::new(
            this.config.deliver_notifications,
            notifier,
        );
        bg.spawn("DeliverNotifications", async move {
            deliver.execute(Start(queue)).await
        });

        if this.config.auto_complete.enabled {
            let svc = this.clone();
            bg.spawn("AutoComplete", async move {
                svc.execute(Start(By::new(svc.config().auto_complete)))
                    .await
            });
        } else {
            log::info!("`task::AutoComplete` is disabled");
        }

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`Fanout`] of this [`Service`].
    #[must_use]
    pub fn fanout(&self) -> &Bus {
        &self.fanout
    }

    /// Dispatches the provided [`Notification`] for a best-effort delivery.
    fn notify(&self, notification: Notification) {
        self.dispatcher.dispatch(notification);
    }
}

impl<Db, Bus> Service<Db, Bus>
where
    Bus: Fanout<Publish<Signal>, Ok = (), Err: fmt::Display>,
{
    /// Signals listeners of the provided [`Channel`]s that their data has
    /// changed.
    ///
    /// Failures are logged only.
    async fn broadcast(
        &self,
        channels: &[Channel],
        event: Option<&'static str>,
        at: DateTime,
    ) {
        for &channel in channels {
            _ = self
                .fanout
                .execute(Publish(Signal { channel, event, at }))
                .await
                .map_err(|e| {
                    log::warn!("failed to broadcast `{channel}` signal: {e}");
                });
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! [`Service`] backed by in-memory infrastructure.

    use tokio::sync::mpsc;

    use crate::{
        domain::Notification,
        infra::{fanout, Memory},
        task::Dispatcher,
        Config,
    };

    /// [`super::Service`] backed by in-memory infrastructure.
    pub(crate) type Service = super::Service<Memory, fanout::Memory>;

    /// Creates a new [`Service`] along with the queue of its dispatched
    /// [`Notification`]s.
    pub(crate) fn service(
        config: Config,
    ) -> (Service, mpsc::UnboundedReceiver<Notification>) {
        let (dispatcher, queue) = Dispatcher::channel();
        let svc = super::Service {
            config,
            database: Memory::new(),
            fanout: fanout::Memory::default(),
            dispatcher,
        };
        (svc, queue)
    }

    /// Drains all the [`Notification`]s dispatched so far.
    pub(crate) fn drain(
        queue: &mut mpsc::UnboundedReceiver<Notification>,
    ) -> Vec<Notification> {
        let mut out = vec![];
        while let Ok(n) = queue.try_recv() {
            out.push(n);
        }
        out
    }
}
