//! [`DeliverNotifications`] [`Task`] and its [`Dispatcher`].

use std::{convert::Infallible, fmt, num::NonZeroUsize};

use common::operations::{Notify, Start};
use futures::{stream, StreamExt as _};
use smart_default::SmartDefault;
use tokio::sync::mpsc;
use tracing as log;

use crate::{domain::Notification, infra::Notifier};

use super::Task;

/// Sending side of the [`Notification`]s queue drained by
/// [`DeliverNotifications`].
#[derive(Clone, Debug)]
pub struct Dispatcher(mpsc::UnboundedSender<Notification>);

impl Dispatcher {
    /// Creates a new [`Dispatcher`] along with the queue it feeds.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    /// Queues the provided [`Notification`] for delivery.
    ///
    /// Never blocks the caller. A [`Notification`] which cannot be queued is
    /// logged and lost.
    pub fn dispatch(&self, notification: Notification) {
        if let Err(mpsc::error::SendError(n)) = self.0.send(notification) {
            log::warn!(
                "`{}` notification to `{}` is lost: delivery queue is closed",
                n.event.kind(),
                n.recipient,
            );
        }
    }
}

/// Configuration for [`DeliverNotifications`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Maximum number of [`Notification`]s being delivered at once.
    #[default(NonZeroUsize::new(8).unwrap_or(NonZeroUsize::MIN))]
    pub concurrency: NonZeroUsize,
}

/// [`Task`] delivering queued [`Notification`]s via a [`Notifier`].
///
/// Delivery failures are logged and never retried.
#[derive(Clone, Copy, Debug)]
pub struct DeliverNotifications<N> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Notifier`] to deliver [`Notification`]s with.
    notifier: N,
}

impl<N> DeliverNotifications<N> {
    /// Creates a new [`DeliverNotifications`] [`Task`].
    #[must_use]
    pub const fn new(config: Config, notifier: N) -> Self {
        Self { config, notifier }
    }
}

impl<N> Task<Start<mpsc::UnboundedReceiver<Notification>>>
    for DeliverNotifications<N>
where
    N: Notifier<Notify<Notification>, Ok = (), Err: fmt::Display>,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(mut queue): Start<mpsc::UnboundedReceiver<Notification>>,
    ) -> Result<Self::Ok, Self::Err> {
        stream::poll_fn(move |cx| queue.poll_recv(cx))
            .for_each_concurrent(self.config.concurrency.get(), |n| async move {
                let (kind, recipient) = (n.event.kind(), n.recipient);
                match self.notifier.execute(Notify(n)).await {
                    Ok(()) => {
                        log::debug!("`{kind}` notification sent to `{recipient}`");
                    }
                    Err(e) => log::error!(
                        "failed to deliver `{kind}` notification to \
                         `{recipient}`: {e}",
                    ),
                }
            })
            .await;

        log::info!("`task::DeliverNotifications` queue is closed");
        Ok(())
    }
}

#[cfg(test)]
mod spec {
    use std::{
        convert::Infallible,
        sync::{Arc, Mutex},
    };

    use common::operations::{Notify, Start};

    use crate::{
        domain::{
            booking::spec::at,
            notification::{Event, Recipient, SaleDetails},
            sale::{self, spec::sale},
            Notification,
        },
        infra::Notifier,
        Task as _,
    };

    use super::{Config, DeliverNotifications, Dispatcher};

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<Notification>>>);

    impl Notifier<Notify<Notification>> for Recording {
        type Ok = ();
        type Err = Infallible;

        async fn execute(
            &self,
            Notify(n): Notify<Notification>,
        ) -> Result<Self::Ok, Self::Err> {
            self.0.lock().unwrap().push(n);
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivers_everything_queued_until_closed() {
        let (dispatcher, queue) = Dispatcher::channel();
        let sale = sale(sale::Status::Pending, at("2024-05-01T10:00:00Z"));
        for _ in 0..3 {
            dispatcher.dispatch(Notification::to(
                Recipient::Operations,
                Event::SaleCreated(SaleDetails::from(&sale)),
            ));
        }
        drop(dispatcher);

        let notifier = Recording::default();
        DeliverNotifications::new(Config::default(), notifier.clone())
            .execute(Start(queue))
            .await
            .unwrap();

        assert_eq!(notifier.0.lock().unwrap().len(), 3);
    }

    #[test]
    fn dispatch_to_closed_queue_is_lost_silently() {
        let (dispatcher, queue) = Dispatcher::channel();
        drop(queue);

        let sale = sale(sale::Status::Pending, at("2024-05-01T10:00:00Z"));
        dispatcher.dispatch(Notification::to(
            Recipient::Operations,
            Event::SaleCreated(SaleDetails::from(&sale)),
        ));
    }
}
