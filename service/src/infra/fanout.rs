//! Real-time [`Fanout`] of change [`Signal`]s to connected listeners.
//!
//! A [`Signal`] carries no data: listeners are expected to re-fetch what
//! they show. Nothing is retained, so a listener subscribing after a
//! [`Signal`] was published never sees it.

use std::{collections::HashMap, convert::Infallible, sync::Arc};

use common::{
    define_kind,
    operations::{Publish, Subscribe},
    DateTime,
};
use futures::{
    stream::{self, BoxStream},
    StreamExt as _,
};
use tokio::sync::broadcast;
use tracing as log;

/// Fan-out operation.
pub use common::Handler as Fanout;

define_kind! {
    #[doc = "Named channel of [`Signal`]s."]
    #[case = "snake_case"]
    enum Channel {
        #[doc = "Bookings have changed."]
        Booking = 1,

        #[doc = "Equipment availability has changed."]
        Equipment = 2,

        #[doc = "Transactions of some user have changed."]
        User = 3,

        #[doc = "Sales have changed."]
        Sales = 4,
    }
}

/// Lightweight signal that data on some [`Channel`] has changed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signal {
    /// [`Channel`] the data has changed on.
    pub channel: Channel,

    /// Kind of the event which has changed the data, if any.
    pub event: Option<&'static str>,

    /// [`DateTime`] when the data has changed.
    pub at: DateTime,
}

/// In-memory [`Fanout`] broker for single-instance deployments.
#[derive(Clone, Debug)]
pub struct Memory {
    /// Senders of every [`Channel`].
    senders: Arc<HashMap<Channel, broadcast::Sender<Signal>>>,
}

impl Memory {
    /// Default number of [`Signal`]s buffered for a slow listener.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Creates a new [`Memory`] broker buffering up to the provided number of
    /// [`Signal`]s for a slow listener, before it starts to miss them.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            senders: Arc::new(
                Channel::ALL
                    .iter()
                    .map(|&ch| (ch, broadcast::channel(capacity.max(1)).0))
                    .collect(),
            ),
        }
    }

    /// Returns the [`broadcast::Sender`] of the provided [`Channel`].
    fn sender(&self, channel: Channel) -> Option<&broadcast::Sender<Signal>> {
        self.senders.get(&channel)
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl Fanout<Publish<Signal>> for Memory {
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Publish(signal): Publish<Signal>,
    ) -> Result<Self::Ok, Self::Err> {
        let channel = signal.channel;
        // No listeners is not an error.
        let listeners = self
            .sender(channel)
            .and_then(|tx| tx.send(signal).ok())
            .unwrap_or_default();
        log::trace!("`{channel}` signal sent to {listeners} listener(s)");
        Ok(())
    }
}

impl Fanout<Subscribe<Vec<Channel>>> for Memory {
    type Ok = BoxStream<'static, Signal>;
    type Err = Infallible;

    async fn execute(
        &self,
        Subscribe(channels): Subscribe<Vec<Channel>>,
    ) -> Result<Self::Ok, Self::Err> {
        let receivers = channels
            .into_iter()
            .filter_map(|ch| self.sender(ch).map(broadcast::Sender::subscribe))
            .map(|rx| {
                stream::unfold(rx, |mut rx| async move {
                    loop {
                        match rx.recv().await {
                            Ok(signal) => return Some((signal, rx)),
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                log::debug!("listener missed {n} signal(s)");
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                return None;
                            }
                        }
                    }
                })
                .boxed()
            });
        Ok(stream::select_all(receivers).boxed())
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        operations::{Publish, Subscribe},
        DateTime,
    };
    use futures::StreamExt as _;
    use tokio::time;

    use super::{Channel, Fanout as _, Memory, Signal};

    fn signal(channel: Channel) -> Signal {
        Signal {
            channel,
            event: None,
            at: DateTime::UNIX_EPOCH,
        }
    }

    #[tokio::test]
    async fn delivers_to_subscribed_channels_only() {
        let broker = Memory::default();
        let mut listener = broker
            .execute(Subscribe(vec![Channel::Booking, Channel::Equipment]))
            .await
            .unwrap();

        broker.execute(Publish(signal(Channel::Sales))).await.unwrap();
        broker.execute(Publish(signal(Channel::Booking))).await.unwrap();

        assert_eq!(listener.next().await, Some(signal(Channel::Booking)));
        assert!(time::timeout(Duration::from_millis(50), listener.next())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn does_not_replay() {
        let broker = Memory::default();
        broker.execute(Publish(signal(Channel::User))).await.unwrap();

        let mut listener =
            broker.execute(Subscribe(vec![Channel::User])).await.unwrap();

        assert!(time::timeout(Duration::from_millis(50), listener.next())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn publishes_without_listeners() {
        let broker = Memory::default();

        assert!(broker.execute(Publish(signal(Channel::Sales))).await.is_ok());
    }
}
