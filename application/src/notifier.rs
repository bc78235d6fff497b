//! [`Notifier`] chosen by configuration.

use common::{operations::Notify, Handler as _};
use service::{
    domain::Notification,
    infra::notifier::{self, webhook},
};
use tracerr::Traced;

use crate::config;

/// [`service::infra::Notifier`] chosen by [`config::Notifier`].
#[derive(Clone, Debug)]
pub enum Notifier {
    /// [`notifier::Log`] one.
    Log(notifier::Log),

    /// [`notifier::Webhook`] one.
    Webhook(notifier::Webhook),
}

impl Notifier {
    /// Creates a new [`Notifier`] out of the provided [`config::Notifier`].
    ///
    /// # Errors
    ///
    /// If the webhook URL is malformed, or its HTTP client cannot be
    /// initialized.
    pub fn new(conf: config::Notifier) -> Result<Self, String> {
        Ok(match conf {
            config::Notifier::Log => Self::Log(notifier::Log),
            config::Notifier::Webhook(config::Webhook {
                url,
                token,
                timeout,
                operations_inbox,
            }) => Self::Webhook(
                notifier::Webhook::new(webhook::Config {
                    url: url
                        .parse()
                        .map_err(|e| format!("invalid URL `{url}`: {e}"))?,
                    token,
                    timeout,
                    operations_inbox,
                })
                .map_err(|e| e.to_string())?,
            ),
        })
    }
}

impl notifier::Notifier<Notify<Notification>> for Notifier {
    type Ok = ();
    type Err = Traced<webhook::DeliveryError>;

    async fn execute(
        &self,
        op: Notify<Notification>,
    ) -> Result<Self::Ok, Self::Err> {
        match self {
            Self::Log(n) => n.execute(op).await.map_err(|e| match e {}),
            Self::Webhook(n) => n.execute(op).await,
        }
    }
}
