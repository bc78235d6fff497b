//! [`Notifier`]s delivering [`Notification`]s to the email/SMS collaborator.

use std::convert::Infallible;

use common::operations::Notify;
use tracing as log;

use crate::domain::Notification;

#[cfg(feature = "webhook")]
pub use self::webhook::Webhook;

/// Notification delivery operation.
pub use common::Handler as Notifier;

/// [`Notifier`] writing [`Notification`]s to the log instead of delivering
/// them.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

impl Notifier<Notify<Notification>> for Log {
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Notify(notification): Notify<Notification>,
    ) -> Result<Self::Ok, Self::Err> {
        log::info!(
            kind = notification.event.kind(),
            recipient = %notification.recipient,
            "notification: {:?}",
            notification.event,
        );
        Ok(())
    }
}

#[cfg(feature = "webhook")]
pub mod webhook {
    //! [`Webhook`] [`Notifier`] definitions.

    use std::time::Duration;

    use common::operations::Notify;
    use derive_more::{Display, Error, From};
    use secrecy::{ExposeSecret as _, SecretString};
    use serde::Serialize;
    use tracerr::Traced;

    use crate::domain::{notification::Recipient, Notification};

    use super::Notifier;

    /// [`Webhook`] configuration.
    #[derive(Clone, Debug)]
    pub struct Config {
        /// URL to `POST` [`Notification`]s to.
        pub url: reqwest::Url,

        /// Bearer token to authorize requests with, if required.
        pub token: Option<SecretString>,

        /// Timeout of a single delivery.
        pub timeout: Duration,

        /// Address of the operations inbox.
        pub operations_inbox: String,
    }

    /// [`Notifier`] `POST`ing [`Notification`]s as JSON to an HTTP endpoint.
    #[derive(Clone, Debug)]
    pub struct Webhook {
        /// HTTP client performing requests.
        client: reqwest::Client,

        /// [`Config`] of this [`Webhook`].
        config: Config,
    }

    impl Webhook {
        /// Creates a new [`Webhook`] with the provided [`Config`].
        ///
        /// # Errors
        ///
        /// If the HTTP client cannot be initialized.
        pub fn new(config: Config) -> Result<Self, Traced<DeliveryError>> {
            let client = reqwest::Client::builder()
                .timeout(config.timeout)
                .build()
                .map_err(tracerr::from_and_wrap!(=> DeliveryError))?;
            Ok(Self { client, config })
        }

        /// Wraps the provided [`Notification`] into a request body,
        /// resolving the operations inbox address.
        fn envelope<'n>(
            &'n self,
            notification: &'n Notification,
        ) -> Envelope<'n> {
            let to = match notification.recipient {
                Recipient::Operations => {
                    Some(self.config.operations_inbox.as_str())
                }
                Recipient::User(_) => None,
            };
            Envelope { to, notification }
        }
    }

    /// Body of a [`Webhook`] request.
    #[derive(Debug, Serialize)]
    struct Envelope<'n> {
        /// Address to deliver to, if it's resolved from the role already.
        to: Option<&'n str>,

        /// Delivered [`Notification`].
        #[serde(flatten)]
        notification: &'n Notification,
    }

    impl Notifier<Notify<Notification>> for Webhook {
        type Ok = ();
        type Err = Traced<DeliveryError>;

        async fn execute(
            &self,
            Notify(notification): Notify<Notification>,
        ) -> Result<Self::Ok, Self::Err> {
            let mut request = self
                .client
                .post(self.config.url.clone())
                .json(&self.envelope(&notification));
            if let Some(token) = &self.config.token {
                request = request.bearer_auth(token.expose_secret());
            }

            _ = request
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(tracerr::from_and_wrap!(=> DeliveryError))?;
            Ok(())
        }
    }

    /// Error of a [`Webhook`] delivery.
    #[derive(Debug, Display, Error, From)]
    pub enum DeliveryError {
        /// HTTP request failed.
        #[display("HTTP request failed: {_0}")]
        Http(reqwest::Error),
    }

    #[cfg(test)]
    mod spec {
        use std::time::Duration;

        use crate::domain::{
            booking::{self, spec::booking},
            notification::{Event, Recipient},
            user, Notification,
        };

        use super::{Config, Webhook};

        fn webhook() -> Webhook {
            Webhook::new(Config {
                url: "http://mailer.local/notify".parse().unwrap(),
                token: Some("mailer-secret".to_owned().into()),
                timeout: Duration::from_secs(5),
                operations_inbox: "ops@example.com".to_owned(),
            })
            .unwrap()
        }

        #[test]
        fn addresses_operations_inbox_only() {
            let webhook = webhook();
            let b = booking(booking::Status::Cancelled, None);

            let to_ops = Notification::to(
                Recipient::Operations,
                Event::BookingCancelledAutomatically((&b).into()),
            );
            let json =
                serde_json::to_value(webhook.envelope(&to_ops)).unwrap();
            assert_eq!(json["to"], "ops@example.com");
            assert_eq!(json["kind"], "booking_cancelled_automatically");

            let to_user = Notification::to(
                Recipient::User(user::Id::new()),
                Event::BookingCancelledAutomatically((&b).into()),
            );
            let json =
                serde_json::to_value(webhook.envelope(&to_user)).unwrap();
            assert!(json["to"].is_null());
        }
    }
}
