//! [`Config`]-related definitions.

use std::{num::NonZeroUsize, time};

use common::Money;
use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use secrecy::SecretString;
use serde::Deserialize;
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: Server,

    /// API access configuration.
    pub api: Api,

    /// Service configuration.
    pub service: Service,

    /// Notifier configuration.
    pub notifier: Notifier,

    /// Postgres configuration.
    pub postgres: Postgres,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to bind the server to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to bind the server to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// API access configuration.
///
/// Callers authenticate with one of the bearer tokens below. A token left
/// unset disables the corresponding kind of caller.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Api {
    /// Token of the marketplace backend acting on behalf of its users.
    pub client_token: Option<SecretString>,

    /// Token of platform operators.
    pub operator_token: Option<SecretString>,

    /// Token of an external scheduler triggering auto-completion passes.
    pub scheduler_token: Option<SecretString>,

    /// Interval of keep-alive pings sent to GraphQL subscribers.
    #[default(time::Duration::from_secs(15))]
    #[serde(with = "humantime_serde")]
    pub keep_alive: time::Duration,
}

/// Service configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Service {
    /// Service tasks configuration.
    pub tasks: Tasks,

    /// Number of attempts to draw a unique reference number.
    #[default(10)]
    pub reference_attempts: u8,

    /// Rate per kilometer of delivering sold equipment, like `150DZD`.
    ///
    /// Delivery is not offered if unset.
    pub transport_rate: Option<Money>,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Service {
            tasks:
                Tasks {
                    auto_completion,
                    notifications,
                },
            reference_attempts,
            transport_rate,
        } = value;
        Self {
            auto_complete: service::task::auto_complete::Config {
                enabled: auto_completion.enabled,
                interval: auto_completion.interval,
            },
            deliver_notifications:
                service::task::deliver_notifications::Config {
                    concurrency: notifications.concurrency,
                },
            reference_attempts,
            transport_rate,
        }
    }
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Tasks {
    /// `AutoComplete` task configuration.
    pub auto_completion: AutoCompletion,

    /// `DeliverNotifications` task configuration.
    pub notifications: Notifications,
}

/// `AutoComplete` task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct AutoCompletion {
    /// Indicator whether passes run in-process on the interval.
    ///
    /// Passes may still be triggered via API once disabled.
    #[default(true)]
    pub enabled: bool,

    /// Interval between passes.
    #[default(time::Duration::from_secs(5 * 60))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,
}

/// `DeliverNotifications` task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Notifications {
    /// Maximum number of notifications delivered concurrently.
    #[default(service::task::deliver_notifications::Config::default().concurrency)]
    pub concurrency: NonZeroUsize,
}

/// Notifier configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Notifier {
    /// Notifications are written to the log only.
    #[default]
    Log,

    /// Notifications are `POST`ed to the email/SMS collaborator.
    Webhook(Webhook),
}

/// Webhook notifier configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Webhook {
    /// URL to `POST` notifications to.
    pub url: String,

    /// Bearer token to authorize requests with, if required.
    pub token: Option<SecretString>,

    /// Timeout of a single delivery.
    #[serde(default = "Webhook::default_timeout", with = "humantime_serde")]
    pub timeout: time::Duration,

    /// Address of the operations inbox.
    pub operations_inbox: String,
}

impl Webhook {
    /// Returns the default [`Webhook::timeout`].
    fn default_timeout() -> time::Duration {
        time::Duration::from_secs(10)
    }
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}
