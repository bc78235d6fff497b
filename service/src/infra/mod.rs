//! Infrastructure layer.

pub mod database;
pub mod fanout;
pub mod notifier;

pub use self::{
    database::{Database, Memory},
    fanout::Fanout,
    notifier::Notifier,
};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
