//! Background [`Task`]s definitions.

pub mod auto_complete;
mod background;
pub mod deliver_notifications;

pub use common::Handler as Task;

pub use self::{
    auto_complete::AutoComplete,
    background::{Background, Failure},
    deliver_notifications::{DeliverNotifications, Dispatcher},
};
