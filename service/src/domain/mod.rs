//! Domain definitions.

pub mod availability;
pub mod booking;
pub mod equipment;
pub mod lifecycle;
pub mod notification;
pub mod pricing;
pub mod reference;
pub mod sale;
pub mod user;

pub use self::{
    booking::Booking, equipment::Equipment, notification::Notification,
    sale::Sale,
};
