//! Read entities definitions.

pub mod booking;
pub mod equipment;
pub mod sale;
