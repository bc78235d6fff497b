//! [`Command`] definition.

pub mod create_booking;
pub mod create_sale;
pub mod expire_booking;
pub mod expire_sale;
pub mod remind_booking;
pub mod remind_sale;
pub mod run_auto_completion;
pub mod set_booking_status;
pub mod set_sale_status;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    create_booking::CreateBooking, create_sale::CreateSale,
    expire_booking::ExpireBooking, expire_sale::ExpireSale,
    remind_booking::RemindBooking, remind_sale::RemindSale,
    run_auto_completion::RunAutoCompletion,
    set_booking_status::SetBookingStatus, set_sale_status::SetSaleStatus,
};
