//! [`Report`]-related definitions.

use derive_more::{From, Into};
use juniper::graphql_object;
use service::command::run_auto_completion as pass;

use crate::{define_error, AsError, Context, Error};

/// Outcome of an auto-completion pass.
#[derive(Clone, Copy, Debug, From, Into)]
pub struct Report(pass::Report);

/// Outcome of an auto-completion pass.
#[graphql_object(name = "AutoCompletionReport", context = Context)]
impl Report {
    /// Outcome for `Booking`s.
    #[must_use]
    pub fn bookings(&self) -> BookingsReport {
        BookingsReport(self.0.bookings)
    }

    /// Outcome for `Sale`s.
    #[must_use]
    pub fn sales(&self) -> SalesReport {
        SalesReport(self.0.sales)
    }
}

/// Outcome of an auto-completion pass for `Booking`s.
#[derive(Clone, Copy, Debug)]
pub struct BookingsReport(pass::BookingsReport);

/// Outcome of an auto-completion pass for `Booking`s.
#[graphql_object(name = "AutoCompletionBookingsReport", context = Context)]
impl BookingsReport {
    /// Number of paid `Booking`s completed.
    #[must_use]
    pub fn completed(&self) -> i32 {
        count(self.0.completed)
    }

    /// Number of pending `Booking`s cancelled.
    #[must_use]
    pub fn cancelled(&self) -> i32 {
        count(self.0.cancelled)
    }

    /// Number of reminders about `Booking`s ending soon.
    #[must_use]
    pub fn reminders(&self) -> i32 {
        count(self.0.reminders)
    }

    /// Number of reminders about `Booking`s starting soon.
    #[must_use]
    pub fn start_reminders(&self) -> i32 {
        count(self.0.start_reminders)
    }
}

/// Outcome of an auto-completion pass for `Sale`s.
#[derive(Clone, Copy, Debug)]
pub struct SalesReport(pass::SalesReport);

/// Outcome of an auto-completion pass for `Sale`s.
#[graphql_object(name = "AutoCompletionSalesReport", context = Context)]
impl SalesReport {
    /// Number of stale `Sale`s cancelled.
    #[must_use]
    pub fn cancelled(&self) -> i32 {
        count(self.0.cancelled)
    }

    /// Number of reminders about pending `Sale`s.
    #[must_use]
    pub fn reminders(&self) -> i32 {
        count(self.0.reminders)
    }
}

/// Converts the provided count into a GraphQL `Int`, saturating on overflow.
fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

define_error! {
    enum PassError {
        #[code = "MOMENT_OUT_OF_RANGE"]
        #[status = BAD_REQUEST]
        #[message = "Moment is too far in the past or future to advance to"]
        MomentOutOfRange,
    }
}

impl AsError for pass::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::OutOfRange => Some(PassError::MomentOutOfRange.into()),
        }
    }
}

#[cfg(test)]
mod spec {
    use service::command::run_auto_completion::ExecutionError;

    use crate::AsError as _;

    use super::count;

    #[test]
    fn rejects_out_of_range_moment_as_bad_request() {
        let err = ExecutionError::OutOfRange.into_error();

        assert_eq!(err.code, "MOMENT_OUT_OF_RANGE");
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn saturates_count() {
        assert_eq!(count(3), 3);
        assert_eq!(count(usize::MAX), i32::MAX);
    }
}
