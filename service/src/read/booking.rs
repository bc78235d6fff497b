//! [`Booking`] selectors of the auto-completion sweeps.
//!
//! Each of them selects IDs of the matching [`Booking`]s.

use common::DateTime;

#[cfg(doc)]
use crate::domain::Booking;

/// Selects active [`Booking`]s whose window has ended at the provided moment
/// or earlier.
#[derive(Clone, Copy, Debug)]
pub struct Ended {
    /// Moment to check against.
    pub at: DateTime,
}

/// Selects pending [`Booking`]s whose window ends within the `(after, until]`
/// range, and whose renter wasn't reminded about it yet.
#[derive(Clone, Copy, Debug)]
pub struct EndingSoon {
    /// Exclusive start of the range.
    pub after: DateTime,

    /// Inclusive end of the range.
    pub until: DateTime,
}

/// Selects paid [`Booking`]s whose window starts within the `(after, until]`
/// range, and whose renter wasn't reminded about it yet.
#[derive(Clone, Copy, Debug)]
pub struct StartingSoon {
    /// Exclusive start of the range.
    pub after: DateTime,

    /// Inclusive end of the range.
    pub until: DateTime,
}
