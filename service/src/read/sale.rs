//! [`Sale`] selectors of the auto-completion sweeps.
//!
//! Each of them selects IDs of the matching [`Sale`]s.

use common::DateTime;

#[cfg(doc)]
use crate::domain::Sale;

/// Selects pending [`Sale`]s created at the provided moment or earlier.
#[derive(Clone, Copy, Debug)]
pub struct Stale {
    /// Latest creation moment of a stale [`Sale`].
    pub created_until: DateTime,
}

/// Selects pending [`Sale`]s created within the `(after, until]` range,
/// whose buyer wasn't reminded about them yet.
#[derive(Clone, Copy, Debug)]
pub struct Aging {
    /// Exclusive start of the range.
    pub after: DateTime,

    /// Inclusive end of the range.
    pub until: DateTime,
}
