//! [`Equipment`] read models.

#[cfg(doc)]
use crate::domain::{availability, Equipment};

/// Selects IDs of all the [`Equipment`] units committed to any transaction,
/// regardless of dates.
///
/// Matches [`availability::is_committed()`] in batch.
#[derive(Clone, Copy, Debug, Default)]
pub struct Committed;
