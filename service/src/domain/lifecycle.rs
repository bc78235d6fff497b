//! Lifecycle of transactions: the parts shared by [`Booking`]s and [`Sale`]s.
//!
//! Legal transitions themselves are defined by the `Status` of each
//! transaction type.
//!
//! [`Booking`]: crate::domain::Booking
//! [`Sale`]: crate::domain::Sale

use std::{fmt, str::FromStr};

use derive_more::{Display, Error};
use serde::Serialize;

use crate::domain::user;

/// Initiator of a status transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// Party of the transaction.
    User(user::Id),

    /// Platform operator, allowed to override the regular flow.
    Operator(user::Id),

    /// Auto-completion scheduler.
    Scheduler,
}

impl Actor {
    /// Indicates whether this [`Actor`] is a platform operator.
    #[must_use]
    pub const fn is_operator(&self) -> bool {
        matches!(self, Self::Operator(_))
    }
}

/// Outcome of an accepted status transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transition<S> {
    /// Status has been changed.
    Changed {
        /// Status before the transition.
        from: S,

        /// Status after the transition.
        to: S,
    },

    /// Status is the requested one already, so nothing has been changed.
    Unchanged(S),
}

impl<S> Transition<S> {
    /// Indicates whether the status has been changed.
    #[must_use]
    pub const fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// Error of a rejected status transition.
#[derive(Clone, Debug, Display, Error)]
pub enum TransitionError {
    /// Current status is terminal, so nothing may leave it.
    #[display("`{from}` status is terminal and cannot be changed")]
    TransitionFromTerminalState {
        /// Current terminal status.
        from: String,
    },

    /// Requested transition is not in the transition table, or is not
    /// allowed for the requesting actor.
    #[display("cannot change `{from}` status to `{to}`: {reason}")]
    InvalidStatusTransition {
        /// Current status.
        from: String,

        /// Requested status.
        to: String,

        /// Human-readable reason of the rejection.
        reason: &'static str,
    },
}

impl TransitionError {
    /// Creates a new [`TransitionError::TransitionFromTerminalState`].
    pub(crate) fn terminal(from: impl fmt::Display) -> Self {
        Self::TransitionFromTerminalState {
            from: from.to_string(),
        }
    }

    /// Creates a new [`TransitionError::InvalidStatusTransition`].
    pub(crate) fn invalid(
        from: impl fmt::Display,
        to: impl fmt::Display,
        reason: &'static str,
    ) -> Self {
        Self::InvalidStatusTransition {
            from: from.to_string(),
            to: to.to_string(),
            reason,
        }
    }
}

/// Error of an unknown status being requested.
#[derive(Clone, Debug, Display, Error)]
#[display("`{_0}` is not a known status")]
pub struct InvalidStatus(#[error(not(source))] pub String);

/// Parses the provided status of some transaction type.
///
/// # Errors
///
/// With [`InvalidStatus`] if the status is unknown to the transaction type.
pub fn parse_status<S: FromStr>(s: &str) -> Result<S, InvalidStatus> {
    S::from_str(s).map_err(|_| InvalidStatus(s.to_owned()))
}
