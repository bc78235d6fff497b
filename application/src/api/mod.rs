//! GraphQL API definitions.

pub mod booking;
pub mod equipment;
mod mutation;
mod query;
pub mod report;
pub mod sale;
pub mod scalar;
pub mod signal;
mod subscription;
pub mod user;

use juniper::{GraphQLEnum, GraphQLUnion};
use service::domain::lifecycle::{InvalidStatus, TransitionError};

use crate::{define_error, AsError, Context, Error};

pub use self::{
    booking::Booking, mutation::Mutation, query::Query, report::Report,
    sale::Sale, signal::Signal, subscription::Subscription,
};

/// GraphQL schema.
pub type Schema = juniper::RootNode<'static, Query, Mutation, Subscription>;

/// Either a `Booking` or a `Sale`.
#[derive(Clone, Debug, GraphQLUnion)]
#[graphql(context = Context)]
pub enum Transaction {
    /// Rental of equipment.
    Booking(Booking),

    /// Purchase of equipment.
    Sale(Sale),
}

/// Type of a transaction.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
pub enum TransactionType {
    /// Rental of equipment.
    Booking,

    /// Purchase of equipment.
    Sale,
}

define_error! {
    enum StatusError {
        #[code = "INVALID_STATUS"]
        #[status = BAD_REQUEST]
        #[message = "Status is unknown to the transaction type"]
        Unknown,

        #[code = "INVALID_STATUS_TRANSITION"]
        #[status = CONFLICT]
        #[message = "Status transition is not allowed"]
        InvalidTransition,

        #[code = "TRANSITION_FROM_TERMINAL_STATE"]
        #[status = CONFLICT]
        #[message = "Status is terminal and cannot be changed"]
        Terminal,
    }
}

impl AsError for TransitionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::TransitionFromTerminalState { .. } => {
                Error::from(StatusError::Terminal).describe(self)
            }
            Self::InvalidStatusTransition { reason, .. } => {
                Error::from(StatusError::InvalidTransition).describe(reason)
            }
        })
    }
}

impl AsError for InvalidStatus {
    fn try_as_error(&self) -> Option<Error> {
        Some(Error::from(StatusError::Unknown).describe(self))
    }
}

define_error! {
    enum AccessError {
        #[code = "ACTOR_REQUIRED"]
        #[status = BAD_REQUEST]
        #[message = "`actorId` is required to act on behalf of someone"]
        ActorRequired,

        #[code = "OPERATOR_REQUIRED"]
        #[status = FORBIDDEN]
        #[message = "Only platform operators are allowed to do this"]
        OperatorRequired,

        #[code = "ACCESS_DENIED"]
        #[status = FORBIDDEN]
        #[message = "Caller is not allowed to do this"]
        Denied,
    }
}

#[cfg(test)]
mod spec {
    use service::domain::{
        booking,
        lifecycle::{parse_status, Actor},
        sale, user,
    };

    use crate::AsError as _;

    #[test]
    fn surfaces_transition_reason() {
        let err = sale::Status::Paid
            .transition(sale::Status::Cancelled, Actor::Scheduler)
            .unwrap_err()
            .into_error();

        assert_eq!(err.code, "INVALID_STATUS_TRANSITION");
        assert_eq!(err.status_code, http::StatusCode::CONFLICT);
        assert_eq!(err.message, "only pending purchases can be cancelled");
    }

    #[test]
    fn surfaces_terminal_state() {
        let err = booking::Status::Completed
            .transition(
                booking::Status::Paid,
                Actor::Operator(user::Id::new()),
            )
            .unwrap_err()
            .into_error();

        assert_eq!(err.code, "TRANSITION_FROM_TERMINAL_STATE");
    }

    #[test]
    fn surfaces_unknown_status() {
        let err = parse_status::<booking::Status>("refunded")
            .unwrap_err()
            .into_error();

        assert_eq!(err.code, "INVALID_STATUS");
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
    }
}
