//! [`Signal`]-related definitions.

use common::DateTime;
use juniper::{graphql_object, GraphQLEnum};
use service::infra::fanout;

use crate::Context;

/// Named channel of `Signal`s.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
pub enum Channel {
    /// `Booking`s have changed.
    Booking,

    /// Availability of `Equipment` has changed.
    Equipment,

    /// Transactions of some user have changed.
    User,

    /// `Sale`s have changed.
    Sales,
}

impl From<Channel> for fanout::Channel {
    fn from(ch: Channel) -> Self {
        match ch {
            Channel::Booking => Self::Booking,
            Channel::Equipment => Self::Equipment,
            Channel::User => Self::User,
            Channel::Sales => Self::Sales,
        }
    }
}

impl From<fanout::Channel> for Channel {
    fn from(ch: fanout::Channel) -> Self {
        match ch {
            fanout::Channel::Booking => Self::Booking,
            fanout::Channel::Equipment => Self::Equipment,
            fanout::Channel::User => Self::User,
            fanout::Channel::Sales => Self::Sales,
        }
    }
}

/// Lightweight notice that data behind some `Channel` has changed.
#[derive(Clone, Debug)]
pub struct Signal(fanout::Signal);

impl From<fanout::Signal> for Signal {
    fn from(signal: fanout::Signal) -> Self {
        Self(signal)
    }
}

/// Lightweight notice that data behind some `Channel` has changed.
///
/// Carries no data, so the affected views are expected to be re-fetched.
#[graphql_object(context = Context)]
impl Signal {
    /// `Channel` the data has changed on.
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.0.channel.into()
    }

    /// Kind of the event which has changed the data, if any.
    #[must_use]
    pub fn event(&self) -> Option<&str> {
        self.0.event
    }

    /// `DateTime` when the data has changed.
    #[must_use]
    pub fn at(&self) -> DateTime {
        self.0.at
    }
}

#[cfg(test)]
mod spec {
    use service::infra::fanout;

    use super::Channel;

    #[test]
    fn maps_every_channel_back_and_forth() {
        for &ch in fanout::Channel::ALL {
            assert_eq!(fanout::Channel::from(Channel::from(ch)), ch);
        }
    }
}
