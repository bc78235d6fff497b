//! Equipment-related definitions.

use derive_more::{AsRef, Display, From, Into};
use juniper::GraphQLScalar;
use service::{domain, query};
use uuid::Uuid;

use crate::{api::scalar, define_error, AsError, Error};

/// Unique identifier of an `Equipment` unit.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::equipment::Id)]
#[into(domain::equipment::Id)]
#[graphql(name = "EquipmentId", transparent)]
pub struct Id(Uuid);

/// Unit a rate of an `Equipment` unit is expressed in: `hourly`, `daily`,
/// `monthly`, `perDistance` or `perWeight`.
#[derive(AsRef, Clone, Copy, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "PricingType",
    with = scalar::Via::<domain::pricing::Type>,
)]
pub struct PricingType(domain::pricing::Type);

/// Strictly positive quantity of usage, measured in units of some
/// `PricingType`.
#[derive(AsRef, Clone, Copy, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "Usage",
    with = scalar::Via::<domain::pricing::Usage>,
)]
pub struct Usage(domain::pricing::Usage);

define_error! {
    enum EquipmentError {
        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "`Equipment` does not exist"]
        NotExists,

        #[code = "EQUIPMENT_UNAVAILABLE"]
        #[status = CONFLICT]
        #[message = "`Equipment` is committed to another transaction"]
        Unavailable,

        #[code = "INVALID_PRICING_TYPE"]
        #[status = BAD_REQUEST]
        #[message = "`Equipment` has no rate for the requested pricing"]
        InvalidPricingType,

        #[code = "NOT_FOR_RENT"]
        #[status = BAD_REQUEST]
        #[message = "`Equipment` is not listed for rent"]
        NotForRent,

        #[code = "NOT_FOR_SALE"]
        #[status = BAD_REQUEST]
        #[message = "`Equipment` is not listed for sale"]
        NotForSale,
    }
}

impl EquipmentError {
    /// Converts this [`EquipmentError`] into an [`Error`] carrying the
    /// provided detailed message.
    pub(crate) fn detailed(self, msg: &impl ToString) -> Error {
        Error::from(self).describe(msg)
    }
}

impl AsError for query::equipment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::EquipmentNotExists(_) => {
                Some(EquipmentError::NotExists.detailed(self))
            }
        }
    }
}
