//! [`Sale`]-related definitions.

use common::{DateTime, Money};
use derive_more::{AsRef, Display, From, Into};
use juniper::{graphql_object, GraphQLScalar};
use service::{command, domain};
use uuid::Uuid;

use crate::{
    api::{self, equipment::EquipmentError, scalar},
    define_error, AsError, Context, Error,
};

/// Purchase of an `Equipment` unit by a buyer.
#[derive(Clone, Debug, From, Into)]
pub struct Sale(domain::Sale);

/// Purchase of an `Equipment` unit by a buyer.
#[graphql_object(context = Context)]
impl Sale {
    /// Unique identifier of this `Sale`.
    #[must_use]
    pub fn id(&self) -> Id {
        self.0.id.into()
    }

    /// Human-readable reference number of this `Sale`.
    #[must_use]
    pub fn reference(&self) -> Reference {
        self.0.reference.clone().into()
    }

    /// ID of the buyer.
    #[must_use]
    pub fn buyer_id(&self) -> api::user::Id {
        self.0.buyer_id.into()
    }

    /// ID of the sold `Equipment` unit.
    #[must_use]
    pub fn equipment_id(&self) -> api::equipment::Id {
        self.0.equipment_id.into()
    }

    /// ID of the supplier selling the `Equipment` unit.
    ///
    /// `null` if the platform itself is the seller.
    #[must_use]
    pub fn supplier_id(&self) -> Option<api::user::Id> {
        self.0.supplier_id.map(Into::into)
    }

    /// Price of the `Equipment` unit.
    #[must_use]
    pub fn price(&self) -> Money {
        self.0.price
    }

    /// Platform commission of this `Sale`.
    #[must_use]
    pub fn commission(&self) -> Money {
        self.0.commission
    }

    /// Delivery of the `Equipment` unit, if requested.
    #[must_use]
    pub fn transport(&self) -> Option<Transport> {
        self.0.transport.map(Transport)
    }

    /// Price paid by the buyer, including the `SaleTransport`.
    #[must_use]
    pub fn grand_total(&self) -> Money {
        self.0.grand_total
    }

    /// Status of this `Sale`: `pending`, `paid`, `completed` or `cancelled`.
    #[must_use]
    pub fn status(&self) -> String {
        self.0.status.to_string()
    }

    /// Notes left along with the last status change.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.0.notes.as_deref()
    }

    /// `DateTime` when this `Sale` was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime {
        self.0.created_at.coerce()
    }

    /// `DateTime` when this `Sale` was last modified.
    #[must_use]
    pub fn updated_at(&self) -> DateTime {
        self.0.updated_at.coerce()
    }

    /// `DateTime` when this `Sale` was completed.
    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime> {
        self.0.completed_at.map(|at| at.coerce())
    }
}

/// Delivery of a sold `Equipment` unit, priced by distance.
#[derive(Clone, Copy, Debug, From, Into)]
pub struct Transport(domain::sale::Transport);

/// Delivery of a sold `Equipment` unit, priced by distance.
#[graphql_object(name = "SaleTransport", context = Context)]
impl Transport {
    /// Distance of the delivery.
    #[must_use]
    pub fn distance(&self) -> api::equipment::Usage {
        self.0.distance.into()
    }

    /// Rate per distance unit at the moment of purchase.
    #[must_use]
    pub fn rate(&self) -> Money {
        self.0.rate
    }

    /// Cost of the delivery.
    #[must_use]
    pub fn cost(&self) -> Money {
        self.0.cost
    }
}

/// Unique identifier of a `Sale`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::sale::Id, Uuid)]
#[into(domain::sale::Id)]
#[graphql(name = "SaleId", transparent)]
pub struct Id(Uuid);

/// Reference number of a `Sale` in a `SL-XXXXXXXX` format.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "SaleReference",
    with = scalar::Via::<domain::sale::Reference>,
)]
pub struct Reference(domain::sale::Reference);

define_error! {
    enum SaleError {
        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "`Sale` does not exist"]
        NotExists,

        #[code = "CURRENCY_MISMATCH"]
        #[status = BAD_REQUEST]
        #[message = "Price and transport cost are in different currencies"]
        CurrencyMismatch,

        #[code = "TRANSPORT_UNAVAILABLE"]
        #[status = BAD_REQUEST]
        #[message = "Delivery of sold equipment is not offered"]
        TransportUnavailable,
    }
}

impl AsError for command::create_sale::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::ReferenceExhausted => return None,
            Self::CurrencyMismatch(_) => {
                Error::from(SaleError::CurrencyMismatch).describe(self)
            }
            Self::TransportUnavailable => {
                SaleError::TransportUnavailable.into()
            }
            Self::EquipmentNotExists(_) => {
                EquipmentError::NotExists.detailed(self)
            }
            Self::EquipmentUnavailable { .. } => {
                EquipmentError::Unavailable.detailed(self)
            }
            Self::InvalidPricingType(_) => {
                EquipmentError::InvalidPricingType.detailed(self)
            }
            Self::NotForSale(_) => EquipmentError::NotForSale.detailed(self),
        })
    }
}

impl AsError for command::set_sale_status::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::SaleNotExists(_) => {
                Some(Error::from(SaleError::NotExists).describe(self))
            }
            Self::EquipmentNotExists(_) => {
                Some(EquipmentError::NotExists.detailed(self))
            }
            Self::Db(e) => e.try_as_error(),
            Self::Transition(e) => e.try_as_error(),
        }
    }
}
