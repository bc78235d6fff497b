//! [`Booking`]-related definitions.

use common::{DateTime, Money};
use derive_more::{AsRef, Display, From, Into};
use juniper::{graphql_object, GraphQLInputObject, GraphQLScalar};
use service::{command, domain};
use uuid::Uuid;

use crate::{
    api::{self, equipment::EquipmentError, scalar},
    define_error, AsError, Context, Error,
};

/// Rental of one or more units of equipment by a renter.
#[derive(Clone, Debug, From, Into)]
pub struct Booking(domain::Booking);

/// Rental of one or more units of equipment by a renter.
#[graphql_object(context = Context)]
impl Booking {
    /// Unique identifier of this `Booking`.
    #[must_use]
    pub fn id(&self) -> Id {
        self.0.id.into()
    }

    /// Human-readable reference number of this `Booking`.
    #[must_use]
    pub fn reference(&self) -> Reference {
        self.0.reference.clone().into()
    }

    /// ID of the renter who made this `Booking`.
    #[must_use]
    pub fn renter_id(&self) -> api::user::Id {
        self.0.renter_id.into()
    }

    /// `LineItem`s of this `Booking`, one per rented `Equipment` unit.
    #[must_use]
    pub fn items(&self) -> Vec<LineItem> {
        self.0.items.iter().copied().map(LineItem).collect()
    }

    /// Start of the calendar window of this `Booking`.
    ///
    /// `null` for usage-only `Booking`s.
    #[must_use]
    pub fn window_start(&self) -> Option<DateTime> {
        self.0.window.map(|w| w.start())
    }

    /// End of the calendar window of this `Booking`.
    ///
    /// `null` for usage-only `Booking`s.
    #[must_use]
    pub fn window_end(&self) -> Option<DateTime> {
        self.0.window.map(|w| w.end())
    }

    /// Sum of `LineItem` subtotals.
    #[must_use]
    pub fn total_price(&self) -> Money {
        self.0.total_price
    }

    /// Sum of `LineItem` commissions.
    #[must_use]
    pub fn commission(&self) -> Money {
        self.0.commission
    }

    /// Status of this `Booking`: `pending`, `paid`, `completed` or
    /// `cancelled`.
    #[must_use]
    pub fn status(&self) -> String {
        self.0.status.to_string()
    }

    /// Notes left along with the last status change.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.0.notes.as_deref()
    }

    /// `DateTime` when this `Booking` was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime {
        self.0.created_at.coerce()
    }

    /// `DateTime` when this `Booking` was last modified.
    #[must_use]
    pub fn updated_at(&self) -> DateTime {
        self.0.updated_at.coerce()
    }

    /// `DateTime` when this `Booking` was completed.
    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime> {
        self.0.completed_at.map(|at| at.coerce())
    }
}

/// Contribution of a single `Equipment` unit to a `Booking`.
#[derive(Clone, Copy, Debug, From, Into)]
pub struct LineItem(domain::booking::LineItem);

/// Contribution of a single `Equipment` unit to a `Booking`.
#[graphql_object(name = "BookingLineItem", context = Context)]
impl LineItem {
    /// ID of the rented `Equipment` unit.
    #[must_use]
    pub fn equipment_id(&self) -> api::equipment::Id {
        self.0.equipment_id.into()
    }

    /// ID of the supplier owning the `Equipment` unit.
    ///
    /// `null` if the platform owns it.
    #[must_use]
    pub fn supplier_id(&self) -> Option<api::user::Id> {
        self.0.supplier_id.map(Into::into)
    }

    /// `PricingType` the `Equipment` unit is rented by.
    #[must_use]
    pub fn pricing_type(&self) -> api::equipment::PricingType {
        self.0.pricing_type.into()
    }

    /// `Usage` of the `Equipment` unit.
    #[must_use]
    pub fn usage(&self) -> api::equipment::Usage {
        self.0.usage.into()
    }

    /// Rate of the `Equipment` unit at the moment of booking.
    #[must_use]
    pub fn rate(&self) -> Money {
        self.0.rate
    }

    /// Price of this `BookingLineItem`.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.0.subtotal
    }

    /// Platform commission of this `BookingLineItem`.
    #[must_use]
    pub fn commission(&self) -> Money {
        self.0.commission
    }
}

/// `Equipment` unit requested for a new `Booking`.
#[derive(Clone, Copy, Debug, GraphQLInputObject)]
#[graphql(name = "BookingItemInput")]
pub struct ItemInput {
    /// ID of the requested `Equipment` unit.
    pub equipment_id: api::equipment::Id,

    /// `PricingType` to rent the `Equipment` unit by.
    pub pricing_type: api::equipment::PricingType,

    /// `Usage` of the `Equipment` unit.
    pub usage: api::equipment::Usage,
}

impl From<ItemInput> for command::create_booking::Item {
    fn from(input: ItemInput) -> Self {
        Self {
            equipment_id: input.equipment_id.into(),
            pricing_type: input.pricing_type.into(),
            usage: input.usage.into(),
        }
    }
}

/// Unique identifier of a `Booking`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::booking::Id, Uuid)]
#[into(domain::booking::Id)]
#[graphql(name = "BookingId", transparent)]
pub struct Id(Uuid);

/// Reference number of a `Booking` in a `BK-XXXXXXXX` format.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "BookingReference",
    with = scalar::Via::<domain::booking::Reference>,
)]
pub struct Reference(domain::booking::Reference);

/// Builds a calendar [`domain::booking::Window`] out of its optional
/// boundaries.
///
/// # Errors
///
/// With [`BookingError::InvalidWindow`] if only one boundary is provided, or
/// the window ends before it starts.
pub(crate) fn window(
    start: Option<DateTime>,
    end: Option<DateTime>,
) -> Result<Option<domain::booking::Window>, Error> {
    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => domain::booking::Window::new(start, end)
            .map(Some)
            .ok_or_else(|| BookingError::InvalidWindow.into()),
        (Some(_), None) | (None, Some(_)) => {
            Err(BookingError::InvalidWindow.into())
        }
    }
}

define_error! {
    enum BookingError {
        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "`Booking` does not exist"]
        NotExists,

        #[code = "NO_LINE_ITEMS"]
        #[status = BAD_REQUEST]
        #[message = "`Booking` must have at least one line item"]
        NoLineItems,

        #[code = "DUPLICATE_EQUIPMENT"]
        #[status = BAD_REQUEST]
        #[message = "`Equipment` is requested more than once"]
        DuplicateEquipment,

        #[code = "CURRENCY_MISMATCH"]
        #[status = BAD_REQUEST]
        #[message = "Line items are priced in different currencies"]
        CurrencyMismatch,

        #[code = "INVALID_WINDOW"]
        #[status = BAD_REQUEST]
        #[message = "Window must have both boundaries and not end before \
                     it starts"]
        InvalidWindow,
    }
}

impl AsError for command::create_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::Db(e) => return e.try_as_error(),
            Self::ReferenceExhausted => return None,
            Self::CurrencyMismatch(_) => {
                Error::from(BookingError::CurrencyMismatch).describe(self)
            }
            Self::DuplicateEquipment(_) => {
                Error::from(BookingError::DuplicateEquipment).describe(self)
            }
            Self::NoLineItems => BookingError::NoLineItems.into(),
            Self::EquipmentNotExists(_) => {
                EquipmentError::NotExists.detailed(self)
            }
            Self::EquipmentUnavailable { .. } => {
                EquipmentError::Unavailable.detailed(self)
            }
            Self::InvalidPricingType(_) => {
                EquipmentError::InvalidPricingType.detailed(self)
            }
            Self::NotForRent(_) => EquipmentError::NotForRent.detailed(self),
        })
    }
}

impl AsError for command::set_booking_status::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::BookingNotExists(_) => {
                Some(Error::from(BookingError::NotExists).describe(self))
            }
            Self::Db(e) => e.try_as_error(),
            Self::Transition(e) => e.try_as_error(),
        }
    }
}
