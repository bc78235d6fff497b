//! [`Notification`] definitions.

use common::{DateTime, Money};
use derive_more::Display;
use serde::Serialize;

use crate::domain::{
    booking, equipment, lifecycle::Actor, pricing, sale, user, Booking, Sale,
};

/// Informational message about a lifecycle event, delivered on a best-effort
/// basis.
#[derive(Clone, Debug, Serialize)]
pub struct Notification {
    /// [`Recipient`] of this [`Notification`].
    pub recipient: Recipient,

    /// [`Event`] this [`Notification`] is about.
    #[serde(flatten)]
    pub event: Event,
}

impl Notification {
    /// Creates a new [`Notification`] about the provided [`Event`] for the
    /// provided [`Recipient`].
    #[must_use]
    pub fn to(recipient: Recipient, event: Event) -> Self {
        Self { recipient, event }
    }
}

/// Role-based recipient of a [`Notification`], resolved to a contact by the
/// delivering side.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    /// Operations inbox of the platform.
    #[display("operations")]
    Operations,

    /// Party of a transaction.
    #[display("user:{_0}")]
    User(user::Id),
}

/// Lifecycle event along with its payload.
#[derive(Clone, Debug, Serialize, strum::IntoStaticStr)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Event {
    /// New [`Booking`] has been created.
    BookingCreated(BookingDetails),

    /// [`Booking`] status has been changed by a party or an operator.
    BookingStatusChanged(StatusChange<BookingDetails, booking::Status>),

    /// Pending [`Booking`] has been cancelled by the scheduler, as its window
    /// has ended.
    BookingCancelledAutomatically(BookingDetails),

    /// Window of a pending [`Booking`] ends soon.
    BookingEndingSoon(BookingDetails),

    /// Window of a paid [`Booking`] starts soon.
    BookingStartingSoon(BookingDetails),

    /// New [`Sale`] has been created.
    SaleCreated(SaleDetails),

    /// [`Sale`] status has been changed by a party or an operator.
    SaleStatusChanged(StatusChange<SaleDetails, sale::Status>),

    /// Pending [`Sale`] has been cancelled by the scheduler, as it's stale.
    SaleCancelledAutomatically(SaleDetails),

    /// [`Sale`] is pending for too long.
    SalePendingReminder(SaleDetails),
}

impl Event {
    /// Returns the kind of this [`Event`].
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

/// Status change payload of an [`Event`].
#[derive(Clone, Debug, Serialize)]
pub struct StatusChange<D, S> {
    /// Details of the transaction after the change.
    #[serde(flatten)]
    pub details: D,

    /// Status before the change.
    pub previous_status: S,

    /// [`Actor`] who changed the status.
    pub changed_by: Actor,
}

/// [`Booking`] payload of an [`Event`].
#[derive(Clone, Debug, Serialize)]
pub struct BookingDetails {
    /// ID of the [`Booking`].
    pub id: booking::Id,

    /// [`booking::Reference`] number of the [`Booking`].
    pub reference: booking::Reference,

    /// ID of the renter.
    pub renter_id: user::Id,

    /// [`booking::Status`] of the [`Booking`].
    pub status: booking::Status,

    /// Total price of the [`Booking`].
    pub total_price: Money,

    /// Platform commission of the [`Booking`].
    pub commission: Money,

    /// Start of the [`Booking`] window, if it's dated.
    pub start_date: Option<DateTime>,

    /// End of the [`Booking`] window, if it's dated.
    pub end_date: Option<DateTime>,

    /// Rented equipment.
    pub items: Vec<ItemDetails>,

    /// Notes left along with the last status change.
    pub notes: Option<String>,
}

impl From<&Booking> for BookingDetails {
    fn from(b: &Booking) -> Self {
        Self {
            id: b.id,
            reference: b.reference.clone(),
            renter_id: b.renter_id,
            status: b.status,
            total_price: b.total_price,
            commission: b.commission,
            start_date: b.window.map(|w| w.start()),
            end_date: b.window.map(|w| w.end()),
            items: b
                .items
                .iter()
                .map(|i| ItemDetails {
                    equipment_id: i.equipment_id,
                    supplier_id: i.supplier_id,
                    pricing_type: i.pricing_type,
                    usage: i.usage,
                    subtotal: i.subtotal,
                })
                .collect(),
            notes: b.notes.clone(),
        }
    }
}

/// [`Booking`] line item payload of an [`Event`].
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ItemDetails {
    /// ID of the rented equipment unit.
    pub equipment_id: equipment::Id,

    /// ID of the supplier owning the equipment unit.
    pub supplier_id: Option<user::Id>,

    /// [`pricing::Type`] the equipment unit is rented by.
    pub pricing_type: pricing::Type,

    /// [`pricing::Usage`] of the equipment unit.
    pub usage: pricing::Usage,

    /// Price of the line item.
    pub subtotal: Money,
}

/// [`Sale`] payload of an [`Event`].
#[derive(Clone, Debug, Serialize)]
pub struct SaleDetails {
    /// ID of the [`Sale`].
    pub id: sale::Id,

    /// [`sale::Reference`] number of the [`Sale`].
    pub reference: sale::Reference,

    /// ID of the buyer.
    pub buyer_id: user::Id,

    /// ID of the sold equipment unit.
    pub equipment_id: equipment::Id,

    /// ID of the selling supplier, if it's not the platform.
    pub supplier_id: Option<user::Id>,

    /// [`sale::Status`] of the [`Sale`].
    pub status: sale::Status,

    /// Price of the equipment unit.
    pub price: Money,

    /// Platform commission of the [`Sale`].
    pub commission: Money,

    /// Cost of the delivery, if requested.
    pub transport_cost: Option<Money>,

    /// Price paid by the buyer.
    pub grand_total: Money,

    /// [`DateTime`] when the [`Sale`] was created.
    pub created_at: DateTime,

    /// Notes left along with the last status change.
    pub notes: Option<String>,
}

impl From<&Sale> for SaleDetails {
    fn from(s: &Sale) -> Self {
        Self {
            id: s.id,
            reference: s.reference.clone(),
            buyer_id: s.buyer_id,
            equipment_id: s.equipment_id,
            supplier_id: s.supplier_id,
            status: s.status,
            price: s.price,
            commission: s.commission,
            transport_cost: s.transport.map(|t| t.cost),
            grand_total: s.grand_total,
            created_at: s.created_at.coerce(),
            notes: s.notes.clone(),
        }
    }
}

#[cfg(test)]
mod spec {
    use common::DAY;

    use crate::domain::{
        booking::{self, spec::at, Window},
        user,
    };

    use super::{Event, Notification, Recipient};

    #[test]
    fn serializes_flat_record() {
        let now = at("2024-05-10T12:00:00Z");
        let b = booking::spec::booking(
            booking::Status::Pending,
            Window::new(now, now + DAY),
        );
        let renter = user::Id::new();

        let json = serde_json::to_value(Notification::to(
            Recipient::User(renter),
            Event::BookingEndingSoon((&b).into()),
        ))
        .unwrap();

        assert_eq!(json["kind"], "booking_ending_soon");
        assert_eq!(json["recipient"]["user"], renter.to_string());
        assert_eq!(json["payload"]["reference"], b.reference.to_string());
        assert_eq!(json["payload"]["status"], "pending");
        assert_eq!(json["payload"]["total_price"], "10000DZD");
        assert_eq!(json["payload"]["end_date"], "2024-05-11T12:00:00Z");
        assert_eq!(json["payload"]["items"][0]["pricing_type"], "daily");
    }

    #[test]
    fn names_event_kind() {
        let b = booking::spec::booking(booking::Status::Cancelled, None);

        assert_eq!(
            Event::BookingCancelledAutomatically((&b).into()).kind(),
            "booking_cancelled_automatically",
        );
        assert_eq!(Recipient::Operations.to_string(), "operations");
    }
}
