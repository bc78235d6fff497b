//! [`Sale`] definitions.

use std::time::Duration;

use common::{define_kind, unit, DateTime, DateTimeOf, Money, DAY};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    equipment,
    lifecycle::{Actor, Transition, TransitionError},
    pricing, reference, user, Equipment,
};

/// Age after which a pending [`Sale`] is cancelled automatically.
pub const EXPIRATION_AGE: Duration = DAY.saturating_mul(7);

/// Age after which the buyer is reminded about a pending [`Sale`].
pub const REMINDER_AGE: Duration = DAY.saturating_mul(6);

/// Purchase of an equipment unit by a buyer.
#[derive(Clone, Debug)]
pub struct Sale {
    /// ID of this [`Sale`].
    pub id: Id,

    /// Human-readable [`Reference`] number of this [`Sale`].
    pub reference: Reference,

    /// ID of the buyer.
    pub buyer_id: user::Id,

    /// ID of the sold equipment unit.
    pub equipment_id: equipment::Id,

    /// ID of the supplier selling the equipment unit.
    ///
    /// [`None`] if the platform itself is the seller.
    pub supplier_id: Option<user::Id>,

    /// Price of the equipment unit.
    pub price: Money,

    /// Platform commission of this [`Sale`].
    pub commission: Money,

    /// Delivery of the equipment unit to the buyer, if requested.
    pub transport: Option<Transport>,

    /// Price paid by the buyer, including the [`Transport`].
    pub grand_total: Money,

    /// [`Status`] of this [`Sale`].
    pub status: Status,

    /// Notes left along with the last status change.
    pub notes: Option<String>,

    /// [`DateTime`] when this [`Sale`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Sale`] was last modified.
    pub updated_at: ModificationDateTime,

    /// [`DateTime`] when this [`Sale`] was completed.
    pub completed_at: Option<CompletionDateTime>,

    /// [`DateTime`] when the buyer was reminded about this pending [`Sale`].
    pub reminded_at: Option<ReminderDateTime>,
}

impl Sale {
    /// Changes the [`Status`] of this [`Sale`] on behalf of the provided
    /// [`Actor`], if the transition is legal.
    ///
    /// Stamps `completed_at` on completion. Effects on the sold
    /// [`Equipment`] are applied separately by [`Sale::settle()`].
    ///
    /// # Errors
    ///
    /// With [`TransitionError`] if the transition is illegal.
    pub fn transition(
        &mut self,
        to: Status,
        actor: Actor,
        notes: Option<String>,
        at: DateTime,
    ) -> Result<Transition<Status>, TransitionError> {
        let transition = self.status.transition(to, actor)?;
        if transition.is_changed() {
            self.status = to;
            self.updated_at = at.coerce();
            if to == Status::Completed {
                self.completed_at = Some(at.coerce());
            }
            if notes.is_some() {
                self.notes = notes;
            }
        }
        Ok(transition)
    }

    /// Brings availability of the sold [`Equipment`] in line with the
    /// current [`Status`] of this [`Sale`].
    ///
    /// Idempotent.
    pub fn settle(&self, equipment: &mut Equipment) {
        match self.status {
            Status::Pending => equipment.reserve(),
            Status::Paid | Status::Completed => equipment.mark_sold(),
            Status::Cancelled => equipment.release(),
        }
    }

    /// Indicates whether this [`Sale`] is pending since the provided moment
    /// or earlier.
    #[must_use]
    pub fn is_stale(&self, created_until: DateTime) -> bool {
        self.status == Status::Pending
            && self.created_at <= created_until.coerce()
    }

    /// Indicates whether this [`Sale`] is pending and was created within the
    /// provided `(after, until]` range, and the buyer wasn't reminded about
    /// it yet.
    #[must_use]
    pub fn is_aging_within(&self, after: DateTime, until: DateTime) -> bool {
        self.status == Status::Pending
            && self.reminded_at.is_none()
            && after.coerce() < self.created_at
            && self.created_at <= until.coerce()
    }
}

/// Delivery of a sold equipment unit, priced by distance.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Transport {
    /// Distance of the delivery.
    pub distance: pricing::Usage,

    /// Snapshot of the rate per distance unit.
    pub rate: Money,

    /// Cost of this [`Transport`].
    pub cost: Money,
}

impl Transport {
    /// Prices the delivery over the provided distance at the provided rate.
    ///
    /// # Errors
    ///
    /// With [`pricing::InvalidPricingType`] if the rate is zero.
    pub fn price(
        rate: Money,
        distance: pricing::Usage,
    ) -> Result<Self, pricing::InvalidPricingType> {
        Ok(Self {
            distance,
            rate,
            cost: pricing::subtotal(
                pricing::Type::PerDistance,
                Some(rate),
                distance,
            )?,
        })
    }
}

/// ID of a [`Sale`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Human-readable reference number of a [`Sale`] in a `SL-XXXXXXXX` format.
#[derive(
    AsRef,
    Clone,
    Debug,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Reference(String);

impl Reference {
    /// Prefix of every [`Sale`] [`Reference`].
    pub const PREFIX: &'static str = "SL";

    /// Draws a new random [`Reference`].
    #[must_use]
    pub fn random() -> Self {
        Self(reference::draw(Self::PREFIX, &mut rand::thread_rng()))
    }
}

impl FromStr for Reference {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if reference::is_valid(Self::PREFIX, s) {
            Ok(Self(s.to_owned()))
        } else {
            Err("invalid sale reference")
        }
    }
}

define_kind! {
    #[doc = "Status of a [`Sale`]."]
    #[case = "snake_case"]
    enum Status {
        #[doc = "[`Sale`] awaits payment, the equipment unit is reserved."]
        Pending = 1,

        #[doc = "[`Sale`] is paid, the equipment unit is sold."]
        Paid = 2,

        #[doc = "[`Sale`] is completed."]
        Completed = 3,

        #[doc = "[`Sale`] is cancelled, the equipment unit is released."]
        Cancelled = 4,
    }
}

impl Status {
    /// Indicates whether this [`Status`] is terminal, so no transition
    /// leaves it.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Checks the transition from this [`Status`] to the provided one.
    ///
    /// Requesting the current non-terminal [`Status`] is accepted as
    /// [`Transition::Unchanged`].
    ///
    /// # Errors
    ///
    /// With [`TransitionError`] if this [`Status`] is terminal, or the
    /// transition is not in the table.
    pub fn transition(
        self,
        to: Self,
        _: Actor,
    ) -> Result<Transition<Self>, TransitionError> {
        use Status as S;

        if self.is_terminal() {
            return Err(TransitionError::terminal(self));
        }
        if self == to {
            return Ok(Transition::Unchanged(self));
        }

        match (self, to) {
            (S::Pending, S::Paid | S::Cancelled) | (S::Paid, S::Completed) => {
                Ok(Transition::Changed { from: self, to })
            }
            (S::Paid, S::Cancelled) => Err(TransitionError::invalid(
                self,
                to,
                "only pending purchases can be cancelled",
            )),
            (S::Pending, S::Completed) => Err(TransitionError::invalid(
                self,
                to,
                "purchase must be paid before completion",
            )),
            (
                S::Pending | S::Paid | S::Completed | S::Cancelled,
                S::Pending | S::Paid | S::Completed | S::Cancelled,
            ) => Err(TransitionError::invalid(
                self,
                to,
                "status cannot move backwards",
            )),
        }
    }
}

/// [`DateTime`] when a [`Sale`] was created.
pub type CreationDateTime = DateTimeOf<(Sale, unit::Creation)>;

/// [`DateTime`] when a [`Sale`] was last modified.
pub type ModificationDateTime = DateTimeOf<(Sale, unit::Modification)>;

/// [`DateTime`] when a [`Sale`] was completed.
pub type CompletionDateTime = DateTimeOf<(Sale, unit::Completion)>;

/// [`DateTime`] when a reminder about a [`Sale`] was sent.
pub type ReminderDateTime = DateTimeOf<(Sale, unit::Reminder)>;

#[cfg(test)]
pub(crate) mod spec {
    use std::collections::HashMap;

    use common::{DateTime, DAY, HOUR};

    use crate::domain::{
        booking::spec::{at, dzd},
        equipment::{self, ListingType, Owner},
        lifecycle::{Actor, Transition, TransitionError},
        pricing, user, Equipment,
    };

    use super::{Id, Reference, Sale, Status, Transport};

    pub(crate) fn for_sale(owner: Owner, price: i64) -> Equipment {
        Equipment {
            id: equipment::Id::new(),
            owner,
            listing_type: ListingType::ForSale,
            rates: HashMap::new(),
            sale_price: Some(dzd(price)),
            is_available: true,
            sold_via_transaction: false,
        }
    }

    pub(crate) fn sale(status: Status, created_at: DateTime) -> Sale {
        Sale {
            id: Id::new(),
            reference: Reference::random(),
            buyer_id: user::Id::new(),
            equipment_id: equipment::Id::new(),
            supplier_id: None,
            price: dzd(500_000),
            commission: dzd(0),
            transport: None,
            grand_total: dzd(500_000),
            status,
            notes: None,
            created_at: created_at.coerce(),
            updated_at: created_at.coerce(),
            completed_at: None,
            reminded_at: None,
        }
    }

    #[test]
    fn follows_transition_table() {
        use Status as S;

        let buyer = Actor::User(user::Id::new());

        for (from, to) in [
            (S::Pending, S::Paid),
            (S::Pending, S::Cancelled),
            (S::Paid, S::Completed),
        ] {
            assert_eq!(
                from.transition(to, buyer).unwrap(),
                Transition::Changed { from, to },
            );
        }

        assert!(S::Pending.transition(S::Completed, buyer).is_err());
        assert!(S::Paid.transition(S::Pending, buyer).is_err());
    }

    #[test]
    fn cancels_pending_only() {
        let operator = Actor::Operator(user::Id::new());

        let err = Status::Paid
            .transition(Status::Cancelled, operator)
            .unwrap_err();

        assert!(
            err.to_string()
                .contains("only pending purchases can be cancelled"),
            "unexpected message: {err}",
        );
        assert!(matches!(
            Status::Cancelled.transition(Status::Cancelled, operator),
            Err(TransitionError::TransitionFromTerminalState { .. }),
        ));
    }

    #[test]
    fn settles_equipment() {
        let now = at("2024-05-10T12:00:00Z");
        let mut eq = for_sale(Owner::Platform, 500_000);
        let mut s = sale(Status::Pending, now);

        s.settle(&mut eq);
        assert!(!eq.is_available);

        _ = s.transition(Status::Paid, Actor::Scheduler, None, now).unwrap();
        s.settle(&mut eq);
        s.settle(&mut eq);
        assert!(!eq.is_available);
        assert!(eq.sold_via_transaction);

        _ = s
            .transition(Status::Completed, Actor::Scheduler, None, now)
            .unwrap();
        s.settle(&mut eq);
        assert!(!eq.is_available);
        assert_eq!(s.completed_at, Some(now.coerce()));
    }

    #[test]
    fn releases_equipment_on_cancellation() {
        let now = at("2024-05-10T12:00:00Z");
        let mut eq = for_sale(Owner::Platform, 500_000);
        let mut s = sale(Status::Pending, now);
        s.settle(&mut eq);

        _ = s
            .transition(Status::Cancelled, Actor::Scheduler, None, now)
            .unwrap();
        s.settle(&mut eq);

        assert!(eq.is_available);
    }

    #[test]
    fn detects_aging() {
        let now = at("2024-05-10T12:00:00Z");

        let stale = sale(Status::Pending, now - DAY * 8);
        assert!(stale.is_stale(now - DAY * 7));

        let aging = sale(Status::Pending, now - DAY * 6);
        assert!(!aging.is_stale(now - DAY * 7));
        assert!(aging.is_aging_within(now - DAY * 7, now - DAY * 6));

        let fresh = sale(Status::Pending, now - DAY * 6 + HOUR);
        assert!(!fresh.is_aging_within(now - DAY * 7, now - DAY * 6));

        let paid = sale(Status::Paid, now - DAY * 8);
        assert!(!paid.is_stale(now - DAY * 7));
    }

    #[test]
    fn prices_transport() {
        let t = Transport::price(dzd(150), "40".parse().unwrap()).unwrap();

        assert_eq!(t.cost, dzd(6_000));
        assert!(Transport::price(dzd(0), "40".parse().unwrap()).is_err());
        assert!(matches!(
            Transport::price(dzd(0), "1".parse().unwrap()),
            Err(pricing::InvalidPricingType(pricing::Type::PerDistance)),
        ));
    }
}
