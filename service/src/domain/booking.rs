//! [`Booking`] definitions.

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

/// How long before its boundary a renter is reminded about a [`Booking`].
pub const REMINDER_LEAD: Duration = DAY;

/// Rental of one or more units of equipment by a renter.
#[derive(Clone, Debug)]
pub struct Booking {
    /// ID of this [`Booking`].
    pub id: Id,

    /// Human-readable [`Reference`] number of this [`Booking`].
    pub reference: Reference,

    /// ID of the renter who made this [`Booking`].
    pub renter_id: user::Id,

    /// [`LineItem`]s of this [`Booking`], one per rented equipment unit.
    pub items: Vec<LineItem>,

    /// Calendar [`Window`] of this [`Booking`].
    ///
    /// [`None`] for usage-only [`Booking`]s.
    pub window: Option<Window>,

    /// Sum of [`LineItem`] subtotals.
    pub total_price: Money,

    /// Sum of [`LineItem`] commissions.
    pub commission: Money,

    /// [`Status`] of this [`Booking`].
    pub status: Status,

    /// Notes left along with the last status change.
    pub notes: Option<String>,

    /// [`DateTime`] when this [`Booking`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Booking`] was last modified.
    pub updated_at: ModificationDateTime,

    /// [`DateTime`] when this [`Booking`] was completed.
    pub completed_at: Option<CompletionDateTime>,

    /// [`DateTime`] when the renter was reminded about the end of the
    /// [`Window`].
    pub end_reminded_at: Option<ReminderDateTime>,

    /// [`DateTime`] when the renter was reminded about the start of the
    /// [`Window`].
    pub start_reminded_at: Option<ReminderDateTime>,
}

impl Booking {
    /// Returns IDs of the equipment this [`Booking`] rents.
    pub fn equipment_ids(&self) -> impl Iterator<Item = equipment::Id> + '_ {
        self.items.iter().map(|i| i.equipment_id)
    }

    /// Changes the [`Status`] of this [`Booking`] on behalf of the provided
    /// [`Actor`], if the transition is legal.
    ///
    /// Stamps `completed_at` on completion.
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

    /// Indicates whether this active [`Booking`] has reached the end of its
    /// [`Window`] at the provided moment.
    #[must_use]
    pub fn has_ended(&self, at: DateTime) -> bool {
        self.status.is_active() && self.window.is_some_and(|w| w.end <= at)
    }

    /// Indicates whether this [`Booking`] is pending and its [`Window`] ends
    /// within the provided `(after, until]` range, and the renter wasn't
    /// reminded about it yet.
    #[must_use]
    pub fn is_ending_within(&self, after: DateTime, until: DateTime) -> bool {
        self.status == Status::Pending
            && self.end_reminded_at.is_none()
            && self.window.is_some_and(|w| after < w.end && w.end <= until)
    }

    /// Indicates whether this [`Booking`] is paid and its [`Window`] starts
    /// within the provided `(after, until]` range, and the renter wasn't
    /// reminded about it yet.
    #[must_use]
    pub fn is_starting_within(&self, after: DateTime, until: DateTime) -> bool {
        self.status == Status::Paid
            && self.start_reminded_at.is_none()
            && self
                .window
                .is_some_and(|w| after < w.start && w.start <= until)
    }
}

/// Contribution of a single equipment unit to a [`Booking`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LineItem {
    /// ID of the rented equipment unit.
    pub equipment_id: equipment::Id,

    /// ID of the supplier owning the equipment unit, if it's not owned by the
    /// platform.
    pub supplier_id: Option<user::Id>,

    /// [`pricing::Type`] the equipment unit is rented by.
    pub pricing_type: pricing::Type,

    /// [`pricing::Usage`] of the equipment unit.
    pub usage: pricing::Usage,

    /// Snapshot of the rate at the moment of booking.
    pub rate: Money,

    /// Price of this [`LineItem`].
    pub subtotal: Money,

    /// Platform commission of this [`LineItem`].
    pub commission: Money,
}

impl LineItem {
    /// Prices the provided [`pricing::Usage`] of the provided [`Equipment`].
    ///
    /// # Errors
    ///
    /// With [`pricing::InvalidPricingType`] if the [`Equipment`] has no rate
    /// for the provided [`pricing::Type`].
    pub fn price(
        equipment: &Equipment,
        pricing_type: pricing::Type,
        usage: pricing::Usage,
    ) -> Result<Self, pricing::InvalidPricingType> {
        let rate =
            pricing::resolve(pricing_type, equipment.rate(pricing_type))?;
        let subtotal = rate.times(usage.quantity());
        Ok(Self {
            equipment_id: equipment.id,
            supplier_id: equipment.supplier_id(),
            pricing_type,
            usage,
            rate,
            subtotal,
            commission: pricing::booking_commission(subtotal),
        })
    }
}

/// Calendar window of a [`Booking`], whose `end` is never before its `start`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Window {
    /// Start of this [`Window`].
    start: DateTime,

    /// End of this [`Window`].
    end: DateTime,
}

impl Window {
    /// Creates a new [`Window`] if the provided `end` is not before the
    /// `start`.
    #[must_use]
    pub fn new(start: DateTime, end: DateTime) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    /// Returns the start of this [`Window`].
    #[must_use]
    pub const fn start(&self) -> DateTime {
        self.start
    }

    /// Returns the end of this [`Window`].
    #[must_use]
    pub const fn end(&self) -> DateTime {
        self.end
    }

    /// Indicates whether this [`Window`] overlaps the provided one.
    ///
    /// Windows are half-open, so the ones touching at a boundary do not
    /// overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// ID of a [`Booking`].
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

/// Human-readable reference number of a [`Booking`] in a `BK-XXXXXXXX`
/// format.
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
    /// Prefix of every [`Booking`] [`Reference`].
    pub const PREFIX: &'static str = "BK";

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
            Err("invalid booking reference")
        }
    }
}

define_kind! {
    #[doc = "Status of a [`Booking`]."]
    #[case = "snake_case"]
    enum Status {
        #[doc = "[`Booking`] awaits payment."]
        Pending = 1,

        #[doc = "[`Booking`] is paid."]
        Paid = 2,

        #[doc = "[`Booking`] is completed."]
        Completed = 3,

        #[doc = "[`Booking`] is cancelled."]
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

    /// Indicates whether a [`Booking`] in this [`Status`] commits its
    /// equipment.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Paid)
    }

    /// Checks the transition from this [`Status`] to the provided one on
    /// behalf of the provided [`Actor`].
    ///
    /// Requesting the current non-terminal [`Status`] is accepted as
    /// [`Transition::Unchanged`].
    ///
    /// # Errors
    ///
    /// With [`TransitionError`] if this [`Status`] is terminal, or the
    /// transition is not in the table, or is not allowed for the [`Actor`].
    pub fn transition(
        self,
        to: Self,
        actor: Actor,
    ) -> Result<Transition<Self>, TransitionError> {
        use Status as S;

        if self.is_terminal() {
            return Err(TransitionError::terminal(self));
        }
        if self == to {
            return Ok(Transition::Unchanged(self));
        }

        let changed = Transition::Changed { from: self, to };
        match (self, to) {
            (S::Pending, S::Paid | S::Completed | S::Cancelled)
            | (S::Paid, S::Completed) => Ok(changed),
            (S::Paid, S::Cancelled) => {
                if actor.is_operator() {
                    Ok(changed)
                } else {
                    Err(TransitionError::invalid(
                        self,
                        to,
                        "only pending bookings can be cancelled",
                    ))
                }
            }
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

/// [`DateTime`] when a [`Booking`] was created.
pub type CreationDateTime = DateTimeOf<(Booking, unit::Creation)>;

/// [`DateTime`] when a [`Booking`] was last modified.
pub type ModificationDateTime = DateTimeOf<(Booking, unit::Modification)>;

/// [`DateTime`] when a [`Booking`] was completed.
pub type CompletionDateTime = DateTimeOf<(Booking, unit::Completion)>;

/// [`DateTime`] when a reminder about a [`Booking`] was sent.
pub type ReminderDateTime = DateTimeOf<(Booking, unit::Reminder)>;

#[cfg(test)]
pub(crate) mod spec {
    use std::collections::HashMap;

    use common::{money::Currency, DateTime, Money, DAY, HOUR};
    use rust_decimal::Decimal;

    use crate::domain::{
        equipment::{self, ListingType, Owner},
        lifecycle::{Actor, Transition, TransitionError},
        pricing, user, Equipment,
    };

    use super::{Booking, Id, LineItem, Reference, Status, Window};

    pub(crate) fn at(s: &str) -> DateTime {
        DateTime::from_rfc3339(s).unwrap()
    }

    pub(crate) fn dzd(amount: i64) -> Money {
        Money {
            amount: Decimal::from(amount),
            currency: Currency::Dzd,
        }
    }

    pub(crate) fn rental(daily: i64) -> Equipment {
        Equipment {
            id: equipment::Id::new(),
            owner: Owner::Supplier(user::Id::new()),
            listing_type: ListingType::ForRent,
            rates: HashMap::from([(pricing::Type::Daily, dzd(daily))]),
            sale_price: None,
            is_available: true,
            sold_via_transaction: false,
        }
    }

    pub(crate) fn booking(status: Status, window: Option<Window>) -> Booking {
        let item = LineItem::price(
            &rental(2_500),
            pricing::Type::Daily,
            pricing::Usage::new(Decimal::from(4)).unwrap(),
        )
        .unwrap();
        let created_at = at("2024-05-01T00:00:00Z");
        Booking {
            id: Id::new(),
            reference: Reference::random(),
            renter_id: user::Id::new(),
            items: vec![item],
            window,
            total_price: item.subtotal,
            commission: item.commission,
            status,
            notes: None,
            created_at: created_at.coerce(),
            updated_at: created_at.coerce(),
            completed_at: None,
            end_reminded_at: None,
            start_reminded_at: None,
        }
    }

    #[test]
    fn prices_line_item() {
        let item = LineItem::price(
            &rental(2_500),
            pricing::Type::Daily,
            pricing::Usage::new(Decimal::from(4)).unwrap(),
        )
        .unwrap();

        assert_eq!(item.rate, dzd(2_500));
        assert_eq!(item.subtotal, dzd(10_000));
        assert_eq!(item.commission, dzd(1_000));
    }

    #[test]
    fn rejects_pricing_without_rate() {
        let err = LineItem::price(
            &rental(2_500),
            pricing::Type::Hourly,
            pricing::Usage::new(Decimal::ONE).unwrap(),
        )
        .unwrap_err();

        assert_eq!(err.0, pricing::Type::Hourly);
    }

    #[test]
    fn follows_transition_table() {
        use Status as S;

        let user = Actor::User(user::Id::new());
        let operator = Actor::Operator(user::Id::new());

        for (from, to) in [
            (S::Pending, S::Paid),
            (S::Pending, S::Completed),
            (S::Pending, S::Cancelled),
            (S::Paid, S::Completed),
        ] {
            assert_eq!(
                from.transition(to, user).unwrap(),
                Transition::Changed { from, to },
            );
        }

        assert!(matches!(
            S::Paid.transition(S::Cancelled, user),
            Err(TransitionError::InvalidStatusTransition { .. }),
        ));
        assert!(matches!(
            S::Paid.transition(S::Cancelled, Actor::Scheduler),
            Err(TransitionError::InvalidStatusTransition { .. }),
        ));
        assert!(S::Paid.transition(S::Cancelled, operator).is_ok());
        assert!(matches!(
            S::Paid.transition(S::Pending, operator),
            Err(TransitionError::InvalidStatusTransition { .. }),
        ));
    }

    #[test]
    fn reapplying_status_is_harmless() {
        assert_eq!(
            Status::Paid.transition(Status::Paid, Actor::Scheduler).unwrap(),
            Transition::Unchanged(Status::Paid),
        );
    }

    #[test]
    fn terminal_statuses_are_final() {
        let operator = Actor::Operator(user::Id::new());

        for from in [Status::Completed, Status::Cancelled] {
            for &to in Status::ALL {
                assert!(
                    matches!(
                        from.transition(to, operator),
                        Err(TransitionError::TransitionFromTerminalState {
                            ..
                        }),
                    ),
                    "`{from}` -> `{to}` is accepted",
                );
            }
        }
    }

    #[test]
    fn stamps_completion() {
        let now = at("2024-05-10T12:00:00Z");
        let mut b = booking(Status::Paid, None);

        let t = b
            .transition(Status::Completed, Actor::Scheduler, None, now)
            .unwrap();

        assert!(t.is_changed());
        assert_eq!(b.status, Status::Completed);
        assert_eq!(b.completed_at, Some(now.coerce()));
        assert_eq!(b.updated_at, now.coerce());
    }

    #[test]
    fn keeps_booking_untouched_on_rejection() {
        let now = at("2024-05-10T12:00:00Z");
        let mut b = booking(Status::Cancelled, None);
        let updated_at = b.updated_at;

        assert!(b
            .transition(Status::Paid, Actor::Scheduler, None, now)
            .is_err());
        assert_eq!(b.status, Status::Cancelled);
        assert_eq!(b.updated_at, updated_at);
    }

    #[test]
    fn validates_window() {
        let start = at("2024-05-10T00:00:00Z");

        assert!(Window::new(start, start + DAY).is_some());
        assert!(Window::new(start, start).is_some());
        assert!(Window::new(start, start - HOUR).is_none());
    }

    #[test]
    fn overlaps_half_open() {
        let d = at("2024-05-10T00:00:00Z");
        let w = |from: u32, to: u32| {
            Window::new(d + DAY * from, d + DAY * to).unwrap()
        };

        assert!(w(0, 3).overlaps(&w(2, 5)));
        assert!(w(2, 5).overlaps(&w(0, 3)));
        assert!(w(0, 5).overlaps(&w(1, 2)));
        assert!(!w(0, 3).overlaps(&w(3, 5)));
        assert!(!w(3, 5).overlaps(&w(0, 3)));
    }

    #[test]
    fn detects_time_boundaries() {
        let now = at("2024-05-10T12:00:00Z");
        let window = Window::new(now - DAY, now + HOUR * 5);

        let pending = booking(Status::Pending, window);
        assert!(!pending.has_ended(now));
        assert!(pending.has_ended(now + HOUR * 5));
        assert!(pending.is_ending_within(now, now + DAY));
        assert!(!pending.is_starting_within(now - DAY * 2, now));

        let mut reminded = pending.clone();
        reminded.end_reminded_at = Some(now.coerce());
        assert!(!reminded.is_ending_within(now, now + DAY));

        let paid = booking(Status::Paid, window);
        assert!(paid.is_starting_within(now - DAY * 2, now));
        assert!(!paid.is_ending_within(now, now + DAY));

        let usage_only = booking(Status::Pending, None);
        assert!(!usage_only.has_ended(now + DAY * 365));
        assert!(!usage_only.is_ending_within(now, now + DAY * 365));
    }

    #[test]
    fn parses_reference() {
        let r = Reference::random();

        assert_eq!(r.to_string().parse::<Reference>().unwrap(), r);
        assert!("SL-ABCD2345".parse::<Reference>().is_err());
    }
}
