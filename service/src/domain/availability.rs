//! Availability of [`Equipment`] for new transactions.
//!
//! An [`Equipment`] unit is unavailable if it has a pending [`Sale`], or an
//! active [`Booking`] conflicting with the requested [`Window`], or it's
//! withdrawn manually. Two [`Booking`]s conflict when both are dated and
//! their [`Window`]s overlap, or when any of them is usage-only.

use derive_more::Display;

use crate::domain::{
    booking::{self, Window},
    sale, Equipment,
};
#[cfg(doc)]
use crate::domain::{Booking, Sale};

/// Engagement of an [`Equipment`] unit by a [`Booking`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BookingEngagement {
    /// ID of the engaging [`Booking`].
    pub booking_id: booking::Id,

    /// Current [`booking::Status`] of the engaging [`Booking`].
    pub status: booking::Status,

    /// [`Window`] of the engaging [`Booking`], if it's dated.
    pub window: Option<Window>,
}

/// Engagement of an [`Equipment`] unit by a [`Sale`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SaleEngagement {
    /// ID of the engaging [`Sale`].
    pub sale_id: sale::Id,

    /// Current [`sale::Status`] of the engaging [`Sale`].
    pub status: sale::Status,
}

/// Engagements of a single [`Equipment`] unit: its active [`Booking`]s and
/// non-cancelled [`Sale`]s.
#[derive(Clone, Debug, Default)]
pub struct Engagements {
    /// [`BookingEngagement`]s of the [`Equipment`] unit.
    pub bookings: Vec<BookingEngagement>,

    /// [`SaleEngagement`]s of the [`Equipment`] unit.
    pub sales: Vec<SaleEngagement>,
}

/// Reason of an [`Equipment`] unit being unavailable.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Conflict {
    /// [`Equipment`] is reserved by a pending [`Sale`].
    #[display("reserved by `Sale(id: {_0})`")]
    Sale(sale::Id),

    /// [`Equipment`] is committed to a conflicting [`Booking`].
    #[display("committed to `Booking(id: {_0})`")]
    Booking(booking::Id),

    /// [`Equipment`] is marked as unavailable.
    #[display("marked as unavailable")]
    Withdrawn,
}

/// Resolves whether the provided [`Equipment`] unit is free to be committed
/// to a new transaction within the provided [`Window`].
///
/// [`None`] [`Window`] stands for a usage-only commitment, conflicting with
/// any active [`Booking`].
///
/// # Errors
///
/// With the first found [`Conflict`] if the unit is unavailable.
pub fn resolve(
    equipment: &Equipment,
    engagements: &Engagements,
    window: Option<&Window>,
) -> Result<(), Conflict> {
    if let Some(s) = engagements
        .sales
        .iter()
        .find(|s| s.status == sale::Status::Pending)
    {
        return Err(Conflict::Sale(s.sale_id));
    }

    if let Some(b) = engagements.bookings.iter().find(|b| {
        b.status.is_active()
            && match (&b.window, window) {
                (Some(existing), Some(requested)) => {
                    existing.overlaps(requested)
                }
                (None, _) | (_, None) => true,
            }
    }) {
        return Err(Conflict::Booking(b.booking_id));
    }

    if !equipment.is_available {
        return Err(Conflict::Withdrawn);
    }

    Ok(())
}

/// Indicates whether the provided [`Equipment`] unit is committed to any
/// transaction at all, regardless of dates.
#[must_use]
pub fn is_committed(equipment: &Equipment, engagements: &Engagements) -> bool {
    resolve(equipment, engagements, None).is_err()
}

#[cfg(test)]
mod spec {
    use common::DAY;

    use crate::domain::{
        booking::{self, spec::at, spec::rental, Window},
        sale,
    };

    use super::{
        is_committed, resolve, BookingEngagement, Conflict, Engagements,
        SaleEngagement,
    };

    fn window(from: u32, to: u32) -> Window {
        let d = at("2024-06-01T00:00:00Z");
        Window::new(d + DAY * from, d + DAY * to).unwrap()
    }

    fn booked(status: booking::Status, window: Option<Window>) -> Engagements {
        Engagements {
            bookings: vec![BookingEngagement {
                booking_id: booking::Id::new(),
                status,
                window,
            }],
            sales: vec![],
        }
    }

    #[test]
    fn free_equipment_is_available() {
        let eq = rental(1_000);

        assert_eq!(
            resolve(&eq, &Engagements::default(), Some(&window(0, 1))),
            Ok(()),
        );
        assert!(!is_committed(&eq, &Engagements::default()));
    }

    #[test]
    fn dated_bookings_conflict_iff_overlap() {
        let eq = rental(1_000);
        let accepted = booked(booking::Status::Paid, Some(window(2, 5)));

        for (from, to, conflicts) in [
            (0, 2, false),
            (5, 7, false),
            (0, 3, true),
            (4, 9, true),
            (3, 4, true),
            (1, 8, true),
            (7, 9, false),
        ] {
            let res = resolve(&eq, &accepted, Some(&window(from, to)));
            assert_eq!(
                res.is_err(),
                conflicts,
                "[{from}, {to}) against [2, 5): {res:?}",
            );
        }
    }

    #[test]
    fn usage_only_bookings_conflict_always() {
        let eq = rental(1_000);

        let usage_only = booked(booking::Status::Pending, None);
        assert!(resolve(&eq, &usage_only, Some(&window(30, 31))).is_err());

        let dated = booked(booking::Status::Pending, Some(window(0, 1)));
        assert!(resolve(&eq, &dated, None).is_err());
    }

    #[test]
    fn terminal_bookings_release_equipment() {
        let eq = rental(1_000);

        for status in [booking::Status::Completed, booking::Status::Cancelled]
        {
            let engagements = booked(status, None);
            assert_eq!(resolve(&eq, &engagements, None), Ok(()));
        }
    }

    #[test]
    fn pending_sale_reserves_equipment() {
        let eq = rental(1_000);
        let sale_id = sale::Id::new();
        let mut engagements = Engagements {
            bookings: vec![],
            sales: vec![SaleEngagement {
                sale_id,
                status: sale::Status::Pending,
            }],
        };

        assert_eq!(
            resolve(&eq, &engagements, None),
            Err(Conflict::Sale(sale_id)),
        );

        engagements.sales[0].status = sale::Status::Cancelled;
        assert_eq!(resolve(&eq, &engagements, None), Ok(()));
    }

    #[test]
    fn withdrawn_equipment_is_unavailable() {
        let mut eq = rental(1_000);
        eq.is_available = false;

        assert_eq!(
            resolve(&eq, &Engagements::default(), None),
            Err(Conflict::Withdrawn),
        );
        assert!(is_committed(&eq, &Engagements::default()));
    }
}
