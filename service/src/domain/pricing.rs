//! Pricing and commission calculation.

use std::str::FromStr;

use common::{define_kind, money, Money, Percent};
use derive_more::{Display, Error};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::equipment::Owner;

/// Commission the platform takes from every booking line item.
#[expect(unsafe_code, reason = "value is in range")]
pub const BOOKING_COMMISSION: Percent =
    unsafe { Percent::new_unchecked(Decimal::TEN) };

/// Commission the platform takes from a sale of a supplier's equipment.
#[expect(unsafe_code, reason = "value is in range")]
pub const SALE_COMMISSION: Percent =
    unsafe { Percent::new_unchecked(Decimal::from_parts(5, 0, 0, false, 0)) };

define_kind! {
    #[doc = "Unit a rate of equipment is expressed in."]
    #[case = "camelCase"]
    enum Type {
        #[doc = "Per hour of use."]
        Hourly = 1,

        #[doc = "Per day of use."]
        Daily = 2,

        #[doc = "Per month of use."]
        Monthly = 3,

        #[doc = "Per kilometer travelled."]
        PerDistance = 4,

        #[doc = "Per ton carried."]
        PerWeight = 5,
    }
}

/// Strictly positive quantity of usage, measured in units of some [`Type`].
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Usage(Decimal);

impl Usage {
    /// Creates a new [`Usage`] out of the provided quantity, if it's strictly
    /// positive.
    #[must_use]
    pub fn new(quantity: Decimal) -> Option<Self> {
        (quantity > Decimal::ZERO).then_some(Self(quantity))
    }

    /// Returns the quantity of this [`Usage`].
    #[must_use]
    pub const fn quantity(self) -> Decimal {
        self.0
    }
}

impl FromStr for Usage {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s)
            .ok()
            .and_then(Self::new)
            .ok_or("usage must be a positive number")
    }
}

/// Error of a rate being absent or zero for the requested pricing [`Type`].
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("no rate is resolved for `{_0}` pricing")]
pub struct InvalidPricingType(#[error(not(source))] pub Type);

/// Resolves the provided rate for the provided pricing [`Type`].
///
/// # Errors
///
/// With [`InvalidPricingType`] if the rate is unresolved or zero.
pub fn resolve(
    ty: Type,
    rate: Option<Money>,
) -> Result<Money, InvalidPricingType> {
    rate.filter(Money::is_positive).ok_or(InvalidPricingType(ty))
}

/// Calculates the subtotal of the provided [`Usage`] at the provided rate.
///
/// # Errors
///
/// With [`InvalidPricingType`] if the rate is unresolved or zero.
pub fn subtotal(
    ty: Type,
    rate: Option<Money>,
    usage: Usage,
) -> Result<Money, InvalidPricingType> {
    resolve(ty, rate).map(|rate| rate.times(usage.quantity()))
}

/// Calculates the platform commission of a booking line item.
#[must_use]
pub fn booking_commission(subtotal: Money) -> Money {
    BOOKING_COMMISSION.of(subtotal)
}

/// Calculates the platform commission of a sale of equipment owned by the
/// provided [`Owner`].
#[must_use]
pub fn sale_commission(price: Money, owner: Owner) -> Money {
    match owner {
        Owner::Platform => Money::zero(price.currency),
        Owner::Supplier(_) => SALE_COMMISSION.of(price),
    }
}

/// Error of combining amounts in different [`money::Currency`]s.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("amounts in `{expected}` and `{actual}` cannot be combined")]
pub struct CurrencyMismatch {
    /// [`money::Currency`] of the first amount.
    pub expected: money::Currency,

    /// [`money::Currency`] of the offending amount.
    pub actual: money::Currency,
}

/// Sums up the provided amounts, which must all be in the [`money::Currency`]
/// of the `first` one.
///
/// # Errors
///
/// With [`CurrencyMismatch`] if any of amounts is in another
/// [`money::Currency`].
pub fn total(
    first: Money,
    rest: impl IntoIterator<Item = Money>,
) -> Result<Money, CurrencyMismatch> {
    rest.into_iter().try_fold(first, |acc, m| {
        acc.checked_add(m).ok_or(CurrencyMismatch {
            expected: acc.currency,
            actual: m.currency,
        })
    })
}

#[cfg(test)]
mod spec {
    use common::{money::Currency, Money};
    use rust_decimal::Decimal;

    use crate::domain::{equipment::Owner, user};

    use super::{
        booking_commission, sale_commission, subtotal, total, Type, Usage,
    };

    fn dzd(amount: i64) -> Money {
        Money {
            amount: Decimal::from(amount),
            currency: Currency::Dzd,
        }
    }

    fn usage(q: i64) -> Usage {
        Usage::new(Decimal::from(q)).unwrap()
    }

    #[test]
    fn multiplies_rate_by_usage() {
        assert_eq!(
            subtotal(Type::Daily, Some(dzd(2_500)), usage(4)).unwrap(),
            dzd(10_000),
        );
        assert_eq!(
            subtotal(
                Type::PerDistance,
                Some(dzd(150)),
                "12.5".parse().unwrap(),
            )
            .unwrap(),
            dzd(1_875),
        );
    }

    #[test]
    fn rejects_unresolved_or_zero_rate() {
        assert!(subtotal(Type::Hourly, None, usage(1)).is_err());
        assert!(subtotal(Type::Monthly, Some(dzd(0)), usage(1)).is_err());
    }

    #[test]
    fn rejects_non_positive_usage() {
        assert!(Usage::new(Decimal::ZERO).is_none());
        assert!("-3".parse::<Usage>().is_err());
        assert!("lots".parse::<Usage>().is_err());
    }

    #[test]
    fn takes_ten_percent_of_booking() {
        assert_eq!(booking_commission(dzd(10_000)), dzd(1_000));
    }

    #[test]
    fn takes_five_percent_of_supplier_sale_only() {
        assert_eq!(sale_commission(dzd(500_000), Owner::Platform), dzd(0));
        assert_eq!(
            sale_commission(dzd(500_000), Owner::Supplier(user::Id::new())),
            dzd(25_000),
        );
    }

    #[test]
    fn totals_same_currency_only() {
        assert_eq!(total(dzd(1), [dzd(2), dzd(3)]).unwrap(), dzd(6));
        assert_eq!(total(dzd(1), []).unwrap(), dzd(1));
        assert!(total(
            dzd(1),
            [Money {
                amount: Decimal::ONE,
                currency: Currency::Eur,
            }],
        )
        .is_err());
    }
}
