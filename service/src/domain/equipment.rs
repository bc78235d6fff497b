//! [`Equipment`] definitions.

use std::collections::HashMap;

use common::{define_kind, Money};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{pricing, user};

/// Unit of equipment listed on the marketplace, as seen by the transaction
/// lifecycle.
///
/// Descriptive fields of a listing are not tracked here.
#[derive(Clone, Debug)]
pub struct Equipment {
    /// ID of this [`Equipment`].
    pub id: Id,

    /// [`Owner`] of this [`Equipment`].
    pub owner: Owner,

    /// [`ListingType`] of this [`Equipment`].
    pub listing_type: ListingType,

    /// Rate card of this [`Equipment`] for renting.
    pub rates: HashMap<pricing::Type, Money>,

    /// Price of this [`Equipment`] for selling, if any.
    pub sale_price: Option<Money>,

    /// Indicator whether this [`Equipment`] may be committed to a new
    /// transaction.
    ///
    /// May be set to `false` manually, besides the transactions.
    pub is_available: bool,

    /// Indicator whether this [`Equipment`] has been sold via a paid sale.
    pub sold_via_transaction: bool,
}

impl Equipment {
    /// Returns the rate of this [`Equipment`] for the provided
    /// [`pricing::Type`], if any.
    #[must_use]
    pub fn rate(&self, ty: pricing::Type) -> Option<Money> {
        self.rates.get(&ty).copied()
    }

    /// Returns ID of the supplier owning this [`Equipment`], if it's not
    /// owned by the platform.
    #[must_use]
    pub fn supplier_id(&self) -> Option<user::Id> {
        match self.owner {
            Owner::Platform => None,
            Owner::Supplier(id) => Some(id),
        }
    }

    /// Reserves this [`Equipment`] for a pending sale.
    pub fn reserve(&mut self) {
        self.is_available = false;
    }

    /// Releases the reservation of this [`Equipment`], unless it's sold.
    pub fn release(&mut self) {
        if !self.sold_via_transaction {
            self.is_available = true;
        }
    }

    /// Marks this [`Equipment`] as sold, so it never becomes available again.
    pub fn mark_sold(&mut self) {
        self.is_available = false;
        self.sold_via_transaction = true;
    }
}

/// ID of an [`Equipment`].
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

/// Owner of an [`Equipment`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Owner {
    /// [`Equipment`] is owned by the platform itself.
    Platform,

    /// [`Equipment`] is owned by the supplier with the provided ID.
    Supplier(user::Id),
}

impl From<Option<user::Id>> for Owner {
    fn from(supplier_id: Option<user::Id>) -> Self {
        supplier_id.map_or(Self::Platform, Self::Supplier)
    }
}

define_kind! {
    #[doc = "Type of an [`Equipment`] listing."]
    #[case = "camelCase"]
    enum ListingType {
        #[doc = "[`Equipment`] is listed for rent."]
        ForRent = 1,

        #[doc = "[`Equipment`] is listed for sale."]
        ForSale = 2,
    }
}

#[cfg(test)]
mod spec {
    use std::collections::HashMap;

    use crate::domain::user;

    use super::{Equipment, Id, ListingType, Owner};

    fn equipment() -> Equipment {
        Equipment {
            id: Id::new(),
            owner: Owner::Supplier(user::Id::new()),
            listing_type: ListingType::ForSale,
            rates: HashMap::new(),
            sale_price: None,
            is_available: true,
            sold_via_transaction: false,
        }
    }

    #[test]
    fn releases_reservation() {
        let mut eq = equipment();

        eq.reserve();
        assert!(!eq.is_available);

        eq.release();
        assert!(eq.is_available);
    }

    #[test]
    fn never_releases_sold() {
        let mut eq = equipment();

        eq.mark_sold();
        eq.mark_sold();
        assert!(!eq.is_available);
        assert!(eq.sold_via_transaction);

        eq.release();
        assert!(!eq.is_available);
    }

    #[test]
    fn parses_listing_type() {
        assert_eq!("forRent".parse(), Ok(ListingType::ForRent));
        assert_eq!(ListingType::ForSale.to_string(), "forSale");
    }
}
