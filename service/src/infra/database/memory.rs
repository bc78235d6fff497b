//! In-memory [`Database`] implementation.
//!
//! Suits tests and single-instance deployments. A transaction holds the
//! whole store exclusively and stages its changes until [`Commit`], so
//! dropping it uncommitted rolls everything back.

use std::{collections::HashMap, future::Future, mem, sync::Arc};

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Update,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{self, BookingEngagement, Engagements, SaleEngagement},
        booking, equipment, sale, Booking, Equipment, Sale,
    },
    infra::database::{self, Database},
    read,
};

/// In-memory [`Database`].
#[derive(Clone, Debug, Default)]
pub struct Memory<T = NonTx>(T);

/// Non-transactional access to a [`Memory`] store.
///
/// Every write is applied immediately.
#[derive(Clone, Debug, Default)]
pub struct NonTx(Arc<Mutex<Store>>);

/// Transactional access to a [`Memory`] store.
///
/// Holds the store exclusively until committed or dropped.
#[derive(Debug)]
pub struct Tx {
    /// Exclusively held store, released on [`Commit`].
    held: Mutex<Option<OwnedMutexGuard<Store>>>,

    /// Changes staged by this [`Tx`].
    staged: Mutex<Store>,
}

/// Contents of a [`Memory`] store.
#[derive(Clone, Debug, Default)]
pub struct Store {
    /// Stored [`Equipment`].
    equipment: HashMap<equipment::Id, Equipment>,

    /// Stored [`Booking`]s.
    bookings: HashMap<booking::Id, Booking>,

    /// Stored [`Sale`]s.
    sales: HashMap<sale::Id, Sale>,
}

impl Store {
    /// Collects [`Engagements`] of the [`Equipment`] with the provided ID.
    fn engagements(&self, id: equipment::Id) -> Engagements {
        Engagements {
            bookings: self
                .bookings
                .values()
                .filter(|b| {
                    b.status.is_active() && b.equipment_ids().any(|e| e == id)
                })
                .map(|b| BookingEngagement {
                    booking_id: b.id,
                    status: b.status,
                    window: b.window,
                })
                .collect(),
            sales: self
                .sales
                .values()
                .filter(|s| {
                    s.equipment_id == id && s.status != sale::Status::Cancelled
                })
                .map(|s| SaleEngagement {
                    sale_id: s.id,
                    status: s.status,
                })
                .collect(),
        }
    }
}

/// Access to a [`Store`].
pub trait Access {
    /// Applies the provided function to the accessed [`Store`].
    fn access<R>(
        &self,
        f: impl FnOnce(&mut Store) -> R,
    ) -> impl Future<Output = R>;
}

impl Access for NonTx {
    async fn access<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        f(&mut *self.0.lock().await)
    }
}

impl Access for Tx {
    async fn access<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        f(&mut *self.staged.lock().await)
    }
}

impl Memory {
    /// Creates a new empty [`Memory`] store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Database<Transact> for Memory<NonTx> {
    type Ok = Memory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        let held = Arc::clone(&self.0 .0).lock_owned().await;
        let staged = held.clone();
        Ok(Memory(Tx {
            held: Mutex::new(Some(held)),
            staged: Mutex::new(staged),
        }))
    }
}

impl Database<Commit> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        if let Some(mut held) = self.0.held.lock().await.take() {
            *held = mem::take(&mut *self.0.staged.lock().await);
        }
        Ok(())
    }
}

impl<A: Access> Database<Select<By<Option<Equipment>, equipment::Id>>>
    for Memory<A>
{
    type Ok = Option<Equipment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Equipment>, equipment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.0.access(|s| s.equipment.get(&id).cloned()).await)
    }
}

impl<A: Access> Database<Insert<Equipment>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(equipment): Insert<Equipment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .access(|s| drop(s.equipment.insert(equipment.id, equipment)))
            .await;
        Ok(())
    }
}

impl<A: Access> Database<Update<Equipment>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(equipment): Update<Equipment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Insert(equipment)).await
    }
}

impl Database<Lock<By<Equipment, equipment::Id>>> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Equipment, equipment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // `Tx` holds the whole store already.
        Ok(())
    }
}

impl<A: Access> Database<Select<By<Engagements, equipment::Id>>>
    for Memory<A>
{
    type Ok = Engagements;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Engagements, equipment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.0.access(|s| s.engagements(id)).await)
    }
}

impl<A: Access>
    Database<Select<By<Vec<equipment::Id>, read::equipment::Committed>>>
    for Memory<A>
{
    type Ok = Vec<equipment::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<Vec<equipment::Id>, read::equipment::Committed>>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut ids = self
            .0
            .access(|s| {
                s.equipment
                    .values()
                    .filter(|e| {
                        availability::is_committed(e, &s.engagements(e.id))
                    })
                    .map(|e| e.id)
                    .collect::<Vec<_>>()
            })
            .await;
        ids.sort_unstable();
        Ok(ids)
    }
}

impl<A: Access> Database<Select<By<Option<Booking>, booking::Id>>>
    for Memory<A>
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.0.access(|s| s.bookings.get(&id).cloned()).await)
    }
}

impl<A: Access> Database<Select<By<Option<Booking>, booking::Reference>>>
    for Memory<A>
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Reference>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reference = by.into_inner();
        Ok(self
            .0
            .access(|s| {
                s.bookings
                    .values()
                    .find(|b| b.reference == reference)
                    .cloned()
            })
            .await)
    }
}

impl<A: Access> Database<Insert<Booking>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .access(|s| drop(s.bookings.insert(booking.id, booking)))
            .await;
        Ok(())
    }
}

impl<A: Access> Database<Update<Booking>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(booking): Update<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Insert(booking)).await
    }
}

impl Database<Lock<By<Booking, booking::Id>>> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Booking, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // `Tx` holds the whole store already.
        Ok(())
    }
}

impl<A: Access> Database<Select<By<Vec<booking::Id>, read::booking::Ended>>>
    for Memory<A>
{
    type Ok = Vec<booking::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<booking::Id>, read::booking::Ended>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::Ended { at } = by.into_inner();
        Ok(self
            .0
            .access(|s| select_bookings(s, |b| b.has_ended(at)))
            .await)
    }
}

impl<A: Access>
    Database<Select<By<Vec<booking::Id>, read::booking::EndingSoon>>>
    for Memory<A>
{
    type Ok = Vec<booking::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<booking::Id>, read::booking::EndingSoon>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::EndingSoon { after, until } = by.into_inner();
        Ok(self
            .0
            .access(|s| {
                select_bookings(s, |b| b.is_ending_within(after, until))
            })
            .await)
    }
}

impl<A: Access>
    Database<Select<By<Vec<booking::Id>, read::booking::StartingSoon>>>
    for Memory<A>
{
    type Ok = Vec<booking::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<booking::Id>, read::booking::StartingSoon>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::StartingSoon { after, until } = by.into_inner();
        Ok(self
            .0
            .access(|s| {
                select_bookings(s, |b| b.is_starting_within(after, until))
            })
            .await)
    }
}

impl<A: Access> Database<Select<By<Option<Sale>, sale::Id>>> for Memory<A> {
    type Ok = Option<Sale>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Sale>, sale::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.0.access(|s| s.sales.get(&id).cloned()).await)
    }
}

impl<A: Access> Database<Select<By<Option<Sale>, sale::Reference>>>
    for Memory<A>
{
    type Ok = Option<Sale>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Sale>, sale::Reference>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reference = by.into_inner();
        Ok(self
            .0
            .access(|s| {
                s.sales.values().find(|s| s.reference == reference).cloned()
            })
            .await)
    }
}

impl<A: Access> Database<Insert<Sale>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(sale): Insert<Sale>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0.access(|s| drop(s.sales.insert(sale.id, sale))).await;
        Ok(())
    }
}

impl<A: Access> Database<Update<Sale>> for Memory<A> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(sale): Update<Sale>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Insert(sale)).await
    }
}

impl Database<Lock<By<Sale, sale::Id>>> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Sale, sale::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // `Tx` holds the whole store already.
        Ok(())
    }
}

impl<A: Access> Database<Select<By<Vec<sale::Id>, read::sale::Stale>>>
    for Memory<A>
{
    type Ok = Vec<sale::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<sale::Id>, read::sale::Stale>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::sale::Stale { created_until } = by.into_inner();
        Ok(self
            .0
            .access(|s| select_sales(s, |s| s.is_stale(created_until)))
            .await)
    }
}

impl<A: Access> Database<Select<By<Vec<sale::Id>, read::sale::Aging>>>
    for Memory<A>
{
    type Ok = Vec<sale::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<sale::Id>, read::sale::Aging>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::sale::Aging { after, until } = by.into_inner();
        Ok(self
            .0
            .access(|s| select_sales(s, |s| s.is_aging_within(after, until)))
            .await)
    }
}

/// Selects IDs of the [`Booking`]s matching the provided predicate, oldest
/// first.
fn select_bookings(
    store: &Store,
    predicate: impl Fn(&Booking) -> bool,
) -> Vec<booking::Id> {
    let mut found = store
        .bookings
        .values()
        .filter(|b| predicate(b))
        .map(|b| (b.created_at, b.id))
        .collect::<Vec<_>>();
    found.sort_unstable_by_key(|(at, id)| (*at, *id));
    found.into_iter().map(|(_, id)| id).collect()
}

/// Selects IDs of the [`Sale`]s matching the provided predicate, oldest
/// first.
fn select_sales(
    store: &Store,
    predicate: impl Fn(&Sale) -> bool,
) -> Vec<sale::Id> {
    let mut found = store
        .sales
        .values()
        .filter(|s| predicate(s))
        .map(|s| (s.created_at, s.id))
        .collect::<Vec<_>>();
    found.sort_unstable_by_key(|(at, id)| (*at, *id));
    found.into_iter().map(|(_, id)| id).collect()
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Commit, Insert, Select, Transact};

    use crate::{
        domain::{booking, Booking},
        infra::Database as _,
    };

    use super::Memory;

    fn pending() -> Booking {
        booking::spec::booking(booking::Status::Pending, None)
    }

    #[tokio::test]
    async fn commits_staged_changes() {
        let db = Memory::new();
        let b = pending();

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Insert(b.clone())).await.unwrap();
        tx.execute(Commit).await.unwrap();
        drop(tx);

        let found = db
            .execute(Select(By::<Option<Booking>, _>::new(b.id)))
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn rolls_back_on_drop() {
        let db = Memory::new();
        let b = pending();

        let tx = db.execute(Transact).await.unwrap();
        tx.execute(Insert(b.clone())).await.unwrap();
        drop(tx);

        let found = db
            .execute(Select(By::<Option<Booking>, _>::new(b.id)))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn selects_by_reference() {
        let db = Memory::new();
        let b = pending();
        db.execute(Insert(b.clone())).await.unwrap();

        let found = db
            .execute(Select(By::<Option<Booking>, _>::new(b.reference.clone())))
            .await
            .unwrap();
        assert_eq!(found.map(|f| f.id), Some(b.id));

        let other = db
            .execute(Select(By::<Option<Booking>, _>::new(
                booking::Reference::random(),
            )))
            .await
            .unwrap();
        assert!(other.is_none());
    }
}
