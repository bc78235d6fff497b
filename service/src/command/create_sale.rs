//! [`Command`] for creating a new [`Sale`].

use std::fmt;

use common::{
    operations::{
        By, Commit, Insert, Lock, Publish, Select, Transact, Transacted, Update,
    },
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{self, Conflict, Engagements},
        equipment::{self, ListingType},
        notification::{Event, Recipient, SaleDetails},
        pricing,
        sale::{self, Transport},
        user, Equipment, Notification, Sale,
    },
    infra::{
        database,
        fanout::{Channel, Signal},
        Database, Fanout,
    },
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Sale`].
#[derive(Clone, Copy, Debug)]
pub struct CreateSale {
    /// ID of the buyer.
    pub buyer_id: user::Id,

    /// ID of the equipment unit to buy.
    pub equipment_id: equipment::Id,

    /// Distance to deliver the equipment unit over, if delivery is requested.
    pub transport_distance: Option<pricing::Usage>,
}

impl<Db, Bus> Command<CreateSale> for Service<Db, Bus>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Equipment, equipment::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Equipment>, equipment::Id>>,
            Ok = Option<Equipment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Engagements, equipment::Id>>,
            Ok = Engagements,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Sale>, sale::Reference>>,
            Ok = Option<Sale>,
            Err = Traced<database::Error>,
        > + Database<Insert<Sale>, Err = Traced<database::Error>>
        + Database<Update<Equipment>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Bus: Fanout<Publish<Signal>, Ok = (), Err: fmt::Display>,
{
    type Ok = Sale;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateSale) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateSale {
            buyer_id,
            equipment_id,
            transport_distance,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent purchases of the same `Equipment`.
        tx.execute(Lock(By::new(equipment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut equipment = tx
            .execute(Select(By::<Option<Equipment>, _>::new(equipment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::EquipmentNotExists(equipment_id))
            .map_err(tracerr::wrap!())?;
        let price = equipment
            .sale_price
            .filter(|_| equipment.listing_type == ListingType::ForSale)
            .ok_or(E::NotForSale(equipment_id))
            .map_err(tracerr::wrap!())?;

        let engagements = tx
            .execute(Select(By::<Engagements, _>::new(equipment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(s) = engagements.sales.first() {
            return Err(tracerr::new!(E::EquipmentUnavailable {
                equipment_id,
                conflict: Conflict::Sale(s.sale_id),
            }));
        }
        availability::resolve(&equipment, &engagements, None)
            .map_err(|conflict| E::EquipmentUnavailable {
                equipment_id,
                conflict,
            })
            .map_err(tracerr::wrap!())?;

        let transport = transport_distance
            .map(|distance| {
                let rate = self
                    .config()
                    .transport_rate
                    .ok_or(E::TransportUnavailable)?;
                Transport::price(rate, distance).map_err(E::from)
            })
            .transpose()
            .map_err(tracerr::wrap!())?;
        let grand_total = pricing::total(price, transport.map(|t| t.cost))
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let mut reference = None;
        for _ in 0..self.config().reference_attempts {
            let candidate = sale::Reference::random();
            let taken = tx
                .execute(Select(By::<Option<Sale>, _>::new(candidate.clone())))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .is_some();
            if !taken {
                reference = Some(candidate);
                break;
            }
        }
        let reference = reference
            .ok_or(E::ReferenceExhausted)
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        let sale = Sale {
            id: sale::Id::new(),
            reference,
            buyer_id,
            equipment_id,
            supplier_id: equipment.supplier_id(),
            price,
            commission: pricing::sale_commission(price, equipment.owner),
            transport,
            grand_total,
            status: sale::Status::Pending,
            notes: None,
            created_at: now.coerce(),
            updated_at: now.coerce(),
            completed_at: None,
            reminded_at: None,
        };
        sale.settle(&mut equipment);

        tx.execute(Insert(sale.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Update(equipment))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let event = Event::SaleCreated(SaleDetails::from(&sale));
        let kind = event.kind();
        self.notify(Notification::to(Recipient::Operations, event));
        self.broadcast(
            &[Channel::Sales, Channel::Equipment, Channel::User],
            Some(kind),
            now,
        )
        .await;

        Ok(sale)
    }
}

/// Error of [`CreateSale`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Sale price and transport cost are in different currencies.
    #[display("`Sale` cannot be priced: {_0}")]
    #[from]
    CurrencyMismatch(pricing::CurrencyMismatch),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Equipment`] with the provided ID does not exist.
    #[display("`Equipment(id: {_0})` does not exist")]
    EquipmentNotExists(#[error(not(source))] equipment::Id),

    /// [`Equipment`] is committed to another transaction.
    #[display("`Equipment(id: {equipment_id})` is unavailable: {conflict}")]
    EquipmentUnavailable {
        /// ID of the unavailable [`Equipment`].
        equipment_id: equipment::Id,

        /// [`Conflict`] making the [`Equipment`] unavailable.
        conflict: Conflict,
    },

    /// Transport rate is not positive.
    #[display("{_0}")]
    #[from]
    InvalidPricingType(pricing::InvalidPricingType),

    /// [`Equipment`] is not listed for sale.
    #[display("`Equipment(id: {_0})` is not listed for sale")]
    NotForSale(#[error(not(source))] equipment::Id),

    /// No unique [`sale::Reference`] could be drawn.
    #[display("failed to draw a unique `Sale` reference number")]
    ReferenceExhausted,

    /// Delivery of sold equipment is not offered.
    #[display("delivery of sold equipment is not offered")]
    TransportUnavailable,
}

#[cfg(test)]
pub(crate) mod spec {
    use std::str::FromStr as _;

    use common::{
        operations::{By, Select},
        Money,
    };
    use rust_decimal::Decimal;

    use crate::{
        command::create_booking::spec::stock,
        domain::{
            availability::Conflict,
            booking::spec::{dzd, rental},
            equipment::Owner,
            notification::{Event, Recipient},
            pricing, sale,
            sale::spec::for_sale,
            user, Equipment,
        },
        infra::Database as _,
        mock, Command as _, Config,
    };

    use super::{CreateSale, ExecutionError};

    pub(crate) fn purchase(eq: &Equipment) -> CreateSale {
        CreateSale {
            buyer_id: user::Id::new(),
            equipment_id: eq.id,
            transport_distance: None,
        }
    }

    pub(crate) async fn reload(svc: &mock::Service, eq: &Equipment) -> Equipment {
        svc.database()
            .execute(Select(By::<Option<Equipment>, _>::new(eq.id)))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn reserves_equipment() {
        let (svc, mut queue) = mock::service(Config::default());
        let excavator = for_sale(Owner::Supplier(user::Id::new()), 500_000);
        stock(&svc, &excavator).await;

        let sale = svc.execute(purchase(&excavator)).await.unwrap();

        assert_eq!(sale.status, sale::Status::Pending);
        assert_eq!(sale.price, dzd(500_000));
        assert_eq!(sale.commission, dzd(25_000));
        assert_eq!(sale.grand_total, dzd(500_000));
        assert!(!reload(&svc, &excavator).await.is_available);

        let notified = mock::drain(&mut queue);
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].recipient, Recipient::Operations);
        assert!(matches!(notified[0].event, Event::SaleCreated(_)));
    }

    #[tokio::test]
    async fn platform_sale_has_no_commission() {
        let (svc, _queue) = mock::service(Config::default());
        let excavator = for_sale(Owner::Platform, 500_000);
        stock(&svc, &excavator).await;

        let sale = svc.execute(purchase(&excavator)).await.unwrap();

        assert_eq!(sale.commission, dzd(0));
        assert_eq!(sale.supplier_id, None);
    }

    #[tokio::test]
    async fn prices_transport() {
        let (svc, _queue) = mock::service(Config {
            transport_rate: Some(Money::from_str("150DZD").unwrap()),
            ..Config::default()
        });
        let excavator = for_sale(Owner::Platform, 500_000);
        stock(&svc, &excavator).await;

        let sale = svc
            .execute(CreateSale {
                transport_distance: Some(
                    pricing::Usage::new(Decimal::from(40)).unwrap(),
                ),
                ..purchase(&excavator)
            })
            .await
            .unwrap();

        assert_eq!(sale.transport.map(|t| t.cost), Some(dzd(6_000)));
        assert_eq!(sale.grand_total, dzd(506_000));
    }

    #[tokio::test]
    async fn rejects_transport_when_not_offered() {
        let (svc, _queue) = mock::service(Config::default());
        let excavator = for_sale(Owner::Platform, 500_000);
        stock(&svc, &excavator).await;

        let err = svc
            .execute(CreateSale {
                transport_distance: Some(
                    pricing::Usage::new(Decimal::ONE).unwrap(),
                ),
                ..purchase(&excavator)
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::TransportUnavailable));
        assert!(reload(&svc, &excavator).await.is_available);
    }

    #[tokio::test]
    async fn allows_single_sale_per_equipment() {
        let (svc, _queue) = mock::service(Config::default());
        let excavator = for_sale(Owner::Platform, 500_000);
        stock(&svc, &excavator).await;

        let first = svc.execute(purchase(&excavator)).await.unwrap();
        let err = svc.execute(purchase(&excavator)).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::EquipmentUnavailable {
                conflict: Conflict::Sale(id),
                ..
            } if *id == first.id,
        ));
    }

    #[tokio::test]
    async fn rejects_rental_listing() {
        let (svc, _queue) = mock::service(Config::default());
        let drill = rental(2_500);
        stock(&svc, &drill).await;

        let err = svc.execute(purchase(&drill)).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NotForSale(_)));
    }
}
