//! [`Command`] for changing the status of a [`Sale`].

use std::fmt;

use common::{
    operations::{By, Commit, Lock, Publish, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        equipment,
        lifecycle::{Actor, Transition, TransitionError},
        notification::{Event, Recipient, SaleDetails, StatusChange},
        sale, Equipment, Notification, Sale,
    },
    infra::{
        database,
        fanout::{Channel, Signal},
        Database, Fanout,
    },
    Service,
};

use super::Command;

/// [`Command`] for changing the status of a [`Sale`] on behalf of its party
/// or a platform operator.
///
/// Availability of the sold [`Equipment`] follows the new status.
#[derive(Clone, Debug)]
pub struct SetSaleStatus {
    /// ID of the [`Sale`] to change the status of.
    pub sale_id: sale::Id,

    /// Requested [`sale::Status`].
    pub status: sale::Status,

    /// [`Actor`] requesting the change.
    pub actor: Actor,

    /// Notes to leave along with the change.
    pub notes: Option<String>,
}

impl<Db, Bus> Command<SetSaleStatus> for Service<Db, Bus>
where
    Db: Database<
            Select<By<Option<Sale>, sale::Id>>,
            Ok = Option<Sale>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Equipment, equipment::Id>>,
            Err = Traced<database::Error>,
        > + Database<Lock<By<Sale, sale::Id>>, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Sale>, sale::Id>>,
            Ok = Option<Sale>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Equipment>, equipment::Id>>,
            Ok = Option<Equipment>,
            Err = Traced<database::Error>,
        > + Database<Update<Sale>, Err = Traced<database::Error>>
        + Database<Update<Equipment>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Bus: Fanout<Publish<Signal>, Ok = (), Err: fmt::Display>,
{
    type Ok = Sale;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: SetSaleStatus) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SetSaleStatus {
            sale_id,
            status,
            actor,
            notes,
        } = cmd;

        let equipment_id = self
            .database()
            .execute(Select(By::<Option<Sale>, _>::new(sale_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::SaleNotExists(sale_id))
            .map_err(tracerr::wrap!())?
            .equipment_id;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // `Equipment` goes first, as `CreateSale` locks it too.
        tx.execute(Lock(By::new(equipment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Lock(By::new(sale_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut sale = tx
            .execute(Select(By::<Option<Sale>, _>::new(sale_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::SaleNotExists(sale_id))
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        let Transition::Changed { from, .. } = sale
            .transition(status, actor, notes, now)
            .map_err(tracerr::from_and_wrap!(=> E))?
        else {
            return Ok(sale);
        };

        let mut equipment = tx
            .execute(Select(By::<Option<Equipment>, _>::new(equipment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::EquipmentNotExists(equipment_id))
            .map_err(tracerr::wrap!())?;
        sale.settle(&mut equipment);

        tx.execute(Update(sale.clone()))
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

        let event = Event::SaleStatusChanged(StatusChange {
            details: SaleDetails::from(&sale),
            previous_status: from,
            changed_by: actor,
        });
        let kind = event.kind();
        self.notify(Notification::to(Recipient::User(sale.buyer_id), event));
        self.broadcast(&[Channel::Sales, Channel::Equipment], Some(kind), now)
            .await;

        Ok(sale)
    }
}

/// Error of [`SetSaleStatus`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Sold [`Equipment`] does not exist.
    #[display("`Equipment(id: {_0})` does not exist")]
    EquipmentNotExists(#[error(not(source))] equipment::Id),

    /// [`Sale`] with the provided ID does not exist.
    #[display("`Sale(id: {_0})` does not exist")]
    SaleNotExists(#[error(not(source))] sale::Id),

    /// Requested transition is illegal.
    #[display("{_0}")]
    #[from]
    Transition(TransitionError),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{
            create_booking::spec::stock,
            create_sale::spec::{purchase, reload},
        },
        domain::{
            equipment::Owner,
            lifecycle::{Actor, TransitionError},
            notification::{Event, Recipient},
            sale::{self, spec::for_sale},
            user, Sale,
        },
        mock, Command as _, Config,
    };

    use super::{ExecutionError, SetSaleStatus};

    fn set(s: &Sale, status: sale::Status) -> SetSaleStatus {
        SetSaleStatus {
            sale_id: s.id,
            status,
            actor: Actor::User(s.buyer_id),
            notes: None,
        }
    }

    #[tokio::test]
    async fn payment_marks_equipment_sold() {
        use sale::Status as S;

        let (svc, mut queue) = mock::service(Config::default());
        let excavator = for_sale(Owner::Platform, 500_000);
        stock(&svc, &excavator).await;
        let s = svc.execute(purchase(&excavator)).await.unwrap();
        _ = mock::drain(&mut queue);

        let paid = svc.execute(set(&s, S::Paid)).await.unwrap();
        assert_eq!(paid.status, S::Paid);
        let sold = reload(&svc, &excavator).await;
        assert!(!sold.is_available);
        assert!(sold.sold_via_transaction);

        let again = svc.execute(set(&s, S::Paid)).await.unwrap();
        assert_eq!(again.status, S::Paid);
        assert!(!reload(&svc, &excavator).await.is_available);

        let done = svc.execute(set(&s, S::Completed)).await.unwrap();
        assert!(done.completed_at.is_some());
        assert!(!reload(&svc, &excavator).await.is_available);

        let notified = mock::drain(&mut queue);
        assert_eq!(notified.len(), 2);
        assert!(notified
            .iter()
            .all(|n| n.recipient == Recipient::User(s.buyer_id)));
        assert!(matches!(notified[0].event, Event::SaleStatusChanged(_)));
    }

    #[tokio::test]
    async fn cancellation_releases_equipment() {
        let (svc, _queue) = mock::service(Config::default());
        let excavator = for_sale(Owner::Supplier(user::Id::new()), 500_000);
        stock(&svc, &excavator).await;
        let s = svc.execute(purchase(&excavator)).await.unwrap();
        assert!(!reload(&svc, &excavator).await.is_available);

        let cancelled =
            svc.execute(set(&s, sale::Status::Cancelled)).await.unwrap();

        assert_eq!(cancelled.status, sale::Status::Cancelled);
        assert!(reload(&svc, &excavator).await.is_available);

        let relisted = svc.execute(purchase(&excavator)).await;
        assert!(relisted.is_ok());
    }

    #[tokio::test]
    async fn only_pending_sale_is_cancelled() {
        use sale::Status as S;

        let (svc, _queue) = mock::service(Config::default());
        let excavator = for_sale(Owner::Platform, 500_000);
        stock(&svc, &excavator).await;
        let s = svc.execute(purchase(&excavator)).await.unwrap();
        _ = svc.execute(set(&s, S::Paid)).await.unwrap();

        let err = svc.execute(set(&s, S::Cancelled)).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::Transition(
                TransitionError::InvalidStatusTransition { reason, .. },
            ) if *reason == "only pending purchases can be cancelled",
        ));
        let sold = reload(&svc, &excavator).await;
        assert!(!sold.is_available);
        assert!(sold.sold_via_transaction);
    }

    #[tokio::test]
    async fn completion_requires_payment() {
        let (svc, _queue) = mock::service(Config::default());
        let excavator = for_sale(Owner::Platform, 500_000);
        stock(&svc, &excavator).await;
        let s = svc.execute(purchase(&excavator)).await.unwrap();

        let err = svc
            .execute(set(&s, sale::Status::Completed))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Transition(_)));
    }
}
