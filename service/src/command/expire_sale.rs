//! [`Command`] for cancelling a stale [`Sale`].

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
        lifecycle::{Actor, TransitionError},
        notification::{Event, Recipient, SaleDetails},
        sale::{self, EXPIRATION_AGE},
        Equipment, Notification, Sale,
    },
    infra::{
        database,
        fanout::{Channel, Signal},
        Database, Fanout,
    },
    Service,
};

use super::Command;

/// [`Command`] for cancelling a [`Sale`] pending for [`EXPIRATION_AGE`] or
/// longer, releasing its equipment.
///
/// Returns whether the [`Sale`] has been cancelled.
#[derive(Clone, Copy, Debug)]
pub struct ExpireSale {
    /// ID of the [`Sale`] to cancel.
    pub sale_id: sale::Id,

    /// Current moment.
    pub now: DateTime,
}

impl<Db, Bus> Command<ExpireSale> for Service<Db, Bus>
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
    type Ok = bool;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: ExpireSale) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ExpireSale { sale_id, now } = cmd;
        let Some(created_until) = now.checked_sub(EXPIRATION_AGE) else {
            return Ok(false);
        };

        let Some(equipment_id) = self
            .database()
            .execute(Select(By::<Option<Sale>, _>::new(sale_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .map(|s| s.equipment_id)
        else {
            return Ok(false);
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Lock(By::new(equipment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
        tx.execute(Lock(By::new(sale_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let Some(mut sale) = tx
            .execute(Select(By::<Option<Sale>, _>::new(sale_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|s| s.is_stale(created_until))
        else {
            return Ok(false);
        };

        _ = sale
            .transition(sale::Status::Cancelled, Actor::Scheduler, None, now)
            .map_err(tracerr::from_and_wrap!(=> E))?;

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

        let event = Event::SaleCancelledAutomatically(SaleDetails::from(&sale));
        let kind = event.kind();
        self.notify(Notification::to(Recipient::Operations, event));
        self.broadcast(&[Channel::Sales, Channel::Equipment], Some(kind), now)
            .await;

        Ok(true)
    }
}

/// Error of [`ExpireSale`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Sold [`Equipment`] does not exist.
    #[display("`Equipment(id: {_0})` does not exist")]
    EquipmentNotExists(#[error(not(source))] equipment::Id),

    /// Cancelling transition is illegal.
    #[display("{_0}")]
    #[from]
    Transition(TransitionError),
}
