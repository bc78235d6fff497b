//! [`Command`] for reminding a buyer about a pending [`Sale`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        notification::{Event, Recipient, SaleDetails},
        sale::{self, EXPIRATION_AGE, REMINDER_AGE},
        Notification, Sale,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for reminding a buyer about a [`Sale`] pending for
/// [`REMINDER_AGE`] but not yet for [`EXPIRATION_AGE`].
///
/// Every [`Sale`] is reminded about once at most. Returns whether the
/// reminder has been sent.
#[derive(Clone, Copy, Debug)]
pub struct RemindSale {
    /// ID of the [`Sale`] to remind about.
    pub sale_id: sale::Id,

    /// Current moment.
    pub now: DateTime,
}

impl<Db, Bus> Command<RemindSale> for Service<Db, Bus>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Lock<By<Sale, sale::Id>>, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Sale>, sale::Id>>,
            Ok = Option<Sale>,
            Err = Traced<database::Error>,
        > + Database<Update<Sale>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = bool;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RemindSale) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RemindSale { sale_id, now } = cmd;
        let (Some(after), Some(until)) =
            (now.checked_sub(EXPIRATION_AGE), now.checked_sub(REMINDER_AGE))
        else {
            return Ok(false);
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Lock(By::new(sale_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let Some(mut sale) = tx
            .execute(Select(By::<Option<Sale>, _>::new(sale_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|s| s.is_aging_within(after, until))
        else {
            return Ok(false);
        };
        sale.reminded_at = Some(now.coerce());

        tx.execute(Update(sale.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.notify(Notification::to(
            Recipient::User(sale.buyer_id),
            Event::SalePendingReminder(SaleDetails::from(&sale)),
        ));

        Ok(true)
    }
}

/// Error of [`RemindSale`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),
}
