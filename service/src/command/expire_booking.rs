//! [`Command`] for resolving a [`Booking`] whose window has ended.

use std::fmt;

use common::{
    operations::{By, Commit, Lock, Publish, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking,
        lifecycle::{Actor, TransitionError},
        notification::{BookingDetails, Event, Recipient},
        Booking, Notification,
    },
    infra::{
        database,
        fanout::{Channel, Signal},
        Database, Fanout,
    },
    Service,
};

use super::Command;

/// [`Command`] for resolving a [`Booking`] whose window has ended: a pending
/// one is cancelled, a paid one is completed.
///
/// Returns the new [`booking::Status`], or [`None`] if the [`Booking`] needs
/// no resolution (anymore).
#[derive(Clone, Copy, Debug)]
pub struct ExpireBooking {
    /// ID of the [`Booking`] to resolve.
    pub booking_id: booking::Id,

    /// Current moment.
    pub now: DateTime,
}

impl<Db, Bus> Command<ExpireBooking> for Service<Db, Bus>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Booking, booking::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Update<Booking>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Bus: Fanout<Publish<Signal>, Ok = (), Err: fmt::Display>,
{
    type Ok = Option<booking::Status>;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: ExpireBooking) -> Result<Self::Ok, Self::Err> {
        use booking::Status as S;
        use ExecutionError as E;

        let ExpireBooking { booking_id, now } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Lock(By::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let Some(mut booking) = tx
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|b| b.has_ended(now))
        else {
            return Ok(None);
        };

        let to = match booking.status {
            S::Pending => S::Cancelled,
            S::Paid => S::Completed,
            S::Completed | S::Cancelled => return Ok(None),
        };
        _ = booking
            .transition(to, Actor::Scheduler, None, now)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        tx.execute(Update(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let kind = (to == S::Cancelled).then(|| {
            let event = Event::BookingCancelledAutomatically(
                BookingDetails::from(&booking),
            );
            let kind = event.kind();
            self.notify(Notification::to(Recipient::Operations, event));
            kind
        });
        self.broadcast(&[Channel::Booking, Channel::Equipment], kind, now)
            .await;

        Ok(Some(to))
    }
}

/// Error of [`ExpireBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Resolving transition is illegal.
    #[display("{_0}")]
    #[from]
    Transition(TransitionError),
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Insert, Select},
        HOUR,
    };

    use crate::{
        domain::{
            booking::{
                self,
                spec::{at, booking},
                Window,
            },
            notification::{Event, Recipient},
            Booking,
        },
        infra::Database as _,
        mock, Command as _, Config,
    };

    use super::ExpireBooking;

    #[tokio::test]
    async fn leaves_running_booking_alone() {
        let (svc, mut queue) = mock::service(Config::default());
        let now = at("2024-06-10T12:00:00Z");
        let b = booking(
            booking::Status::Pending,
            Window::new(now - HOUR * 5, now + HOUR),
        );
        svc.database().execute(Insert(b.clone())).await.unwrap();

        let outcome = svc
            .execute(ExpireBooking {
                booking_id: b.id,
                now,
            })
            .await
            .unwrap();

        assert_eq!(outcome, None);
        assert!(mock::drain(&mut queue).is_empty());
    }

    #[tokio::test]
    async fn is_noop_when_repeated() {
        let (svc, mut queue) = mock::service(Config::default());
        let now = at("2024-06-10T12:00:00Z");
        let b = booking(
            booking::Status::Pending,
            Window::new(now - HOUR * 5, now - HOUR),
        );
        svc.database().execute(Insert(b.clone())).await.unwrap();
        let cmd = ExpireBooking {
            booking_id: b.id,
            now,
        };

        let first = svc.execute(cmd).await.unwrap();
        let second = svc.execute(cmd).await.unwrap();

        assert_eq!(first, Some(booking::Status::Cancelled));
        assert_eq!(second, None);
        let notified = mock::drain(&mut queue);
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].recipient, Recipient::Operations);
        assert!(matches!(
            notified[0].event,
            Event::BookingCancelledAutomatically(_),
        ));

        let found = svc
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(b.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.status, booking::Status::Cancelled);
        assert!(found.completed_at.is_none());
    }
}
