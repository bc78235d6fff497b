//! [`Command`] for changing the status of a [`Booking`].

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
        lifecycle::{Actor, Transition, TransitionError},
        notification::{BookingDetails, Event, Recipient, StatusChange},
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

/// [`Command`] for changing the status of a [`Booking`] on behalf of its
/// party or a platform operator.
#[derive(Clone, Debug)]
pub struct SetBookingStatus {
    /// ID of the [`Booking`] to change the status of.
    pub booking_id: booking::Id,

    /// Requested [`booking::Status`].
    pub status: booking::Status,

    /// [`Actor`] requesting the change.
    pub actor: Actor,

    /// Notes to leave along with the change.
    pub notes: Option<String>,
}

impl<Db, Bus> Command<SetBookingStatus> for Service<Db, Bus>
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
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: SetBookingStatus,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SetBookingStatus {
            booking_id,
            status,
            actor,
            notes,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent transitions of the same `Booking`.
        tx.execute(Lock(By::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        let Transition::Changed { from, .. } = booking
            .transition(status, actor, notes, now)
            .map_err(tracerr::from_and_wrap!(=> E))?
        else {
            return Ok(booking);
        };

        tx.execute(Update(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let event = Event::BookingStatusChanged(StatusChange {
            details: BookingDetails::from(&booking),
            previous_status: from,
            changed_by: actor,
        });
        let kind = event.kind();
        self.notify(Notification::to(
            Recipient::User(booking.renter_id),
            event,
        ));
        self.broadcast(&[Channel::Booking, Channel::Equipment], Some(kind), now)
            .await;

        Ok(booking)
    }
}

/// Error of [`SetBookingStatus`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Requested transition is illegal.
    #[display("{_0}")]
    #[from]
    Transition(TransitionError),
}
