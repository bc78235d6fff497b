//! [`Command`] for reminding a renter about an upcoming [`Booking`]
//! boundary.

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, REMINDER_LEAD},
        notification::{BookingDetails, Event, Recipient},
        Booking, Notification,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for reminding a renter about the [`Boundary`] of a
/// [`Booking`] window coming within [`REMINDER_LEAD`].
///
/// Every [`Boundary`] is reminded about once at most. Returns whether the
/// reminder has been sent.
#[derive(Clone, Copy, Debug)]
pub struct RemindBooking {
    /// ID of the [`Booking`] to remind about.
    pub booking_id: booking::Id,

    /// [`Boundary`] to remind about.
    pub boundary: Boundary,

    /// Current moment.
    pub now: DateTime,
}

/// Boundary of a [`Booking`] window.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Boundary {
    /// Start of a paid [`Booking`].
    Start,

    /// End of a pending [`Booking`].
    End,
}

impl<Db, Bus> Command<RemindBooking> for Service<Db, Bus>
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
{
    type Ok = bool;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RemindBooking) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RemindBooking {
            booking_id,
            boundary,
            now,
        } = cmd;
        let Some(until) = now.checked_add(REMINDER_LEAD) else {
            return Ok(false);
        };

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
            .filter(|b| match boundary {
                Boundary::Start => b.is_starting_within(now, until),
                Boundary::End => b.is_ending_within(now, until),
            })
        else {
            return Ok(false);
        };

        let marker = match boundary {
            Boundary::Start => &mut booking.start_reminded_at,
            Boundary::End => &mut booking.end_reminded_at,
        };
        *marker = Some(now.coerce());

        tx.execute(Update(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let details = BookingDetails::from(&booking);
        self.notify(Notification::to(
            Recipient::User(booking.renter_id),
            match boundary {
                Boundary::Start => Event::BookingStartingSoon(details),
                Boundary::End => Event::BookingEndingSoon(details),
            },
        ));

        Ok(true)
    }
}

/// Error of [`RemindBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),
}

#[cfg(test)]
mod spec {
    use common::{operations::Insert, HOUR};

    use crate::{
        domain::{
            booking::{
                self,
                spec::{at, booking},
                Window,
            },
            notification::{Event, Recipient},
        },
        infra::Database as _,
        mock, Command as _, Config,
    };

    use super::{Boundary, RemindBooking};

    #[tokio::test]
    async fn reminds_once() {
        let (svc, mut queue) = mock::service(Config::default());
        let now = at("2024-06-10T12:00:00Z");
        let b = booking(
            booking::Status::Pending,
            Window::new(now - HOUR * 48, now + HOUR * 3),
        );
        svc.database().execute(Insert(b.clone())).await.unwrap();
        let cmd = RemindBooking {
            booking_id: b.id,
            boundary: Boundary::End,
            now,
        };

        assert!(svc.execute(cmd).await.unwrap());
        assert!(!svc.execute(cmd).await.unwrap());
        assert!(!svc
            .execute(RemindBooking {
                now: now + HOUR,
                ..cmd
            })
            .await
            .unwrap());

        let notified = mock::drain(&mut queue);
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].recipient, Recipient::User(b.renter_id));
        assert!(matches!(notified[0].event, Event::BookingEndingSoon(_)));
    }

    #[tokio::test]
    async fn reminds_about_start_of_paid_only() {
        let (svc, mut queue) = mock::service(Config::default());
        let now = at("2024-06-10T12:00:00Z");
        let window = Window::new(now + HOUR * 2, now + HOUR * 50);
        let pending = booking(booking::Status::Pending, window);
        let paid = booking(booking::Status::Paid, window);
        for b in [&pending, &paid] {
            svc.database().execute(Insert(b.clone())).await.unwrap();
        }

        let pending_reminded = svc
            .execute(RemindBooking {
                booking_id: pending.id,
                boundary: Boundary::Start,
                now,
            })
            .await
            .unwrap();
        let paid_reminded = svc
            .execute(RemindBooking {
                booking_id: paid.id,
                boundary: Boundary::Start,
                now,
            })
            .await
            .unwrap();

        assert!(!pending_reminded);
        assert!(paid_reminded);
        let notified = mock::drain(&mut queue);
        assert_eq!(notified.len(), 1);
        assert!(matches!(notified[0].event, Event::BookingStartingSoon(_)));
    }
}
