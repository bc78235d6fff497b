//! [`Command`] for running a single auto-completion pass.

use std::fmt;

use common::{
    operations::{By, Select},
    DateTime,
};
use derive_more::{Display, Error, From};
use serde::Serialize;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        booking::{self, REMINDER_LEAD},
        sale::{self, EXPIRATION_AGE, REMINDER_AGE},
    },
    infra::{database, Database},
    read, Service,
};

use super::{
    remind_booking::Boundary, Command, ExpireBooking, ExpireSale,
    RemindBooking, RemindSale,
};

/// [`Command`] advancing all the bookings and sales to the provided moment:
/// resolves ended bookings, cancels stale sales and sends due reminders.
///
/// Bookings go before sales, and resolutions go before reminders. Each
/// transaction is processed on its own, so a failure is logged and doesn't
/// affect the others. Repeating a pass with the same moment does nothing.
#[derive(Clone, Copy, Debug)]
pub struct RunAutoCompletion {
    /// Moment to advance to.
    pub now: DateTime,
}

/// Outcome of a [`RunAutoCompletion`] pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Report {
    /// Outcome for bookings.
    pub bookings: BookingsReport,

    /// Outcome for sales.
    pub sales: SalesReport,
}

impl Report {
    /// Indicates whether nothing has happened during the pass.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Outcome of a [`RunAutoCompletion`] pass for bookings.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingsReport {
    /// Number of paid bookings completed.
    pub completed: usize,

    /// Number of pending bookings cancelled.
    pub cancelled: usize,

    /// Number of reminders about bookings ending soon.
    pub reminders: usize,

    /// Number of reminders about bookings starting soon.
    pub start_reminders: usize,
}

/// Outcome of a [`RunAutoCompletion`] pass for sales.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SalesReport {
    /// Number of stale sales cancelled.
    pub cancelled: usize,

    /// Number of reminders about pending sales.
    pub reminders: usize,
}

impl<Db, Bus> Command<RunAutoCompletion> for Service<Db, Bus>
where
    Db: Database<
            Select<By<Vec<booking::Id>, read::booking::Ended>>,
            Ok = Vec<booking::Id>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<booking::Id>, read::booking::EndingSoon>>,
            Ok = Vec<booking::Id>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<booking::Id>, read::booking::StartingSoon>>,
            Ok = Vec<booking::Id>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<sale::Id>, read::sale::Stale>>,
            Ok = Vec<sale::Id>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<sale::Id>, read::sale::Aging>>,
            Ok = Vec<sale::Id>,
            Err = Traced<database::Error>,
        >,
    Self: Command<ExpireBooking, Ok = Option<booking::Status>, Err: fmt::Display>
        + Command<RemindBooking, Ok = bool, Err: fmt::Display>
        + Command<ExpireSale, Ok = bool, Err: fmt::Display>
        + Command<RemindSale, Ok = bool, Err: fmt::Display>,
{
    type Ok = Report;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RunAutoCompletion,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RunAutoCompletion { now } = cmd;
        let (Some(reminders_until), Some(stale_until), Some(aging_until)) = (
            now.checked_add(REMINDER_LEAD),
            now.checked_sub(EXPIRATION_AGE),
            now.checked_sub(REMINDER_AGE),
        ) else {
            return Err(tracerr::new!(E::OutOfRange));
        };
        let mut report = Report::default();

        let ended = self
            .database()
            .execute(Select(By::<Vec<booking::Id>, _>::new(
                read::booking::Ended { at: now },
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        for booking_id in ended {
            match self.execute(ExpireBooking { booking_id, now }).await {
                Ok(Some(booking::Status::Cancelled)) => {
                    report.bookings.cancelled += 1;
                }
                Ok(Some(booking::Status::Completed)) => {
                    report.bookings.completed += 1;
                }
                Ok(Some(booking::Status::Pending | booking::Status::Paid)
                | None) => {}
                Err(e) => log::error!(
                    "failed to resolve ended `Booking(id: {booking_id})`: {e}",
                ),
            }
        }

        let ending = self
            .database()
            .execute(Select(By::<Vec<booking::Id>, _>::new(
                read::booking::EndingSoon {
                    after: now,
                    until: reminders_until,
                },
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        report.bookings.reminders =
            self.remind_bookings(ending, Boundary::End, now).await;

        let starting = self
            .database()
            .execute(Select(By::<Vec<booking::Id>, _>::new(
                read::booking::StartingSoon {
                    after: now,
                    until: reminders_until,
                },
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        report.bookings.start_reminders =
            self.remind_bookings(starting, Boundary::Start, now).await;

        let stale = self
            .database()
            .execute(Select(By::<Vec<sale::Id>, _>::new(read::sale::Stale {
                created_until: stale_until,
            })))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        for sale_id in stale {
            match self.execute(ExpireSale { sale_id, now }).await {
                Ok(true) => report.sales.cancelled += 1,
                Ok(false) => {}
                Err(e) => log::error!(
                    "failed to cancel stale `Sale(id: {sale_id})`: {e}",
                ),
            }
        }

        let aging = self
            .database()
            .execute(Select(By::<Vec<sale::Id>, _>::new(read::sale::Aging {
                after: stale_until,
                until: aging_until,
            })))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        for sale_id in aging {
            match self.execute(RemindSale { sale_id, now }).await {
                Ok(true) => report.sales.reminders += 1,
                Ok(false) => {}
                Err(e) => log::error!(
                    "failed to remind about pending `Sale(id: {sale_id})`: \
                     {e}",
                ),
            }
        }

        if report.is_empty() {
            log::debug!(
                "auto-completion pass at {} changed nothing",
                now.to_rfc3339(),
            );
        } else {
            log::info!(
                "auto-completion pass at {}: {report:?}",
                now.to_rfc3339(),
            );
        }
        Ok(report)
    }
}

impl<Db, Bus> Service<Db, Bus>
where
    Self: Command<RemindBooking, Ok = bool, Err: fmt::Display>,
{
    /// Reminds about the provided [`Boundary`] of the provided bookings,
    /// returning the number of sent reminders.
    async fn remind_bookings(
        &self,
        ids: Vec<booking::Id>,
        boundary: Boundary,
        now: DateTime,
    ) -> usize {
        let mut sent = 0;
        for booking_id in ids {
            match self
                .execute(RemindBooking {
                    booking_id,
                    boundary,
                    now,
                })
                .await
            {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) => log::error!(
                    "failed to remind about {boundary:?} of \
                     `Booking(id: {booking_id})`: {e}",
                ),
            }
        }
        sent
    }
}

/// Error of [`RunAutoCompletion`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Moment to advance to is too close to the supported range boundaries
    /// to compute the sweep deadlines.
    #[display("moment to advance to is out of the supported range")]
    OutOfRange,
}

#[cfg(test)]
mod spec {
    use common::{
        operations::{By, Insert, Select},
        DateTime, DAY, HOUR,
    };

    use crate::{
        domain::{
            booking::{
                self,
                spec::{at, booking},
                Window,
            },
            equipment::Owner,
            notification::{Event, Recipient},
            sale::{
                self,
                spec::{for_sale, sale},
            },
            Booking, Equipment, Sale,
        },
        infra::Database as _,
        mock, Command as _, Config,
    };

    use super::{
        BookingsReport, ExecutionError, Report, RunAutoCompletion, SalesReport,
    };

    fn now() -> DateTime {
        at("2024-06-10T12:00:00Z")
    }

    async fn stored_booking(
        svc: &mock::Service,
        status: booking::Status,
        window: Option<Window>,
    ) -> Booking {
        let b = booking(status, window);
        svc.database().execute(Insert(b.clone())).await.unwrap();
        b
    }

    async fn stored_sale(
        svc: &mock::Service,
        created_at: DateTime,
    ) -> (Sale, Equipment) {
        let mut eq = for_sale(Owner::Platform, 500_000);
        let mut s = sale(sale::Status::Pending, created_at);
        s.equipment_id = eq.id;
        s.settle(&mut eq);
        svc.database().execute(Insert(eq.clone())).await.unwrap();
        svc.database().execute(Insert(s.clone())).await.unwrap();
        (s, eq)
    }

    async fn booking_of(svc: &mock::Service, b: &Booking) -> Booking {
        svc.database()
            .execute(Select(By::<Option<Booking>, _>::new(b.id)))
            .await
            .unwrap()
            .unwrap()
    }

    async fn sale_of(svc: &mock::Service, s: &Sale) -> Sale {
        svc.database()
            .execute(Select(By::<Option<Sale>, _>::new(s.id)))
            .await
            .unwrap()
            .unwrap()
    }

    async fn equipment_of(svc: &mock::Service, eq: &Equipment) -> Equipment {
        svc.database()
            .execute(Select(By::<Option<Equipment>, _>::new(eq.id)))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn cancels_ended_pending_booking() {
        let (svc, mut queue) = mock::service(Config::default());
        let now = now();
        let b = stored_booking(
            &svc,
            booking::Status::Pending,
            Window::new(now - DAY, now - HOUR),
        )
        .await;

        let report = svc.execute(RunAutoCompletion { now }).await.unwrap();

        assert_eq!(report.bookings.cancelled, 1);
        assert_eq!(booking_of(&svc, &b).await.status, booking::Status::Cancelled);
        let notified = mock::drain(&mut queue);
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].recipient, Recipient::Operations);
        assert!(matches!(
            notified[0].event,
            Event::BookingCancelledAutomatically(_),
        ));
    }

    #[tokio::test]
    async fn completes_ended_paid_booking_silently() {
        let (svc, mut queue) = mock::service(Config::default());
        let now = now();
        let b = stored_booking(
            &svc,
            booking::Status::Paid,
            Window::new(now - DAY, now - HOUR),
        )
        .await;

        let report = svc.execute(RunAutoCompletion { now }).await.unwrap();

        assert_eq!(report.bookings.completed, 1);
        let found = booking_of(&svc, &b).await;
        assert_eq!(found.status, booking::Status::Completed);
        assert_eq!(found.completed_at.map(|at| at.coerce()), Some(now));
        assert!(mock::drain(&mut queue).is_empty());
    }

    #[tokio::test]
    async fn cancels_stale_sale() {
        let (svc, mut queue) = mock::service(Config::default());
        let now = now();
        let (s, eq) = stored_sale(&svc, now - DAY * 8).await;
        assert!(!equipment_of(&svc, &eq).await.is_available);

        let report = svc.execute(RunAutoCompletion { now }).await.unwrap();

        assert_eq!(report.sales.cancelled, 1);
        assert_eq!(sale_of(&svc, &s).await.status, sale::Status::Cancelled);
        assert!(equipment_of(&svc, &eq).await.is_available);
        let notified = mock::drain(&mut queue);
        assert_eq!(notified.len(), 1);
        assert!(matches!(
            notified[0].event,
            Event::SaleCancelledAutomatically(_),
        ));
    }

    #[tokio::test]
    async fn reminds_about_aging_sale() {
        let (svc, mut queue) = mock::service(Config::default());
        let now = now();
        let (s, eq) = stored_sale(&svc, now - DAY * 6).await;

        let report = svc.execute(RunAutoCompletion { now }).await.unwrap();

        assert_eq!(report.sales.reminders, 1);
        assert_eq!(report.sales.cancelled, 0);
        let found = sale_of(&svc, &s).await;
        assert_eq!(found.status, sale::Status::Pending);
        assert!(found.reminded_at.is_some());
        assert!(!equipment_of(&svc, &eq).await.is_available);
        let notified = mock::drain(&mut queue);
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].recipient, Recipient::User(s.buyer_id));
        assert!(matches!(notified[0].event, Event::SalePendingReminder(_)));
    }

    #[tokio::test]
    async fn reminds_about_upcoming_boundaries() {
        let (svc, _queue) = mock::service(Config::default());
        let now = now();
        _ = stored_booking(
            &svc,
            booking::Status::Pending,
            Window::new(now - DAY, now + HOUR * 23),
        )
        .await;
        _ = stored_booking(
            &svc,
            booking::Status::Pending,
            Window::new(now - DAY, now + HOUR * 25),
        )
        .await;
        _ = stored_booking(
            &svc,
            booking::Status::Paid,
            Window::new(now + HOUR * 2, now + DAY * 3),
        )
        .await;
        _ = stored_booking(&svc, booking::Status::Pending, None).await;

        let report = svc.execute(RunAutoCompletion { now }).await.unwrap();

        assert_eq!(
            report,
            Report {
                bookings: BookingsReport {
                    reminders: 1,
                    start_reminders: 1,
                    ..BookingsReport::default()
                },
                sales: SalesReport::default(),
            },
        );
    }

    #[tokio::test]
    async fn resolves_instead_of_reminding() {
        let (svc, mut queue) = mock::service(Config::default());
        let now = now();
        let b = stored_booking(
            &svc,
            booking::Status::Pending,
            Window::new(now - DAY, now),
        )
        .await;

        let report = svc.execute(RunAutoCompletion { now }).await.unwrap();

        assert_eq!(report.bookings.cancelled, 1);
        assert_eq!(report.bookings.reminders, 0);
        assert_eq!(booking_of(&svc, &b).await.status, booking::Status::Cancelled);
        assert_eq!(mock::drain(&mut queue).len(), 1);
    }

    #[tokio::test]
    async fn second_pass_changes_nothing() {
        let (svc, mut queue) = mock::service(Config::default());
        let now = now();
        _ = stored_booking(
            &svc,
            booking::Status::Pending,
            Window::new(now - DAY, now - HOUR),
        )
        .await;
        _ = stored_booking(
            &svc,
            booking::Status::Paid,
            Window::new(now - DAY, now - HOUR),
        )
        .await;
        _ = stored_booking(
            &svc,
            booking::Status::Pending,
            Window::new(now - DAY, now + HOUR),
        )
        .await;
        _ = stored_booking(
            &svc,
            booking::Status::Paid,
            Window::new(now + HOUR, now + DAY),
        )
        .await;
        _ = stored_sale(&svc, now - DAY * 8).await;
        _ = stored_sale(&svc, now - DAY * 6 - HOUR).await;

        let first = svc.execute(RunAutoCompletion { now }).await.unwrap();
        let notified = mock::drain(&mut queue).len();
        let second = svc.execute(RunAutoCompletion { now }).await.unwrap();

        assert_eq!(
            first,
            Report {
                bookings: BookingsReport {
                    completed: 1,
                    cancelled: 1,
                    reminders: 1,
                    start_reminders: 1,
                },
                sales: SalesReport {
                    cancelled: 1,
                    reminders: 1,
                },
            },
        );
        assert_eq!(notified, 5);
        assert!(second.is_empty());
        assert!(mock::drain(&mut queue).is_empty());
    }

    #[tokio::test]
    async fn isolates_failures() {
        let (svc, _queue) = mock::service(Config::default());
        let now = now();
        let orphan = sale(sale::Status::Pending, now - DAY * 9);
        svc.database().execute(Insert(orphan.clone())).await.unwrap();
        let (s, eq) = stored_sale(&svc, now - DAY * 8).await;

        let report = svc.execute(RunAutoCompletion { now }).await.unwrap();

        assert_eq!(report.sales.cancelled, 1);
        assert_eq!(sale_of(&svc, &orphan).await.status, sale::Status::Pending);
        assert_eq!(sale_of(&svc, &s).await.status, sale::Status::Cancelled);
        assert!(equipment_of(&svc, &eq).await.is_available);
    }

    #[tokio::test]
    async fn rejects_moment_beyond_supported_range() {
        let (svc, mut queue) = mock::service(Config::default());
        let last = at("9999-12-31T12:00:00Z");
        let (s, _) = stored_sale(&svc, last - DAY * 8).await;

        let err = svc
            .execute(RunAutoCompletion { now: last })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::OutOfRange));
        assert_eq!(sale_of(&svc, &s).await.status, sale::Status::Pending);
        assert!(mock::drain(&mut queue).is_empty());
    }
}
