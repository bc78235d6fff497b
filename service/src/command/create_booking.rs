//! [`Command`] for creating a new [`Booking`].

use std::{collections::HashSet, fmt};

use common::{
    operations::{By, Commit, Insert, Lock, Publish, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        availability::{self, Engagements},
        booking::{self, LineItem, Window},
        equipment::{self, ListingType},
        notification::{BookingDetails, Event, Recipient},
        pricing, user, Booking, Equipment, Notification,
    },
    infra::{
        database,
        fanout::{Channel, Signal},
        Database, Fanout,
    },
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Booking`].
#[derive(Clone, Debug)]
pub struct CreateBooking {
    /// ID of the renter making the [`Booking`].
    pub renter_id: user::Id,

    /// Requested equipment units along with their usage.
    pub items: Vec<Item>,

    /// Calendar [`Window`] of the [`Booking`].
    ///
    /// [`None`] for a usage-only [`Booking`].
    pub window: Option<Window>,
}

/// Single equipment unit requested by a [`CreateBooking`] [`Command`].
#[derive(Clone, Copy, Debug)]
pub struct Item {
    /// ID of the requested equipment unit.
    pub equipment_id: equipment::Id,

    /// [`pricing::Type`] to rent the equipment unit by.
    pub pricing_type: pricing::Type,

    /// [`pricing::Usage`] of the equipment unit.
    pub usage: pricing::Usage,
}

impl<Db, Bus> Command<CreateBooking> for Service<Db, Bus>
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
            Select<By<Option<Booking>, booking::Reference>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Insert<Booking>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Bus: Fanout<Publish<Signal>, Ok = (), Err: fmt::Display>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateBooking) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateBooking {
            renter_id,
            items,
            window,
        } = cmd;

        if items.is_empty() {
            return Err(tracerr::new!(E::NoLineItems));
        }
        let mut requested = HashSet::with_capacity(items.len());
        for item in &items {
            if !requested.insert(item.equipment_id) {
                return Err(tracerr::new!(E::DuplicateEquipment(
                    item.equipment_id
                )));
            }
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Lock in a stable order, so concurrent bookings of overlapping
        // equipment sets never deadlock.
        let mut lock_order = requested.into_iter().collect::<Vec<_>>();
        lock_order.sort_unstable();
        for id in lock_order {
            tx.execute(Lock(By::new(id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        let mut line_items = Vec::with_capacity(items.len());
        for Item {
            equipment_id,
            pricing_type,
            usage,
        } in items
        {
            let equipment = tx
                .execute(Select(By::<Option<Equipment>, _>::new(equipment_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::EquipmentNotExists(equipment_id))
                .map_err(tracerr::wrap!())?;
            if equipment.listing_type != ListingType::ForRent {
                return Err(tracerr::new!(E::NotForRent(equipment_id)));
            }

            let engagements = tx
                .execute(Select(By::<Engagements, _>::new(equipment_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            availability::resolve(&equipment, &engagements, window.as_ref())
                .map_err(|conflict| E::EquipmentUnavailable {
                    equipment_id,
                    conflict,
                })
                .map_err(tracerr::wrap!())?;

            line_items.push(
                LineItem::price(&equipment, pricing_type, usage)
                    .map_err(tracerr::from_and_wrap!(=> E))?,
            );
        }

        let (first, rest) = line_items
            .split_first()
            .ok_or(E::NoLineItems)
            .map_err(tracerr::wrap!())?;
        let total_price =
            pricing::total(first.subtotal, rest.iter().map(|i| i.subtotal))
                .map_err(tracerr::from_and_wrap!(=> E))?;
        let commission = pricing::total(
            first.commission,
            rest.iter().map(|i| i.commission),
        )
        .map_err(tracerr::from_and_wrap!(=> E))?;

        let mut reference = None;
        for _ in 0..self.config().reference_attempts {
            let candidate = booking::Reference::random();
            let taken = tx
                .execute(Select(By::<Option<Booking>, _>::new(
                    candidate.clone(),
                )))
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
        let booking = Booking {
            id: booking::Id::new(),
            reference,
            renter_id,
            items: line_items,
            window,
            total_price,
            commission,
            status: booking::Status::Pending,
            notes: None,
            created_at: now.coerce(),
            updated_at: now.coerce(),
            completed_at: None,
            end_reminded_at: None,
            start_reminded_at: None,
        };

        tx.execute(Insert(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let event = Event::BookingCreated(BookingDetails::from(&booking));
        let kind = event.kind();
        self.notify(Notification::to(Recipient::Operations, event));
        self.broadcast(
            &[Channel::Booking, Channel::Equipment, Channel::User],
            Some(kind),
            now,
        )
        .await;

        Ok(booking)
    }
}

/// Error of [`CreateBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Prices of line items are in different currencies.
    #[display("Line items cannot be priced together: {_0}")]
    #[from]
    CurrencyMismatch(pricing::CurrencyMismatch),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Same equipment unit is requested more than once.
    #[display("`Equipment(id: {_0})` is requested more than once")]
    DuplicateEquipment(#[error(not(source))] equipment::Id),

    /// [`Equipment`] with the provided ID does not exist.
    #[display("`Equipment(id: {_0})` does not exist")]
    EquipmentNotExists(#[error(not(source))] equipment::Id),

    /// [`Equipment`] is committed to another transaction.
    #[display("`Equipment(id: {equipment_id})` is unavailable: {conflict}")]
    EquipmentUnavailable {
        /// ID of the unavailable [`Equipment`].
        equipment_id: equipment::Id,

        /// [`availability::Conflict`] making the [`Equipment`] unavailable.
        conflict: availability::Conflict,
    },

    /// [`Equipment`] has no rate for the requested [`pricing::Type`].
    #[display("{_0}")]
    #[from]
    InvalidPricingType(pricing::InvalidPricingType),

    /// No equipment units are requested.
    #[display("`Booking` must have at least one line item")]
    NoLineItems,

    /// [`Equipment`] is not listed for rent.
    #[display("`Equipment(id: {_0})` is not listed for rent")]
    NotForRent(#[error(not(source))] equipment::Id),

    /// No unique [`booking::Reference`] could be drawn.
    #[display("failed to draw a unique `Booking` reference number")]
    ReferenceExhausted,
}

#[cfg(test)]
pub(crate) mod spec {
    use common::{
        operations::{By, Insert, Select, Subscribe},
        HOUR,
    };
    use futures::StreamExt as _;
    use rust_decimal::Decimal;

    use crate::{
        domain::{
            availability::Conflict,
            booking::{
                self,
                spec::{at, dzd, rental},
                Window,
            },
            equipment::ListingType,
            notification::{Event, Recipient},
            pricing, reference, user, Booking, Equipment,
        },
        infra::{fanout::Channel, Database as _, Fanout as _},
        mock, Command as _, Config,
    };

    use super::{CreateBooking, ExecutionError, Item};

    pub(crate) async fn stock(svc: &mock::Service, eq: &Equipment) {
        svc.database().execute(Insert(eq.clone())).await.unwrap();
    }

    pub(crate) fn days(eq: &Equipment, n: i64) -> Item {
        Item {
            equipment_id: eq.id,
            pricing_type: pricing::Type::Daily,
            usage: pricing::Usage::new(Decimal::from(n)).unwrap(),
        }
    }

    pub(crate) fn window(from: &str, to: &str) -> Window {
        Window::new(at(from), at(to)).unwrap()
    }

    pub(crate) fn request(
        items: Vec<Item>,
        window: Option<Window>,
    ) -> CreateBooking {
        CreateBooking {
            renter_id: user::Id::new(),
            items,
            window,
        }
    }

    #[tokio::test]
    async fn creates_pending_booking() {
        let (svc, mut queue) = mock::service(Config::default());
        let (drill, mixer) = (rental(2_500), rental(1_000));
        stock(&svc, &drill).await;
        stock(&svc, &mixer).await;

        let mut signals = svc
            .fanout()
            .execute(Subscribe(vec![Channel::Booking]))
            .await
            .unwrap();

        let booking = svc
            .execute(request(
                vec![days(&drill, 4), days(&mixer, 4)],
                Some(window("2024-06-01T00:00:00Z", "2024-06-05T00:00:00Z")),
            ))
            .await
            .unwrap();

        assert_eq!(booking.status, booking::Status::Pending);
        assert_eq!(booking.total_price, dzd(14_000));
        assert_eq!(booking.commission, dzd(1_400));
        assert!(reference::is_valid(
            booking::Reference::PREFIX,
            booking.reference.as_ref(),
        ));

        let stored = svc
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(booking.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.items.len(), 2);

        let notified = mock::drain(&mut queue);
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].recipient, Recipient::Operations);
        assert!(matches!(notified[0].event, Event::BookingCreated(_)));

        let signal = signals.next().await.unwrap();
        assert_eq!(signal.channel, Channel::Booking);
        assert_eq!(signal.event, Some("booking_created"));
    }

    #[tokio::test]
    async fn rejects_overlapping_windows_only() {
        let (svc, _queue) = mock::service(Config::default());
        let drill = rental(2_500);
        stock(&svc, &drill).await;

        _ = svc
            .execute(request(
                vec![days(&drill, 4)],
                Some(window("2024-06-01T00:00:00Z", "2024-06-05T00:00:00Z")),
            ))
            .await
            .unwrap();

        let overlapping = svc
            .execute(request(
                vec![days(&drill, 2)],
                Some(window("2024-06-04T00:00:00Z", "2024-06-06T00:00:00Z")),
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            overlapping.as_ref(),
            ExecutionError::EquipmentUnavailable {
                conflict: Conflict::Booking(_),
                ..
            },
        ));

        let touching = svc
            .execute(request(
                vec![days(&drill, 2)],
                Some(window("2024-06-05T00:00:00Z", "2024-06-07T00:00:00Z")),
            ))
            .await;
        assert!(touching.is_ok());
    }

    #[tokio::test]
    async fn usage_only_booking_conflicts_with_any_active() {
        let (svc, _queue) = mock::service(Config::default());
        let drill = rental(2_500);
        stock(&svc, &drill).await;

        _ = svc
            .execute(request(
                vec![days(&drill, 1)],
                Some(window("2030-01-01T00:00:00Z", "2030-01-02T00:00:00Z")),
            ))
            .await
            .unwrap();

        let err = svc
            .execute(request(vec![days(&drill, 1)], None))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::EquipmentUnavailable { .. },
        ));
    }

    #[tokio::test]
    async fn rejects_malformed_requests() {
        let (svc, _queue) = mock::service(Config::default());
        let drill = rental(2_500);
        let mut for_sale = rental(2_500);
        for_sale.listing_type = ListingType::ForSale;
        stock(&svc, &drill).await;
        stock(&svc, &for_sale).await;

        let err = svc.execute(request(vec![], None)).await.unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NoLineItems));

        let err = svc
            .execute(request(vec![days(&drill, 1), days(&drill, 2)], None))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::DuplicateEquipment(id) if *id == drill.id,
        ));

        let err = svc
            .execute(request(vec![days(&for_sale, 1)], None))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotForRent(_)));

        let hourly = Item {
            pricing_type: pricing::Type::Hourly,
            ..days(&drill, 1)
        };
        let err = svc.execute(request(vec![hourly], None)).await.unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::InvalidPricingType(_),
        ));

        let missing = rental(1);
        let err = svc
            .execute(request(vec![days(&missing, 1)], None))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::EquipmentNotExists(_),
        ));
    }

    #[tokio::test]
    async fn failed_creation_leaves_no_trace() {
        let (svc, mut queue) = mock::service(Config::default());
        let drill = rental(2_500);
        let mut withdrawn = rental(2_500);
        withdrawn.is_available = false;
        stock(&svc, &drill).await;
        stock(&svc, &withdrawn).await;

        let err = svc
            .execute(request(
                vec![days(&drill, 1), days(&withdrawn, 1)],
                Some(window("2024-06-01T00:00:00Z", "2024-06-01T08:00:00Z")),
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::EquipmentUnavailable {
                conflict: Conflict::Withdrawn,
                ..
            },
        ));
        assert!(mock::drain(&mut queue).is_empty());

        let start = at("2024-06-01T00:00:00Z");
        let retry = svc
            .execute(request(
                vec![days(&drill, 1)],
                Some(Window::new(start, start + HOUR * 8).unwrap()),
            ))
            .await;
        assert!(retry.is_ok());
    }

    #[tokio::test]
    async fn exhausts_reference_attempts() {
        let (svc, _queue) = mock::service(Config {
            reference_attempts: 0,
            ..Config::default()
        });
        let drill = rental(2_500);
        stock(&svc, &drill).await;

        let err = svc
            .execute(request(vec![days(&drill, 1)], None))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::ReferenceExhausted));
    }
}
