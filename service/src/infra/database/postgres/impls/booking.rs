//! [`Booking`]-related [`Database`] implementations.

use common::{
    money::Currency,
    operations::{By, Insert, Lock, Select, Update},
};
use rust_decimal::Decimal;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, LineItem},
        equipment, pricing, user, Booking,
    },
    infra::{
        database::{
            self,
            postgres::{Connection, Tx},
            Postgres,
        },
        Database,
    },
    read,
};

use super::{equipment::window, money};

impl<C> Database<Select<By<Option<Booking>, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT id, reference, renter_id, window_start, window_end, \
                   currency, total_amount, commission_amount, \
                   status, notes, \
                   created_at, updated_at, completed_at, \
                   end_reminded_at, start_reminded_at \
            FROM bookings \
            WHERE id = $1::UUID";
        let Some(row) = self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        const ITEMS_SQL: &str = "\
            SELECT equipment_id, supplier_id, pricing_type, usage, \
                   currency, rate_amount, subtotal_amount, commission_amount \
            FROM booking_items \
            WHERE booking_id = $1::UUID \
            ORDER BY position";
        let items = self
            .query(ITEMS_SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(line_item)
            .collect();

        Ok(Some(booking(&row, items)))
    }
}

impl<C> Database<Select<By<Option<Booking>, booking::Reference>>>
    for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<Option<Booking>, booking::Id>>,
        Ok = Option<Booking>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Reference>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reference = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM bookings \
            WHERE reference = $1::VARCHAR";
        let Some(row) = self
            .query_opt(SQL, &[&reference])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        self.execute(Select(By::<Option<Booking>, booking::Id>::new(
            row.get("id"),
        )))
        .await
        .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Insert<Booking>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        let Booking {
            id,
            reference,
            renter_id,
            items,
            window,
            total_price,
            commission,
            status,
            notes,
            created_at,
            updated_at,
            completed_at,
            end_reminded_at,
            start_reminded_at,
        } = booking;

        const SQL: &str = "\
            INSERT INTO bookings (id, reference, renter_id, \
                                  window_start, window_end, \
                                  currency, total_amount, commission_amount, \
                                  status, notes, \
                                  created_at, updated_at, completed_at, \
                                  end_reminded_at, start_reminded_at) \
            VALUES ($1::UUID, $2::VARCHAR, $3::UUID, \
                    $4::TIMESTAMPTZ, $5::TIMESTAMPTZ, \
                    $6::INT2, $7::NUMERIC, $8::NUMERIC, \
                    $9::INT2, $10::TEXT, \
                    $11::TIMESTAMPTZ, $12::TIMESTAMPTZ, $13::TIMESTAMPTZ, \
                    $14::TIMESTAMPTZ, $15::TIMESTAMPTZ)";
        self.exec(
            SQL,
            &[
                &id,
                &reference,
                &renter_id,
                &window.map(|w| w.start()),
                &window.map(|w| w.end()),
                &total_price.currency,
                &total_price.amount,
                &commission.amount,
                &status,
                &notes,
                &created_at,
                &updated_at,
                &completed_at,
                &end_reminded_at,
                &start_reminded_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())?;

        let mut columns = ItemColumns::default();
        for (position, item) in (0_i16..).zip(items) {
            columns.push(position, item);
        }
        let ItemColumns {
            positions,
            equipment_ids,
            supplier_ids,
            pricing_types,
            usages,
            currencies,
            rates,
            subtotals,
            commissions,
        } = columns;

        const ITEMS_SQL: &str = "\
            INSERT INTO booking_items (booking_id, position, \
                                       equipment_id, supplier_id, \
                                       pricing_type, usage, currency, \
                                       rate_amount, subtotal_amount, \
                                       commission_amount) \
            SELECT $1::UUID, i.* \
            FROM unnest($2::INT2[], \
                        $3::UUID[], $4::UUID[], \
                        $5::INT2[], $6::NUMERIC[], $7::INT2[], \
                        $8::NUMERIC[], $9::NUMERIC[], \
                        $10::NUMERIC[]) AS i";
        self.exec(
            ITEMS_SQL,
            &[
                &id,
                &positions,
                &equipment_ids,
                &supplier_ids,
                &pricing_types,
                &usages,
                &currencies,
                &rates,
                &subtotals,
                &commissions,
            ],
        )
        .await
        .map(drop)
        .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Booking>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    /// Updates the lifecycle fields only, as [`LineItem`]s and totals of a
    /// [`Booking`] never change once it's created.
    async fn execute(
        &self,
        Update(booking): Update<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE bookings \
            SET status = $2::INT2, \
                notes = $3::TEXT, \
                updated_at = $4::TIMESTAMPTZ, \
                completed_at = $5::TIMESTAMPTZ, \
                end_reminded_at = $6::TIMESTAMPTZ, \
                start_reminded_at = $7::TIMESTAMPTZ \
            WHERE id = $1::UUID";
        self.exec(
            SQL,
            &[
                &booking.id,
                &booking.status,
                &booking.notes,
                &booking.updated_at,
                &booking.completed_at,
                &booking.end_reminded_at,
                &booking.start_reminded_at,
            ],
        )
        .await
        .map(drop)
        .map_err(tracerr::wrap!())
    }
}

impl Database<Lock<By<Booking, booking::Id>>> for Postgres<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Booking, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT 1 \
            FROM bookings \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query_opt(SQL, &[&id])
            .await
            .map(drop)
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<Vec<booking::Id>, read::booking::Ended>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<booking::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<booking::Id>, read::booking::Ended>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::Ended { at } = by.into_inner();
        let active = booking::Status::ALL
            .iter()
            .copied()
            .filter(|s| s.is_active())
            .collect::<Vec<_>>();

        const SQL: &str = "\
            SELECT id \
            FROM bookings \
            WHERE status = ANY($1::INT2[]) \
              AND window_end <= $2::TIMESTAMPTZ \
            ORDER BY created_at, id";
        self.ids(SQL, &[&active, &at]).await
    }
}

impl<C> Database<Select<By<Vec<booking::Id>, read::booking::EndingSoon>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<booking::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<booking::Id>, read::booking::EndingSoon>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::EndingSoon { after, until } = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM bookings \
            WHERE status = $1::INT2 \
              AND end_reminded_at IS NULL \
              AND window_end > $3::TIMESTAMPTZ \
              AND window_end <= $2::TIMESTAMPTZ \
            ORDER BY created_at, id";
        self.ids(SQL, &[&booking::Status::Pending, &until, &after])
            .await
    }
}

impl<C> Database<Select<By<Vec<booking::Id>, read::booking::StartingSoon>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<booking::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<booking::Id>, read::booking::StartingSoon>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::StartingSoon { after, until } = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM bookings \
            WHERE status = $1::INT2 \
              AND start_reminded_at IS NULL \
              AND window_start > $3::TIMESTAMPTZ \
              AND window_start <= $2::TIMESTAMPTZ \
            ORDER BY created_at, id";
        self.ids(SQL, &[&booking::Status::Paid, &until, &after])
            .await
    }
}

/// Columns of [`LineItem`]s to be inserted at once.
#[derive(Default)]
struct ItemColumns {
    positions: Vec<i16>,
    equipment_ids: Vec<equipment::Id>,
    supplier_ids: Vec<Option<user::Id>>,
    pricing_types: Vec<pricing::Type>,
    usages: Vec<pricing::Usage>,
    currencies: Vec<Currency>,
    rates: Vec<Decimal>,
    subtotals: Vec<Decimal>,
    commissions: Vec<Decimal>,
}

impl ItemColumns {
    fn push(&mut self, position: i16, item: LineItem) {
        self.positions.push(position);
        self.equipment_ids.push(item.equipment_id);
        self.supplier_ids.push(item.supplier_id);
        self.pricing_types.push(item.pricing_type);
        self.usages.push(item.usage);
        self.currencies.push(item.rate.currency);
        self.rates.push(item.rate.amount);
        self.subtotals.push(item.subtotal.amount);
        self.commissions.push(item.commission.amount);
    }
}

/// Reads a [`LineItem`] out of the provided `booking_items` [`Row`].
fn line_item(row: &Row) -> LineItem {
    LineItem {
        equipment_id: row.get("equipment_id"),
        supplier_id: row.get("supplier_id"),
        pricing_type: row.get("pricing_type"),
        usage: row.get("usage"),
        rate: money(row, "rate_amount", "currency"),
        subtotal: money(row, "subtotal_amount", "currency"),
        commission: money(row, "commission_amount", "currency"),
    }
}

/// Reads a [`Booking`] out of the provided `bookings` [`Row`].
fn booking(row: &Row, items: Vec<LineItem>) -> Booking {
    Booking {
        id: row.get("id"),
        reference: row.get("reference"),
        renter_id: row.get("renter_id"),
        items,
        window: window(row.get("window_start"), row.get("window_end")),
        total_price: money(row, "total_amount", "currency"),
        commission: money(row, "commission_amount", "currency"),
        status: row.get("status"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        completed_at: row.get("completed_at"),
        end_reminded_at: row.get("end_reminded_at"),
        start_reminded_at: row.get("start_reminded_at"),
    }
}
