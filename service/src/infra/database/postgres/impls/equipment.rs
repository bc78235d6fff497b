//! [`Equipment`]-related [`Database`] implementations.

use common::{
    money::Currency,
    operations::{By, Insert, Lock, Select, Update},
    DateTime, Money,
};
use rust_decimal::Decimal;
use tracerr::Traced;

use crate::{
    domain::{
        availability::{BookingEngagement, Engagements, SaleEngagement},
        booking::{self, Window},
        equipment::{self, Owner},
        pricing, sale, user, Equipment,
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

use super::money;

impl<C> Database<Select<By<Option<Equipment>, equipment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Equipment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Equipment>, equipment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT supplier_id, listing_type, \
                   sale_price_amount, sale_price_currency, \
                   is_available, sold_via_transaction \
            FROM equipment \
            WHERE id = $1::UUID";
        let Some(row) = self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        const RATES_SQL: &str = "\
            SELECT pricing_type, amount, currency \
            FROM equipment_rates \
            WHERE equipment_id = $1::UUID";
        let rates = self
            .query(RATES_SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|r| {
                (r.get("pricing_type"), money(&r, "amount", "currency"))
            })
            .collect();

        let sale_price = row
            .get::<_, Option<Decimal>>("sale_price_amount")
            .zip(row.get::<_, Option<Currency>>("sale_price_currency"))
            .map(|(amount, currency)| Money { amount, currency });

        Ok(Some(Equipment {
            id,
            owner: Owner::from(row.get::<_, Option<user::Id>>("supplier_id")),
            listing_type: row.get("listing_type"),
            rates,
            sale_price,
            is_available: row.get("is_available"),
            sold_via_transaction: row.get("sold_via_transaction"),
        }))
    }
}

impl<C> Database<Insert<Equipment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(equipment): Insert<Equipment>,
    ) -> Result<Self::Ok, Self::Err> {
        let supplier_id = equipment.supplier_id();
        let Equipment {
            id,
            owner: _,
            listing_type,
            rates,
            sale_price,
            is_available,
            sold_via_transaction,
        } = equipment;
        let (sale_price_amount, sale_price_currency) =
            sale_price.map(|m| (m.amount, m.currency)).unzip();

        const SQL: &str = "\
            INSERT INTO equipment (id, supplier_id, listing_type, \
                                   sale_price_amount, sale_price_currency, \
                                   is_available, sold_via_transaction) \
            VALUES ($1::UUID, $2::UUID, $3::INT2, \
                    $4::NUMERIC, $5::INT2, \
                    $6::BOOLEAN, $7::BOOLEAN) \
            ON CONFLICT (id) DO UPDATE \
            SET supplier_id = EXCLUDED.supplier_id, \
                listing_type = EXCLUDED.listing_type, \
                sale_price_amount = EXCLUDED.sale_price_amount, \
                sale_price_currency = EXCLUDED.sale_price_currency, \
                is_available = EXCLUDED.is_available, \
                sold_via_transaction = EXCLUDED.sold_via_transaction";
        self.exec(
            SQL,
            &[
                &id,
                &supplier_id,
                &listing_type,
                &sale_price_amount,
                &sale_price_currency,
                &is_available,
                &sold_via_transaction,
            ],
        )
        .await
        .map_err(tracerr::wrap!())?;

        let mut types = Vec::<pricing::Type>::with_capacity(rates.len());
        let mut amounts = Vec::<Decimal>::with_capacity(rates.len());
        let mut currencies = Vec::<Currency>::with_capacity(rates.len());
        for (ty, rate) in rates {
            types.push(ty);
            amounts.push(rate.amount);
            currencies.push(rate.currency);
        }

        const RATES_SQL: &str = "\
            WITH cleared AS ( \
                DELETE FROM equipment_rates \
                WHERE equipment_id = $1::UUID \
            ) \
            INSERT INTO equipment_rates (equipment_id, pricing_type, \
                                         amount, currency) \
            SELECT $1::UUID, r.pricing_type, r.amount, r.currency \
            FROM unnest($2::INT2[], $3::NUMERIC[], $4::INT2[]) \
                 AS r(pricing_type, amount, currency)";
        self.exec(RATES_SQL, &[&id, &types, &amounts, &currencies])
            .await
            .map(drop)
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Equipment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    /// Updates availability flags only, as nothing else of an [`Equipment`]
    /// changes along the transaction lifecycle.
    async fn execute(
        &self,
        Update(equipment): Update<Equipment>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE equipment \
            SET is_available = $2::BOOLEAN, \
                sold_via_transaction = $3::BOOLEAN \
            WHERE id = $1::UUID";
        self.exec(
            SQL,
            &[
                &equipment.id,
                &equipment.is_available,
                &equipment.sold_via_transaction,
            ],
        )
        .await
        .map(drop)
        .map_err(tracerr::wrap!())
    }
}

impl Database<Lock<By<Equipment, equipment::Id>>> for Postgres<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Equipment, equipment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT 1 \
            FROM equipment \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query_opt(SQL, &[&id])
            .await
            .map(drop)
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<Engagements, equipment::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Engagements;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Engagements, equipment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        let active = booking::Status::ALL
            .iter()
            .copied()
            .filter(|s| s.is_active())
            .collect::<Vec<_>>();

        const BOOKINGS_SQL: &str = "\
            SELECT b.id, b.status, b.window_start, b.window_end \
            FROM bookings AS b \
            WHERE b.status = ANY($2::INT2[]) \
              AND EXISTS (SELECT 1 \
                          FROM booking_items AS i \
                          WHERE i.booking_id = b.id \
                            AND i.equipment_id = $1::UUID)";
        let bookings = self
            .query(BOOKINGS_SQL, &[&id, &active])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| BookingEngagement {
                booking_id: row.get("id"),
                status: row.get("status"),
                window: window(
                    row.get("window_start"),
                    row.get("window_end"),
                ),
            })
            .collect();

        const SALES_SQL: &str = "\
            SELECT id, status \
            FROM sales \
            WHERE equipment_id = $1::UUID \
              AND status <> $2::INT2";
        let sales = self
            .query(SALES_SQL, &[&id, &sale::Status::Cancelled])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| SaleEngagement {
                sale_id: row.get("id"),
                status: row.get("status"),
            })
            .collect();

        Ok(Engagements { bookings, sales })
    }
}

impl<C> Database<Select<By<Vec<equipment::Id>, read::equipment::Committed>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<equipment::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<Vec<equipment::Id>, read::equipment::Committed>>,
    ) -> Result<Self::Ok, Self::Err> {
        let active = booking::Status::ALL
            .iter()
            .copied()
            .filter(|s| s.is_active())
            .collect::<Vec<_>>();

        const SQL: &str = "\
            SELECT e.id \
            FROM equipment AS e \
            WHERE NOT e.is_available \
               OR EXISTS (SELECT 1 \
                          FROM sales AS s \
                          WHERE s.equipment_id = e.id \
                            AND s.status = $2::INT2) \
               OR EXISTS (SELECT 1 \
                          FROM booking_items AS i \
                          JOIN bookings AS b ON b.id = i.booking_id \
                          WHERE i.equipment_id = e.id \
                            AND b.status = ANY($1::INT2[])) \
            ORDER BY e.id";
        Ok(self
            .query(SQL, &[&active, &sale::Status::Pending])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| row.get("id"))
            .collect())
    }
}

/// Assembles a [`Window`] out of its stored boundaries, if the
/// [`Booking`](crate::domain::Booking) is dated.
pub(super) fn window(
    start: Option<DateTime>,
    end: Option<DateTime>,
) -> Option<Window> {
    Window::new(start?, end?)
}
