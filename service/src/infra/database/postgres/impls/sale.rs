//! [`Sale`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use rust_decimal::Decimal;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        pricing,
        sale::{self, Transport},
        Sale,
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

impl<C> Database<Select<By<Option<Sale>, sale::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Sale>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Sale>, sale::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT id, reference, buyer_id, equipment_id, supplier_id, \
                   currency, price_amount, commission_amount, \
                   transport_distance, transport_rate_amount, \
                   transport_cost_amount, grand_total_amount, \
                   status, notes, \
                   created_at, updated_at, completed_at, reminded_at \
            FROM sales \
            WHERE id = $1::UUID";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(sale))
    }
}

impl<C> Database<Select<By<Option<Sale>, sale::Reference>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<Option<Sale>, sale::Id>>,
        Ok = Option<Sale>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Sale>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Sale>, sale::Reference>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reference = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM sales \
            WHERE reference = $1::VARCHAR";
        let Some(row) = self
            .query_opt(SQL, &[&reference])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        self.execute(Select(By::<Option<Sale>, sale::Id>::new(row.get("id"))))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Insert<Sale>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(sale): Insert<Sale>,
    ) -> Result<Self::Ok, Self::Err> {
        let Sale {
            id,
            reference,
            buyer_id,
            equipment_id,
            supplier_id,
            price,
            commission,
            transport,
            grand_total,
            status,
            notes,
            created_at,
            updated_at,
            completed_at,
            reminded_at,
        } = sale;

        const SQL: &str = "\
            INSERT INTO sales (id, reference, buyer_id, \
                               equipment_id, supplier_id, \
                               currency, price_amount, commission_amount, \
                               transport_distance, transport_rate_amount, \
                               transport_cost_amount, grand_total_amount, \
                               status, notes, \
                               created_at, updated_at, completed_at, \
                               reminded_at) \
            VALUES ($1::UUID, $2::VARCHAR, $3::UUID, \
                    $4::UUID, $5::UUID, \
                    $6::INT2, $7::NUMERIC, $8::NUMERIC, \
                    $9::NUMERIC, $10::NUMERIC, \
                    $11::NUMERIC, $12::NUMERIC, \
                    $13::INT2, $14::TEXT, \
                    $15::TIMESTAMPTZ, $16::TIMESTAMPTZ, $17::TIMESTAMPTZ, \
                    $18::TIMESTAMPTZ)";
        self.exec(
            SQL,
            &[
                &id,
                &reference,
                &buyer_id,
                &equipment_id,
                &supplier_id,
                &price.currency,
                &price.amount,
                &commission.amount,
                &transport.map(|t| t.distance),
                &transport.map(|t| t.rate.amount),
                &transport.map(|t| t.cost.amount),
                &grand_total.amount,
                &status,
                &notes,
                &created_at,
                &updated_at,
                &completed_at,
                &reminded_at,
            ],
        )
        .await
        .map(drop)
        .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Sale>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    /// Updates the lifecycle fields only, as pricing of a [`Sale`] never
    /// changes once it's created.
    async fn execute(
        &self,
        Update(sale): Update<Sale>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE sales \
            SET status = $2::INT2, \
                notes = $3::TEXT, \
                updated_at = $4::TIMESTAMPTZ, \
                completed_at = $5::TIMESTAMPTZ, \
                reminded_at = $6::TIMESTAMPTZ \
            WHERE id = $1::UUID";
        self.exec(
            SQL,
            &[
                &sale.id,
                &sale.status,
                &sale.notes,
                &sale.updated_at,
                &sale.completed_at,
                &sale.reminded_at,
            ],
        )
        .await
        .map(drop)
        .map_err(tracerr::wrap!())
    }
}

impl Database<Lock<By<Sale, sale::Id>>> for Postgres<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Sale, sale::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT 1 \
            FROM sales \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query_opt(SQL, &[&id])
            .await
            .map(drop)
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<Vec<sale::Id>, read::sale::Stale>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<sale::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<sale::Id>, read::sale::Stale>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::sale::Stale { created_until } = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM sales \
            WHERE status = $1::INT2 \
              AND created_at <= $2::TIMESTAMPTZ \
            ORDER BY created_at, id";
        self.ids(SQL, &[&sale::Status::Pending, &created_until])
            .await
    }
}

impl<C> Database<Select<By<Vec<sale::Id>, read::sale::Aging>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<sale::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<sale::Id>, read::sale::Aging>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::sale::Aging { after, until } = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM sales \
            WHERE status = $1::INT2 \
              AND reminded_at IS NULL \
              AND created_at > $2::TIMESTAMPTZ \
              AND created_at <= $3::TIMESTAMPTZ \
            ORDER BY created_at, id";
        self.ids(SQL, &[&sale::Status::Pending, &after, &until])
            .await
    }
}

/// Reads a [`Sale`] out of the provided `sales` [`Row`].
fn sale(row: &Row) -> Sale {
    let price = money(row, "price_amount", "currency");
    let currency = price.currency;
    let transport = match (
        row.get::<_, Option<pricing::Usage>>("transport_distance"),
        row.get::<_, Option<Decimal>>("transport_rate_amount"),
        row.get::<_, Option<Decimal>>("transport_cost_amount"),
    ) {
        (Some(distance), Some(rate), Some(cost)) => Some(Transport {
            distance,
            rate: Money {
                amount: rate,
                currency,
            },
            cost: Money {
                amount: cost,
                currency,
            },
        }),
        _ => None,
    };

    Sale {
        id: row.get("id"),
        reference: row.get("reference"),
        buyer_id: row.get("buyer_id"),
        equipment_id: row.get("equipment_id"),
        supplier_id: row.get("supplier_id"),
        price,
        commission: money(row, "commission_amount", "currency"),
        transport,
        grand_total: money(row, "grand_total_amount", "currency"),
        status: row.get("status"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        completed_at: row.get("completed_at"),
        reminded_at: row.get("reminded_at"),
    }
}
