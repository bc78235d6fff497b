//! Postgres [`Database`] implementation.

pub mod connection;
mod impls;

use std::sync::Arc;

use deadpool_postgres::Runtime;
use derive_more::{Deref, Display, Error as StdError, From};
use tokio::sync::Mutex;
use tokio_postgres::{types::ToSql, NoTls, Row, ToStatement};
use tracerr::Traced;

use crate::infra::database;
#[cfg(doc)]
use crate::infra::Database;

pub use refinery::embed_migrations;

pub use self::connection::Connection;

pub use deadpool_postgres::Config;

/// Postgres [`Database`] client.
#[derive(Clone, Debug, Deref)]
pub struct Postgres<T = NonTx>(T);

/// Non-transactional access to a [`Postgres`] database.
///
/// Every operation takes a connection from the pool for its own duration.
#[derive(Clone, Debug)]
pub struct NonTx(connection::Pool);

/// Transactional access to a [`Postgres`] database.
///
/// All the clones share a single transaction, which is rolled back once the
/// last of them is dropped uncommitted.
#[derive(Clone, Debug)]
pub struct Tx(Arc<Mutex<connection::Tx>>);

impl Postgres {
    /// Creates a new [`Postgres`] client with the provided [`Config`].
    ///
    /// # Errors
    ///
    /// If failed to create a new [`Postgres`] client.
    pub fn new(conf: &Config) -> Result<Self, Traced<database::Error>> {
        let pool = conf
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)?;
        Ok(Self(NonTx(pool)))
    }
}

impl NonTx {
    /// Takes a [`connection::Client`] from the pool.
    async fn client(
        &self,
    ) -> Result<connection::Client, Traced<database::Error>> {
        self.0
            .get()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))
            .map_err(tracerr::map_from)
    }

    /// Begins a new [`Tx`] on a dedicated [`connection::Client`].
    async fn begin(&self) -> Result<Tx, Traced<database::Error>> {
        let client = self.client().await.map_err(tracerr::wrap!())?;
        let tx = connection::Tx::begin(client)
            .await
            .map_err(tracerr::wrap!())?;
        Ok(Tx(Arc::new(Mutex::new(tx))))
    }
}

impl Tx {
    /// Commits this [`Tx`].
    async fn commit(&self) -> Result<(), Traced<database::Error>> {
        self.0.lock().await.commit().await
    }
}

impl Connection for NonTx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        let client = self.client().await.map_err(tracerr::wrap!())?;
        client.query(stmt, params).await
    }

    async fn query_opt<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        let client = self.client().await.map_err(tracerr::wrap!())?;
        client.query_opt(stmt, params).await
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        let client = self.client().await.map_err(tracerr::wrap!())?;
        client.exec(stmt, params).await
    }
}

impl Connection for Tx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.0.lock().await.query(stmt, params).await
    }

    async fn query_opt<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.0.lock().await.query_opt(stmt, params).await
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.0.lock().await.exec(stmt, params).await
    }
}

/// Postgres database [`Error`].
#[derive(Debug, Display, StdError, From)]
pub enum Error {
    /// Error of the underlying connection.
    #[display("Connection error: {_0}")]
    Connection(connection::Error),

    /// Transaction is committed already.
    #[display("Transaction is finished already")]
    Finished,

    /// Error of creating a new [`connection::Pool`].
    #[display("Failed to create a new `connection::Pool`: {_0}")]
    PoolCreation(connection::PoolCreationError),

    /// Error of taking a [`connection::Client`] from the pool.
    #[display("`connection::Pool` error: {_0}")]
    Pool(connection::PoolError),
}
