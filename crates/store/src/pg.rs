use std::time::Duration;

use sqlx::Row;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;

use crate::entity::{Record, UpdateStatement};
use crate::error::StoreError;
use crate::mutation::EntityStore;

#[derive(Clone)]
pub struct PgEntityStore {
    pool: sqlx::PgPool,
    statement_timeout: Duration,
}

impl PgEntityStore {
    pub async fn connect(db_url: &str, statement_timeout: Duration) -> Result<Self, StoreError> {
        let pool = tokio::time::timeout(
            Duration::from_secs(2),
            PgPoolOptions::new().max_connections(8).connect(db_url),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(Self::from_pool(pool, statement_timeout))
    }

    pub async fn connect_and_migrate(
        db_url: &str,
        statement_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let store = Self::connect(db_url, statement_timeout).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: sqlx::PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        tokio::time::timeout(Duration::from_secs(10), migrate(&self.pool))
            .await
            .map_err(|_| StoreError::Timeout)?
            .map_err(|err| StoreError::Sqlx(err.into()))?;
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        tokio::time::timeout(
            self.statement_timeout,
            sqlx::query("SELECT 1").execute(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl EntityStore for PgEntityStore {
    async fn exists(
        &self,
        table: &'static str,
        column: &'static str,
        value: &serde_json::Value,
    ) -> Result<bool, StoreError> {
        let sql = format!("SELECT 1 FROM {} WHERE {} = $1 LIMIT 1", table, column);
        let row = tokio::time::timeout(
            self.statement_timeout,
            bind_json(sqlx::query(&sql), value).fetch_optional(&self.pool),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        Ok(row.is_some())
    }

    async fn update_returning(
        &self,
        statement: &UpdateStatement<'_>,
    ) -> Result<Option<Record>, StoreError> {
        let sql = statement.sql();
        let query = statement
            .bind_values()
            .into_iter()
            .fold(sqlx::query(&sql), bind_json);

        let row = tokio::time::timeout(self.statement_timeout, query.fetch_optional(&self.pool))
            .await
            .map_err(|_| StoreError::Timeout)??;

        let Some(row) = row else {
            return Ok(None);
        };

        match row.try_get::<serde_json::Value, _>("record")? {
            serde_json::Value::Object(record) => Ok(Some(record)),
            _ => Err(StoreError::InvalidRecord),
        }
    }
}

/// Binds a JSON value with the closest Postgres type. Arrays and objects go
/// in as jsonb.
fn bind_json<'q>(
    query: Query<'q, sqlx::Postgres, PgArguments>,
    value: &serde_json::Value,
) -> Query<'q, sqlx::Postgres, PgArguments> {
    match value {
        serde_json::Value::Null => query.bind(None::<String>),
        serde_json::Value::Bool(b) => query.bind(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        serde_json::Value::String(s) => query.bind(s.clone()),
        other => query.bind(sqlx::types::Json(other.clone())),
    }
}

pub async fn migrate(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
