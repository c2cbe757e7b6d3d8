//! Executes planned mutations and reads local row state for the resolver.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use regionsync_core::{RowState, SyncTable};

use crate::error::{Result, StorageError};
use crate::plan::{SqlStatement, SqlValue};
use crate::schema::schema_for;

/// Writer over the local store; one statement per message, no surrounding
/// transaction.
#[derive(Clone)]
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Current (updated_at, version) coordinates of a row, if present.
    ///
    /// Casts keep decode types stable across timestamp/timestamptz and
    /// integer/bigint schema variants.
    pub async fn row_state(
        &self,
        table: SyncTable,
        primary_key: &Value,
    ) -> Result<Option<RowState>> {
        let schema = schema_for(table).ok_or(StorageError::UnsyncedTable(table))?;
        let sql = format!(
            "SELECT updated_at::timestamptz AS updated_at, version::bigint AS version \
             FROM {} WHERE id = $1",
            schema.name()
        );
        let row = bind(sqlx::query(&sql), &SqlValue::from_key(primary_key))
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let updated_at: Option<DateTime<Utc>> = row.try_get("updated_at")?;
        let version: Option<i64> = row.try_get("version")?;
        Ok(Some(RowState {
            updated_at_ms: updated_at.map(|ts| ts.timestamp_millis()).unwrap_or(0),
            version: version.unwrap_or(0),
        }))
    }

    /// Execute one planned statement, returning the affected row count.
    pub async fn execute(&self, statement: &SqlStatement) -> Result<u64> {
        let mut query = sqlx::query(&statement.sql);
        for value in &statement.params {
            query = bind(query, value);
        }
        let done = query.execute(&self.pool).await?;
        Ok(done.rows_affected())
    }
}

fn bind<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        // Planned statements render NULL inline; this arm is for safety.
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::BigInt(i) => query.bind(*i),
        SqlValue::Double(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.as_str()),
        SqlValue::Timestamp(ts) => query.bind(*ts),
        SqlValue::Date(date) => query.bind(*date),
    }
}
