//! PostgreSQL record store.
//!
//! Each model maps to a table named after it, with a `UUID` primary key
//! `id` and one text column per file-list field. Table and column names
//! are interpolated into SQL, so they are checked against a strict
//! identifier pattern first.

use async_trait::async_trait;
use multifile_core::{Error, RecordKey, RecordStore, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use tracing::debug;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Quote `name` as a SQL identifier after validating it.
pub fn quote_identifier(name: &str) -> Result<String> {
    if !IDENTIFIER.is_match(name) {
        return Err(Error::InvalidInput(format!("invalid SQL identifier: {}", name)));
    }
    Ok(format!("\"{}\"", name))
}

/// [`RecordStore`] over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the table of `model` with the given text columns if missing.
    pub async fn ensure_table(&self, model: &str, columns: &[&str]) -> Result<()> {
        let table = quote_identifier(model)?;
        let mut defs = vec!["id UUID PRIMARY KEY".to_string()];
        for column in columns {
            defs.push(format!("{} TEXT NOT NULL DEFAULT ''", quote_identifier(column)?));
        }
        let sql = format!("CREATE TABLE IF NOT EXISTS {} ({})", table, defs.join(", "));
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn fetch_columns(
        &self,
        key: &RecordKey,
        columns: &[&str],
    ) -> Result<Option<BTreeMap<String, Option<String>>>> {
        let table = quote_identifier(&key.model)?;
        let select = if columns.is_empty() {
            "id".to_string()
        } else {
            columns
                .iter()
                .map(|c| quote_identifier(c).map(|q| format!("{q}::text AS {q}")))
                .collect::<Result<Vec<_>>>()?
                .join(", ")
        };
        let sql = format!("SELECT {} FROM {} WHERE id = $1", select, table);

        let row = sqlx::query(&sql)
            .bind(key.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut values = BTreeMap::new();
        for column in columns {
            let value: Option<String> = row.try_get(*column).map_err(Error::Database)?;
            values.insert(column.to_string(), value);
        }
        Ok(Some(values))
    }

    async fn write_columns(&self, key: &RecordKey, values: &[(String, String)]) -> Result<()> {
        let table = quote_identifier(&key.model)?;
        let mut names = Vec::with_capacity(values.len());
        for (column, _) in values {
            names.push(quote_identifier(column)?);
        }

        let sql = if names.is_empty() {
            format!(
                "INSERT INTO {} (id) VALUES ($1) ON CONFLICT (id) DO NOTHING",
                table
            )
        } else {
            let placeholders: Vec<String> = (0..names.len()).map(|i| format!("${}", i + 2)).collect();
            let updates: Vec<String> = names.iter().map(|n| format!("{n} = EXCLUDED.{n}")).collect();
            format!(
                "INSERT INTO {} (id, {}) VALUES ($1, {}) ON CONFLICT (id) DO UPDATE SET {}",
                table,
                names.join(", "),
                placeholders.join(", "),
                updates.join(", ")
            )
        };

        let mut query = sqlx::query(&sql).bind(key.id);
        for (_, value) in values {
            query = query.bind(value);
        }
        query.execute(&self.pool).await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "record_store",
            op = "write_columns",
            model = %key.model,
            record_id = %key.id,
            column_count = values.len(),
            "Record columns written"
        );
        Ok(())
    }
}
