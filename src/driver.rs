//! The driver collaborator contract and the bundled sqlx implementation.
//!
//! Composed SQL always carries positional `?` placeholders. A driver takes
//! that text plus an ordered parameter list and must distinguish "no
//! matching rows" from a true failure so the facade can collapse the
//! former into an empty result.

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Row as _, TypeInfo};

use crate::config::DbOptions;
use crate::dialect::Dialect;
use crate::dml::Statement;
use crate::error::DriverError;
use crate::row::Row;
use crate::value::Value;

/// An execution backend. Object-safe so the facade can hold mocks in
/// tests and alternative backends in hosts.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Run DML, returning affected rows.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DriverError>;

    /// Run a query, returning column-name-keyed records.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DriverError>;

    /// Run an ordered statement batch as one atomic unit.
    async fn execute_batch(&self, stmts: &[Statement]) -> Result<(), DriverError>;
}

/// Renumber `?` placeholders to `$1…$n`, leaving quoted spans alone.
/// The PostgreSQL-compatible dialects want numbered placeholders on the
/// wire; composed SQL never knows about them.
pub fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0usize;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                }
                _ => out.push(c),
            },
        }
    }
    out
}

/// The bundled driver over a [`sqlx::AnyPool`].
#[derive(Clone)]
pub struct SqlxDriver {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlxDriver {
    /// Open a pool for the configured database. Failure here is fatal to
    /// the caller's startup sequence.
    pub async fn connect(options: &DbOptions) -> Result<Self, DriverError> {
        sqlx::any::install_default_drivers();
        let url = options
            .url()
            .map_err(|e| DriverError::Connect(e.to_string()))?;
        let pool = AnyPoolOptions::new()
            .max_connections(options.max_connections)
            .connect(&url)
            .await
            .map_err(|e| DriverError::Connect(e.to_string()))?;
        Ok(Self {
            pool,
            dialect: options.dialect,
        })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    fn wire_sql(&self, sql: &str) -> String {
        if self.dialect.quotes_identifiers() {
            number_placeholders(sql)
        } else {
            sql.to_string()
        }
    }
}

fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
    params: &'q [Value],
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(v) => query.bind(*v),
            Value::Int(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::String(v) => query.bind(v.as_str()),
            // The Any driver has no blob or timestamp binding; both travel
            // as text.
            Value::Bytes(v) => query.bind(String::from_utf8_lossy(v).into_owned()),
            Value::Timestamp(_) => query.bind(param.as_string()),
        };
    }
    query
}

fn map_sqlx_err(err: sqlx::Error) -> DriverError {
    match err {
        sqlx::Error::RowNotFound => DriverError::NotFound,
        other => DriverError::Execute(other.to_string()),
    }
}

/// Materialize one record, dispatching on the driver's column type names.
fn materialize(row: &AnyRow) -> Row {
    let mut out = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "BOOL" | "BOOLEAN" => row
                .try_get::<bool, _>(i)
                .map(Value::Bool)
                .unwrap_or(Value::Null),
            "INT2" | "INT4" | "INT8" | "INTEGER" | "BIGINT" | "SMALLINT" => row
                .try_get::<i64, _>(i)
                .map(Value::Int)
                .unwrap_or(Value::Null),
            "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE" | "NUMERIC" | "DECIMAL" => row
                .try_get::<f64, _>(i)
                .map(Value::Float)
                .unwrap_or(Value::Null),
            _ => row
                .try_get::<String, _>(i)
                .map(Value::String)
                .unwrap_or(Value::Null),
        };
        out.put(column.name(), value);
    }
    out
}

#[async_trait]
impl Driver for SqlxDriver {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DriverError> {
        let sql = self.wire_sql(sql);
        let result = bind_params(sqlx::query(&sql), params)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DriverError> {
        let sql = self.wire_sql(sql);
        let rows = bind_params(sqlx::query(&sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(rows.iter().map(materialize).collect())
    }

    async fn execute_batch(&self, stmts: &[Statement]) -> Result<(), DriverError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        let wired: Vec<String> = stmts.iter().map(|s| self.wire_sql(&s.sql)).collect();
        for (stmt, sql) in stmts.iter().zip(&wired) {
            bind_params(sqlx::query(sql), &stmt.params)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
        }
        tx.commit().await.map_err(map_sqlx_err)
    }
}
