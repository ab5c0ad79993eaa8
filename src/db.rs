//! The query execution facade.
//!
//! Every statement, composed or caller-supplied, passes through the
//! dialect rewriter before it reaches the driver. Composed queries anchor
//! their filters on a `WHERE 1=1` base so compiled fragments append
//! uniformly. Paginated calls fork a count branch and a row branch and
//! join on both.

use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use tracing::{debug, error};

use crate::cons::{compile, compile_order, Cons, OrderSpec};
use crate::config::DbOptions;
use crate::dml::Statement;
use crate::driver::{Driver, SqlxDriver};
use crate::error::{SqlectError, SqlectResult};
use crate::row::Row;
use crate::value::Value;

/// One page of results plus the matching total.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub rows: Vec<Row>,
    pub total: i64,
}

impl Page {
    /// Decode every row into `T`.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> SqlectResult<Vec<T>> {
        self.rows.iter().map(Row::decode).collect()
    }
}

/// A post-commit callback. Runs only after the whole batch commits; a
/// failure here does not undo the commit.
pub type Callback = Box<dyn FnOnce() -> SqlectResult<()> + Send>;

/// The facade: a driver plus the options that pick the dialect.
#[derive(Clone)]
pub struct Db {
    driver: Arc<dyn Driver>,
    options: DbOptions,
}

impl Db {
    pub fn new(driver: Arc<dyn Driver>, options: DbOptions) -> Self {
        Self { driver, options }
    }

    /// Open the bundled sqlx driver for the configured database.
    pub async fn connect(options: DbOptions) -> SqlectResult<Self> {
        let driver = SqlxDriver::connect(&options).await?;
        Ok(Self::new(Arc::new(driver), options))
    }

    pub fn options(&self) -> &DbOptions {
        &self.options
    }

    /// Dialect-correct table reference using the configured schema.
    pub fn table_name(&self, table: &str) -> String {
        self.options.table_name(table)
    }

    /// Run DML. A "no matching rows" outcome is success.
    pub async fn exec(&self, sql: &str, params: &[Value]) -> SqlectResult<()> {
        self.execute(sql, params).await.map(|_| ())
    }

    /// Run DML, returning affected rows. "No matching rows" counts 0.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> SqlectResult<u64> {
        let wired = self.options.dialect.rewrite_exec(sql);
        if self.options.log_sql {
            debug!(sql = %wired, params = ?params, "exec");
        }
        match self.driver.execute(&wired, params).await {
            Ok(n) => Ok(n),
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => {
                error!(src = %sql, sql = %wired, params = ?params, error = %e, "exec sql failed");
                Err(e.into())
            }
        }
    }

    /// Run a query. A "no matching rows" outcome is an empty result.
    pub async fn query(&self, sql: &str, params: &[Value]) -> SqlectResult<Vec<Row>> {
        let wired = self.options.dialect.rewrite_query(sql);
        if self.options.log_sql {
            debug!(sql = %wired, params = ?params, "query");
        }
        match self.driver.query(&wired, params).await {
            Ok(rows) => Ok(rows),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => {
                error!(src = %sql, sql = %wired, params = ?params, error = %e, "query sql failed");
                Err(e.into())
            }
        }
    }

    /// Run a scalar count query: the first column of the first row,
    /// parsed permissively. An empty result counts 0.
    pub async fn query_total(&self, sql: &str, params: &[Value]) -> SqlectResult<i64> {
        let rows = self.query(sql, params).await?;
        Ok(rows
            .first()
            .and_then(|row| row.iter().next())
            .map_or(0, |(_, v)| v.as_i64()))
    }

    /// Run a query with a `LIMIT offset,count` suffix when both page
    /// values are positive.
    pub async fn query_rows(
        &self,
        page_no: i32,
        page_size: i32,
        sql: &str,
        params: &[Value],
    ) -> SqlectResult<Vec<Row>> {
        let sql = if page_no > 0 && page_size > 0 {
            format!(
                "{sql} LIMIT {},{}",
                (page_no as i64 - 1) * page_size as i64,
                page_size
            )
        } else {
            sql.to_string()
        };
        self.query(&sql, params).await
    }

    /// Count matching rows of an entity table.
    pub async fn find_total(&self, table: &str, cons: &[Cons]) -> SqlectResult<i64> {
        let mut sql = format!(
            "SELECT COUNT(1) FROM {} t WHERE 1=1",
            self.table_name(table)
        );
        let params = append_where(&mut sql, cons);
        self.query_total(&sql, &params).await
    }

    /// Fetch one page of an entity table.
    pub async fn find_rows(
        &self,
        table: &str,
        page_no: i32,
        page_size: i32,
        cons: &[Cons],
        orders: &[OrderSpec],
    ) -> SqlectResult<Vec<Row>> {
        let mut sql = format!("SELECT t.* FROM {} t WHERE 1=1", self.table_name(table));
        let params = append_where(&mut sql, cons);
        append_order(&mut sql, orders);
        self.query_rows(page_no, page_size, &sql, &params).await
    }

    /// Count and fetch concurrently. The count branch runs iff
    /// `page_no != 0`, the row branch iff `page_size != 0`; skipped
    /// branches contribute zero/empty. When both fail, the count error
    /// wins.
    pub async fn find_page(
        &self,
        table: &str,
        page_no: i32,
        page_size: i32,
        cons: &[Cons],
        orders: &[OrderSpec],
    ) -> SqlectResult<Page> {
        let count = async {
            if page_no != 0 {
                self.find_total(table, cons).await
            } else {
                Ok(0)
            }
        };
        let rows = async {
            if page_size != 0 {
                self.find_rows(table, page_no, page_size, cons, orders).await
            } else {
                Ok(Vec::new())
            }
        };
        join_page(tokio::join!(count, rows))
    }

    /// Count matching rows of a caller-supplied `FROM … WHERE 1=1` body.
    pub async fn find_total_from(
        &self,
        from_sql: &str,
        from_params: &[Value],
        cons: &[Cons],
    ) -> SqlectResult<i64> {
        let mut sql = format!("SELECT COUNT(1) {from_sql}");
        let params = append_where_with(&mut sql, from_params, cons);
        self.query_total(&sql, &params).await
    }

    /// Fetch one page of a caller-supplied `FROM … WHERE 1=1` body.
    pub async fn find_rows_from(
        &self,
        from_sql: &str,
        from_params: &[Value],
        page_no: i32,
        page_size: i32,
        cons: &[Cons],
        orders: &[OrderSpec],
    ) -> SqlectResult<Vec<Row>> {
        let mut sql = format!("SELECT * {from_sql}");
        let params = append_where_with(&mut sql, from_params, cons);
        append_order(&mut sql, orders);
        self.query_rows(page_no, page_size, &sql, &params).await
    }

    /// Paginate a caller-supplied `FROM` body; same branch gating as
    /// [`Db::find_page`].
    pub async fn find_page_from(
        &self,
        from_sql: &str,
        from_params: &[Value],
        page_no: i32,
        page_size: i32,
        cons: &[Cons],
        orders: &[OrderSpec],
    ) -> SqlectResult<Page> {
        let count = async {
            if page_no != 0 {
                self.find_total_from(from_sql, from_params, cons).await
            } else {
                Ok(0)
            }
        };
        let rows = async {
            if page_size != 0 {
                self.find_rows_from(from_sql, from_params, page_no, page_size, cons, orders)
                    .await
            } else {
                Ok(Vec::new())
            }
        };
        join_page(tokio::join!(count, rows))
    }

    /// Fetch one page of a complete caller-supplied SELECT.
    pub async fn find_rows_select(
        &self,
        select_sql: &str,
        select_params: &[Value],
        page_no: i32,
        page_size: i32,
        cons: &[Cons],
        orders: &[OrderSpec],
    ) -> SqlectResult<Vec<Row>> {
        let mut sql = select_sql.to_string();
        let params = append_where_with(&mut sql, select_params, cons);
        append_order(&mut sql, orders);
        self.query_rows(page_no, page_size, &sql, &params).await
    }

    // Count variant of a complete SELECT: everything from its FROM clause
    // onward under SELECT COUNT(1). A SELECT with no FROM counts 0.
    async fn find_total_select(
        &self,
        select_sql: &str,
        select_params: &[Value],
        cons: &[Cons],
    ) -> SqlectResult<i64> {
        // ASCII-only uppercasing keeps byte indices valid on the source.
        let upper = select_sql.to_ascii_uppercase();
        let Some(i) = upper.find("FROM ") else {
            return Ok(0);
        };
        let mut sql = format!("SELECT COUNT(1) {}", &select_sql[i..]);
        let params = append_where_with(&mut sql, select_params, cons);
        self.query_total(&sql, &params).await
    }

    /// Paginate a complete caller-supplied SELECT; same branch gating as
    /// [`Db::find_page`].
    pub async fn find_page_select(
        &self,
        select_sql: &str,
        select_params: &[Value],
        page_no: i32,
        page_size: i32,
        cons: &[Cons],
        orders: &[OrderSpec],
    ) -> SqlectResult<Page> {
        let count = async {
            if page_no != 0 {
                self.find_total_select(select_sql, select_params, cons).await
            } else {
                Ok(0)
            }
        };
        let rows = async {
            if page_size != 0 {
                self.find_rows_select(select_sql, select_params, page_no, page_size, cons, orders)
                    .await
            } else {
                Ok(Vec::new())
            }
        };
        join_page(tokio::join!(count, rows))
    }

    /// [`Db::find_page`] mapped through [`Row::decode`].
    pub async fn find_page_decode<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        page_no: i32,
        page_size: i32,
        cons: &[Cons],
        orders: &[OrderSpec],
    ) -> SqlectResult<(Vec<T>, i64)> {
        let page = self.find_page(table, page_no, page_size, cons, orders).await?;
        Ok((page.decode()?, page.total))
    }

    /// Submit an ordered statement batch as one atomic unit.
    pub async fn tran(&self, stmts: &[Statement]) -> SqlectResult<()> {
        let wired: Vec<Statement> = stmts
            .iter()
            .map(|s| Statement::new(self.options.dialect.rewrite_exec(&s.sql), s.params.clone()))
            .collect();
        if let Err(e) = self.driver.execute_batch(&wired).await {
            error!(count = stmts.len(), error = %e, "tran batch failed");
            return Err(e.into());
        }
        Ok(())
    }

    /// [`Db::tran`], then run post-commit callbacks in order, stopping at
    /// and surfacing the first failure. The commit stands regardless.
    pub async fn tran_then(
        &self,
        stmts: &[Statement],
        callbacks: Vec<Callback>,
    ) -> SqlectResult<()> {
        self.tran(stmts).await?;
        for (i, callback) in callbacks.into_iter().enumerate() {
            if let Err(e) = callback() {
                error!(index = i, error = %e, "tran callback failed");
                return Err(e);
            }
        }
        Ok(())
    }
}

fn append_where(sql: &mut String, cons: &[Cons]) -> Vec<Value> {
    let (fragment, params) = compile(cons);
    if !fragment.is_empty() {
        sql.push(' ');
        sql.push_str(&fragment);
    }
    params
}

fn append_where_with(sql: &mut String, leading: &[Value], cons: &[Cons]) -> Vec<Value> {
    let mut params = leading.to_vec();
    params.extend(append_where(sql, cons));
    params
}

fn append_order(sql: &mut String, orders: &[OrderSpec]) {
    let fragment = compile_order(orders);
    if !fragment.is_empty() {
        sql.push(' ');
        sql.push_str(&fragment);
    }
}

fn join_page(results: (SqlectResult<i64>, SqlectResult<Vec<Row>>)) -> SqlectResult<Page> {
    match results {
        (Ok(total), Ok(rows)) => Ok(Page { rows, total }),
        (Err(count_err), _) => Err(count_err),
        (_, Err(rows_err)) => Err(rows_err),
    }
}

static GLOBAL: Lazy<RwLock<Option<Arc<Db>>>> = Lazy::new(|| RwLock::new(None));

/// Install the process-wide handle. Fails if one is already installed;
/// use [`reinstall`] for a deliberate swap.
pub fn install(db: Db) -> SqlectResult<()> {
    let mut guard = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    if guard.is_some() {
        return Err(SqlectError::Config(
            "a global database handle is already installed".into(),
        ));
    }
    *guard = Some(Arc::new(db));
    Ok(())
}

/// Replace the process-wide handle, last writer wins. In-flight queries
/// keep the handle they already cloned.
pub fn reinstall(db: Db) {
    let mut guard = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    *guard = Some(Arc::new(db));
}

/// The process-wide handle, if installed.
pub fn global() -> Option<Arc<Db>> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
