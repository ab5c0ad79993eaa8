//! Facade tests against a recording mock driver.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use sqlect::cons::{self, Compare, Cons, OrderSpec};
use sqlect::config::DbOptions;
use sqlect::db::{Callback, Db};
use sqlect::dialect::Dialect;
use sqlect::dml::Statement;
use sqlect::driver::Driver;
use sqlect::error::{DriverError, SqlectError};
use sqlect::row::Row;
use sqlect::value::Value;

/// Records every submission; answers count queries and row queries from
/// canned results, with switchable failures.
#[derive(Default)]
struct MockDriver {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    batches: Mutex<Vec<Vec<Statement>>>,
    rows: Vec<Row>,
    total: i64,
    fail_count: bool,
    fail_rows: bool,
    not_found: bool,
}

impl MockDriver {
    fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DriverError> {
        self.record(sql, params);
        if self.not_found {
            return Err(DriverError::NotFound);
        }
        Ok(1)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DriverError> {
        self.record(sql, params);
        if self.not_found {
            return Err(DriverError::NotFound);
        }
        if sql.starts_with("SELECT COUNT(1)") {
            if self.fail_count {
                return Err(DriverError::Execute("count branch down".into()));
            }
            return Ok(vec![[("COUNT(1)", Value::Int(self.total))]
                .into_iter()
                .collect()]);
        }
        if self.fail_rows {
            return Err(DriverError::Execute("row branch down".into()));
        }
        Ok(self.rows.clone())
    }

    async fn execute_batch(&self, stmts: &[Statement]) -> Result<(), DriverError> {
        self.batches.lock().unwrap().push(stmts.to_vec());
        if self.fail_rows {
            return Err(DriverError::Execute("batch down".into()));
        }
        Ok(())
    }
}

fn user_row(name: &str) -> Row {
    [
        ("ID", Value::Int(1)),
        ("LOGIN_NAME", Value::String(name.into())),
    ]
    .into_iter()
    .collect()
}

fn db_with(driver: MockDriver, dialect: Dialect) -> (Db, Arc<MockDriver>) {
    let driver = Arc::new(driver);
    let options = DbOptions::new(dialect, "", "appdb");
    (Db::new(driver.clone(), options), driver)
}

#[tokio::test]
async fn find_page_runs_both_branches() {
    let (db, driver) = db_with(
        MockDriver {
            rows: vec![user_row("admin")],
            total: 42,
            ..Default::default()
        },
        Dialect::MySql,
    );

    let nodes = vec![Cons::leaf("t.enable", Compare::Eq, 1)];
    let orders = vec![OrderSpec::desc("t.sort")];
    let page = db.find_page("T_USER", 2, 10, &nodes, &orders).await.unwrap();

    assert_eq!(page.total, 42);
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].get_string("login_name"), "admin");

    let calls = driver.calls();
    assert_eq!(calls.len(), 2);
    let count_call = calls.iter().find(|(sql, _)| sql.starts_with("SELECT COUNT")).unwrap();
    assert_eq!(
        count_call.0,
        "SELECT COUNT(1) FROM T_USER t WHERE 1=1 AND t.enable = ?"
    );
    assert_eq!(count_call.1, vec![Value::Int(1)]);
    let rows_call = calls.iter().find(|(sql, _)| sql.starts_with("SELECT t.*")).unwrap();
    assert_eq!(
        rows_call.0,
        "SELECT t.* FROM T_USER t WHERE 1=1 AND t.enable = ? ORDER BY t.sort DESC LIMIT 10,10"
    );
}

#[tokio::test]
async fn find_page_zero_page_no_skips_count_branch() {
    let (db, driver) = db_with(
        MockDriver {
            rows: vec![user_row("admin")],
            total: 42,
            fail_count: true,
            ..Default::default()
        },
        Dialect::MySql,
    );

    let page = db.find_page("T_USER", 0, 10, &[], &[]).await.unwrap();
    assert_eq!(page.total, 0);
    assert_eq!(page.rows.len(), 1);
    // Only the row fetch went out; page_no=0 also suppresses the LIMIT.
    let calls = driver.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "SELECT t.* FROM T_USER t WHERE 1=1");
}

#[tokio::test]
async fn find_page_zero_page_size_skips_row_branch() {
    let (db, driver) = db_with(
        MockDriver {
            total: 7,
            fail_rows: true,
            ..Default::default()
        },
        Dialect::MySql,
    );

    let page = db.find_page("T_USER", 1, 0, &[], &[]).await.unwrap();
    assert_eq!(page.total, 7);
    assert!(page.rows.is_empty());
    assert_eq!(driver.calls().len(), 1);
}

#[tokio::test]
async fn find_page_count_error_takes_precedence() {
    let (db, _driver) = db_with(
        MockDriver {
            fail_count: true,
            fail_rows: true,
            ..Default::default()
        },
        Dialect::MySql,
    );

    let err = db.find_page("T_USER", 1, 10, &[], &[]).await.unwrap_err();
    assert!(err.to_string().contains("count branch down"));
}

#[tokio::test]
async fn facade_routes_sql_through_the_quoting_engine() {
    let (db, driver) = db_with(MockDriver::default(), Dialect::Dameng);

    db.exec("INSERT INTO T_USER(id,name) VALUES(?,?)", &[1.into(), "x".into()])
        .await
        .unwrap();
    db.query("SELECT * FROM T_USER t WHERE t.LoginName=?", &["x".into()])
        .await
        .unwrap();
    db.find_total("T_USER", &[]).await.unwrap();

    let calls = driver.calls();
    assert_eq!(calls[0].0, "INSERT INTO \"T_USER\"(\"id\",\"name\") VALUES(?,?)");
    assert_eq!(calls[1].0, "SELECT * FROM \"T_USER\" t WHERE t.\"LoginName\"=?");
    // The entity path quotes the table before composition; the rewriter
    // leaves the already-quoted name alone.
    assert_eq!(calls[2].0, "SELECT COUNT(1) FROM \"T_USER\" t WHERE 1=1");
}

#[tokio::test]
async fn mysql_sql_passes_through_unchanged() {
    let (db, driver) = db_with(MockDriver::default(), Dialect::MySql);
    let sql = "DELETE FROM T_USER WHERE LoginName=?";
    db.exec(sql, &["x".into()]).await.unwrap();
    assert_eq!(driver.calls()[0].0, sql);
}

#[tokio::test]
async fn not_found_collapses_to_empty_results() {
    let (db, _driver) = db_with(
        MockDriver {
            not_found: true,
            ..Default::default()
        },
        Dialect::MySql,
    );

    assert_eq!(db.execute("DELETE FROM T_USER", &[]).await.unwrap(), 0);
    assert!(db.query("SELECT * FROM T_USER t", &[]).await.unwrap().is_empty());
    assert_eq!(db.query_total("SELECT COUNT(1) FROM T_USER t", &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn query_total_parses_first_column_permissively() {
    let (db, _driver) = db_with(
        MockDriver {
            total: 31,
            ..Default::default()
        },
        Dialect::MySql,
    );
    let total = db
        .query_total("SELECT COUNT(1) FROM T_USER t WHERE 1=1", &[])
        .await
        .unwrap();
    assert_eq!(total, 31);
}

#[tokio::test]
async fn find_page_select_without_from_counts_zero() {
    let (db, driver) = db_with(
        MockDriver {
            rows: vec![user_row("admin")],
            ..Default::default()
        },
        Dialect::MySql,
    );

    let page = db
        .find_page_select("SELECT 1", &[], 1, 10, &[], &[])
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert_eq!(page.rows.len(), 1);
    // No count query was issued at all.
    assert!(driver.calls().iter().all(|(sql, _)| !sql.starts_with("SELECT COUNT")));
}

#[tokio::test]
async fn find_page_select_survives_multibyte_text_before_from() {
    let (db, driver) = db_with(
        MockDriver {
            total: 5,
            ..Default::default()
        },
        Dialect::MySql,
    );

    // Multibyte literals ahead of FROM must not shift the count split.
    let select = "SELECT 'ı'喂 from T_USER t WHERE 1=1";
    let page = db
        .find_page_select(select, &[], 1, 10, &[], &[])
        .await
        .unwrap();
    assert_eq!(page.total, 5);

    let calls = driver.calls();
    let count_call = calls.iter().find(|(sql, _)| sql.starts_with("SELECT COUNT")).unwrap();
    assert_eq!(count_call.0, "SELECT COUNT(1) from T_USER t WHERE 1=1");
}

#[tokio::test]
async fn find_page_from_carries_leading_params() {
    let (db, driver) = db_with(
        MockDriver {
            total: 3,
            ..Default::default()
        },
        Dialect::MySql,
    );

    let from = "FROM T_USER t INNER JOIN T_ORG o ON o.id=t.org_id AND o.kind=? WHERE 1=1";
    let nodes = vec![Cons::leaf("t.enable", Compare::Eq, 1)];
    db.find_page_from(from, &[Value::Int(5)], 1, 10, &nodes, &[])
        .await
        .unwrap();

    let calls = driver.calls();
    let count_call = calls.iter().find(|(sql, _)| sql.starts_with("SELECT COUNT")).unwrap();
    assert_eq!(count_call.0, format!("SELECT COUNT(1) {from} AND t.enable = ?"));
    // Leading FROM params come before constraint params.
    assert_eq!(count_call.1, vec![Value::Int(5), Value::Int(1)]);
}

#[tokio::test]
async fn tran_rewrites_statements_and_runs_callbacks_in_order() {
    let (db, driver) = db_with(MockDriver::default(), Dialect::UxDb);

    let order = Arc::new(AtomicUsize::new(0));
    let first = order.clone();
    let second = order.clone();
    let callbacks: Vec<Callback> = vec![
        Box::new(move || {
            assert_eq!(first.fetch_add(1, Ordering::SeqCst), 0);
            Ok(())
        }),
        Box::new(move || {
            assert_eq!(second.fetch_add(1, Ordering::SeqCst), 1);
            Ok(())
        }),
    ];

    let stmts = vec![
        Statement::new("INSERT INTO T_USER(id) VALUES(?)", vec![Value::Int(1)]),
        Statement::new("DELETE FROM T_USER WHERE id=?", vec![Value::Int(1)]),
    ];
    db.tran_then(&stmts, callbacks).await.unwrap();

    assert_eq!(order.load(Ordering::SeqCst), 2);
    let batches = driver.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0][0].sql, "INSERT INTO \"T_USER\"(\"id\") VALUES(?)");
    assert_eq!(batches[0][1].sql, "DELETE FROM \"T_USER\" WHERE \"id\"=?");
}

#[tokio::test]
async fn tran_then_stops_at_first_callback_error() {
    let (db, _driver) = db_with(MockDriver::default(), Dialect::MySql);

    let ran_third = Arc::new(AtomicUsize::new(0));
    let probe = ran_third.clone();
    let callbacks: Vec<Callback> = vec![
        Box::new(|| Ok(())),
        Box::new(|| Err(SqlectError::Config("callback boom".into()))),
        Box::new(move || {
            probe.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    ];

    let err = db.tran_then(&[], callbacks).await.unwrap_err();
    assert!(err.to_string().contains("callback boom"));
    assert_eq!(ran_third.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tran_batch_failure_skips_callbacks() {
    let (db, _driver) = db_with(
        MockDriver {
            fail_rows: true,
            ..Default::default()
        },
        Dialect::MySql,
    );

    let ran = Arc::new(AtomicUsize::new(0));
    let probe = ran.clone();
    let callbacks: Vec<Callback> = vec![Box::new(move || {
        probe.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })];

    let stmts = vec![Statement::new("INSERT INTO T_USER(id) VALUES(?)", vec![1.into()])];
    assert!(db.tran_then(&stmts, callbacks).await.is_err());
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn constraint_build_to_page_round_trip() {
    let (db, driver) = db_with(
        MockDriver {
            rows: vec![user_row("bob")],
            total: 1,
            ..Default::default()
        },
        Dialect::MySql,
    );

    let mut filters = sqlect::value::ValueMap::new();
    cons::push_str(&mut filters, "t.enable", "1");
    cons::push_str(&mut filters, "t.login_name", "bob");
    cons::push_str(&mut filters, "t.true_name", "bob");

    let mut ops = std::collections::HashMap::new();
    ops.insert("t.login_name".to_string(), Compare::Like);
    ops.insert("t.true_name".to_string(), Compare::Like);
    let mut or_fields = std::collections::HashSet::new();
    or_fields.insert("t.login_name".to_string());
    or_fields.insert("t.true_name".to_string());

    let nodes = cons::build(&filters, &ops, &or_fields);
    let page = db.find_page("T_USER", 1, 10, &nodes, &[]).await.unwrap();
    assert_eq!(page.total, 1);

    let calls = driver.calls();
    let rows_call = calls.iter().find(|(sql, _)| sql.starts_with("SELECT t.*")).unwrap();
    assert_eq!(
        rows_call.0,
        "SELECT t.* FROM T_USER t WHERE 1=1 AND t.enable = ? \
         AND (t.login_name LIKE ? OR t.true_name LIKE ?) LIMIT 0,10"
    );
    assert_eq!(
        rows_call.1,
        vec![
            Value::String("1".into()),
            Value::String("%bob%".into()),
            Value::String("%bob%".into()),
        ]
    );
}
