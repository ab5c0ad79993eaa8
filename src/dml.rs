//! Parameterized INSERT/UPDATE generation from entity metadata.
//!
//! Payload fields match declared properties case-insensitively; values are
//! coerced on the way out when a property's validation format and column
//! type disagree on booleans. Columns come out bare here — the dialect
//! layer quotes them when the statement is submitted.

use serde::{Deserialize, Serialize};

use crate::schema::Prop;
use crate::value::{Value, ValueMap};

/// Composed SQL text plus its ordered positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Render `(?,?,…)` with `n` placeholders, for VALUES lists and callers
/// composing `IN` predicates.
pub fn to_sql_in(n: usize) -> String {
    let mut out = String::from("(");
    for i in 0..n {
        if i != 0 {
            out.push(',');
        }
        out.push('?');
    }
    out.push(')');
    out
}

/// Build `INSERT INTO <table>(<cols>) VALUES(<placeholders>)`.
///
/// Matched payload fields contribute their coerced value; declared
/// properties absent from the payload still contribute when they carry a
/// validation-tag default — the only path that injects defaults. Returns
/// `None` when the payload is empty or no column makes the list.
pub fn build_insert(props: &[Prop], table: &str, data: &ValueMap) -> Option<Statement> {
    if data.is_empty() {
        return None;
    }
    let mut columns = String::new();
    let mut params = Vec::new();
    for prop in props {
        let Some(column) = prop.column.as_ref().filter(|c| !c.column.is_empty()) else {
            continue;
        };
        if let Some(value) = data.get(&prop.name) {
            params.push(coerce_write(prop, value));
        } else if let Some(default) = prop
            .check
            .as_ref()
            .and_then(|c| c.default.as_deref())
            .filter(|d| !d.is_empty())
        {
            params.push(Value::String(default.to_string()));
        } else {
            continue;
        }
        if !columns.is_empty() {
            columns.push(',');
        }
        columns.push_str(&column.column);
    }
    if params.is_empty() {
        return None;
    }
    let sql = format!(
        "INSERT INTO {table}({columns}) VALUES{}",
        to_sql_in(params.len())
    );
    Some(Statement::new(sql, params))
}

/// Build `UPDATE <table> t SET t.<col>=?,… WHERE t.<pk>=? AND …`.
///
/// Only matched payload fields make the SET list — no default fill on this
/// path. Primary-key entries join the WHERE clause in insertion order; an
/// empty pk map emits no WHERE clause. Returns `None` when no data field
/// matches.
pub fn build_update(
    props: &[Prop],
    table: &str,
    pks: &ValueMap,
    data: &ValueMap,
) -> Option<Statement> {
    if data.is_empty() {
        return None;
    }
    let mut sets = String::new();
    let mut params = Vec::new();
    for prop in props {
        let Some(column) = prop.column.as_ref().filter(|c| !c.column.is_empty()) else {
            continue;
        };
        let Some(value) = data.get(&prop.name) else {
            continue;
        };
        params.push(coerce_write(prop, value));
        if !sets.is_empty() {
            sets.push(',');
        }
        sets.push_str("t.");
        sets.push_str(&column.column);
        sets.push_str("=?");
    }
    if params.is_empty() {
        return None;
    }
    let mut sql = format!("UPDATE {table} t SET {sets}");
    if !pks.is_empty() {
        sql.push_str(" WHERE ");
        for (i, (key, value)) in pks.iter().enumerate() {
            if i != 0 {
                sql.push_str(" AND ");
            }
            sql.push_str("t.");
            sql.push_str(key);
            sql.push_str("=?");
            params.push(value.clone());
        }
    }
    Some(Statement::new(sql, params))
}

/// Write-side coercion. A `format:bool` property stored in an integer
/// column writes 1/0; a `bool` column converts integer/string input to a
/// boolean. Both use the `true`/`1` truthy set. Everything else passes
/// through unchanged.
pub fn coerce_write(prop: &Prop, value: &Value) -> Value {
    let format = prop
        .check
        .as_ref()
        .and_then(|c| c.format.as_deref())
        .unwrap_or("");
    let sql_type = prop
        .column
        .as_ref()
        .map(|c| c.sql_type.as_str())
        .unwrap_or("");
    if format == "bool" && matches!(sql_type, "int" | "bigint") {
        let truthy = matches!(value.as_string().as_str(), "true" | "1");
        return Value::Int(i64::from(truthy));
    }
    if sql_type == "bool" {
        let truthy = matches!(value.as_string().as_str(), "true" | "1");
        return Value::Bool(truthy);
    }
    value.clone()
}
