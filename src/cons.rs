//! Boolean filter trees and their compilation into WHERE fragments.
//!
//! A filter is an ordered list of [`Cons`] nodes. [`compile`] renders the
//! list into a fragment that appends to a `WHERE 1=1` base, pushing
//! parameters in left-to-right leaf order. [`build`] assembles the list
//! from a plain field map plus operator overrides and an or-group set.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;

use crate::value::{Value, ValueMap, DATETIME_FORMAT};

/// Comparison operators for constraint leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Eq,
    Lt,
    Like,
    Lte,
    Gt,
    Gte,
    In,
    Ne,
    NotIn,
    NotLike,
    IsNull,
    NotNull,
}

impl Compare {
    /// SQL symbol for this operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            Compare::Eq => "=",
            Compare::Lt => "<",
            Compare::Like => "LIKE",
            Compare::Lte => "<=",
            Compare::Gt => ">",
            Compare::Gte => ">=",
            Compare::In => "IN",
            Compare::Ne => "<>",
            Compare::NotIn => "NOT IN",
            Compare::NotLike => "NOT LIKE",
            Compare::IsNull => "IS NULL",
            Compare::NotNull => "IS NOT NULL",
        }
    }
}

/// One node of a filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Cons {
    Leaf {
        field: String,
        op: Compare,
        value: Value,
    },
    And(Vec<Cons>),
    Or(Vec<Cons>),
}

impl Cons {
    /// Build a leaf. LIKE stores the value pre-wrapped in `%...%`; no
    /// other operator mutates its value.
    pub fn leaf(field: impl Into<String>, op: Compare, value: impl Into<Value>) -> Self {
        let value = value.into();
        let value = if op == Compare::Like {
            Value::String(format!("%{}%", value.as_string()))
        } else {
            value
        };
        Cons::Leaf {
            field: field.into(),
            op,
            value,
        }
    }
}

/// Assemble top-level nodes from a filter map, in the map's insertion
/// order. The default operator is `=`; fields named in `ops` use that
/// operator instead. Fields named in `or_fields` are collected into one
/// trailing `Or` node rather than standing as independent leaves.
pub fn build(
    filters: &ValueMap,
    ops: &HashMap<String, Compare>,
    or_fields: &HashSet<String>,
) -> Vec<Cons> {
    let mut nodes = Vec::new();
    let mut or_group = Vec::new();
    for (field, value) in filters.iter() {
        let op = ops.get(field).copied().unwrap_or(Compare::Eq);
        let leaf = Cons::leaf(field, op, value.clone());
        if or_fields.contains(field) {
            or_group.push(leaf);
        } else {
            nodes.push(leaf);
        }
    }
    if !or_group.is_empty() {
        nodes.push(Cons::Or(or_group));
    }
    nodes
}

/// Compile nodes into a WHERE fragment plus its parameters.
///
/// Top-level nodes join with `AND`; the fragment starts with `AND ` so it
/// appends directly after a `WHERE 1=1` base. Composites parenthesize
/// themselves, so a leading composite opens the fragment as `AND (`.
/// An empty node list yields an empty fragment and no parameters.
pub fn compile(nodes: &[Cons]) -> (String, Vec<Value>) {
    let mut sql = String::new();
    let mut params = Vec::new();
    for node in nodes {
        sql.push_str(if sql.is_empty() { "AND " } else { " AND " });
        render(node, &mut sql, &mut params);
    }
    (sql, params)
}

fn render(node: &Cons, sql: &mut String, params: &mut Vec<Value>) {
    match node {
        Cons::Leaf { field, op, value } => {
            params.push(value.clone());
            sql.push_str(field);
            sql.push(' ');
            sql.push_str(op.symbol());
            sql.push_str(" ?");
        }
        Cons::Or(children) => render_group(children, " OR ", sql, params),
        Cons::And(children) => render_group(children, " AND ", sql, params),
    }
}

fn render_group(children: &[Cons], joiner: &str, sql: &mut String, params: &mut Vec<Value>) {
    sql.push('(');
    for (i, child) in children.iter().enumerate() {
        if i != 0 {
            sql.push_str(joiner);
        }
        render(child, sql, params);
    }
    sql.push(')');
}

/// One ordering term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub field: String,
    pub asc: bool,
}

impl OrderSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            asc: true,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            asc: false,
        }
    }
}

/// Render an `ORDER BY` fragment, or an empty string for no orderings.
pub fn compile_order(orders: &[OrderSpec]) -> String {
    if orders.is_empty() {
        return String::new();
    }
    let mut sql = String::from("ORDER BY ");
    for (i, order) in orders.iter().enumerate() {
        if i != 0 {
            sql.push(',');
        }
        sql.push_str(&order.field);
        sql.push(' ');
        sql.push_str(if order.asc { "ASC" } else { "DESC" });
    }
    sql
}

/// Add a string filter, skipping blanks.
pub fn push_str(filters: &mut ValueMap, field: &str, value: &str) {
    if !value.is_empty() {
        filters.insert(field, value);
    }
}

/// Add an integer filter from a loosely typed value. Booleans and the
/// literals `"true"`/`"false"` store 1/0 even when falsy; anything else
/// stores its integer form, where 0 means "no filter" and the sentinel
/// -1 means "filter on zero".
pub fn push_int(filters: &mut ValueMap, field: &str, value: &Value) {
    match value {
        Value::Bool(b) => {
            filters.insert(field, i64::from(*b));
        }
        Value::String(s) if s == "true" => {
            filters.insert(field, 1);
        }
        Value::String(s) if s == "false" => {
            filters.insert(field, 0);
        }
        _ => {
            let n = value.as_i64();
            if n == -1 {
                filters.insert(field, 0);
            } else if n != 0 {
                filters.insert(field, n);
            }
        }
    }
}

/// Add an i32 filter: 0 means "no filter", -1 means "filter on zero".
pub fn push_i32(filters: &mut ValueMap, field: &str, value: i32) {
    if value != 0 {
        filters.insert(field, if value == -1 { 0 } else { value });
    }
}

/// Add an i64 filter: 0 means "no filter", -1 means "filter on zero".
pub fn push_i64(filters: &mut ValueMap, field: &str, value: i64) {
    if value != 0 {
        filters.insert(field, if value == -1 { 0 } else { value });
    }
}

/// Append a timestamp leaf with the given comparison, skipping `None`.
/// This appends to the node list rather than the filter map so one field
/// can carry both a lower and an upper bound.
pub fn push_time(nodes: &mut Vec<Cons>, field: &str, op: Compare, value: Option<NaiveDateTime>) {
    if let Some(t) = value {
        nodes.push(Cons::Leaf {
            field: field.to_string(),
            op,
            value: Value::String(t.format(DATETIME_FORMAT).to_string()),
        });
    }
}

/// Add an integer filter that only applies above a threshold. Booleans
/// and boolean literals store 1/0 regardless of the threshold.
pub fn push_int_threshold(filters: &mut ValueMap, field: &str, value: &Value, threshold: i64) {
    match value {
        Value::Bool(b) => {
            filters.insert(field, i64::from(*b));
        }
        Value::String(s) if s == "true" => {
            filters.insert(field, 1);
        }
        Value::String(s) if s == "false" => {
            filters.insert(field, 0);
        }
        _ => {
            let n = value.as_i64();
            if n > threshold {
                filters.insert(field, n);
            }
        }
    }
}

/// Add an i32 filter that only applies above a threshold.
pub fn push_i32_threshold(filters: &mut ValueMap, field: &str, value: i32, threshold: i32) {
    if value > threshold {
        filters.insert(field, value);
    }
}

/// Add an i64 filter that only applies above a threshold.
pub fn push_i64_threshold(filters: &mut ValueMap, field: &str, value: i64, threshold: i64) {
    if value > threshold {
        filters.insert(field, value);
    }
}
