//! Lexical identifier quoting for the PostgreSQL-compatible dialects.
//!
//! This is a best-effort rewrite over raw SQL text, not a parser. It quotes
//! identifiers that follow the project's naming conventions (table names
//! prefixed `T_`/`S_`/`V_` in any case, alias-qualified column references)
//! and the column list of an INSERT. It never fails: text that matches no
//! pattern passes through unchanged, and unusual SQL may come out with
//! imperfect quoting.

use once_cell::sync::Lazy;
use regex::Regex;

// Table names with a recognized prefix, e.g. ` T_USER(` or `,t_org `.
static TABLE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ ,][TtSsVv]_\w+[( ]").unwrap());

// Alias-qualified column references followed by an operator or delimiter,
// e.g. `t.LoginName=` or `t.sort `.
static COLUMN_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\w+[)!=+-><,&|^*/% ]").unwrap());

// DELETE predicates: a bare column directly against an operator.
static DELETE_BARE_OP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+\w+[=!<>]").unwrap());

// DELETE predicates: a column separated from its operator or keyword.
static DELETE_SPACED_OP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+\w+\s+(?:[=!<>]|(?i:in\s+)|(?i:like\s+)|(?i:not\s+))").unwrap()
});

/// Generic rewrite: pad with a trailing space, run the table-prefix pass
/// and then the column-reference pass on the mutated text, trim.
///
/// Each match is re-rendered as delimiter + quoted core + delimiter, and
/// the replacement applies to every occurrence of the matched text.
pub(super) fn query(sql: &str) -> String {
    let mut sql = format!("{sql} ");
    for regex in [&*TABLE_PREFIX, &*COLUMN_REF] {
        let matches: Vec<String> = regex
            .find_iter(&sql)
            .map(|m| m.as_str().to_string())
            .collect();
        for m in matches {
            let quoted = format!("{}\"{}\"{}", &m[..1], &m[1..m.len() - 1], &m[m.len() - 1..]);
            sql = sql.replace(&m, &quoted);
        }
    }
    sql.trim().to_string()
}

/// DML rewrite: route INSERT and DELETE statements through their dedicated
/// passes (sniffed from the trimmed, upper-cased prefix), then always
/// finish with the generic query rewrite.
pub(super) fn exec(sql: &str) -> String {
    let upper = sql.trim().to_ascii_uppercase();
    let sql = if upper.starts_with("INSERT INTO ") {
        insert(sql)
    } else if upper.starts_with("DELETE FROM ") {
        delete(sql)
    } else {
        sql.to_string()
    };
    query(&sql)
}

/// Quote the column list of an INSERT: the span between the first `(` and
/// the following `) VALUES` or `) SELECT ` (located case-insensitively).
/// Statements without that shape pass through for the generic rewrite.
fn insert(sql: &str) -> String {
    let upper = sql.to_ascii_uppercase();
    let Some(b) = upper.find('(') else {
        return sql.to_string();
    };
    let e = match upper.find(") VALUES") {
        Some(e) => e,
        None => match upper.find(") SELECT ") {
            Some(e) => e,
            None => return sql.to_string(),
        },
    };
    if e < b {
        return sql.to_string();
    }
    format!(
        "{}{}{}",
        &sql[..b + 1],
        quote_list(&sql[b + 1..e], ','),
        &sql[e..]
    )
}

/// Quote each item of a separated list verbatim, dropping empty segments.
fn quote_list(list: &str, sep: char) -> String {
    let mut out = String::new();
    for (k, part) in list.split(sep).enumerate() {
        if part.is_empty() {
            continue;
        }
        if k != 0 {
            out.push(sep);
        }
        out.push('"');
        out.push_str(part);
        out.push('"');
    }
    out
}

/// Quote predicate columns of a DELETE. Two passes: columns sitting
/// directly against an operator, then columns separated from an operator
/// or an `IN`/`LIKE`/`NOT` keyword.
fn delete(sql: &str) -> String {
    let mut sql = sql.to_string();

    let matches: Vec<String> = DELETE_BARE_OP
        .find_iter(&sql)
        .map(|m| m.as_str().to_string())
        .collect();
    for m in matches {
        // Quote the word between the last space and the operator.
        let b = m.rfind(' ').map_or(0, |i| i + 1);
        let quoted = format!("{}\"{}\"{}", &m[..b], &m[b..m.len() - 1], &m[m.len() - 1..]);
        sql = sql.replace(&m, &quoted);
    }

    let matches: Vec<String> = DELETE_SPACED_OP
        .find_iter(&sql)
        .map(|m| m.as_str().to_string())
        .collect();
    for m in matches {
        let trimmed = m.trim();
        let Some(i) = trimmed.find(' ') else {
            continue;
        };
        let prop = &trimmed[..i];
        let Some(b) = m.find(prop) else {
            continue;
        };
        let quoted = format!("{}\"{}\"{}", &m[..b], prop, &m[b + prop.len()..]);
        sql = sql.replace(&m, &quoted);
    }

    sql
}
