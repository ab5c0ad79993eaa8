//! Target dialects and identifier-quoting dispatch.
//!
//! One MySQL-compatible dialect passes SQL through untouched; the three
//! PostgreSQL-compatible dialects require double-quoted identifiers and
//! route statements through the lexical rewriter in [`rewrite`].

mod rewrite;

use std::fmt;

use serde::{Deserialize, Serialize};

/// A supported database dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    MySql,
    UxDb,
    Dameng,
    Vastbase,
}

impl Dialect {
    /// Resolve a dialect from a configuration token or a well-known port.
    /// Unrecognized tokens fall back to MySQL.
    pub fn from_token(token: &str) -> Self {
        match token.to_lowercase().as_str() {
            "ux" | "uxdb" | "uxres" | "5432" => Dialect::UxDb,
            "dm" | "dmdb" | "5236" | "5237" => Dialect::Dameng,
            "vb" | "vast" | "vastbase" | "5433" => Dialect::Vastbase,
            _ => Dialect::MySql,
        }
    }

    /// Whether identifiers must be double-quoted for this dialect.
    pub fn quotes_identifiers(&self) -> bool {
        !matches!(self, Dialect::MySql)
    }

    /// Dialect-correct table reference, optionally schema-qualified.
    pub fn table_name(&self, table: &str, schema: &str) -> String {
        if !self.quotes_identifiers() {
            return table.to_string();
        }
        if schema.is_empty() {
            format!("\"{table}\"")
        } else {
            format!("\"{schema}\".\"{table}\"")
        }
    }

    /// Rewrite a query statement for this dialect.
    pub fn rewrite_query(&self, sql: &str) -> String {
        if self.quotes_identifiers() {
            rewrite::query(sql)
        } else {
            sql.to_string()
        }
    }

    /// Rewrite a DML statement for this dialect. INSERT and DELETE get
    /// their dedicated passes first; every statement then goes through
    /// the generic query rewrite.
    pub fn rewrite_exec(&self, sql: &str) -> String {
        if self.quotes_identifiers() {
            rewrite::exec(sql)
        } else {
            sql.to_string()
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::MySql => "mysql",
            Dialect::UxDb => "uxdb",
            Dialect::Dameng => "dameng",
            Dialect::Vastbase => "vastbase",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token() {
        assert_eq!(Dialect::from_token("uxres"), Dialect::UxDb);
        assert_eq!(Dialect::from_token("5432"), Dialect::UxDb);
        assert_eq!(Dialect::from_token("DM"), Dialect::Dameng);
        assert_eq!(Dialect::from_token("5237"), Dialect::Dameng);
        assert_eq!(Dialect::from_token("vastbase"), Dialect::Vastbase);
        assert_eq!(Dialect::from_token("5433"), Dialect::Vastbase);
        assert_eq!(Dialect::from_token("mysql"), Dialect::MySql);
        assert_eq!(Dialect::from_token("anything"), Dialect::MySql);
    }

    #[test]
    fn test_table_name() {
        assert_eq!(Dialect::MySql.table_name("T_USER", "sys"), "T_USER");
        assert_eq!(Dialect::UxDb.table_name("T_USER", ""), "\"T_USER\"");
        assert_eq!(
            Dialect::Dameng.table_name("T_USER", "sys"),
            "\"sys\".\"T_USER\""
        );
    }

    #[test]
    fn test_mysql_is_passthrough() {
        let sql = "SELECT * FROM T_USER t WHERE t.LoginName=?";
        assert_eq!(Dialect::MySql.rewrite_query(sql), sql);
        let sql = "DELETE FROM T_USER WHERE LoginName=?";
        assert_eq!(Dialect::MySql.rewrite_exec(sql), sql);
    }

    #[test]
    fn test_quoting_dialects_share_the_rewriter() {
        let sql = "SELECT * FROM T_USER t";
        let expected = "SELECT * FROM \"T_USER\" t";
        assert_eq!(Dialect::UxDb.rewrite_query(sql), expected);
        assert_eq!(Dialect::Dameng.rewrite_query(sql), expected);
        assert_eq!(Dialect::Vastbase.rewrite_query(sql), expected);
    }
}
