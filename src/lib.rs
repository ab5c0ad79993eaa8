//! # sqlect — dialect-aware SQL composition
//!
//! A composition layer between application code and a SQL driver. One body
//! of application SQL stays portable across a MySQL-compatible dialect and
//! three PostgreSQL-compatible dialects that require double-quoted
//! identifiers (UXDB, Dameng, Vastbase).
//!
//! ## Quick example
//!
//! ```rust,ignore
//! use sqlect::prelude::*;
//!
//! let options = DbOptions::new(Dialect::Dameng, "host=10.0.0.1 port=5236 user=sa password=s", "appdb");
//! let db = Db::connect(options).await?;
//!
//! let mut filters = ValueMap::new();
//! cons::push_str(&mut filters, "login_name", "admin");
//! let nodes = cons::build(&filters, &Default::default(), &Default::default());
//!
//! let page = db.find_page("T_USER", 1, 10, &nodes, &[OrderSpec::desc("t.sort")]).await?;
//! ```
//!
//! Pieces, leaf first: [`value`] (dynamic values and ordered field maps),
//! [`schema`] (entity metadata, cached per table), [`cons`] (constraint
//! trees compiled to WHERE fragments), [`dialect`] (lexical identifier
//! quoting), [`row`]/[`decode`] (case-insensitive result records),
//! [`dml`] (INSERT/UPDATE generation), and [`db`] (the execution facade).

pub mod bootstrap;
pub mod config;
pub mod cons;
pub mod db;
pub mod decode;
pub mod dialect;
pub mod dml;
pub mod driver;
pub mod error;
pub mod row;
pub mod schema;
pub mod validate;
pub mod value;

pub mod prelude {
    pub use crate::config::DbOptions;
    pub use crate::cons::{self, Compare, Cons, OrderSpec};
    pub use crate::db::{Db, Page};
    pub use crate::decode::FromRow;
    pub use crate::dialect::Dialect;
    pub use crate::dml::{build_insert, build_update, Statement};
    pub use crate::driver::Driver;
    pub use crate::error::{DriverError, SqlectError, SqlectResult};
    pub use crate::row::Row;
    pub use crate::schema::{props, EntityDef};
    pub use crate::validate::{verify_create, verify_update};
    pub use crate::value::{Value, ValueMap};
}
