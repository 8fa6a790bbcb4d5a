//! Backend query translators
//!
//! - [`document`]: Find/Update into native document-store filter and update maps
//! - [`sql`]: Find/Update into parameterized SQL for the relational dialects

pub mod document;
pub mod sql;

pub use sql::{MysqlDialect, SqlDialect, SqlFragment, SqlTranslator, SqliteDialect};
