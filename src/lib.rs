//! # Polystore - one record shape, many stores
//!
//! Declare a record type once and persist it unmodified in a document store
//! or a relational engine.
//!
//! Polystore provides:
//! - An explicit field-descriptor schema per record type, derived once and cached
//! - Record <-> generic document mapping, with embedded records nested or flattened
//! - Backend-agnostic Find/Update descriptors
//! - Translators into document filters and parameterized SQL (SQLite, MySQL)
//! - Table creation from field metadata
//! - Typed repositories and an explicit per-type repository registry

pub mod value;
pub mod field;
pub mod schema;
pub mod query;
pub mod translate;
pub mod storage;
pub mod provider;
pub mod repository;
pub mod registry;
pub mod connection;
pub mod config;
pub mod logging;

// Re-exports for convenient access
pub use value::{Document, Value};
pub use field::{Blob, FieldType, FieldValue};
pub use schema::{
    derive_metadata, Column, Embedded, FieldDescriptor, FieldRole, Prop, Record, RecordSchema, SchemaBuilder,
    SchemaMetadata, Shape,
};
pub use query::{Condition, Find, FindOptions, SortKey, SortOrder, Update, UpdateOperator};
pub use provider::{connect, Backend, Provider, ProviderExt};
pub use provider::document::{DocumentClient, DocumentProvider};
pub use provider::memory::MemoryDocumentClient;
pub use provider::sql::{MysqlProvider, SqlProvider, SqliteProvider};
pub use storage::{SqlConnection, SqliteConnection};
pub use repository::Repository;
pub use registry::{Persist, Registry};
pub use connection::ConnectionInfo;
pub use config::{connect_from_config, StoreConfig};

/// Result type alias for Polystore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Polystore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} declares no identifier field")]
    MissingIdentifier(String),

    #[error("Required field {record}.{field} is null and has no default")]
    MissingRequiredField { record: String, field: String },

    #[error("Cannot coerce {found} into {expected} for {field}")]
    TypeCoercion {
        field: String,
        expected: FieldType,
        found: String,
    },

    #[error("Unsupported type {field_type} for {field}")]
    UnsupportedType { field: String, field_type: FieldType },

    #[error("Operator {operator} is not supported by the {backend} backend")]
    UnsupportedOperator { backend: Backend, operator: String },

    #[error("Schema declaration error: {0}")]
    SchemaDeclaration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{backend} error: {message}")]
    Backend { backend: Backend, message: String },

    #[error("No repository registered for {0}")]
    NotRegistered(String),

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Backend {
            backend: Backend::Sqlite,
            message: e.to_string(),
        }
    }
}
