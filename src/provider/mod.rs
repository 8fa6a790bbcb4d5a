//! Provider abstraction
//!
//! A [`Provider`] owns one backend connection and dispatches every CRUD call
//! to the matching translator. Callers see one contract regardless of the
//! engine; capability differences are exposed through probes such as
//! [`Provider::requires_schema`].

pub mod document;
pub mod memory;
pub mod sql;

use crate::connection::ConnectionInfo;
use crate::query::{Find, FindOptions, Update};
use crate::registry::Registry;
use crate::repository::Repository;
use crate::schema::{Record, SchemaMetadata, Shape};
use crate::value::Document;
use crate::{Error, Result};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use document::DocumentProvider;
use memory::MemoryDocumentClient;
use sql::SqliteProvider;

/// Storage engine behind a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Document,
    Sqlite,
    Mysql,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Document => "document",
            Backend::Sqlite => "sqlite",
            Backend::Mysql => "mysql",
        }
    }

    /// How records are laid out for this engine
    pub fn shape(&self) -> Shape {
        match self {
            Backend::Document => Shape::Nested,
            Backend::Sqlite | Backend::Mysql => Shape::Flattened,
        }
    }

    /// Whether tables must exist before records can be written
    pub fn requires_schema(&self) -> bool {
        !matches!(self, Backend::Document)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backend-independent CRUD contract.
///
/// Counts report matched rows or documents. Zero matches is `0`/`false`,
/// never an error.
pub trait Provider: Send + Sync {
    fn backend(&self) -> Backend;

    fn shape(&self) -> Shape {
        self.backend().shape()
    }

    /// True when [`Provider::initialize_schema`] must run before use
    fn requires_schema(&self) -> bool {
        self.backend().requires_schema()
    }

    fn insert(&self, collection: &str, document: &Document) -> Result<bool>;

    /// Insert a batch atomically, returning the number inserted
    fn insert_many(&self, collection: &str, documents: &[Document]) -> Result<u64>;

    /// Insert, or replace the non-identifier fields of the record with the same `id_key`
    fn upsert(&self, collection: &str, id_key: &str, document: &Document) -> Result<bool>;

    fn find(&self, collection: &str, find: &Find) -> Result<Vec<Document>> {
        self.find_with(collection, find, &FindOptions::default())
    }

    fn find_with(&self, collection: &str, find: &Find, options: &FindOptions) -> Result<Vec<Document>>;

    fn find_one(&self, collection: &str, find: &Find) -> Result<Option<Document>> {
        let found = self.find_with(collection, find, &FindOptions::new().limit(1))?;
        Ok(found.into_iter().next())
    }

    fn find_by_id(&self, collection: &str, id_key: &str, id: &str) -> Result<Option<Document>> {
        self.find_one(collection, &Find::new().equals(id_key, id))
    }

    fn update(&self, collection: &str, find: &Find, update: &Update) -> Result<u64>;

    fn update_one(&self, collection: &str, find: &Find, update: &Update) -> Result<bool>;

    fn update_by_id(&self, collection: &str, id_key: &str, id: &str, update: &Update) -> Result<bool> {
        self.update_one(collection, &Find::new().equals(id_key, id), update)
    }

    fn delete(&self, collection: &str, find: &Find) -> Result<u64>;

    fn delete_one(&self, collection: &str, find: &Find) -> Result<bool>;

    fn delete_by_id(&self, collection: &str, id_key: &str, id: &str) -> Result<bool> {
        self.delete_one(collection, &Find::new().equals(id_key, id))
    }

    /// Make sure the collection can hold records described by `metadata`.
    /// Safe to call repeatedly.
    fn initialize_schema(&self, collection: &str, metadata: &SchemaMetadata) -> Result<bool>;
}

/// Repository registration on a shared provider
pub trait ProviderExt {
    /// Return the registered repository for `T`, creating and caching it on
    /// first use. Relational backends get their table created here.
    fn add_repository<T: Record>(&self, registry: &Registry) -> Result<Arc<Repository<T>>>;
}

impl ProviderExt for Arc<dyn Provider> {
    fn add_repository<T: Record>(&self, registry: &Registry) -> Result<Arc<Repository<T>>> {
        registry.get_or_insert_with(|| {
            let repository = Repository::<T>::new(Arc::clone(self))?;
            if self.requires_schema() {
                repository.initialize_schema()?;
            }
            tracing::info!(
                "registered repository for {} on {} ({})",
                repository.schema().metadata().type_name,
                self.backend(),
                repository.collection()
            );
            Ok(repository)
        })
    }
}

/// Open a provider from a connection descriptor.
///
/// `sqlite` opens a bundled rusqlite connection (`:memory:` for an in-memory
/// database) and `memory` an in-process document store. Engines whose wire
/// client is external (`mongodb`, `mysql`) are built with
/// [`DocumentProvider::new`] or [`sql::MysqlProvider::new`] instead.
pub fn connect(info: &ConnectionInfo) -> Result<Arc<dyn Provider>> {
    match info.protocol.as_str() {
        "sqlite" => {
            let provider = match info.database.as_deref() {
                None | Some("") | Some(":memory:") => SqliteProvider::open_in_memory()?,
                Some(path) => SqliteProvider::open(Path::new(path))?,
            };
            Ok(Arc::new(provider))
        }
        "memory" => Ok(Arc::new(DocumentProvider::new(MemoryDocumentClient::new()))),
        "mongodb" | "mongodb+srv" => Err(Error::Backend {
            backend: Backend::Document,
            message: format!(
                "no wire client bundled for {}; wrap one in DocumentProvider::new",
                info.protocol
            ),
        }),
        "mysql" => Err(Error::Backend {
            backend: Backend::Mysql,
            message: format!(
                "no wire client bundled for {}; wrap one in MysqlProvider::new",
                info.protocol
            ),
        }),
        other => Err(Error::InvalidConnection(format!("unknown protocol '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_probes() {
        assert!(!Backend::Document.requires_schema());
        assert!(Backend::Sqlite.requires_schema());
        assert_eq!(Backend::Mysql.shape(), Shape::Flattened);
        assert_eq!(Backend::Document.shape(), Shape::Nested);
    }

    #[test]
    fn test_connect_dispatch() {
        let sqlite = connect(&ConnectionInfo::parse("sqlite::memory:").unwrap()).unwrap();
        assert_eq!(sqlite.backend(), Backend::Sqlite);

        let memory = connect(&ConnectionInfo::parse("memory://local/app").unwrap()).unwrap();
        assert_eq!(memory.backend(), Backend::Document);

        let mysql = ConnectionInfo::parse("mysql://root:pw@localhost:3306/app").unwrap();
        assert!(matches!(
            connect(&mysql),
            Err(Error::Backend { backend: Backend::Mysql, .. })
        ));

        let unknown = ConnectionInfo::parse("ftp://host/db").unwrap();
        assert!(matches!(connect(&unknown), Err(Error::InvalidConnection(_))));
    }

    #[test]
    fn test_connect_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let info = ConnectionInfo::parse(&format!("sqlite://{}", path.display())).unwrap();

        let provider = connect(&info).unwrap();
        assert_eq!(provider.backend(), Backend::Sqlite);
        assert_eq!(info.database.as_deref(), path.to_str());
    }
}
