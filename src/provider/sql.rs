//! Relational provider
//!
//! One implementation serves every SQL engine: statements come from a
//! [`SqlTranslator`] for the engine's dialect and run on a boxed
//! [`SqlConnection`]. Records are stored flattened, one column per field.

use super::{Backend, Provider};
use crate::query::{Find, FindOptions, Update};
use crate::schema::SchemaMetadata;
use crate::storage::{SqlConnection, SqliteConnection, Transaction};
use crate::translate::{MysqlDialect, SqlDialect, SqlFragment, SqlTranslator, SqliteDialect};
use crate::value::Document;
use crate::Result;
use parking_lot::Mutex;
use std::path::Path;

/// Provider over a relational connection
pub struct SqlProvider<D> {
    conn: Mutex<Box<dyn SqlConnection>>,
    translator: SqlTranslator<D>,
}

/// SQLite through the bundled rusqlite connection
pub type SqliteProvider = SqlProvider<SqliteDialect>;

/// MySQL through a caller-supplied connection
pub type MysqlProvider = SqlProvider<MysqlDialect>;

impl<D: SqlDialect + Default> SqlProvider<D> {
    pub fn new(connection: impl SqlConnection + 'static) -> Self {
        Self {
            conn: Mutex::new(Box::new(connection)),
            translator: SqlTranslator::new(D::default()),
        }
    }
}

impl SqliteProvider {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        tracing::debug!("opening sqlite database at {}", path.display());
        Ok(Self::new(SqliteConnection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(SqliteConnection::open_in_memory()?))
    }
}

impl<D: SqlDialect> SqlProvider<D> {
    pub fn translator(&self) -> &SqlTranslator<D> {
        &self.translator
    }

    fn execute(&self, statement: SqlFragment) -> Result<u64> {
        tracing::debug!("{} {:?}", statement.sql, statement.params);
        self.conn.lock().execute(&statement.sql, &statement.params)
    }

    fn query(&self, statement: SqlFragment) -> Result<Vec<Document>> {
        tracing::debug!("{} {:?}", statement.sql, statement.params);
        self.conn.lock().query(&statement.sql, &statement.params)
    }
}

impl<D: SqlDialect> Provider for SqlProvider<D> {
    fn backend(&self) -> Backend {
        self.translator.dialect().backend()
    }

    fn insert(&self, collection: &str, document: &Document) -> Result<bool> {
        let statement = self.translator.insert(collection, document)?;
        Ok(self.execute(statement)? > 0)
    }

    fn insert_many(&self, collection: &str, documents: &[Document]) -> Result<u64> {
        if documents.is_empty() {
            return Ok(0);
        }
        let statements = documents
            .iter()
            .map(|doc| self.translator.insert(collection, doc))
            .collect::<Result<Vec<_>>>()?;

        let mut guard = self.conn.lock();
        let mut tx = Transaction::begin(&mut **guard)?;
        let mut inserted = 0;
        for statement in &statements {
            inserted += tx.connection().execute(&statement.sql, &statement.params)?;
        }
        tx.commit()?;

        tracing::debug!("inserted {} rows into {}", inserted, collection);
        Ok(inserted)
    }

    fn upsert(&self, collection: &str, id_key: &str, document: &Document) -> Result<bool> {
        let statement = self.translator.upsert(collection, id_key, document)?;
        Ok(self.execute(statement)? > 0)
    }

    fn find_with(&self, collection: &str, find: &Find, options: &FindOptions) -> Result<Vec<Document>> {
        let statement = self.translator.select(collection, find, options)?;
        self.query(statement)
    }

    fn update(&self, collection: &str, find: &Find, update: &Update) -> Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }
        let statement = self.translator.update(collection, find, update)?;
        self.execute(statement)
    }

    fn update_one(&self, collection: &str, find: &Find, update: &Update) -> Result<bool> {
        if update.is_empty() {
            return Ok(false);
        }
        let statement = self.translator.update_one(collection, find, update)?;
        Ok(self.execute(statement)? > 0)
    }

    fn delete(&self, collection: &str, find: &Find) -> Result<u64> {
        let statement = self.translator.delete(collection, find)?;
        self.execute(statement)
    }

    fn delete_one(&self, collection: &str, find: &Find) -> Result<bool> {
        let statement = self.translator.delete_one(collection, find)?;
        Ok(self.execute(statement)? > 0)
    }

    /// Create the table when the engine reports it missing
    fn initialize_schema(&self, collection: &str, metadata: &SchemaMetadata) -> Result<bool> {
        let probe = self.translator.table_exists(collection)?;
        if !self.query(probe)?.is_empty() {
            tracing::debug!("table {} already exists", collection);
            return Ok(true);
        }

        let create = self.translator.create_table(collection, metadata)?;
        self.execute(create)?;
        tracing::info!("created table {} for {}", collection, metadata.type_name);
        Ok(true)
    }
}
