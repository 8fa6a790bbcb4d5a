//! Storage Layer - relational connections
//!
//! [`SqlConnection`] is the narrow surface the SQL provider drives. A bundled
//! SQLite implementation lives in [`sqlite`]; other engines plug in their own
//! driver behind the same trait.

pub mod sqlite;

pub use sqlite::SqliteConnection;

use crate::Result;
use crate::value::{Document, Value};

/// A blocking relational connection executing parameterized statements
pub trait SqlConnection: Send {
    /// Execute a statement, returning the number of affected rows
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Run a query and return every row as a document keyed by column name
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Document>>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}

/// Scoped transaction: rolls back on drop unless committed
pub struct Transaction<'a> {
    conn: &'a mut dyn SqlConnection,
    committed: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(conn: &'a mut dyn SqlConnection) -> Result<Self> {
        conn.begin()?;
        Ok(Self {
            conn,
            committed: false,
        })
    }

    pub fn connection(&mut self) -> &mut dyn SqlConnection {
        &mut *self.conn
    }

    pub fn commit(mut self) -> Result<()> {
        self.conn.commit()?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        tracing::warn!("rolling back uncommitted transaction");
        if let Err(e) = self.conn.rollback() {
            tracing::warn!("rollback failed: {}", e);
        }
    }
}
