//! Document-store provider
//!
//! Records are stored as nested documents. The wire client is external and
//! reached through [`DocumentClient`]; [`crate::MemoryDocumentClient`] is the
//! bundled in-process implementation.

use super::{Backend, Provider};
use crate::query::{Find, FindOptions, Update};
use crate::schema::SchemaMetadata;
use crate::translate::document as translate;
use crate::value::Document;
use crate::{Error, Result};

/// Raw primitives of a document-store client, keyed by collection name and
/// native filter/update documents
pub trait DocumentClient: Send + Sync {
    fn insert_one(&self, collection: &str, document: Document) -> Result<()>;

    /// Insert every document or none, returning the number inserted
    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64>;

    fn find(&self, collection: &str, filter: &Document, options: &FindOptions) -> Result<Vec<Document>>;

    /// Apply a native update to the first (or every, when `multi`) match.
    /// With `upsert`, a document is created from the filter when nothing
    /// matches. Returns the number of documents matched or created.
    fn update(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        multi: bool,
        upsert: bool,
    ) -> Result<u64>;

    /// Remove the first (or every, when `multi`) match, returning the count
    fn delete(&self, collection: &str, filter: &Document, multi: bool) -> Result<u64>;
}

/// Provider over a document-store client
pub struct DocumentProvider {
    client: Box<dyn DocumentClient>,
}

impl DocumentProvider {
    pub fn new(client: impl DocumentClient + 'static) -> Self {
        Self {
            client: Box::new(client),
        }
    }

    pub fn client(&self) -> &dyn DocumentClient {
        self.client.as_ref()
    }

    fn native_update(&self, update: &Update) -> Result<Option<Document>> {
        if update.is_empty() {
            tracing::debug!("skipping empty update");
            return Ok(None);
        }
        Ok(Some(translate::update(update)?))
    }
}

impl Provider for DocumentProvider {
    fn backend(&self) -> Backend {
        Backend::Document
    }

    fn insert(&self, collection: &str, document: &Document) -> Result<bool> {
        tracing::debug!("insert into {}: {}", collection, document);
        self.client.insert_one(collection, document.clone())?;
        Ok(true)
    }

    fn insert_many(&self, collection: &str, documents: &[Document]) -> Result<u64> {
        if documents.is_empty() {
            return Ok(0);
        }
        tracing::debug!("insert {} documents into {}", documents.len(), collection);
        self.client.insert_many(collection, documents.to_vec())
    }

    fn upsert(&self, collection: &str, id_key: &str, document: &Document) -> Result<bool> {
        let id = match document.get(id_key) {
            Some(id) if !id.is_null() => id.clone(),
            _ => return Err(Error::MissingIdentifier(collection.to_string())),
        };

        let mut filter = Document::with_capacity(1);
        filter.insert(id_key, id.clone());

        let mut update = Update::set_all(document, id_key);
        if update.is_empty() {
            update = update.set(id_key, id);
        }
        let update = translate::update(&update)?;

        tracing::debug!("upsert into {}: {} {}", collection, filter, update);
        Ok(self.client.update(collection, &filter, &update, false, true)? > 0)
    }

    fn find_with(&self, collection: &str, find: &Find, options: &FindOptions) -> Result<Vec<Document>> {
        let filter = translate::filter(find)?;
        tracing::debug!("find in {}: {}", collection, filter);
        self.client.find(collection, &filter, options)
    }

    fn update(&self, collection: &str, find: &Find, update: &Update) -> Result<u64> {
        let Some(native) = self.native_update(update)? else {
            return Ok(0);
        };
        let filter = translate::filter(find)?;
        tracing::debug!("update {}: {} {}", collection, filter, native);
        self.client.update(collection, &filter, &native, true, false)
    }

    fn update_one(&self, collection: &str, find: &Find, update: &Update) -> Result<bool> {
        let Some(native) = self.native_update(update)? else {
            return Ok(false);
        };
        let filter = translate::filter(find)?;
        tracing::debug!("update one in {}: {} {}", collection, filter, native);
        Ok(self.client.update(collection, &filter, &native, false, false)? > 0)
    }

    fn delete(&self, collection: &str, find: &Find) -> Result<u64> {
        let filter = translate::filter(find)?;
        tracing::debug!("delete from {}: {}", collection, filter);
        self.client.delete(collection, &filter, true)
    }

    fn delete_one(&self, collection: &str, find: &Find) -> Result<bool> {
        let filter = translate::filter(find)?;
        tracing::debug!("delete one from {}: {}", collection, filter);
        Ok(self.client.delete(collection, &filter, false)? > 0)
    }

    /// Document stores create collections on first write
    fn initialize_schema(&self, collection: &str, _metadata: &SchemaMetadata) -> Result<bool> {
        tracing::debug!("no schema needed for collection {}", collection);
        Ok(true)
    }
}
