//! Typed repositories
//!
//! A [`Repository`] binds one record type to a provider and a collection.
//! Records are converted to documents in the provider's shape on the way in
//! and rebuilt from documents on the way out.

use crate::provider::Provider;
use crate::query::{Find, FindOptions, Update};
use crate::schema::{Record, RecordSchema};
use crate::value::Document;
use crate::{Error, Result};
use std::sync::Arc;

/// CRUD over records of type `T`
pub struct Repository<T> {
    provider: Arc<dyn Provider>,
    collection: String,
    schema: Arc<RecordSchema<T>>,
}

impl<T: Record> Repository<T> {
    /// Bind `T` to the collection its schema declares
    pub fn new(provider: Arc<dyn Provider>) -> Result<Self> {
        let collection = T::schema().metadata().collection.clone();
        Self::with_collection(provider, collection)
    }

    pub fn with_collection(provider: Arc<dyn Provider>, collection: impl Into<String>) -> Result<Self> {
        let schema = T::schema();
        schema.validate()?;
        Ok(Self {
            provider,
            collection: collection.into(),
            schema,
        })
    }

    pub fn schema(&self) -> &RecordSchema<T> {
        &self.schema
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Prepare the backing collection or table
    pub fn initialize_schema(&self) -> Result<bool> {
        self.provider
            .initialize_schema(&self.collection, self.schema.metadata())
    }

    fn id_key(&self) -> &str {
        self.schema.metadata().id_key()
    }

    fn require_identifier(&self) -> Result<()> {
        if self.schema.has_identifier() {
            Ok(())
        } else {
            Err(Error::MissingIdentifier(self.schema.metadata().type_name.clone()))
        }
    }

    fn to_document(&self, record: &mut T) -> Result<Document> {
        if self.schema.has_identifier() {
            self.schema.assign_identifier(record)?;
        }
        self.schema.to_document(record, self.provider.shape())
    }

    fn from_document(&self, doc: &Document) -> Result<T> {
        self.schema.from_document(doc, self.provider.shape())
    }

    // ========== Writes ==========

    /// Insert a record, assigning an identifier first if it has none
    pub fn insert(&self, record: &mut T) -> Result<bool> {
        let doc = self.to_document(record)?;
        self.provider.insert(&self.collection, &doc)
    }

    /// Insert every record or none
    pub fn insert_many(&self, records: &mut [T]) -> Result<u64> {
        let docs = records
            .iter_mut()
            .map(|record| self.to_document(record))
            .collect::<Result<Vec<_>>>()?;
        self.provider.insert_many(&self.collection, &docs)
    }

    /// Insert, or replace the stored record with the same identifier
    pub fn upsert(&self, record: &mut T) -> Result<bool> {
        self.require_identifier()?;
        let doc = self.to_document(record)?;
        self.provider.upsert(&self.collection, self.id_key(), &doc)
    }

    /// Insert the record if its identifier is unknown, otherwise overwrite
    /// every stored non-identifier field.
    pub fn save(&self, record: &mut T) -> Result<bool> {
        self.require_identifier()?;
        let doc = self.to_document(record)?;
        let id = self.schema.identifier(record)?;

        if self
            .provider
            .find_by_id(&self.collection, self.id_key(), id)?
            .is_none()
        {
            tracing::debug!("saving new {} {}", self.schema.metadata().type_name, id);
            return self.provider.insert(&self.collection, &doc);
        }

        let update = Update::set_all(&doc, self.id_key());
        if update.is_empty() {
            return Ok(true);
        }
        self.provider
            .update_by_id(&self.collection, self.id_key(), id, &update)
    }

    // ========== Reads ==========

    pub fn find(&self, find: &Find) -> Result<Vec<T>> {
        self.find_with(find, &FindOptions::default())
    }

    pub fn find_with(&self, find: &Find, options: &FindOptions) -> Result<Vec<T>> {
        self.provider
            .find_with(&self.collection, find, options)?
            .iter()
            .map(|doc| self.from_document(doc))
            .collect()
    }

    pub fn find_one(&self, find: &Find) -> Result<Option<T>> {
        self.provider
            .find_one(&self.collection, find)?
            .map(|doc| self.from_document(&doc))
            .transpose()
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        self.require_identifier()?;
        self.provider
            .find_by_id(&self.collection, self.id_key(), id)?
            .map(|doc| self.from_document(&doc))
            .transpose()
    }

    // ========== Updates ==========

    /// Apply `update` to every match, returning the number matched
    pub fn update(&self, find: &Find, update: &Update) -> Result<u64> {
        self.provider.update(&self.collection, find, update)
    }

    pub fn update_by_id(&self, id: &str, update: &Update) -> Result<bool> {
        self.require_identifier()?;
        self.provider
            .update_by_id(&self.collection, self.id_key(), id, update)
    }

    pub fn update_one(&self, find: &Find, update: &Update) -> Result<bool> {
        self.provider.update_one(&self.collection, find, update)
    }

    // ========== Deletes ==========

    pub fn delete(&self, find: &Find) -> Result<u64> {
        self.provider.delete(&self.collection, find)
    }

    pub fn delete_by_id(&self, id: &str) -> Result<bool> {
        self.require_identifier()?;
        self.provider
            .delete_by_id(&self.collection, self.id_key(), id)
    }

    pub fn delete_one(&self, find: &Find) -> Result<bool> {
        self.provider.delete_one(&self.collection, find)
    }

    /// Delete the stored copy of `record`. The record keeps its identifier.
    pub fn remove(&self, record: &T) -> Result<bool> {
        let id = self.schema.identifier(record)?;
        if id.is_empty() {
            return Ok(false);
        }
        self.delete_by_id(id)
    }
}
