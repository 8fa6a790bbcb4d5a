//! Per-type repository registry
//!
//! The registry is an ordinary value owned by the application. Repositories
//! are looked up by record type; nothing is constructed implicitly.

use crate::repository::Repository;
use crate::schema::Record;
use crate::{Error, Result};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Repositories keyed by record type
#[derive(Default)]
pub struct Registry {
    repositories: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the repository for `T`, replacing any previous one
    pub fn cache<T: Record>(&self, repository: Arc<Repository<T>>) {
        self.repositories
            .write()
            .insert(TypeId::of::<T>(), repository);
    }

    pub fn get<T: Record>(&self) -> Option<Arc<Repository<T>>> {
        let entry = self.repositories.read().get(&TypeId::of::<T>()).cloned()?;
        entry.downcast::<Repository<T>>().ok()
    }

    /// Return the repository for `T`, building and storing it with `build`
    /// when absent. The check and the insert happen under one write lock, so
    /// concurrent callers all receive the same repository.
    pub fn get_or_insert_with<T, F>(&self, build: F) -> Result<Arc<Repository<T>>>
    where
        T: Record,
        F: FnOnce() -> Result<Repository<T>>,
    {
        if let Some(existing) = self.get::<T>() {
            return Ok(existing);
        }

        let mut repositories = self.repositories.write();
        if let Some(entry) = repositories.get(&TypeId::of::<T>()) {
            if let Ok(existing) = Arc::clone(entry).downcast::<Repository<T>>() {
                return Ok(existing);
            }
        }
        let repository = Arc::new(build()?);
        repositories.insert(TypeId::of::<T>(), Arc::clone(&repository) as Arc<dyn Any + Send + Sync>);
        Ok(repository)
    }

    /// Like [`Registry::get`], failing with [`Error::NotRegistered`]
    pub fn require<T: Record>(&self) -> Result<Arc<Repository<T>>> {
        self.get::<T>()
            .ok_or_else(|| Error::NotRegistered(T::schema().metadata().type_name.clone()))
    }

    /// Forget the repository for `T`. Holders of the returned `Arc` can keep using it.
    pub fn remove<T: Record>(&self) -> Option<Arc<Repository<T>>> {
        let entry = self.repositories.write().remove(&TypeId::of::<T>())?;
        entry.downcast::<Repository<T>>().ok()
    }

    pub fn contains<T: Record>(&self) -> bool {
        self.repositories.read().contains_key(&TypeId::of::<T>())
    }

    pub fn clear(&self) {
        self.repositories.write().clear();
    }

    pub fn len(&self) -> usize {
        self.repositories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.read().is_empty()
    }
}

/// Persistence helpers on records, resolved through a [`Registry`]
pub trait Persist: Record {
    /// Insert or update this record through its registered repository
    fn save(&mut self, registry: &Registry) -> Result<bool>;

    /// Delete the stored copy. The in-memory identifier is kept.
    fn delete(&self, registry: &Registry) -> Result<bool>;
}

impl<T: Record> Persist for T {
    fn save(&mut self, registry: &Registry) -> Result<bool> {
        registry.require::<T>()?.save(self)
    }

    fn delete(&self, registry: &Registry) -> Result<bool> {
        registry.require::<T>()?.remove(self)
    }
}
