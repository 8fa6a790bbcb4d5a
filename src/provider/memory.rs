//! In-process document store
//!
//! Evaluates the same native filter and update documents a document-store
//! wire client would receive. Supported filter operators: `$and`, `$eq`,
//! `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`, plus dotted
//! paths into nested documents. Supported update operators: `$set`, `$inc`,
//! `$push`.

use super::Backend;
use super::document::DocumentClient;
use crate::query::{FindOptions, SortOrder};
use crate::value::{Document, Value};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

const ID_KEY: &str = "_id";

/// Collections of documents held behind a lock
#[derive(Default)]
pub struct MemoryDocumentClient {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryDocumentClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

fn backend_error(message: impl Into<String>) -> Error {
    Error::Backend {
        backend: Backend::Document,
        message: message.into(),
    }
}

/// Give the document an `_id` if it has none, then reject duplicates
fn prepare_insert(existing: &[Document], pending: &[Document], mut document: Document) -> Result<Document> {
    if document.get(ID_KEY).is_none_or(Value::is_null) {
        document.insert(ID_KEY, Uuid::new_v4().to_string());
    }
    let id = document.get(ID_KEY);
    if existing.iter().chain(pending).any(|d| d.get(ID_KEY) == id) {
        return Err(backend_error(format!(
            "duplicate key {}",
            id.map(Value::to_string).unwrap_or_default()
        )));
    }
    Ok(document)
}

// ========== Filter Evaluation ==========

fn matches(document: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter.iter() {
        let matched = if key == "$and" {
            let Value::List(clauses) = condition else {
                return Err(backend_error("$and expects a list"));
            };
            let mut all = true;
            for clause in clauses {
                let Value::Map(clause) = clause else {
                    return Err(backend_error("$and clauses must be documents"));
                };
                all &= matches(document, clause)?;
            }
            all
        } else {
            field_matches(document.get_path(key), condition)?
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_operator_map(value: &Value) -> Option<&Document> {
    match value {
        Value::Map(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => Some(ops),
        _ => None,
    }
}

fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(Value::List(items)) if !matches!(expected, Value::List(_)) => {
            items.iter().any(|item| item.loosely_equals(expected))
        }
        Some(actual) => actual.loosely_equals(expected),
    }
}

fn field_matches(actual: Option<&Value>, condition: &Value) -> Result<bool> {
    let Some(ops) = is_operator_map(condition) else {
        return Ok(equals(actual, condition));
    };

    for (op, operand) in ops.iter() {
        let ordering = || actual.and_then(|a| a.compare(operand));
        let matched = match op {
            "$eq" => equals(actual, operand),
            "$ne" => !equals(actual, operand),
            "$gt" => ordering() == Some(Ordering::Greater),
            "$gte" => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
            "$lt" => ordering() == Some(Ordering::Less),
            "$lte" => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            "$in" | "$nin" => {
                let Value::List(candidates) = operand else {
                    return Err(backend_error(format!("{} expects a list", op)));
                };
                let found = candidates.iter().any(|c| equals(actual, c));
                if op == "$in" { found } else { !found }
            }
            "$exists" => {
                let wanted = operand.as_bool().unwrap_or(true);
                actual.is_some() == wanted
            }
            other => return Err(backend_error(format!("unknown operator {}", other))),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

// ========== Update Application ==========

fn apply_update(document: &Document, update: &Document) -> Result<Document> {
    let mut updated = document.clone();
    for (op, fields) in update.iter() {
        let Value::Map(fields) = fields else {
            return Err(backend_error(format!("{} expects a document", op)));
        };
        for (path, operand) in fields.iter() {
            let next = match op {
                "$set" => operand.clone(),
                "$inc" => increment(updated.get_path(path), operand, path)?,
                "$push" => match updated.get_path(path) {
                    None | Some(Value::Null) => Value::List(vec![operand.clone()]),
                    Some(Value::List(items)) => {
                        let mut items = items.clone();
                        items.push(operand.clone());
                        Value::List(items)
                    }
                    Some(other) => {
                        return Err(backend_error(format!(
                            "cannot push to non-array field {} ({})",
                            path,
                            other.type_name()
                        )));
                    }
                },
                other => return Err(backend_error(format!("unknown update operator {}", other))),
            };
            updated
                .set_path(path, next)
                .map_err(|segment| backend_error(format!("cannot traverse {} in {}", segment, path)))?;
        }
    }
    Ok(updated)
}

fn increment(current: Option<&Value>, amount: &Value, path: &str) -> Result<Value> {
    let current = current.cloned().unwrap_or(Value::Int(0));
    match (&current, amount) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(*b)
            .map(Value::Int)
            .ok_or_else(|| backend_error(format!("increment of {} overflows", path))),
        (Value::Null, Value::Int(b)) => Ok(Value::Int(*b)),
        (Value::Null, Value::Float(b)) => Ok(Value::Float(*b)),
        (a, b) if a.is_numeric() && b.is_numeric() => Ok(Value::Float(
            a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default(),
        )),
        _ => Err(backend_error(format!(
            "cannot increment {} ({}) by {}",
            path,
            current.type_name(),
            amount.type_name()
        ))),
    }
}

/// Seed a new document from the equality entries of an upsert filter
fn seed_from_filter(filter: &Document) -> Result<Document> {
    let mut seed = Document::new();
    for (key, value) in filter.iter() {
        if key.starts_with('$') || is_operator_map(value).is_some() {
            continue;
        }
        seed.set_path(key, value.clone())
            .map_err(|segment| backend_error(format!("cannot traverse {} in {}", segment, key)))?;
    }
    Ok(seed)
}

fn sort_documents(documents: &mut [Document], options: &FindOptions) {
    if options.sort.is_empty() {
        return;
    }
    documents.sort_by(|a, b| {
        for key in &options.sort {
            let ordering = match (a.get_path(&key.field), b.get_path(&key.field)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
            };
            let ordering = match key.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

impl DocumentClient for MemoryDocumentClient {
    fn insert_one(&self, collection: &str, document: Document) -> Result<()> {
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        let document = prepare_insert(docs, &[], document)?;
        docs.push(document);
        Ok(())
    }

    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64> {
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();

        let mut pending = Vec::with_capacity(documents.len());
        for document in documents {
            let document = prepare_insert(docs, &pending, document)?;
            pending.push(document);
        }
        let count = pending.len() as u64;
        docs.extend(pending);
        Ok(count)
    }

    fn find(&self, collection: &str, filter: &Document, options: &FindOptions) -> Result<Vec<Document>> {
        let collections = self.collections.read();
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for doc in docs {
            if matches(doc, filter)? {
                found.push(doc.clone());
            }
        }
        sort_documents(&mut found, options);

        let skip = options.skip.unwrap_or(0) as usize;
        let limit = options.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(skip).take(limit).collect())
    }

    fn update(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        multi: bool,
        upsert: bool,
    ) -> Result<u64> {
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();

        let mut changes = Vec::new();
        for (index, doc) in docs.iter().enumerate() {
            if matches(doc, filter)? {
                changes.push((index, apply_update(doc, update)?));
                if !multi {
                    break;
                }
            }
        }

        if changes.is_empty() {
            if !upsert {
                return Ok(0);
            }
            let created = apply_update(&seed_from_filter(filter)?, update)?;
            let created = prepare_insert(docs, &[], created)?;
            docs.push(created);
            return Ok(1);
        }

        let matched = changes.len() as u64;
        for (index, updated) in changes {
            docs[index] = updated;
        }
        Ok(matched)
    }

    fn delete(&self, collection: &str, filter: &Document, multi: bool) -> Result<u64> {
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut doomed = Vec::new();
        for (index, doc) in docs.iter().enumerate() {
            if matches(doc, filter)? {
                doomed.push(index);
                if !multi {
                    break;
                }
            }
        }
        for index in doomed.iter().rev() {
            docs.remove(*index);
        }
        Ok(doomed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn client() -> MemoryDocumentClient {
        let client = MemoryDocumentClient::new();
        client
            .insert_many(
                "people",
                vec![
                    doc! { "_id" => "a", "name" => "sam", "age" => 30, "addr" => doc! { "city" => "x" } },
                    doc! { "_id" => "b", "name" => "sam", "age" => 12, "tags" => vec!["kid"] },
                    doc! { "_id" => "c", "name" => "ana", "age" => 45.5 },
                ],
            )
            .unwrap();
        client
    }

    fn ids(docs: &[Document]) -> Vec<String> {
        docs.iter()
            .filter_map(|d| d.get("_id").and_then(Value::as_str).map(String::from))
            .collect()
    }

    #[test]
    fn test_operators() {
        let client = client();
        let all = FindOptions::new();

        let adults = client
            .find("people", &doc! { "age" => doc! { "$gte" => 30 } }, &all)
            .unwrap();
        assert_eq!(ids(&adults), vec!["a", "c"]);

        let not_sam = client
            .find("people", &doc! { "name" => doc! { "$ne" => "sam" } }, &all)
            .unwrap();
        assert_eq!(ids(&not_sam), vec!["c"]);

        let listed = client
            .find("people", &doc! { "_id" => doc! { "$in" => vec!["a", "c"] } }, &all)
            .unwrap();
        assert_eq!(ids(&listed), vec!["a", "c"]);

        let tagged = client
            .find("people", &doc! { "tags" => doc! { "$exists" => true } }, &all)
            .unwrap();
        assert_eq!(ids(&tagged), vec!["b"]);

        let nested = client
            .find("people", &doc! { "addr.city" => "x" }, &all)
            .unwrap();
        assert_eq!(ids(&nested), vec!["a"]);

        let array_member = client.find("people", &doc! { "tags" => "kid" }, &all).unwrap();
        assert_eq!(ids(&array_member), vec!["b"]);
    }

    #[test]
    fn test_unknown_operator_is_backend_error() {
        let err = client()
            .find("people", &doc! { "name" => doc! { "$regex" => "s" } }, &FindOptions::new())
            .unwrap_err();
        assert!(matches!(err, Error::Backend { backend: Backend::Document, .. }));
    }

    #[test]
    fn test_sort_skip_limit() {
        let options = FindOptions::new()
            .sort("age", SortOrder::Descending)
            .skip(1)
            .limit(1);
        let found = client().find("people", &Document::new(), &options).unwrap();
        assert_eq!(ids(&found), vec!["a"]);
    }

    #[test]
    fn test_update_operators() {
        let client = client();
        let update = doc! {
            "$set" => doc! { "addr.zip" => "1000" },
            "$inc" => doc! { "age" => 1 },
            "$push" => doc! { "tags" => "new" },
        };
        let matched = client
            .update("people", &doc! { "_id" => "a" }, &update, false, false)
            .unwrap();
        assert_eq!(matched, 1);

        let a = &client
            .find("people", &doc! { "_id" => "a" }, &FindOptions::new())
            .unwrap()[0];
        assert_eq!(a.get("age"), Some(&Value::Int(31)));
        assert_eq!(a.get_path("addr.zip"), Some(&Value::from("1000")));
        assert_eq!(a.get("tags"), Some(&Value::from(vec!["new"])));
    }

    #[test]
    fn test_failed_update_leaves_document_untouched() {
        let client = client();
        let update = doc! { "$set" => doc! { "age" => 99 }, "$inc" => doc! { "name" => 1 } };
        assert!(client
            .update("people", &doc! { "_id" => "a" }, &update, false, false)
            .is_err());

        let a = &client
            .find("people", &doc! { "_id" => "a" }, &FindOptions::new())
            .unwrap()[0];
        assert_eq!(a.get("age"), Some(&Value::Int(30)));
    }

    #[test]
    fn test_eq_operand_shaped_like_operators() {
        let client = MemoryDocumentClient::new();
        client
            .insert_one("links", doc! { "_id" => "l", "meta" => doc! { "$ref" => "users" } })
            .unwrap();

        let filter = doc! { "meta" => doc! { "$eq" => doc! { "$ref" => "users" } } };
        let found = client.find("links", &filter, &FindOptions::new()).unwrap();
        assert_eq!(ids(&found), vec!["l"]);
    }

    #[test]
    fn test_increment_overflow_is_backend_error() {
        let client = MemoryDocumentClient::new();
        client
            .insert_one("counters", doc! { "_id" => "n", "n" => i64::MAX })
            .unwrap();

        let err = client
            .update("counters", &Document::new(), &doc! { "$inc" => doc! { "n" => 1 } }, true, false)
            .unwrap_err();
        assert!(matches!(err, Error::Backend { backend: Backend::Document, .. }));

        let stored = &client
            .find("counters", &Document::new(), &FindOptions::new())
            .unwrap()[0];
        assert_eq!(stored.get("n"), Some(&Value::Int(i64::MAX)));
    }

    #[test]
    fn test_upsert_creates_from_filter() {
        let client = MemoryDocumentClient::new();
        let created = client
            .update(
                "people",
                &doc! { "_id" => "z" },
                &doc! { "$set" => doc! { "name" => "zoe" } },
                false,
                true,
            )
            .unwrap();
        assert_eq!(created, 1);
        assert_eq!(client.count("people"), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let client = client();
        assert!(client.insert_one("people", doc! { "_id" => "a" }).is_err());

        let batch = vec![doc! { "_id" => "x" }, doc! { "_id" => "x" }];
        assert!(client.insert_many("people", batch).is_err());
        assert_eq!(client.count("people"), 3);
    }

    #[test]
    fn test_generated_id() {
        let client = MemoryDocumentClient::new();
        client.insert_one("t", doc! { "n" => 1 }).unwrap();
        let found = client.find("t", &Document::new(), &FindOptions::new()).unwrap();
        assert!(found[0].get("_id").and_then(Value::as_str).is_some());
    }
}
