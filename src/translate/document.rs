//! Document-store translation
//!
//! Equality criteria become bare field values, comparison criteria become
//! `{field: {$op: operand}}`. Update groups are emitted as one native update
//! map in set, increment, append order.

use crate::provider::Backend;
use crate::query::{Condition, Find, Update, UpdateOperator};
use crate::value::{Document, Value};
use crate::{Error, Result};

/// Translate a Find into a native filter. An empty Find matches everything.
pub fn filter(find: &Find) -> Result<Document> {
    let mut filter = Document::with_capacity(find.criteria().len());
    for (field, condition) in find.criteria() {
        let native = match condition {
            Condition::Eq(value) if looks_like_operators(value) => operator(condition, value.clone()),
            Condition::Eq(value) => value.clone(),
            Condition::Ne(value)
            | Condition::Gt(value)
            | Condition::Gte(value)
            | Condition::Lt(value)
            | Condition::Lte(value) => operator(condition, value.clone()),
            Condition::In(values) => operator(condition, Value::List(values.clone())),
            Condition::Exists(present) => operator(condition, Value::Bool(*present)),
            Condition::Unknown { operator, .. } => {
                return Err(Error::UnsupportedOperator {
                    backend: Backend::Document,
                    operator: operator.clone(),
                });
            }
        };
        filter.insert(field.clone(), native);
    }
    Ok(filter)
}

/// A map whose keys all start with `$` would be read back as an operator map
fn looks_like_operators(value: &Value) -> bool {
    matches!(value, Value::Map(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')))
}

fn operator(condition: &Condition, operand: Value) -> Value {
    let mut op = Document::with_capacity(1);
    op.insert(condition.operator().unwrap_or("$eq"), operand);
    Value::Map(op)
}

/// Translate an Update into a native update map
pub fn update(update: &Update) -> Result<Document> {
    let mut native = Document::new();
    for (op, fields) in update.ordered() {
        if fields.is_empty() {
            continue;
        }
        match op {
            UpdateOperator::Set | UpdateOperator::Append => {}
            UpdateOperator::Increment => {
                if let Some((field, value)) = fields.iter().find(|(_, v)| !v.is_numeric()) {
                    return Err(Error::Validation(format!(
                        "cannot increment '{}' by non-numeric {}",
                        field,
                        value.type_name()
                    )));
                }
            }
            UpdateOperator::Unknown(name) => {
                return Err(Error::UnsupportedOperator {
                    backend: Backend::Document,
                    operator: name.clone(),
                });
            }
        }
        native.insert(op.as_str(), fields.clone());
    }
    Ok(native)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_filter_translation() {
        let find = Find::new().greater_than("age", 18).equals("name", "sam");
        let native = filter(&find).unwrap();

        assert_eq!(
            native,
            doc! { "age" => doc! { "$gt" => 18 }, "name" => "sam" }
        );
    }

    #[test]
    fn test_empty_find_matches_all() {
        assert!(filter(&Find::new()).unwrap().is_empty());
    }

    #[test]
    fn test_membership_and_exists() {
        let find = Find::new().is_in("role", ["a", "b"]).exists("email", false);
        let native = filter(&find).unwrap();
        assert_eq!(
            native.get_path("role.$in"),
            Some(&Value::from(vec!["a", "b"]))
        );
        assert_eq!(native.get_path("email.$exists"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_equality_against_operator_shaped_map() {
        let find = Find::new().equals("meta", doc! { "$ref" => "users" });
        let native = filter(&find).unwrap();
        assert_eq!(
            native,
            doc! { "meta" => doc! { "$eq" => doc! { "$ref" => "users" } } }
        );

        let plain = filter(&Find::new().equals("meta", doc! { "kind" => "a" })).unwrap();
        assert_eq!(plain, doc! { "meta" => doc! { "kind" => "a" } });
    }

    #[test]
    fn test_unknown_filter_operator() {
        let find = Find::from_document(&doc! { "n" => doc! { "$regex" => "x" } }).unwrap();
        assert!(matches!(
            filter(&find),
            Err(Error::UnsupportedOperator { ref operator, .. }) if operator == "$regex"
        ));
    }

    #[test]
    fn test_update_translation_order() {
        let up = Update::new()
            .append_to_array("tags", "x")
            .increment("visits", 2)
            .set("age", 30);
        let native = update(&up).unwrap();

        assert_eq!(native.keys().collect::<Vec<_>>(), vec!["$set", "$inc", "$push"]);
        assert_eq!(native.get_path("$inc.visits"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_non_numeric_increment() {
        let up = Update::new().increment("visits", "two");
        assert!(matches!(update(&up), Err(Error::Validation(_))));
    }
}
