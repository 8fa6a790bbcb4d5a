//! Backend-agnostic Find / Update descriptors
//!
//! Both descriptors store plain ordered operations, never backend syntax.
//! Translation into document filters or SQL happens in [`crate::translate`].
//! Nothing is validated while building; unsupported operators and bad
//! operands surface when a translator sees them.

use crate::value::{Document, Value};
use crate::{Error, Result};

/// A single predicate on one field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Exists(bool),
    /// An operator this crate does not know, kept so translators can report it
    Unknown { operator: String, operand: Value },
}

impl Condition {
    /// Native operator name, `None` for implicit equality
    pub fn operator(&self) -> Option<&str> {
        match self {
            Condition::Eq(_) => None,
            Condition::Ne(_) => Some("$ne"),
            Condition::Gt(_) => Some("$gt"),
            Condition::Gte(_) => Some("$gte"),
            Condition::Lt(_) => Some("$lt"),
            Condition::Lte(_) => Some("$lte"),
            Condition::In(_) => Some("$in"),
            Condition::Exists(_) => Some("$exists"),
            Condition::Unknown { operator, .. } => Some(operator),
        }
    }

    fn parse(operator: &str, operand: Value) -> Result<Self> {
        Ok(match operator {
            "$eq" => Condition::Eq(operand),
            "$ne" => Condition::Ne(operand),
            "$gt" => Condition::Gt(operand),
            "$gte" => Condition::Gte(operand),
            "$lt" => Condition::Lt(operand),
            "$lte" => Condition::Lte(operand),
            "$in" => match operand {
                Value::List(items) => Condition::In(items),
                other => {
                    return Err(Error::Validation(format!(
                        "$in expects a list, found {}",
                        other.type_name()
                    )));
                }
            },
            "$exists" => match operand {
                Value::Bool(b) => Condition::Exists(b),
                Value::Int(i) => Condition::Exists(i != 0),
                other => {
                    return Err(Error::Validation(format!(
                        "$exists expects a boolean, found {}",
                        other.type_name()
                    )));
                }
            },
            other => Condition::Unknown {
                operator: other.to_string(),
                operand,
            },
        })
    }
}

/// Selection predicate: field conditions joined by AND
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Find {
    criteria: Vec<(String, Condition)>,
}

impl Find {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    pub fn not_equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Ne(value.into()))
    }

    pub fn greater_than(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Gt(value.into()))
    }

    pub fn greater_or_equal(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Gte(value.into()))
    }

    pub fn less_than(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Lt(value.into()))
    }

    pub fn less_or_equal(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Lte(value.into()))
    }

    pub fn is_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.with(field, Condition::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn exists(self, field: impl Into<String>, present: bool) -> Self {
        self.with(field, Condition::Exists(present))
    }

    /// Set the condition for a field, replacing any earlier one in place
    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        let field = field.into();
        match self.criteria.iter_mut().find(|(f, _)| *f == field) {
            Some((_, slot)) => *slot = condition,
            None => self.criteria.push((field, condition)),
        }
        self
    }

    pub fn criteria(&self) -> &[(String, Condition)] {
        &self.criteria
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Parse a filter written as a document, e.g. `{age: {$gt: 18}, name: "sam"}`.
    ///
    /// A map whose keys all start with `$` is read as an operator; any other
    /// value means equality. Each field may carry one operator.
    pub fn from_document(doc: &Document) -> Result<Self> {
        let mut find = Find::new();
        for (field, value) in doc.iter() {
            let condition = match value {
                Value::Map(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => {
                    if ops.len() > 1 {
                        return Err(Error::Validation(format!(
                            "field '{}' carries {} operators, only one is supported",
                            field,
                            ops.len()
                        )));
                    }
                    let (operator, operand) = ops
                        .iter()
                        .next()
                        .ok_or_else(|| Error::Validation(format!("empty operator for '{}'", field)))?;
                    Condition::parse(operator, operand.clone())?
                }
                other => Condition::Eq(other.clone()),
            };
            find = find.with(field, condition);
        }
        Ok(find)
    }
}

/// Mutation operator of an [`Update`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpdateOperator {
    Set,
    Increment,
    Append,
    Unknown(String),
}

impl UpdateOperator {
    pub fn as_str(&self) -> &str {
        match self {
            UpdateOperator::Set => "$set",
            UpdateOperator::Increment => "$inc",
            UpdateOperator::Append => "$push",
            UpdateOperator::Unknown(name) => name,
        }
    }

    /// Position in the fixed set, increment, append application order
    pub fn rank(&self) -> usize {
        match self {
            UpdateOperator::Set => 0,
            UpdateOperator::Increment => 1,
            UpdateOperator::Append => 2,
            UpdateOperator::Unknown(_) => 3,
        }
    }

    fn parse(name: &str) -> Self {
        match name {
            "$set" => UpdateOperator::Set,
            "$inc" => UpdateOperator::Increment,
            "$push" => UpdateOperator::Append,
            other => UpdateOperator::Unknown(other.to_string()),
        }
    }
}

/// Mutation set: operator groups of field assignments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    operations: Vec<(UpdateOperator, Document)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(UpdateOperator::Set, field, value)
    }

    pub fn increment(self, field: impl Into<String>, amount: impl Into<Value>) -> Self {
        self.with(UpdateOperator::Increment, field, amount)
    }

    pub fn append_to_array(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(UpdateOperator::Append, field, value)
    }

    pub fn with(
        mut self,
        operator: UpdateOperator,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        match self.operations.iter_mut().find(|(op, _)| *op == operator) {
            Some((_, fields)) => {
                fields.insert(field, value);
            }
            None => {
                let mut fields = Document::new();
                fields.insert(field, value);
                self.operations.push((operator, fields));
            }
        }
        self
    }

    /// Operator groups in the order they were first used
    pub fn operations(&self) -> &[(UpdateOperator, Document)] {
        &self.operations
    }

    /// Operator groups in application order: set, increment, append, unknown
    pub fn ordered(&self) -> Vec<&(UpdateOperator, Document)> {
        let mut ordered: Vec<_> = self.operations.iter().collect();
        ordered.sort_by_key(|(op, _)| op.rank());
        ordered
    }

    /// True when no operator assigns any field
    pub fn is_empty(&self) -> bool {
        self.operations.iter().all(|(_, fields)| fields.is_empty())
    }

    /// Build a `$set` of every entry in a document, skipping `skip_key`
    pub fn set_all(doc: &Document, skip_key: &str) -> Self {
        doc.iter()
            .filter(|(k, _)| *k != skip_key)
            .fold(Update::new(), |update, (k, v)| update.set(k, v.clone()))
    }

    /// Parse an update written as a document, e.g. `{$set: {age: 30}}`
    pub fn from_document(doc: &Document) -> Result<Self> {
        let mut update = Update::new();
        for (operator, fields) in doc.iter() {
            let Value::Map(fields) = fields else {
                return Err(Error::Validation(format!(
                    "update operator '{}' expects a map, found {}",
                    operator,
                    fields.type_name()
                )));
            };
            let operator = UpdateOperator::parse(operator);
            for (field, value) in fields.iter() {
                update = update.with(operator.clone(), field, value.clone());
            }
        }
        Ok(update)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

/// Paging and ordering for `find`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub sort: Vec<SortKey>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            order,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_find_replaces_field_in_place() {
        let find = Find::new()
            .greater_than("age", 18)
            .equals("name", "sam")
            .less_than("age", 65);

        assert_eq!(
            find.criteria(),
            &[
                ("age".to_string(), Condition::Lt(Value::Int(65))),
                ("name".to_string(), Condition::Eq(Value::from("sam"))),
            ]
        );
    }

    #[test]
    fn test_find_from_document() {
        let filter = doc! {
            "age" => doc! { "$gt" => 18 },
            "name" => "sam",
            "role" => doc! { "$in" => vec!["admin", "dev"] },
        };
        let find = Find::from_document(&filter).unwrap();
        let criteria = find.criteria();

        assert_eq!(criteria[0], ("age".to_string(), Condition::Gt(Value::Int(18))));
        assert_eq!(criteria[1], ("name".to_string(), Condition::Eq(Value::from("sam"))));
        assert!(matches!(criteria[2].1, Condition::In(ref v) if v.len() == 2));
    }

    #[test]
    fn test_find_from_document_keeps_unknown_operator() {
        let find = Find::from_document(&doc! { "name" => doc! { "$regex" => "^s" } }).unwrap();
        assert_eq!(find.criteria()[0].1.operator(), Some("$regex"));
    }

    #[test]
    fn test_find_from_document_rejects_two_operators() {
        let filter = doc! { "age" => doc! { "$gt" => 1, "$lt" => 5 } };
        assert!(matches!(Find::from_document(&filter), Err(Error::Validation(_))));
    }

    #[test]
    fn test_plain_map_is_equality() {
        let filter = doc! { "meta" => doc! { "k" => 1 } };
        let find = Find::from_document(&filter).unwrap();
        assert!(matches!(find.criteria()[0].1, Condition::Eq(Value::Map(_))));
    }

    #[test]
    fn test_update_groups_and_order() {
        let update = Update::new()
            .append_to_array("tags", "x")
            .increment("visits", 1)
            .set("name", "sam")
            .set("age", 30);

        assert_eq!(update.operations()[0].0, UpdateOperator::Append);
        let ordered: Vec<&UpdateOperator> = update.ordered().into_iter().map(|(op, _)| op).collect();
        assert_eq!(
            ordered,
            vec![&UpdateOperator::Set, &UpdateOperator::Increment, &UpdateOperator::Append]
        );
        assert_eq!(update.ordered()[0].1.len(), 2);
    }

    #[test]
    fn test_update_from_document() {
        let update = Update::from_document(&doc! {
            "$set" => doc! { "age" => 30 },
            "$rename" => doc! { "a" => "b" },
        })
        .unwrap();
        assert_eq!(update.operations().len(), 2);
        assert_eq!(update.operations()[1].0, UpdateOperator::Unknown("$rename".into()));

        assert!(Update::from_document(&doc! { "$set" => 1 }).is_err());
    }

    #[test]
    fn test_update_empty() {
        assert!(Update::new().is_empty());
        assert!(!Update::new().set("a", 1).is_empty());
        let set_all = Update::set_all(&doc! { "_id" => "x", "a" => 1 }, "_id");
        assert_eq!(set_all.operations()[0].1.keys().collect::<Vec<_>>(), vec!["a"]);
    }
}
