//! Record metadata and the schema reflector
//!
//! A record type declares its persisted fields once through [`Record::describe`].
//! The resulting [`RecordSchema`] is derived once per type and cached for the
//! life of the process. It carries:
//! - the ordered [`FieldDescriptor`] table ([`SchemaMetadata`])
//! - typed accessors used to move values between a record and a [`Document`]
//!
//! Documents come in two shapes. Document stores keep embedded records as
//! nested maps ([`Shape::Nested`]); relational engines flatten them into
//! prefixed columns ([`Shape::Flattened`]).

use crate::field::{FieldType, FieldValue};
use crate::value::{Document, Value};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

/// Storage key used when a record declares its identifier without a name
pub const DEFAULT_ID_KEY: &str = "_id";

/// Separator appended to an embedded field name to form its default prefix
pub const EMBEDDED_SEPARATOR: &str = "__";

/// How embedded records are laid out in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Embedded records become nested maps under the field name
    Nested,
    /// Embedded fields are hoisted to the top level as `<prefix><name>`
    Flattened,
}

/// Role a field plays in its record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    Identifier,
    Property,
    Embedded,
}

/// Metadata for one persisted field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name in the record type
    pub name: String,
    /// Key used in documents and column names
    pub storage_name: String,
    pub field_type: FieldType,
    pub role: FieldRole,
    pub required: bool,
    /// String-encoded default, coerced to `field_type` when applied
    pub default: Option<String>,
    /// Transient fields are never persisted
    pub transient: bool,
    /// Prefix applied to nested storage names when flattening
    pub prefix: Option<String>,
    /// Descriptors of the embedded record type
    pub nested: Vec<FieldDescriptor>,
}

/// A flattened relational column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub field_type: FieldType,
}

/// The ordered field table of a record type
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaMetadata {
    /// Short name of the record type
    pub type_name: String,
    /// Collection or table the records live in
    pub collection: String,
    pub fields: Vec<FieldDescriptor>,
}

impl SchemaMetadata {
    /// The identifier descriptor, if the type declares one
    pub fn identifier(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.role == FieldRole::Identifier)
    }

    /// Storage key of the identifier, or [`DEFAULT_ID_KEY`]
    pub fn id_key(&self) -> &str {
        self.identifier()
            .map(|f| f.storage_name.as_str())
            .unwrap_or(DEFAULT_ID_KEY)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Relational columns in declaration order.
    ///
    /// The identifier and transient fields are left out; embedded fields are
    /// flattened using their accumulated prefix.
    pub fn columns(&self) -> Vec<Column> {
        let mut columns = Vec::new();
        flatten_columns(&self.fields, "", &mut columns);
        columns
    }
}

fn flatten_columns(fields: &[FieldDescriptor], prefix: &str, out: &mut Vec<Column>) {
    for field in fields {
        if field.transient {
            continue;
        }
        match field.role {
            FieldRole::Identifier => {}
            FieldRole::Property => out.push(Column {
                name: format!("{}{}", prefix, field.storage_name),
                field_type: field.field_type,
            }),
            FieldRole::Embedded => {
                let nested_prefix = format!("{}{}", prefix, field.prefix.as_deref().unwrap_or(""));
                flatten_columns(&field.nested, &nested_prefix, out);
            }
        }
    }
}

/// A type that can be persisted.
///
/// ```
/// use polystore::{Prop, Record, SchemaBuilder};
///
/// #[derive(Debug, Default)]
/// struct User {
///     id: String,
///     username: String,
///     age: i64,
/// }
///
/// impl Record for User {
///     fn describe(schema: &mut SchemaBuilder<Self>) {
///         schema
///             .collection("users")
///             .id(|u| &u.id, |u| &mut u.id)
///             .prop(Prop::new("username").required(), |u| &u.username, |u| &mut u.username)
///             .prop(Prop::new("age"), |u| &u.age, |u| &mut u.age);
///     }
/// }
///
/// let user = User::instantiate();
/// assert!(!user.id.is_empty());
/// assert_eq!(User::schema().metadata().collection, "users");
/// ```
pub trait Record: Default + Send + Sync + 'static {
    /// Register the persisted fields of this type
    fn describe(schema: &mut SchemaBuilder<Self>);

    /// The cached schema for this type
    fn schema() -> Arc<RecordSchema<Self>> {
        schema_of::<Self>()
    }

    /// A zero-valued record carrying a freshly generated identifier
    fn instantiate() -> Self {
        Self::schema().instantiate()
    }
}

static SCHEMAS: LazyLock<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> =
    LazyLock::new(Default::default);

/// Resolve the cached schema of `T`, deriving it on first use.
///
/// The schema is built outside the lock so embedded types can resolve their
/// own schemas while the parent is being described.
pub fn schema_of<T: Record>() -> Arc<RecordSchema<T>> {
    let key = TypeId::of::<T>();
    let cached = SCHEMAS.read().get(&key).cloned();
    if let Some(Ok(schema)) = cached.map(|c| c.downcast::<RecordSchema<T>>()) {
        return schema;
    }

    let built: Arc<dyn Any + Send + Sync> = Arc::new(RecordSchema::<T>::build());
    let stored = SCHEMAS.write().entry(key).or_insert(built).clone();
    match stored.downcast::<RecordSchema<T>>() {
        Ok(schema) => schema,
        Err(_) => Arc::new(RecordSchema::<T>::build()),
    }
}

/// The ordered field table of `T`
pub fn derive_metadata<T: Record>() -> SchemaMetadata {
    schema_of::<T>().metadata.clone()
}

/// Options for a scalar property
#[derive(Debug, Clone)]
pub struct Prop {
    name: String,
    storage_name: Option<String>,
    required: bool,
    default: Option<String>,
    transient: bool,
}

impl Prop {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage_name: None,
            required: false,
            default: None,
            transient: false,
        }
    }

    /// Store the field under a different key
    pub fn name(mut self, storage_name: impl Into<String>) -> Self {
        self.storage_name = Some(storage_name.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Keep the field on the record but never persist it
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }
}

/// Options for an embedded record field
#[derive(Debug, Clone)]
pub struct Embedded {
    name: String,
    storage_name: Option<String>,
    prefix: Option<String>,
}

impl Embedded {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage_name: None,
            prefix: None,
        }
    }

    pub fn name(mut self, storage_name: impl Into<String>) -> Self {
        self.storage_name = Some(storage_name.into());
        self
    }

    /// Override the `<field>__` column prefix used when flattening
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

type ValueReader<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;
type ValueWriter<T> = Box<dyn Fn(&mut T, Value) -> std::result::Result<(), Value> + Send + Sync>;
type NestedWriter<T> = Box<dyn Fn(&T, Shape, &str, &mut Document) -> Result<()> + Send + Sync>;
type NestedReader<T> = Box<dyn Fn(&mut T, &Document, Shape, &str) -> Result<()> + Send + Sync>;

struct IdBinding<T> {
    get: fn(&T) -> &String,
    get_mut: fn(&mut T) -> &mut String,
}

enum Binding<T> {
    Identifier,
    Property {
        read: ValueReader<T>,
        write: ValueWriter<T>,
        coerce: fn(Value) -> std::result::Result<Value, Value>,
    },
    Embedded {
        read: NestedReader<T>,
        write: NestedWriter<T>,
    },
}

fn coerce_through<F: FieldValue>(value: Value) -> std::result::Result<Value, Value> {
    F::from_value(value).map(|typed| typed.to_value())
}

/// Collects field registrations for a record type
pub struct SchemaBuilder<T> {
    collection: Option<String>,
    fields: Vec<FieldDescriptor>,
    bindings: Vec<Binding<T>>,
    id: Option<IdBinding<T>>,
    problems: Vec<String>,
}

impl<T: Record> SchemaBuilder<T> {
    fn new() -> Self {
        Self {
            collection: None,
            fields: Vec::new(),
            bindings: Vec::new(),
            id: None,
            problems: Vec::new(),
        }
    }

    /// Collection or table name; defaults to the type name
    pub fn collection(&mut self, name: impl Into<String>) -> &mut Self {
        self.collection = Some(name.into());
        self
    }

    /// Declare the identifier slot, stored under [`DEFAULT_ID_KEY`]
    pub fn id(&mut self, get: fn(&T) -> &String, get_mut: fn(&mut T) -> &mut String) -> &mut Self {
        self.identifier(Prop::new(DEFAULT_ID_KEY), get, get_mut)
    }

    /// Declare a named identifier field
    pub fn identifier(
        &mut self,
        prop: Prop,
        get: fn(&T) -> &String,
        get_mut: fn(&mut T) -> &mut String,
    ) -> &mut Self {
        if self.id.is_some() {
            self.problems
                .push(format!("identifier declared twice (second: {})", prop.name));
            return self;
        }
        self.id = Some(IdBinding { get, get_mut });
        self.push(
            FieldDescriptor {
                storage_name: prop.storage_name.unwrap_or_else(|| prop.name.clone()),
                name: prop.name,
                field_type: FieldType::Text,
                role: FieldRole::Identifier,
                required: false,
                default: None,
                transient: false,
                prefix: None,
                nested: Vec::new(),
            },
            Binding::Identifier,
        );
        self
    }

    /// Declare a scalar, list or map property
    pub fn prop<F: FieldValue>(
        &mut self,
        prop: Prop,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> &mut Self {
        let binding = Binding::Property {
            read: Box::new(move |record: &T| get(record).to_value()),
            write: Box::new(move |record: &mut T, value: Value| {
                *get_mut(record) = F::from_value(value)?;
                Ok(())
            }),
            coerce: coerce_through::<F>,
        };
        self.push(
            FieldDescriptor {
                storage_name: prop.storage_name.unwrap_or_else(|| prop.name.clone()),
                name: prop.name,
                field_type: F::FIELD_TYPE,
                role: FieldRole::Property,
                required: prop.required,
                default: prop.default,
                transient: prop.transient,
                prefix: None,
                nested: Vec::new(),
            },
            binding,
        );
        self
    }

    /// Declare an embedded record
    pub fn embedded<E: Record>(
        &mut self,
        embedded: Embedded,
        get: fn(&T) -> &E,
        get_mut: fn(&mut T) -> &mut E,
    ) -> &mut Self {
        let nested = E::schema();
        let writer = Arc::clone(&nested);
        let reader = Arc::clone(&nested);
        let binding = Binding::Embedded {
            write: Box::new(move |record: &T, shape: Shape, prefix: &str, out: &mut Document| {
                writer.write_fields(get(record), shape, prefix, out, false)
            }),
            read: Box::new(move |record: &mut T, doc: &Document, shape: Shape, prefix: &str| {
                reader.read_fields(get_mut(record), doc, shape, prefix, false)
            }),
        };
        let prefix = embedded
            .prefix
            .unwrap_or_else(|| format!("{}{}", embedded.name, EMBEDDED_SEPARATOR));
        self.push(
            FieldDescriptor {
                storage_name: embedded.storage_name.unwrap_or_else(|| embedded.name.clone()),
                name: embedded.name,
                field_type: FieldType::Object,
                role: FieldRole::Embedded,
                required: false,
                default: None,
                transient: false,
                prefix: Some(prefix),
                nested: nested.metadata.fields.clone(),
            },
            binding,
        );
        self
    }

    fn push(&mut self, descriptor: FieldDescriptor, binding: Binding<T>) {
        if descriptor.storage_name.is_empty() {
            self.problems
                .push(format!("field '{}' has an empty storage name", descriptor.name));
        } else if self
            .fields
            .iter()
            .any(|f| f.storage_name == descriptor.storage_name)
        {
            self.problems.push(format!(
                "storage name '{}' is used by more than one field",
                descriptor.storage_name
            ));
        }
        self.fields.push(descriptor);
        self.bindings.push(binding);
    }
}

/// Derived schema of a record type: metadata plus typed accessors
pub struct RecordSchema<T> {
    metadata: SchemaMetadata,
    bindings: Vec<Binding<T>>,
    id: Option<IdBinding<T>>,
    problems: Vec<String>,
}

impl<T: Record> RecordSchema<T> {
    fn build() -> Self {
        let mut builder = SchemaBuilder::<T>::new();
        T::describe(&mut builder);

        let type_name = short_type_name::<T>();
        let collection = builder.collection.unwrap_or_else(|| type_name.clone());
        let mut problems = builder.problems;
        if collection.is_empty() {
            problems.push("collection name is empty".to_string());
        }

        Self {
            metadata: SchemaMetadata {
                type_name,
                collection,
                fields: builder.fields,
            },
            bindings: builder.bindings,
            id: builder.id,
            problems,
        }
    }

    pub fn metadata(&self) -> &SchemaMetadata {
        &self.metadata
    }

    pub fn has_identifier(&self) -> bool {
        self.id.is_some()
    }

    /// Reject declarations that cannot be persisted
    pub fn validate(&self) -> Result<()> {
        match self.problems.first() {
            Some(problem) => Err(Error::SchemaDeclaration(format!(
                "{}: {}",
                self.metadata.type_name, problem
            ))),
            None => Ok(()),
        }
    }

    pub fn instantiate(&self) -> T {
        let mut record = T::default();
        if let Some(id) = &self.id {
            *(id.get_mut)(&mut record) = Uuid::new_v4().to_string();
        }
        record
    }

    /// The identifier value of a record
    pub fn identifier<'a>(&self, record: &'a T) -> Result<&'a str> {
        let id = self.id_binding()?;
        Ok((id.get)(record).as_str())
    }

    /// Return the record's identifier, generating one first if it is empty
    pub fn assign_identifier(&self, record: &mut T) -> Result<String> {
        let id = self.id_binding()?;
        let slot = (id.get_mut)(record);
        if slot.is_empty() {
            *slot = Uuid::new_v4().to_string();
        }
        Ok(slot.clone())
    }

    fn id_binding(&self) -> Result<&IdBinding<T>> {
        self.id
            .as_ref()
            .ok_or_else(|| Error::MissingIdentifier(self.metadata.type_name.clone()))
    }

    /// Convert a record into a document of the given shape
    pub fn to_document(&self, record: &T, shape: Shape) -> Result<Document> {
        self.validate()?;
        let mut doc = Document::with_capacity(self.metadata.fields.len());
        self.write_fields(record, shape, "", &mut doc, true)?;
        Ok(doc)
    }

    /// Rebuild a record from a document of the given shape
    pub fn from_document(&self, doc: &Document, shape: Shape) -> Result<T> {
        self.validate()?;
        let mut record = T::default();
        self.read_fields(&mut record, doc, shape, "", true)?;
        Ok(record)
    }

    fn write_fields(
        &self,
        record: &T,
        shape: Shape,
        prefix: &str,
        out: &mut Document,
        include_id: bool,
    ) -> Result<()> {
        if include_id {
            // Types without an identifier slot still get a fresh sentinel key
            let value = match &self.id {
                Some(id) if !(id.get)(record).is_empty() => (id.get)(record).clone(),
                _ => Uuid::new_v4().to_string(),
            };
            out.insert(self.metadata.id_key(), value);
        }

        for (field, binding) in self.metadata.fields.iter().zip(&self.bindings) {
            if field.transient {
                continue;
            }
            match binding {
                Binding::Identifier => {}
                Binding::Property { read, coerce, .. } => {
                    let mut value = read(record);
                    if value.is_null() && field.required {
                        value = self.default_for(field, *coerce)?.ok_or_else(|| {
                            Error::MissingRequiredField {
                                record: self.metadata.type_name.clone(),
                                field: field.name.clone(),
                            }
                        })?;
                    }
                    out.insert(format!("{}{}", prefix, field.storage_name), value);
                }
                Binding::Embedded { write, .. } => match shape {
                    Shape::Nested => {
                        let mut inner = Document::new();
                        write(record, shape, "", &mut inner)?;
                        out.insert(field.storage_name.clone(), inner);
                    }
                    Shape::Flattened => {
                        let nested_prefix = format!("{}{}", prefix, field.prefix.as_deref().unwrap_or(""));
                        write(record, shape, &nested_prefix, out)?;
                    }
                },
            }
        }
        Ok(())
    }

    fn read_fields(
        &self,
        record: &mut T,
        doc: &Document,
        shape: Shape,
        prefix: &str,
        include_id: bool,
    ) -> Result<()> {
        if let Some(id) = self.id.as_ref().filter(|_| include_id) {
            match doc.get(self.metadata.id_key()) {
                Some(Value::Text(s)) => *(id.get_mut)(record) = s.clone(),
                Some(Value::Int(i)) => *(id.get_mut)(record) = i.to_string(),
                Some(Value::Null) | None => {}
                Some(other) => {
                    return Err(Error::TypeCoercion {
                        field: format!("{}.{}", self.metadata.type_name, self.metadata.id_key()),
                        expected: FieldType::Text,
                        found: other.type_name().to_string(),
                    });
                }
            }
        }

        for (field, binding) in self.metadata.fields.iter().zip(&self.bindings) {
            if field.transient {
                continue;
            }
            match binding {
                Binding::Identifier => {}
                Binding::Property { write, coerce, .. } => {
                    let key = format!("{}{}", prefix, field.storage_name);
                    let value = match doc.get(&key) {
                        Some(value) if !value.is_null() => value.clone(),
                        _ if field.required => match self.default_for(field, *coerce)? {
                            Some(default) => default,
                            None => continue,
                        },
                        _ => continue,
                    };
                    write(record, value).map_err(|found| Error::TypeCoercion {
                        field: format!("{}.{}", self.metadata.type_name, field.name),
                        expected: field.field_type,
                        found: found.type_name().to_string(),
                    })?;
                }
                Binding::Embedded { read, .. } => match shape {
                    Shape::Nested => match doc.get(&field.storage_name) {
                        Some(Value::Map(inner)) => read(record, inner, shape, "")?,
                        Some(Value::Null) | None => read(record, &Document::new(), shape, "")?,
                        Some(other) => {
                            return Err(Error::TypeCoercion {
                                field: format!("{}.{}", self.metadata.type_name, field.name),
                                expected: FieldType::Object,
                                found: other.type_name().to_string(),
                            });
                        }
                    },
                    Shape::Flattened => {
                        let nested_prefix = format!("{}{}", prefix, field.prefix.as_deref().unwrap_or(""));
                        read(record, doc, shape, &nested_prefix)?;
                    }
                },
            }
        }
        Ok(())
    }

    /// Coerce the string-encoded default of a field into its declared type
    fn default_for(
        &self,
        field: &FieldDescriptor,
        coerce: fn(Value) -> std::result::Result<Value, Value>,
    ) -> Result<Option<Value>> {
        let Some(default) = &field.default else {
            return Ok(None);
        };
        if !field.field_type.accepts_string_default() {
            return Err(Error::UnsupportedType {
                field: format!("{}.{}", self.metadata.type_name, field.name),
                field_type: field.field_type,
            });
        }
        coerce(Value::Text(default.clone()))
            .map(Some)
            .map_err(|found| Error::TypeCoercion {
                field: format!("{}.{}", self.metadata.type_name, field.name),
                expected: field.field_type,
                found: format!("{} {:?}", found.type_name(), default),
            })
    }
}

fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
