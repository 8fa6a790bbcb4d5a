//! Relational translation
//!
//! One template renders every statement; a [`SqlDialect`] supplies the parts
//! that differ between engines (identifier quoting, boolean storage, JSON
//! append, single-row limits, native upsert and table introspection).
//!
//! Values are never interpolated into SQL text. Every operand becomes a
//! positional `?` parameter in [`SqlFragment::params`].

use crate::field::FieldType;
use crate::provider::Backend;
use crate::query::{Condition, Find, FindOptions, SortOrder, Update, UpdateOperator};
use crate::schema::SchemaMetadata;
use crate::value::{Document, Value};
use crate::{Error, Result};

/// SQL text with its positional parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Engine-specific pieces of the SQL template
pub trait SqlDialect: Send + Sync + 'static {
    fn backend(&self) -> Backend;

    /// Quote a validated identifier
    fn quote(&self, ident: &str) -> String;

    fn boolean_type(&self) -> &'static str;

    /// Column type of the identifier, always the first column
    fn id_column_type(&self) -> &'static str;

    /// Trailing table options for CREATE TABLE
    fn table_options(&self) -> &'static str {
        ""
    }

    /// Column type for a field type
    fn column_type(&self, field_type: FieldType) -> &'static str {
        match field_type {
            FieldType::Text => "TEXT",
            FieldType::Integer => "INTEGER",
            FieldType::Float => "REAL",
            FieldType::Boolean => self.boolean_type(),
            FieldType::Blob => "BLOB",
            FieldType::List | FieldType::Map | FieldType::Any | FieldType::Object => "TEXT",
        }
    }

    /// Convert a value into the parameter the engine stores.
    /// Lists and maps are stored as JSON text.
    fn bind(&self, value: &Value) -> Value {
        match value {
            Value::List(_) | Value::Map(_) => Value::Text(value.to_json().to_string()),
            other => other.clone(),
        }
    }

    /// Expression appending the JSON-encoded `?` parameter to an array column
    fn append_expression(&self, column: &str) -> String;

    /// Query returning a row when the table named by the single parameter exists
    fn table_exists_sql(&self) -> &'static str;

    /// Conflict clause turning an INSERT into an upsert on `id_column`
    fn upsert_clause(&self, id_column: &str, columns: &[String]) -> String;

    /// Tail restricting an UPDATE or DELETE on `table` to one matching row
    fn single_row_tail(&self, table: &str, filter: &SqlFragment) -> String;

    /// LIMIT/OFFSET clause, empty when neither is set
    fn limit_clause(&self, limit: Option<u64>, skip: Option<u64>) -> String;
}

/// SQLite: bare identifiers, booleans as INTEGER 0/1
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn quote(&self, ident: &str) -> String {
        ident.to_string()
    }

    fn boolean_type(&self) -> &'static str {
        "INTEGER"
    }

    fn id_column_type(&self) -> &'static str {
        "TEXT"
    }

    fn bind(&self, value: &Value) -> Value {
        match value {
            Value::Bool(b) => Value::Int(*b as i64),
            Value::List(_) | Value::Map(_) => Value::Text(value.to_json().to_string()),
            other => other.clone(),
        }
    }

    fn append_expression(&self, column: &str) -> String {
        format!("json_insert(COALESCE({}, '[]'), '$[#]', json(?))", column)
    }

    fn table_exists_sql(&self) -> &'static str {
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?"
    }

    fn upsert_clause(&self, id_column: &str, columns: &[String]) -> String {
        if columns.is_empty() {
            return format!("ON CONFLICT({}) DO NOTHING", id_column);
        }
        let assignments: Vec<String> = columns
            .iter()
            .map(|c| format!("{} = excluded.{}", c, c))
            .collect();
        format!("ON CONFLICT({}) DO UPDATE SET {}", id_column, assignments.join(", "))
    }

    fn single_row_tail(&self, table: &str, filter: &SqlFragment) -> String {
        join_sql(&[
            "WHERE rowid IN (SELECT rowid FROM",
            table,
            &filter.sql,
            "LIMIT 1)",
        ])
    }

    fn limit_clause(&self, limit: Option<u64>, skip: Option<u64>) -> String {
        match (limit, skip) {
            (Some(limit), Some(skip)) => format!("LIMIT {} OFFSET {}", limit, skip),
            (Some(limit), None) => format!("LIMIT {}", limit),
            (None, Some(skip)) => format!("LIMIT -1 OFFSET {}", skip),
            (None, None) => String::new(),
        }
    }
}

/// MySQL: backtick quoting, native BOOLEAN, InnoDB tables
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl SqlDialect for MysqlDialect {
    fn backend(&self) -> Backend {
        Backend::Mysql
    }

    fn quote(&self, ident: &str) -> String {
        format!("`{}`", ident)
    }

    fn boolean_type(&self) -> &'static str {
        "BOOLEAN"
    }

    fn id_column_type(&self) -> &'static str {
        "VARCHAR(255)"
    }

    fn table_options(&self) -> &'static str {
        " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
    }

    fn append_expression(&self, column: &str) -> String {
        format!(
            "JSON_ARRAY_APPEND(COALESCE({}, JSON_ARRAY()), '$', CAST(? AS JSON))",
            column
        )
    }

    fn table_exists_sql(&self) -> &'static str {
        "SELECT table_name FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?"
    }

    fn upsert_clause(&self, id_column: &str, columns: &[String]) -> String {
        if columns.is_empty() {
            return format!("ON DUPLICATE KEY UPDATE {} = {}", id_column, id_column);
        }
        let assignments: Vec<String> = columns
            .iter()
            .map(|c| format!("{} = VALUES({})", c, c))
            .collect();
        format!("ON DUPLICATE KEY UPDATE {}", assignments.join(", "))
    }

    fn single_row_tail(&self, _table: &str, filter: &SqlFragment) -> String {
        join_sql(&[&filter.sql, "LIMIT 1"])
    }

    fn limit_clause(&self, limit: Option<u64>, skip: Option<u64>) -> String {
        match (limit, skip) {
            (Some(limit), Some(skip)) => format!("LIMIT {} OFFSET {}", limit, skip),
            (Some(limit), None) => format!("LIMIT {}", limit),
            (None, Some(skip)) => format!("LIMIT {} OFFSET {}", u64::MAX, skip),
            (None, None) => String::new(),
        }
    }
}

/// Join non-empty SQL parts with single spaces
fn join_sql(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Renders Find/Update descriptors into statements for one dialect
#[derive(Debug, Clone, Default)]
pub struct SqlTranslator<D> {
    dialect: D,
}

impl<D: SqlDialect> SqlTranslator<D> {
    pub fn new(dialect: D) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Quote a table name; invalid names are a declaration problem
    pub fn table(&self, name: &str) -> Result<String> {
        if !is_identifier(name) {
            return Err(Error::SchemaDeclaration(format!(
                "'{}' is not a valid table name",
                name
            )));
        }
        Ok(self.dialect.quote(name))
    }

    /// Quote a column referenced by a query or document
    pub fn column(&self, name: &str) -> Result<String> {
        if !is_identifier(name) {
            return Err(Error::Validation(format!("'{}' is not a valid column name", name)));
        }
        Ok(self.dialect.quote(name))
    }

    fn unsupported(&self, operator: &str) -> Error {
        Error::UnsupportedOperator {
            backend: self.dialect.backend(),
            operator: operator.to_string(),
        }
    }

    // ========== Clauses ==========

    /// `WHERE a > ? AND b = ?`, or an empty fragment for an empty Find
    pub fn where_clause(&self, find: &Find) -> Result<SqlFragment> {
        let mut predicates = Vec::with_capacity(find.criteria().len());
        let mut params = Vec::new();

        for (field, condition) in find.criteria() {
            let column = self.column(field)?;
            let predicate = match condition {
                Condition::Eq(Value::Null) | Condition::Exists(false) => {
                    format!("{} IS NULL", column)
                }
                Condition::Ne(Value::Null) | Condition::Exists(true) => {
                    format!("{} IS NOT NULL", column)
                }
                Condition::Eq(value) => self.compare(&column, "=", value, &mut params),
                Condition::Ne(value) => {
                    let compared = self.compare(&column, "!=", value, &mut params);
                    format!("({} OR {} IS NULL)", compared, column)
                }
                Condition::Gt(value) => self.ordered(&column, ">", value, &mut params)?,
                Condition::Gte(value) => self.ordered(&column, ">=", value, &mut params)?,
                Condition::Lt(value) => self.ordered(&column, "<", value, &mut params)?,
                Condition::Lte(value) => self.ordered(&column, "<=", value, &mut params)?,
                Condition::In(values) if values.is_empty() => "1 = 0".to_string(),
                Condition::In(values) => {
                    params.extend(values.iter().map(|v| self.dialect.bind(v)));
                    let placeholders = vec!["?"; values.len()].join(", ");
                    format!("{} IN ({})", column, placeholders)
                }
                Condition::Unknown { operator, .. } => return Err(self.unsupported(operator)),
            };
            predicates.push(predicate);
        }

        if predicates.is_empty() {
            return Ok(SqlFragment::default());
        }
        Ok(SqlFragment::new(
            format!("WHERE {}", predicates.join(" AND ")),
            params,
        ))
    }

    fn compare(&self, column: &str, op: &str, value: &Value, params: &mut Vec<Value>) -> String {
        params.push(self.dialect.bind(value));
        format!("{} {} ?", column, op)
    }

    fn ordered(
        &self,
        column: &str,
        op: &str,
        value: &Value,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        if value.is_null() {
            return Err(Error::Validation(format!(
                "cannot order {} against null",
                column
            )));
        }
        Ok(self.compare(column, op, value, params))
    }

    /// `SET a = ?, n = n + ?, tags = <append>` in set, increment, append order
    pub fn set_clause(&self, update: &Update) -> Result<SqlFragment> {
        let mut assignments = Vec::new();
        let mut params = Vec::new();

        for (op, fields) in update.ordered() {
            for (field, value) in fields.iter() {
                let column = self.column(field)?;
                match op {
                    UpdateOperator::Set => {
                        assignments.push(format!("{} = ?", column));
                        params.push(self.dialect.bind(value));
                    }
                    UpdateOperator::Increment => {
                        if !value.is_numeric() {
                            return Err(Error::Validation(format!(
                                "cannot increment '{}' by non-numeric {}",
                                field,
                                value.type_name()
                            )));
                        }
                        assignments.push(format!("{} = {} + ?", column, column));
                        params.push(value.clone());
                    }
                    UpdateOperator::Append => {
                        assignments.push(format!(
                            "{} = {}",
                            column,
                            self.dialect.append_expression(&column)
                        ));
                        params.push(Value::Text(value.to_json().to_string()));
                    }
                    UpdateOperator::Unknown(name) => return Err(self.unsupported(name)),
                }
            }
        }

        if assignments.is_empty() {
            return Ok(SqlFragment::default());
        }
        Ok(SqlFragment::new(format!("SET {}", assignments.join(", ")), params))
    }

    fn order_by(&self, options: &FindOptions) -> Result<String> {
        if options.sort.is_empty() {
            return Ok(String::new());
        }
        let keys = options
            .sort
            .iter()
            .map(|key| {
                let direction = match key.order {
                    SortOrder::Ascending => "ASC",
                    SortOrder::Descending => "DESC",
                };
                Ok(format!("{} {}", self.column(&key.field)?, direction))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("ORDER BY {}", keys.join(", ")))
    }

    // ========== Statements ==========

    pub fn select(&self, table: &str, find: &Find, options: &FindOptions) -> Result<SqlFragment> {
        let table = self.table(table)?;
        let filter = self.where_clause(find)?;
        let sql = join_sql(&[
            "SELECT * FROM",
            &table,
            &filter.sql,
            &self.order_by(options)?,
            &self.dialect.limit_clause(options.limit, options.skip),
        ]);
        Ok(SqlFragment::new(sql, filter.params))
    }

    pub fn insert(&self, table: &str, doc: &Document) -> Result<SqlFragment> {
        let table = self.table(table)?;
        if doc.is_empty() {
            return Err(Error::Validation(format!("nothing to insert into {}", table)));
        }
        let (columns, params) = self.columns_and_params(doc)?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        Ok(SqlFragment::new(
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders
            ),
            params,
        ))
    }

    /// Native insert-or-update keyed on `id_key`
    pub fn upsert(&self, table: &str, id_key: &str, doc: &Document) -> Result<SqlFragment> {
        if doc.get(id_key).is_none_or(Value::is_null) {
            return Err(Error::MissingIdentifier(table.to_string()));
        }
        let insert = self.insert(table, doc)?;
        let id_column = self.column(id_key)?;
        let updated: Vec<String> = doc
            .keys()
            .filter(|k| *k != id_key)
            .map(|k| self.column(k))
            .collect::<Result<_>>()?;
        Ok(SqlFragment::new(
            format!(
                "{} {}",
                insert.sql,
                self.dialect.upsert_clause(&id_column, &updated)
            ),
            insert.params,
        ))
    }

    pub fn update(&self, table: &str, find: &Find, update: &Update) -> Result<SqlFragment> {
        let table = self.table(table)?;
        let set = self.non_empty_set(update)?;
        let filter = self.where_clause(find)?;
        Ok(SqlFragment::new(
            join_sql(&["UPDATE", &table, &set.sql, &filter.sql]),
            [set.params, filter.params].concat(),
        ))
    }

    pub fn update_one(&self, table: &str, find: &Find, update: &Update) -> Result<SqlFragment> {
        let table = self.table(table)?;
        let set = self.non_empty_set(update)?;
        let filter = self.where_clause(find)?;
        let tail = self.dialect.single_row_tail(&table, &filter);
        Ok(SqlFragment::new(
            join_sql(&["UPDATE", &table, &set.sql, &tail]),
            [set.params, filter.params].concat(),
        ))
    }

    pub fn delete(&self, table: &str, find: &Find) -> Result<SqlFragment> {
        let table = self.table(table)?;
        let filter = self.where_clause(find)?;
        Ok(SqlFragment::new(
            join_sql(&["DELETE FROM", &table, &filter.sql]),
            filter.params,
        ))
    }

    pub fn delete_one(&self, table: &str, find: &Find) -> Result<SqlFragment> {
        let table = self.table(table)?;
        let filter = self.where_clause(find)?;
        let tail = self.dialect.single_row_tail(&table, &filter);
        Ok(SqlFragment::new(
            join_sql(&["DELETE FROM", &table, &tail]),
            filter.params,
        ))
    }

    /// CREATE TABLE with the identifier first and one column per flattened field
    pub fn create_table(&self, table: &str, metadata: &SchemaMetadata) -> Result<SqlFragment> {
        let table = self.table(table)?;
        let id_key = metadata.id_key();
        if !is_identifier(id_key) {
            return Err(Error::SchemaDeclaration(format!(
                "'{}' is not a valid identifier column",
                id_key
            )));
        }

        let mut definitions = vec![format!(
            "{} {} PRIMARY KEY",
            self.dialect.quote(id_key),
            self.dialect.id_column_type()
        )];
        for column in metadata.columns() {
            if !is_identifier(&column.name) {
                return Err(Error::SchemaDeclaration(format!(
                    "{}: '{}' is not a valid column name",
                    metadata.type_name, column.name
                )));
            }
            definitions.push(format!(
                "{} {}",
                self.dialect.quote(&column.name),
                self.dialect.column_type(column.field_type)
            ));
        }

        Ok(SqlFragment::new(
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({}){}",
                table,
                definitions.join(", "),
                self.dialect.table_options()
            ),
            Vec::new(),
        ))
    }

    pub fn table_exists(&self, table: &str) -> Result<SqlFragment> {
        self.table(table)?;
        Ok(SqlFragment::new(
            self.dialect.table_exists_sql(),
            vec![Value::from(table)],
        ))
    }

    fn non_empty_set(&self, update: &Update) -> Result<SqlFragment> {
        let set = self.set_clause(update)?;
        if set.is_empty() {
            return Err(Error::Validation("update assigns no fields".to_string()));
        }
        Ok(set)
    }

    fn columns_and_params(&self, doc: &Document) -> Result<(Vec<String>, Vec<Value>)> {
        let mut columns = Vec::with_capacity(doc.len());
        let mut params = Vec::with_capacity(doc.len());
        for (key, value) in doc.iter() {
            columns.push(self.column(key)?);
            params.push(self.dialect.bind(value));
        }
        Ok((columns, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::schema::{Embedded, Prop, Record, SchemaBuilder};

    fn sqlite() -> SqlTranslator<SqliteDialect> {
        SqlTranslator::new(SqliteDialect)
    }

    fn mysql() -> SqlTranslator<MysqlDialect> {
        SqlTranslator::new(MysqlDialect)
    }

    #[derive(Debug, Default)]
    struct Location {
        city: String,
    }

    impl Record for Location {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.prop(Prop::new("city"), |l| &l.city, |l| &mut l.city);
        }
    }

    #[derive(Debug, Default)]
    struct Member {
        id: String,
        name: String,
        age: i64,
        score: f64,
        active: bool,
        tags: Vec<String>,
        home: Location,
        work: Location,
    }

    impl Record for Member {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .collection("members")
                .id(|m| &m.id, |m| &mut m.id)
                .prop(Prop::new("name"), |m| &m.name, |m| &mut m.name)
                .prop(Prop::new("age"), |m| &m.age, |m| &mut m.age)
                .prop(Prop::new("score"), |m| &m.score, |m| &mut m.score)
                .prop(Prop::new("active"), |m| &m.active, |m| &mut m.active)
                .prop(Prop::new("tags"), |m| &m.tags, |m| &mut m.tags)
                .embedded(Embedded::new("home"), |m| &m.home, |m| &mut m.home)
                .embedded(Embedded::new("work").prefix("w_"), |m| &m.work, |m| &mut m.work);
        }
    }

    #[test]
    fn test_where_clause() {
        let find = Find::new().greater_than("age", 18).equals("name", "sam");
        let fragment = sqlite().where_clause(&find).unwrap();

        assert_eq!(fragment.sql, "WHERE age > ? AND name = ?");
        assert_eq!(fragment.params, vec![Value::Int(18), Value::from("sam")]);
    }

    #[test]
    fn test_where_clause_mysql_quoting() {
        let find = Find::new().greater_than("age", 18).equals("name", "sam");
        let fragment = mysql().where_clause(&find).unwrap();
        assert_eq!(fragment.sql, "WHERE `age` > ? AND `name` = ?");
    }

    #[test]
    fn test_where_clause_special_cases() {
        let find = Find::new()
            .equals("deleted", Value::Null)
            .is_in("role", Vec::<Value>::new())
            .not_equals("active", true);
        let fragment = sqlite().where_clause(&find).unwrap();

        assert_eq!(fragment.sql, "WHERE deleted IS NULL AND 1 = 0 AND (active != ? OR active IS NULL)");
        assert_eq!(fragment.params, vec![Value::Int(1)]);
        assert!(sqlite().where_clause(&Find::new()).unwrap().is_empty());
    }

    #[test]
    fn test_where_clause_rejects_bad_input() {
        let injected = Find::new().equals("name; DROP TABLE x", 1);
        assert!(matches!(sqlite().where_clause(&injected), Err(Error::Validation(_))));

        let unknown = Find::new().with(
            "name",
            Condition::Unknown {
                operator: "$regex".into(),
                operand: Value::from("^a"),
            },
        );
        assert!(matches!(
            mysql().where_clause(&unknown),
            Err(Error::UnsupportedOperator { backend: Backend::Mysql, .. })
        ));
    }

    #[test]
    fn test_set_clause_order() {
        let update = Update::new()
            .append_to_array("tags", "x")
            .increment("age", 1)
            .set("name", "sam");
        let fragment = sqlite().set_clause(&update).unwrap();

        assert_eq!(
            fragment.sql,
            "SET name = ?, age = age + ?, tags = json_insert(COALESCE(tags, '[]'), '$[#]', json(?))"
        );
        assert_eq!(
            fragment.params,
            vec![Value::from("sam"), Value::Int(1), Value::from("\"x\"")]
        );
    }

    #[test]
    fn test_set_clause_mysql_append() {
        let fragment = mysql()
            .set_clause(&Update::new().append_to_array("tags", "x"))
            .unwrap();
        assert_eq!(
            fragment.sql,
            "SET `tags` = JSON_ARRAY_APPEND(COALESCE(`tags`, JSON_ARRAY()), '$', CAST(? AS JSON))"
        );
    }

    #[test]
    fn test_increment_requires_number() {
        let update = Update::new().increment("age", "one");
        assert!(matches!(sqlite().set_clause(&update), Err(Error::Validation(_))));
    }

    #[test]
    fn test_select_with_options() {
        let options = FindOptions::new()
            .sort("age", SortOrder::Descending)
            .limit(10)
            .skip(5);
        let fragment = sqlite()
            .select("users", &Find::new().equals("name", "sam"), &options)
            .unwrap();
        assert_eq!(
            fragment.sql,
            "SELECT * FROM users WHERE name = ? ORDER BY age DESC LIMIT 10 OFFSET 5"
        );

        let skip_only = sqlite()
            .select("users", &Find::new(), &FindOptions::new().skip(3))
            .unwrap();
        assert_eq!(skip_only.sql, "SELECT * FROM users LIMIT -1 OFFSET 3");
    }

    #[test]
    fn test_insert_and_upsert() {
        let doc = doc! { "_id" => "a", "name" => "sam", "tags" => vec!["x"] };
        let insert = sqlite().insert("users", &doc).unwrap();
        assert_eq!(insert.sql, "INSERT INTO users (_id, name, tags) VALUES (?, ?, ?)");
        assert_eq!(insert.params[2], Value::from("[\"x\"]"));

        let upsert = sqlite().upsert("users", "_id", &doc).unwrap();
        assert!(upsert.sql.ends_with(
            "ON CONFLICT(_id) DO UPDATE SET name = excluded.name, tags = excluded.tags"
        ));

        let upsert = mysql().upsert("users", "_id", &doc).unwrap();
        assert!(upsert.sql.ends_with(
            "ON DUPLICATE KEY UPDATE `name` = VALUES(`name`), `tags` = VALUES(`tags`)"
        ));

        assert!(matches!(
            sqlite().upsert("users", "_id", &doc! { "name" => "x" }),
            Err(Error::MissingIdentifier(_))
        ));
    }

    #[test]
    fn test_single_row_statements() {
        let find = Find::new().equals("name", "sam");
        let update = Update::new().set("age", 30);

        let sqlite_update = sqlite().update_one("users", &find, &update).unwrap();
        assert_eq!(
            sqlite_update.sql,
            "UPDATE users SET age = ? WHERE rowid IN (SELECT rowid FROM users WHERE name = ? LIMIT 1)"
        );
        assert_eq!(sqlite_update.params, vec![Value::Int(30), Value::from("sam")]);

        let mysql_delete = mysql().delete_one("users", &find).unwrap();
        assert_eq!(mysql_delete.sql, "DELETE FROM `users` WHERE `name` = ? LIMIT 1");

        let delete_all = sqlite().delete("users", &Find::new()).unwrap();
        assert_eq!(delete_all.sql, "DELETE FROM users");
    }

    #[test]
    fn test_empty_update_is_rejected() {
        assert!(matches!(
            sqlite().update("users", &Find::new(), &Update::new()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_create_table() {
        let metadata = Member::schema().metadata().clone();

        let fragment = sqlite().create_table("members", &metadata).unwrap();
        assert_eq!(
            fragment.sql,
            "CREATE TABLE IF NOT EXISTS members (_id TEXT PRIMARY KEY, name TEXT, age INTEGER, \
             score REAL, active INTEGER, tags TEXT, home__city TEXT, w_city TEXT)"
        );

        let fragment = mysql().create_table("members", &metadata).unwrap();
        assert!(fragment.sql.starts_with(
            "CREATE TABLE IF NOT EXISTS `members` (`_id` VARCHAR(255) PRIMARY KEY"
        ));
        assert!(fragment.sql.contains("`active` BOOLEAN"));
        assert!(fragment.sql.ends_with(") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"));
    }

    #[test]
    fn test_invalid_table_name() {
        let metadata = Member::schema().metadata().clone();
        assert!(matches!(
            sqlite().create_table("bad-name", &metadata),
            Err(Error::SchemaDeclaration(_))
        ));
        assert!(matches!(
            sqlite().table_exists("x y"),
            Err(Error::SchemaDeclaration(_))
        ));
    }

    #[test]
    fn test_table_exists_probe() {
        let probe = mysql().table_exists("members").unwrap();
        assert!(probe.sql.contains("information_schema.tables"));
        assert_eq!(probe.params, vec![Value::from("members")]);
    }
}
