use polystore::translate::document as document_translate;
use polystore::translate::{SqlTranslator, SqliteDialect};
use polystore::config::write_config;
use polystore::{
    connect, connect_from_config, doc, ConnectionInfo, Embedded, Find, Persist, Prop, Provider,
    ProviderExt, Record, Registry, SchemaBuilder, Shape, StoreConfig, Update, Value,
};
use std::sync::Arc;

#[derive(Debug, Default, Clone, PartialEq)]
struct Address {
    city: String,
    zip: String,
}

impl Record for Address {
    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema
            .prop(Prop::new("city"), |a| &a.city, |a| &mut a.city)
            .prop(Prop::new("zip"), |a| &a.zip, |a| &mut a.zip);
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct UserSchema {
    id: String,
    username: String,
    age: i64,
    verified: bool,
    roles: Vec<String>,
    addr: Address,
    session: String,
}

impl Record for UserSchema {
    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema
            .collection("users")
            .id(|u| &u.id, |u| &mut u.id)
            .prop(Prop::new("username").required(), |u| &u.username, |u| &mut u.username)
            .prop(Prop::new("age").default_value("18").required(), |u| &u.age, |u| &mut u.age)
            .prop(Prop::new("verified"), |u| &u.verified, |u| &mut u.verified)
            .prop(Prop::new("roles"), |u| &u.roles, |u| &mut u.roles)
            .embedded(Embedded::new("addr"), |u| &u.addr, |u| &mut u.addr)
            .prop(Prop::new("session").transient(), |u| &u.session, |u| &mut u.session);
    }
}

fn backends() -> Vec<Arc<dyn Provider>> {
    ["memory://local/app", "sqlite::memory:"]
        .iter()
        .map(|uri| connect(&ConnectionInfo::parse(uri).unwrap()).unwrap())
        .collect()
}

#[test]
fn user_lifecycle_on_every_backend() {
    polystore::logging::init_logging(false);

    for provider in backends() {
        let registry = Registry::new();
        let users = provider.add_repository::<UserSchema>(&registry).unwrap();

        let mut user = UserSchema::instantiate();
        user.username = "sammwy".to_string();
        user.age = 23;
        user.addr.city = "Lima".to_string();
        user.session = "not stored".to_string();
        assert!(!user.id.is_empty());

        assert!(user.save(&registry).unwrap());
        let stored = users.find_by_id(&user.id).unwrap().unwrap();
        assert_eq!(stored.username, "sammwy");
        assert_eq!(stored.age, 23);
        assert_eq!(stored.addr.city, "Lima");
        assert_eq!(stored.session, "");

        user.age = 24;
        assert!(user.save(&registry).unwrap());
        assert_eq!(users.find(&Find::new()).unwrap().len(), 1);

        users
            .update_by_id(&user.id, &Update::new().append_to_array("roles", "admin"))
            .unwrap();
        let stored = users.find_by_id(&user.id).unwrap().unwrap();
        assert_eq!(stored.age, 24);
        assert_eq!(stored.roles, vec!["admin".to_string()]);

        assert!(user.delete(&registry).unwrap());
        assert!(users.find_by_id(&user.id).unwrap().is_none());
        assert!(!user.id.is_empty());
    }
}

#[test]
fn query_matches_the_same_records_everywhere() {
    for provider in backends() {
        let registry = Registry::new();
        let users = provider.add_repository::<UserSchema>(&registry).unwrap();

        let mut batch: Vec<UserSchema> = [("sam", 30), ("sam", 12), ("ana", 40)]
            .iter()
            .map(|(name, age)| UserSchema {
                username: name.to_string(),
                age: *age,
                ..UserSchema::default()
            })
            .collect();
        assert_eq!(users.insert_many(&mut batch).unwrap(), 3);

        let found = users
            .find(&Find::new().greater_than("age", 18).equals("username", "sam"))
            .unwrap();
        assert_eq!(found.len(), 1, "{}", provider.backend());
        assert_eq!(found[0].id, batch[0].id);
    }
}

#[test]
fn translation_equivalence() {
    let find = Find::new().greater_than("age", 18).equals("name", "sam");

    let filter = document_translate::filter(&find).unwrap();
    assert_eq!(filter, doc! { "age" => doc! { "$gt" => 18 }, "name" => "sam" });

    let clause = SqlTranslator::new(SqliteDialect).where_clause(&find).unwrap();
    assert_eq!(clause.sql, "WHERE age > ? AND name = ?");
    assert_eq!(clause.params, vec![Value::Int(18), Value::from("sam")]);
}

#[test]
fn embedded_layout_per_shape() {
    let schema = UserSchema::schema();
    let mut user = UserSchema::instantiate();
    user.username = "sam".into();
    user.addr.city = "Lima".into();

    let flat = schema.to_document(&user, Shape::Flattened).unwrap();
    assert_eq!(flat.get("addr__city"), Some(&Value::from("Lima")));
    assert!(flat.get("session").is_none());

    let nested = schema.to_document(&user, Shape::Nested).unwrap();
    assert_eq!(nested.get_path("addr.city"), Some(&Value::from("Lima")));

    let columns: Vec<String> = schema
        .metadata()
        .columns()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(
        columns,
        vec!["username", "age", "verified", "roles", "addr__city", "addr__zip"]
    );
}

#[test]
fn schema_initialization_keeps_data() {
    let provider = connect(&ConnectionInfo::parse("sqlite::memory:").unwrap()).unwrap();
    let registry = Registry::new();
    let users = provider.add_repository::<UserSchema>(&registry).unwrap();

    let mut user = UserSchema {
        username: "kept".into(),
        ..UserSchema::default()
    };
    users.insert(&mut user).unwrap();

    assert!(users.initialize_schema().unwrap());
    assert!(users.initialize_schema().unwrap());
    assert_eq!(users.find(&Find::new()).unwrap().len(), 1);
}

#[test]
fn sqlite_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let uri = format!("sqlite://{}", dir.path().join("users.db").display());
    let info = ConnectionInfo::parse(&uri).unwrap();

    let id = {
        let provider = connect(&info).unwrap();
        let registry = Registry::new();
        provider.add_repository::<UserSchema>(&registry).unwrap();

        let mut user = UserSchema::instantiate();
        user.username = "durable".into();
        user.save(&registry).unwrap();
        user.id
    };

    let provider = connect(&info).unwrap();
    let registry = Registry::new();
    let users = provider.add_repository::<UserSchema>(&registry).unwrap();
    let user = users.find_by_id(&id).unwrap().unwrap();
    assert_eq!(user.username, "durable");
}

#[test]
fn required_field_default_applies_on_read() {
    let provider = connect(&ConnectionInfo::parse("memory://local/app").unwrap()).unwrap();
    provider
        .insert("users", &doc! { "_id" => "raw", "username" => "x", "age" => Value::Null })
        .unwrap();

    let registry = Registry::new();
    let users = provider.add_repository::<UserSchema>(&registry).unwrap();
    let user = users.find_by_id("raw").unwrap().unwrap();
    assert_eq!(user.age, 18);
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Member {
    id: String,
    nick: Option<String>,
}

impl Record for Member {
    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema
            .collection("members")
            .id(|m| &m.id, |m| &mut m.id)
            .prop(Prop::new("nick"), |m| &m.nick, |m| &mut m.nick);
    }
}

#[test]
fn not_equals_includes_missing_values_everywhere() {
    for provider in backends() {
        let registry = Registry::new();
        let members = provider.add_repository::<Member>(&registry).unwrap();

        let mut batch = vec![
            Member { nick: None, ..Member::default() },
            Member { nick: Some("x".into()), ..Member::default() },
            Member { nick: Some("y".into()), ..Member::default() },
        ];
        members.insert_many(&mut batch).unwrap();

        let mut found: Vec<Option<String>> = members
            .find(&Find::new().not_equals("nick", "x"))
            .unwrap()
            .into_iter()
            .map(|m| m.nick)
            .collect();
        found.sort();
        assert_eq!(found, vec![None, Some("y".to_string())], "{}", provider.backend());
    }
}

#[test]
fn connects_from_a_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("polystore.toml");
    let config = StoreConfig {
        protocol: Some("sqlite".into()),
        database: Some(dir.path().join("app.db").display().to_string()),
        ..StoreConfig::default()
    };
    write_config(&path, &config, false).unwrap();

    let id = {
        let provider = connect_from_config(Some(&path)).unwrap();
        let registry = Registry::new();
        provider.add_repository::<UserSchema>(&registry).unwrap();
        let mut user = UserSchema::instantiate();
        user.username = "configured".into();
        user.save(&registry).unwrap();
        user.id
    };

    let provider = connect_from_config(Some(&path)).unwrap();
    let registry = Registry::new();
    let users = provider.add_repository::<UserSchema>(&registry).unwrap();
    assert_eq!(users.find_by_id(&id).unwrap().unwrap().username, "configured");
}
