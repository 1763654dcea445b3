mod common;

use common::{run_ddl, sqlite_pool, sqlite_runner};
use sql_gateway::introspect::DEFAULT_SCHEMA;
use sql_gateway::types::LookupErrorKind;
use sql_gateway::{DatabaseError, ForeignKeyRef, SchemaIntrospector, SqlValue, TableKind};

async fn fixture() -> SchemaIntrospector {
    let pool = sqlite_pool().await;
    run_ddl(
        &pool,
        &[
            "CREATE TABLE users (id INTEGER PRIMARY KEY, email VARCHAR(120) NOT NULL, \
             nickname TEXT DEFAULT 'anon')",
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, \
             user_id INTEGER NOT NULL REFERENCES users(id), total REAL)",
            "CREATE VIEW big_orders AS SELECT * FROM orders WHERE total > 100",
            "INSERT INTO users (id, email) VALUES (1, 'a@example.com'), (2, 'b@example.com')",
        ],
    )
    .await;
    SchemaIntrospector::new(sqlite_runner(pool))
}

#[tokio::test]
async fn test_list_tables_includes_views() {
    let introspector = fixture().await;
    let result = introspector.list_tables(DEFAULT_SCHEMA).await;
    assert!(result.is_ok(), "list_tables failed: {:?}", result.err());
    if let Ok(tables) = result {
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["big_orders", "orders", "users"]);
        assert_eq!(tables[0].kind, TableKind::View);
        assert_eq!(tables[2].kind, TableKind::BaseTable);
    }
}

#[tokio::test]
async fn test_single_foreign_key_round_trip() {
    let introspector = fixture().await;
    let result = introspector.table_schema("orders", DEFAULT_SCHEMA).await;
    assert!(result.is_ok(), "table_schema failed: {:?}", result.err());
    if let Ok(schema) = result {
        let columns: Vec<_> = schema.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(columns, vec!["id", "user_id", "total"]);

        let keys: Vec<_> = schema
            .columns
            .iter()
            .filter_map(|c| c.foreign_key.as_ref())
            .collect();
        assert_eq!(
            keys,
            vec![&ForeignKeyRef {
                schema: "main".to_string(),
                table: "users".to_string(),
                column: "id".to_string(),
            }]
        );
        assert_eq!(schema.schema, "main");
    }
}

#[tokio::test]
async fn test_no_foreign_keys_reports_null_everywhere() {
    let introspector = fixture().await;
    let result = introspector.table_schema("users", DEFAULT_SCHEMA).await;
    assert!(result.is_ok(), "table_schema failed: {:?}", result.err());
    if let Ok(schema) = result {
        assert!(schema.columns.iter().all(|c| c.foreign_key.is_none()));

        let email = &schema.columns[1];
        assert_eq!(email.max_length, Some(120));
        assert!(!email.nullable);

        let nickname = &schema.columns[2];
        assert!(nickname.nullable);
        assert_eq!(nickname.default.as_deref(), Some("'anon'"));
    }
}

#[tokio::test]
async fn test_partial_success_reports_missing_table() {
    let introspector = fixture().await;
    let report = introspector
        .table_schemas(
            &["users".to_string(), "ghosts".to_string()],
            DEFAULT_SCHEMA,
        )
        .await;

    assert_eq!(report.tables.len(), 1);
    assert_eq!(report.tables[0].name, "users");
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].table, "ghosts");
    assert_eq!(report.errors[0].kind, LookupErrorKind::NotFound);
}

#[tokio::test]
async fn test_hostile_table_name_is_just_missing() {
    let introspector = fixture().await;
    let report = introspector
        .table_schemas(&["users'); DROP TABLE users; --".to_string()], DEFAULT_SCHEMA)
        .await;
    assert_eq!(report.errors.len(), 1);

    let still_there = introspector.list_tables(DEFAULT_SCHEMA).await;
    assert!(matches!(still_there, Ok(ref t) if t.iter().any(|t| t.name == "users")));
}

#[tokio::test]
async fn test_sample_rows() {
    let introspector = fixture().await;
    let result = introspector.sample_rows("users", DEFAULT_SCHEMA, 1).await;
    assert!(result.is_ok(), "sample_rows failed: {:?}", result.err());
    if let Ok(rows) = result {
        assert_eq!(rows.columns, vec!["id", "email", "nickname"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.rows[0][1], SqlValue::Text("a@example.com".to_string()));
    }

    let missing = introspector.sample_rows("ghosts", DEFAULT_SCHEMA, 10).await;
    assert!(matches!(missing, Err(DatabaseError::NotFound(_))), "{:?}", missing);

    let invalid = introspector.sample_rows("users;--", DEFAULT_SCHEMA, 10).await;
    assert!(matches!(invalid, Err(DatabaseError::ExecutionError(_))), "{:?}", invalid);
}
