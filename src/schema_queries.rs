//! Engine-specific catalog queries behind one interface
//!
//! The introspector only talks to [`CatalogQueries`]; each engine gets its own
//! implementation. Schema and table names are always bound parameters, never
//! interpolated.
//!
//! Every tables query returns `table_name`, `table_type`, `table_description`.
//! Every columns query returns one row per column in ordinal order with
//! `column_name`, `data_type`, `max_length`, `is_nullable` (`YES`/`NO`),
//! `column_default`, `column_description`, `table_description`, `fk_schema`,
//! `fk_table`, `fk_column`. Zero rows means the table does not exist.
//!
//! Text results go through `CAST(... AS TEXT)` on PostgreSQL because the sqlx
//! Any driver cannot decode `name` and `oid`-derived types.

use crate::types::DatabaseType;

/// SQL plus positional text parameters
pub type CatalogQuery = (String, Vec<String>);

pub trait CatalogQueries: Send + Sync {
    /// Base tables, views and materialized views of `schema`
    fn tables_query(&self, schema: &str) -> CatalogQuery;

    /// Columns and foreign-key targets of one table
    fn columns_query(&self, schema: &str, table: &str) -> CatalogQuery;

    /// Schema name reported back for `requested`
    fn effective_schema(&self, requested: &str) -> String {
        requested.to_string()
    }
}

/// Pick the catalog implementation for an engine.
///
/// ```rust
/// use sql_gateway::schema_queries::catalog_for;
/// use sql_gateway::types::DatabaseType;
///
/// let (sql, params) = catalog_for(DatabaseType::Postgres).tables_query("public");
/// assert!(sql.contains("pg_class"));
/// assert_eq!(params, vec!["public".to_string()]);
/// ```
pub fn catalog_for(db_type: DatabaseType) -> Box<dyn CatalogQueries> {
    match db_type {
        DatabaseType::Postgres => Box::new(PostgresCatalog),
        DatabaseType::MySQL | DatabaseType::MariaDB => Box::new(MySqlCatalog),
        DatabaseType::SQLite => Box::new(SqliteCatalog),
    }
}

/// pg_catalog based; covers partitioned tables and materialized views
pub struct PostgresCatalog;

impl CatalogQueries for PostgresCatalog {
    fn tables_query(&self, schema: &str) -> CatalogQuery {
        let sql = "SELECT CAST(c.relname AS TEXT) AS table_name, \
                   CASE c.relkind WHEN 'v' THEN 'VIEW' WHEN 'm' THEN 'MATERIALIZED VIEW' \
                   ELSE 'BASE TABLE' END AS table_type, \
                   CAST(obj_description(c.oid, 'pg_class') AS TEXT) AS table_description \
                   FROM pg_catalog.pg_class c \
                   JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
                   WHERE n.nspname = $1 AND c.relkind IN ('r', 'p', 'v', 'm') \
                   ORDER BY c.relname"
            .to_string();
        (sql, vec![schema.to_string()])
    }

    fn columns_query(&self, schema: &str, table: &str) -> CatalogQuery {
        let sql = "SELECT CAST(a.attname AS TEXT) AS column_name, \
                   CAST(format_type(a.atttypid, NULL) AS TEXT) AS data_type, \
                   CAST(CASE WHEN a.atttypid IN (1042, 1043) AND a.atttypmod > 4 \
                        THEN a.atttypmod - 4 END AS BIGINT) AS max_length, \
                   CASE WHEN a.attnotnull THEN 'NO' ELSE 'YES' END AS is_nullable, \
                   CAST(pg_get_expr(d.adbin, d.adrelid) AS TEXT) AS column_default, \
                   CAST(col_description(c.oid, a.attnum) AS TEXT) AS column_description, \
                   CAST(obj_description(c.oid, 'pg_class') AS TEXT) AS table_description, \
                   CAST(fk.fk_schema AS TEXT) AS fk_schema, \
                   CAST(fk.fk_table AS TEXT) AS fk_table, \
                   CAST(fk.fk_column AS TEXT) AS fk_column \
                   FROM pg_catalog.pg_class c \
                   JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
                   JOIN pg_catalog.pg_attribute a \
                     ON a.attrelid = c.oid AND a.attnum > 0 AND NOT a.attisdropped \
                   LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = c.oid AND d.adnum = a.attnum \
                   LEFT JOIN LATERAL ( \
                     SELECT rn.nspname AS fk_schema, rc.relname AS fk_table, ra.attname AS fk_column \
                     FROM pg_catalog.pg_constraint con \
                     JOIN pg_catalog.pg_class rc ON rc.oid = con.confrelid \
                     JOIN pg_catalog.pg_namespace rn ON rn.oid = rc.relnamespace \
                     JOIN pg_catalog.pg_attribute ra ON ra.attrelid = con.confrelid \
                       AND ra.attnum = con.confkey[array_position(con.conkey, a.attnum)] \
                     WHERE con.conrelid = c.oid AND con.contype = 'f' \
                       AND a.attnum = ANY (con.conkey) \
                     ORDER BY con.conname LIMIT 1 \
                   ) fk ON TRUE \
                   WHERE n.nspname = $1 AND c.relname = $2 AND c.relkind IN ('r', 'p', 'v', 'm') \
                   ORDER BY a.attnum"
            .to_string();
        (sql, vec![schema.to_string(), table.to_string()])
    }
}

/// information_schema based; "public" maps to the connection's database
pub struct MySqlCatalog;

impl CatalogQueries for MySqlCatalog {
    fn tables_query(&self, schema: &str) -> CatalogQuery {
        let sql = "SELECT CAST(table_name AS CHAR) AS table_name, \
                   CAST(table_type AS CHAR) AS table_type, \
                   CAST(NULLIF(table_comment, '') AS CHAR) AS table_description \
                   FROM information_schema.tables \
                   WHERE table_schema = COALESCE(NULLIF(?, 'public'), DATABASE()) \
                   ORDER BY table_name"
            .to_string();
        (sql, vec![schema.to_string()])
    }

    fn columns_query(&self, schema: &str, table: &str) -> CatalogQuery {
        let sql = "SELECT CAST(c.column_name AS CHAR) AS column_name, \
                   CAST(c.data_type AS CHAR) AS data_type, \
                   CAST(c.character_maximum_length AS SIGNED) AS max_length, \
                   CAST(c.is_nullable AS CHAR) AS is_nullable, \
                   CAST(c.column_default AS CHAR) AS column_default, \
                   CAST(NULLIF(c.column_comment, '') AS CHAR) AS column_description, \
                   CAST(NULLIF(t.table_comment, '') AS CHAR) AS table_description, \
                   CAST(k.referenced_table_schema AS CHAR) AS fk_schema, \
                   CAST(k.referenced_table_name AS CHAR) AS fk_table, \
                   CAST(k.referenced_column_name AS CHAR) AS fk_column \
                   FROM information_schema.columns c \
                   JOIN information_schema.tables t \
                     ON t.table_schema = c.table_schema AND t.table_name = c.table_name \
                   LEFT JOIN information_schema.key_column_usage k \
                     ON k.table_schema = c.table_schema AND k.table_name = c.table_name \
                     AND k.column_name = c.column_name AND k.referenced_table_name IS NOT NULL \
                   WHERE c.table_schema = COALESCE(NULLIF(?, 'public'), DATABASE()) \
                     AND c.table_name = ? \
                   ORDER BY c.ordinal_position"
            .to_string();
        (sql, vec![schema.to_string(), table.to_string()])
    }
}

/// sqlite_master and table-valued pragmas; only the `main` schema is listed
pub struct SqliteCatalog;

impl CatalogQueries for SqliteCatalog {
    fn tables_query(&self, schema: &str) -> CatalogQuery {
        let sql = "SELECT name AS table_name, \
                   CASE type WHEN 'view' THEN 'VIEW' ELSE 'BASE TABLE' END AS table_type, \
                   NULL AS table_description \
                   FROM sqlite_master \
                   WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
                     AND COALESCE(NULLIF(?1, 'public'), 'main') = 'main' \
                   ORDER BY name"
            .to_string();
        (sql, vec![schema.to_string()])
    }

    fn columns_query(&self, schema: &str, table: &str) -> CatalogQuery {
        // The referenced column defaults to the target's primary key when the
        // constraint names none; targets that do not exist produce no edge.
        let sql = "WITH fks AS ( \
                     SELECT f.\"from\" AS column_name, f.\"table\" AS fk_table, \
                       COALESCE(f.\"to\", (SELECT r.name FROM pragma_table_info(f.\"table\") AS r \
                                           WHERE r.pk = f.seq + 1)) AS fk_column \
                     FROM pragma_foreign_key_list(?1) AS f \
                   ) \
                   SELECT p.name AS column_name, \
                   p.type AS data_type, \
                   NULL AS max_length, \
                   CASE WHEN p.\"notnull\" = 1 OR p.pk > 0 THEN 'NO' ELSE 'YES' END AS is_nullable, \
                   p.dflt_value AS column_default, \
                   NULL AS column_description, \
                   NULL AS table_description, \
                   CASE WHEN fk.fk_table IS NOT NULL THEN 'main' END AS fk_schema, \
                   fk.fk_table AS fk_table, \
                   fk.fk_column AS fk_column \
                   FROM pragma_table_info(?1) AS p \
                   LEFT JOIN fks AS fk ON fk.column_name = p.name \
                     AND EXISTS (SELECT 1 FROM pragma_table_info(fk.fk_table) AS r \
                                 WHERE r.name = fk.fk_column) \
                   WHERE COALESCE(NULLIF(?2, 'public'), 'main') = 'main' \
                   ORDER BY p.cid"
            .to_string();
        (sql, vec![table.to_string(), schema.to_string()])
    }

    fn effective_schema(&self, requested: &str) -> String {
        if requested == "public" {
            "main".to_string()
        } else {
            requested.to_string()
        }
    }
}
