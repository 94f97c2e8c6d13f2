/// Catalog dialect: how to list a target's programmable objects and quote
/// identifiers. One implementation per supported driver, resolved once per
/// connection by `from_driver`.
pub trait CatalogDialect: Send + Sync {
    /// Driver name as used in output metadata; never branched on outside
    /// this module.
    fn name(&self) -> &'static str;

    fn quote_ident(&self, s: &str) -> String;

    /// SQL returning `(schema, name, kind_code, definition, last_modified)`
    /// rows for every programmable object the connected user can see.
    /// `kind_code` matches `ObjectKind::from_code` (P/V/FN/TF/IF).
    fn list_objects_sql(&self) -> &'static str;

    /// `false` when the catalog has no notion of stored routines at all
    /// (SQLite): only views are enumerable there.
    fn supports_routines(&self) -> bool {
        true
    }
}

pub struct PostgresCatalog;

impl CatalogDialect for PostgresCatalog {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("\"{}\"", s.replace('"', "\"\""))
    }

    fn list_objects_sql(&self) -> &'static str {
        "SELECT n.nspname AS schema, p.proname AS name, \
                CASE WHEN p.prokind = 'f' AND p.proretset THEN 'TF' \
                     WHEN p.prokind = 'f' THEN 'FN' \
                     ELSE 'P' END AS kind_code, \
                pg_get_functiondef(p.oid) AS definition, \
                NOW() AS last_modified \
         FROM pg_proc p \
         JOIN pg_namespace n ON n.oid = p.pronamespace \
         WHERE n.nspname NOT IN ('pg_catalog', 'information_schema') \
         UNION ALL \
         SELECT schemaname AS schema, viewname AS name, 'V' AS kind_code, \
                definition, NOW() AS last_modified \
         FROM pg_views \
         WHERE schemaname NOT IN ('pg_catalog', 'information_schema')"
    }
}

pub struct MysqlCatalog;

impl CatalogDialect for MysqlCatalog {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("`{}`", s.replace('`', "``"))
    }

    fn list_objects_sql(&self) -> &'static str {
        "SELECT ROUTINE_SCHEMA AS schema_name, ROUTINE_NAME AS name, \
                IF(ROUTINE_TYPE = 'PROCEDURE', 'P', 'FN') AS kind_code, \
                ROUTINE_DEFINITION AS definition, LAST_ALTERED AS last_modified \
         FROM information_schema.ROUTINES \
         WHERE ROUTINE_SCHEMA = DATABASE() \
         UNION ALL \
         SELECT TABLE_SCHEMA AS schema_name, TABLE_NAME AS name, 'V' AS kind_code, \
                VIEW_DEFINITION AS definition, NOW() AS last_modified \
         FROM information_schema.VIEWS \
         WHERE TABLE_SCHEMA = DATABASE()"
    }
}

/// SQLite has no routine catalog: only `CREATE VIEW` objects are
/// enumerable. Procedures and functions are unsupported on this driver,
/// a real-world constraint this engine has to accept rather than paper
/// over (documented in the grounding ledger).
pub struct SqliteCatalog;

impl CatalogDialect for SqliteCatalog {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("\"{}\"", s.replace('"', "\"\""))
    }

    fn list_objects_sql(&self) -> &'static str {
        "SELECT 'main' AS schema_name, name, 'V' AS kind_code, sql AS definition, NULL AS last_modified \
         FROM sqlite_master \
         WHERE type = 'view'"
    }

    fn supports_routines(&self) -> bool {
        false
    }
}

pub fn from_driver(driver: &str) -> Box<dyn CatalogDialect> {
    match driver {
        "mysql" | "mariadb" => Box::new(MysqlCatalog),
        "sqlite" => Box::new(SqliteCatalog),
        _ => Box::new(PostgresCatalog),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_quote_ident_doubles_quotes() {
        assert_eq!(PostgresCatalog.quote_ident(r#"ta"ble"#), r#""ta""ble""#);
    }

    #[test]
    fn mysql_quote_ident_uses_backticks() {
        assert_eq!(MysqlCatalog.quote_ident("my_table"), "`my_table`");
    }

    #[test]
    fn sqlite_has_no_routine_support() {
        assert!(!SqliteCatalog.supports_routines());
        assert!(PostgresCatalog.supports_routines());
        assert!(MysqlCatalog.supports_routines());
    }

    #[test]
    fn from_driver_falls_back_to_postgres() {
        assert_eq!(from_driver("unknown").name(), "postgres");
        assert_eq!(from_driver("mysql").name(), "mysql");
        assert_eq!(from_driver("sqlite").name(), "sqlite");
    }
}
