//! SQLite schema definitions and SQL builders.
//!
//! Pure data, no I/O. Collection names are validated identifiers, so they are
//! safe to interpolate into statements.

/// Current `user_version` of the database.
pub const SELECT_USER_VERSION: &str = "PRAGMA user_version";

/// All user tables, excluding SQLite's internal ones.
pub const SELECT_TABLES: &str = r#"
SELECT name
FROM sqlite_master
WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
ORDER BY name
"#;

/// Returns true if `name` can be used as a collection (table) name.
pub fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.to_ascii_lowercase().starts_with("sqlite_")
}

pub fn create_collection(name: &str) -> String {
    format!(r#"CREATE TABLE IF NOT EXISTS "{name}" (key TEXT PRIMARY KEY NOT NULL, value TEXT NOT NULL)"#)
}

/// Drops a table found on disk. Its name may not be a valid collection name,
/// so embedded quotes are escaped.
pub fn drop_collection(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!(r#"DROP TABLE IF EXISTS "{escaped}""#)
}

/// Statements for one collection, built once per store handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSql {
    pub count: String,
    pub select_all: String,
    pub select_by_key: String,
    pub upsert: String,
    pub delete_by_key: String,
    pub delete_all: String,
}

impl CollectionSql {
    pub fn new(name: &str) -> Self {
        Self {
            count: format!(r#"SELECT COUNT(*) FROM "{name}""#),
            select_all: format!(r#"SELECT value FROM "{name}" ORDER BY rowid ASC"#),
            select_by_key: format!(r#"SELECT value FROM "{name}" WHERE key = ?1"#),
            upsert: format!(
                r#"INSERT INTO "{name}" (key, value) VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value"#
            ),
            delete_by_key: format!(r#"DELETE FROM "{name}" WHERE key = ?1"#),
            delete_all: format!(r#"DELETE FROM "{name}""#),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_collection_names() {
        assert!(is_valid_collection_name("events"));
        assert!(is_valid_collection_name("_scratch"));
        assert!(is_valid_collection_name("users_v2"));
    }

    #[test]
    fn test_invalid_collection_names() {
        assert!(!is_valid_collection_name(""));
        assert!(!is_valid_collection_name("2fa"));
        assert!(!is_valid_collection_name("user-roles"));
        assert!(!is_valid_collection_name("events\"; DROP TABLE users; --"));
        assert!(!is_valid_collection_name("sqlite_master"));
        assert!(!is_valid_collection_name("SQLITE_stat1"));
    }

    #[test]
    fn test_collection_sql_targets_named_table() {
        let sql = CollectionSql::new("events");
        assert!(sql.count.contains(r#"FROM "events""#));
        assert!(sql.select_all.contains("ORDER BY rowid"));
        assert!(sql.select_by_key.contains("WHERE key = ?1"));
        assert!(sql.upsert.contains("ON CONFLICT(key) DO UPDATE"));
        assert!(sql.delete_by_key.contains("DELETE"));
        assert_eq!(sql.delete_all, r#"DELETE FROM "events""#);
    }

    #[test]
    fn test_create_and_drop_statements() {
        assert!(create_collection("users").contains(r#"CREATE TABLE IF NOT EXISTS "users""#));
        assert_eq!(drop_collection("users"), r#"DROP TABLE IF EXISTS "users""#);
        assert_eq!(
            drop_collection(r#"we"ird"#),
            r#"DROP TABLE IF EXISTS "we""ird""#
        );
    }
}
