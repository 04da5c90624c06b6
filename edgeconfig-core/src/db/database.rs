//! SQLite connection for one logical schema
//!
//! Every statement is parameterised. Table and column names are spliced into
//! the SQL text, but they only ever come from the static table descriptors.

use log::{debug, warn};
#[cfg(test)]
use rusqlite::params;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::catalog::{SCHEMA_ANSS, SCHEMA_EDGE, SCHEMA_FETCHER};
use crate::error::{Error, Result};
use crate::record::Record;
use crate::table::{TableDescriptor, Value};

/// Current schema version
const SCHEMA_VERSION: i64 = 1;

/// Tables created in a schema's database file
fn schema_ddl(schema: &str) -> Option<&'static str> {
    match schema {
        SCHEMA_EDGE => Some(include_str!("edge.sql")),
        SCHEMA_ANSS => Some(include_str!("anss.sql")),
        SCHEMA_FETCHER => Some(include_str!("fetcher.sql")),
        _ => None,
    }
}

/// A connection to one logical schema
pub struct Database {
    schema: String,
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (creating if needed) the database file for `schema`.
    ///
    /// Connection failures are retried up to `attempts` times before giving up
    /// with [`Error::Connection`].
    pub fn open<P: AsRef<Path>>(schema: &str, path: P, attempts: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        let attempts = attempts.max(1);
        let mut attempt = 0;
        let conn = loop {
            attempt += 1;
            match Self::connect(&path) {
                Ok(conn) => break conn,
                Err(e) if attempt < attempts => {
                    warn!(
                        "Connection to {} ({}) failed on attempt {}/{}: {}",
                        schema,
                        path.display(),
                        attempt,
                        attempts,
                        e
                    );
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(source) => {
                    return Err(Error::Connection {
                        schema: schema.to_string(),
                        attempts,
                        source,
                    })
                }
            }
        };

        let db = Self {
            schema: schema.to_string(),
            path: Some(path),
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Opens a private in-memory database, mostly for tests
    pub fn open_in_memory(schema: &str) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::Connection {
            schema: schema.to_string(),
            attempts: 1,
            source,
        })?;
        let db = Self {
            schema: schema.to_string(),
            path: None,
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn connect(path: &Path) -> rusqlite::Result<Connection> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let ddl = schema_ddl(&self.schema)
            .ok_or_else(|| Error::Config(format!("Unknown schema '{}'", self.schema)))?;
        let conn = self.lock();
        conn.execute_batch(include_str!("version.sql"))?;
        conn.execute_batch(ddl)?;

        let current: Option<i64> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        match current {
            None => {
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    [SCHEMA_VERSION],
                )?;
            }
            Some(v) if v > SCHEMA_VERSION => {
                return Err(Error::Config(format!(
                    "Database schema version {} is newer than supported version {}",
                    v, SCHEMA_VERSION
                )));
            }
            Some(_) => {}
        }
        Ok(())
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Path of the backing file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // =========================================================================
    // Row operations driven by a table descriptor
    // =========================================================================

    /// Full table scan ordered by natural key
    pub fn select_all(&self, table: &TableDescriptor) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            table.select_columns(),
            table.name,
            table.key_column()
        );
        debug!("{}: {}", self.schema, sql);

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| Record::from_row(table, row))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn select_by_key(&self, table: &TableDescriptor, key: &str) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            table.select_columns(),
            table.name,
            table.key_column()
        );
        let conn = self.lock();
        conn.query_row(&sql, [key], |row| Record::from_row(table, row))
            .optional()
            .map_err(Error::from)
    }

    pub fn select_by_id(&self, table: &TableDescriptor, id: i64) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            table.select_columns(),
            table.name
        );
        let conn = self.lock();
        conn.query_row(&sql, [id], |row| Record::from_row(table, row))
            .optional()
            .map_err(Error::from)
    }

    /// Inserts a row and returns the id the database assigned
    pub fn insert(
        &self,
        table: &TableDescriptor,
        key: &str,
        values: &BTreeMap<String, Value>,
    ) -> Result<i64> {
        let mut columns = vec![table.key_column().to_string()];
        let mut args = vec![Value::Text(key.to_string())];
        for spec in table.fields {
            if let Some(value) = values.get(spec.name) {
                columns.push(spec.name.to_string());
                args.push(value.clone());
            }
        }
        let placeholders: Vec<String> = (1..=args.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name,
            columns.join(", "),
            placeholders.join(", ")
        );
        debug!("{}: {}", self.schema, sql);

        let conn = self.lock();
        conn.execute(&sql, params_from_iter(args.iter()))?;
        Ok(conn.last_insert_rowid())
    }

    /// Rewrites the key and the given columns of row `id`
    pub fn update(
        &self,
        table: &TableDescriptor,
        id: i64,
        key: &str,
        values: &BTreeMap<String, Value>,
    ) -> Result<usize> {
        let mut assignments = vec![format!("{} = ?1", table.key_column())];
        let mut args = vec![Value::Text(key.to_string())];
        for spec in table.fields {
            if let Some(value) = values.get(spec.name) {
                args.push(value.clone());
                assignments.push(format!("{} = ?{}", spec.name, args.len()));
            }
        }
        args.push(Value::Int(id));
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table.name,
            assignments.join(", "),
            args.len()
        );
        debug!("{}: {}", self.schema, sql);

        let conn = self.lock();
        Ok(conn.execute(&sql, params_from_iter(args.iter()))?)
    }

    pub fn delete_by_key(&self, table: &TableDescriptor, key: &str) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            table.name,
            table.key_column()
        );
        debug!("{}: {}", self.schema, sql);
        let conn = self.lock();
        Ok(conn.execute(&sql, [key])?)
    }

    /// Highest id in the table, 0 when empty
    pub fn max_id(&self, table: &TableDescriptor) -> Result<i64> {
        let sql = format!("SELECT COALESCE(MAX(id), 0) FROM {}", table.name);
        let conn = self.lock();
        Ok(conn.query_row(&sql, [], |row| row.get(0))?)
    }

    pub fn count(&self, table: &TableDescriptor) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name);
        let conn = self.lock();
        let n: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Adds a row to the wide `channel` table
    #[cfg(test)]
    pub(crate) fn insert_channel(&self, channel: &str, flags: i64, hydraflags: i64) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO channel (channel, flags, hydraflags) VALUES (?1, ?2, ?3)",
            params![channel, flags, hydraflags],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use tempfile::NamedTempFile;

    fn cpu_values(ip: &str) -> BTreeMap<String, Value> {
        let mut values = BTreeMap::new();
        values.insert("ipadr".to_string(), Value::Text(ip.to_string()));
        values.insert("hasdata".to_string(), Value::Bool(true));
        values
    }

    #[test]
    fn test_open_file_database() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let db = Database::open("edge", temp_file.path(), 3).unwrap();
        assert_eq!(db.schema(), "edge");
        assert_eq!(db.path(), Some(temp_file.path()));
        assert_eq!(db.count(&catalog::CPU).unwrap(), 0);

        // Reopening an initialised file keeps the data
        let id = db
            .insert(&catalog::CPU, "GLDKETCHUP", &cpu_values("010.000.000.001"))
            .unwrap();
        drop(db);
        let db = Database::open("edge", temp_file.path(), 1).unwrap();
        let cpu = db.select_by_id(&catalog::CPU, id).unwrap().unwrap();
        assert_eq!(cpu.key, "GLDKETCHUP");
    }

    #[test]
    fn test_open_unreachable_path_reports_attempts() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file
        let err = match Database::open("edge", dir.path(), 2) {
            Err(e) => e,
            Ok(_) => panic!("opening a directory should fail"),
        };
        match err {
            Error::Connection {
                schema, attempts, ..
            } => {
                assert_eq!(schema, "edge");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_insert_select_update_delete() {
        let db = Database::open_in_memory("edge").unwrap();
        let id = db
            .insert(&catalog::CPU, "GLDKETCHUP", &cpu_values("010.000.000.001"))
            .unwrap();
        assert_eq!(id, 1);

        let cpu = db.select_by_key(&catalog::CPU, "GLDKETCHUP").unwrap().unwrap();
        assert_eq!(cpu.get("ipadr"), Some(&Value::Text("010.000.000.001".into())));
        assert_eq!(cpu.get("hasdata"), Some(&Value::Bool(true)));
        assert_eq!(cpu.get("os"), Some(&Value::Text(String::new())));

        let mut changes = BTreeMap::new();
        changes.insert("os".to_string(), Value::Text("Linux".into()));
        assert_eq!(db.update(&catalog::CPU, id, "GLDMUSTARD", &changes).unwrap(), 1);

        assert!(db.select_by_key(&catalog::CPU, "GLDKETCHUP").unwrap().is_none());
        let cpu = db.select_by_id(&catalog::CPU, id).unwrap().unwrap();
        assert_eq!(cpu.key, "GLDMUSTARD");
        assert_eq!(cpu.get("os"), Some(&Value::Text("Linux".into())));
        assert_eq!(cpu.get("ipadr"), Some(&Value::Text("010.000.000.001".into())));

        assert_eq!(db.delete_by_key(&catalog::CPU, "GLDMUSTARD").unwrap(), 1);
        assert_eq!(db.delete_by_key(&catalog::CPU, "GLDMUSTARD").unwrap(), 0);
    }

    #[test]
    fn test_select_all_is_sorted_by_key() {
        let db = Database::open_in_memory("edge").unwrap();
        for key in ["ZETA", "ALPHA", "MIKE"] {
            db.insert(&catalog::ROLE, key, &BTreeMap::new()).unwrap();
        }
        let keys: Vec<String> = db
            .select_all(&catalog::ROLE)
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["ALPHA", "MIKE", "ZETA"]);
    }

    #[test]
    fn test_duplicate_key_is_a_query_error() {
        let db = Database::open_in_memory("edge").unwrap();
        db.insert(&catalog::FLAGS, "FOO", &BTreeMap::new()).unwrap();
        let err = db.insert(&catalog::FLAGS, "FOO", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::Query(_)));
    }

    #[test]
    fn test_each_schema_gets_only_its_tables() {
        let tables = |db: &Database| -> Vec<String> {
            let conn = db.lock();
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .unwrap();
            let names = stmt.query_map([], |row| row.get::<_, String>(0)).unwrap();
            names.map(|n| n.unwrap()).collect()
        };

        let fetcher = Database::open_in_memory("fetcher").unwrap();
        assert_eq!(tables(&fetcher), vec!["requesttype", "schema_version"]);

        let anss = Database::open_in_memory("anss").unwrap();
        assert_eq!(
            tables(&anss),
            vec!["schema_version", "snwgroup", "snwrule", "snwstation"]
        );

        let edge = tables(&Database::open_in_memory("edge").unwrap());
        assert!(edge.contains(&"channel".to_string()));
        assert!(!edge.contains(&"snwstation".to_string()));
        assert!(!edge.contains(&"requesttype".to_string()));

        for table in crate::catalog::TABLES {
            let db = Database::open_in_memory(table.schema).unwrap();
            assert_eq!(db.count(table).unwrap(), 0, "{} missing", table.name);
        }

        assert!(matches!(
            Database::open_in_memory("nope"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_max_id() {
        let db = Database::open_in_memory("edge").unwrap();
        assert_eq!(db.max_id(&catalog::FLAGS).unwrap(), 0);
        db.insert(&catalog::FLAGS, "A", &BTreeMap::new()).unwrap();
        db.insert(&catalog::FLAGS, "B", &BTreeMap::new()).unwrap();
        assert_eq!(db.max_id(&catalog::FLAGS).unwrap(), 2);
    }
}
