//! Connections keyed by logical schema name
//!
//! Schemas are opened on first use and shared afterwards.

use log::info;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::Database;
use crate::config::Config;
use crate::error::Result;

enum Location {
    Files {
        paths: HashMap<String, PathBuf>,
        data_dir: PathBuf,
    },
    Memory,
}

pub struct SchemaPool {
    location: Location,
    attempts: u32,
    open: Mutex<HashMap<String, Arc<Database>>>,
}

impl SchemaPool {
    /// Pool resolving schemas to files as described by the configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            location: Location::Files {
                paths: config.schemas.clone(),
                data_dir: config.data_dir.clone(),
            },
            attempts: config.connect_attempts,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Pool where every schema is a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            attempts: 1,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// File backing `schema`, `None` for in-memory pools
    pub fn path_for(&self, schema: &str) -> Option<PathBuf> {
        match &self.location {
            Location::Files { paths, data_dir } => Some(
                paths
                    .get(schema)
                    .cloned()
                    .unwrap_or_else(|| data_dir.join(format!("{}.db", schema))),
            ),
            Location::Memory => None,
        }
    }

    /// Returns the connection for `schema`, opening it if needed
    pub fn get(&self, schema: &str) -> Result<Arc<Database>> {
        let mut open = self.open.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(db) = open.get(schema) {
            return Ok(Arc::clone(db));
        }

        let db = match self.path_for(schema) {
            Some(path) => {
                info!("Opening schema {} at {}", schema, path.display());
                Database::open(schema, &path, self.attempts)?
            }
            None => Database::open_in_memory(schema)?,
        };
        let db = Arc::new(db);
        open.insert(schema.to_string(), Arc::clone(&db));
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connections_are_shared() {
        let pool = SchemaPool::in_memory();
        let a = pool.get("edge").unwrap();
        let b = pool.get("edge").unwrap();
        let c = pool.get("anss").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.schema(), "anss");
    }

    #[test]
    fn test_schema_paths_follow_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = dir.path().to_path_buf();
        config
            .schemas
            .insert("fetcher".to_string(), dir.path().join("custom/fetch.db"));
        let pool = SchemaPool::from_config(&config);

        assert_eq!(pool.path_for("edge"), Some(dir.path().join("edge.db")));
        assert_eq!(
            pool.path_for("fetcher"),
            Some(dir.path().join("custom/fetch.db"))
        );

        pool.get("fetcher").unwrap();
        assert!(dir.path().join("custom/fetch.db").exists());
    }
}
