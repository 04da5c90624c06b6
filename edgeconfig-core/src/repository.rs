//! Per-table repository with its own row cache
//!
//! The cache is all or nothing: either absent, or the complete result of the
//! last full table scan. Every write made through the repository drops it.
//! Changes made by other sessions only show up after [`Repository::invalidate`].

use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::db::{Database, SchemaPool};
use crate::error::{Error, Result};
use crate::record::Record;
use crate::table::{TableDescriptor, Value};

pub struct Repository {
    table: &'static TableDescriptor,
    db: Arc<Database>,
    cache: Mutex<Option<Arc<Vec<Record>>>>,
}

impl Repository {
    pub fn new(table: &'static TableDescriptor, db: Arc<Database>) -> Self {
        Self {
            table,
            db,
            cache: Mutex::new(None),
        }
    }

    /// Repository for `table` on the connection of the table's schema
    pub fn open(pool: &SchemaPool, table: &'static TableDescriptor) -> Result<Self> {
        Ok(Self::new(table, pool.get(table.schema)?))
    }

    pub fn table(&self) -> &'static TableDescriptor {
        self.table
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// All rows sorted by natural key.
    ///
    /// The first call scans the table; later calls return the same snapshot
    /// until [`invalidate`](Self::invalidate) is called or a write happens.
    pub fn list_all(&self) -> Result<Arc<Vec<Record>>> {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(rows) = cache.as_ref() {
            return Ok(Arc::clone(rows));
        }
        let rows = Arc::new(self.db.select_all(self.table)?);
        debug!("Loaded {} {} rows", rows.len(), self.table.name);
        *cache = Some(Arc::clone(&rows));
        Ok(rows)
    }

    /// Drops the cached snapshot
    pub fn invalidate(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        *cache = None;
    }

    pub fn is_cached(&self) -> bool {
        self.cache
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .is_some()
    }

    /// Looks `key` up in the cached snapshot. The key must already be normalised.
    pub fn find_cached(&self, key: &str) -> Result<Option<Record>> {
        Ok(self.list_all()?.iter().find(|r| r.key == key).cloned())
    }

    /// Reads the current row for `key` straight from the database
    pub fn fetch(&self, key: &str) -> Result<Option<Record>> {
        self.db.select_by_key(self.table, key)
    }

    pub fn fetch_by_id(&self, id: i64) -> Result<Option<Record>> {
        self.db.select_by_id(self.table, id)
    }

    pub fn insert(&self, key: &str, values: &BTreeMap<String, Value>) -> Result<Record> {
        let id = self.db.insert(self.table, key, values)?;
        self.invalidate();
        info!("Inserted {} '{}' (id {})", self.table.name, key, id);
        self.fetch_by_id(id)?.ok_or_else(|| Error::NotFound {
            table: self.table.name.to_string(),
            key: key.to_string(),
        })
    }

    /// Rewrites the key and the given columns of row `id`
    pub fn update(&self, id: i64, key: &str, values: &BTreeMap<String, Value>) -> Result<Record> {
        let changed = self.db.update(self.table, id, key, values)?;
        self.invalidate();
        if changed == 0 {
            return Err(Error::StaleRecord {
                table: self.table.name.to_string(),
                key: key.to_string(),
            });
        }
        info!("Updated {} '{}' (id {})", self.table.name, key, id);
        self.fetch_by_id(id)?.ok_or_else(|| Error::StaleRecord {
            table: self.table.name.to_string(),
            key: key.to_string(),
        })
    }

    /// Deletes the row for `key`; false when there was none
    pub fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.db.delete_by_key(self.table, key)? > 0;
        self.invalidate();
        if removed {
            info!("Deleted {} '{}'", self.table.name, key);
        }
        Ok(removed)
    }

    /// Highest assigned id, 0 when the table is empty
    pub fn max_id(&self) -> Result<i64> {
        self.db.max_id(self.table)
    }

    pub fn count(&self) -> Result<usize> {
        self.db.count(self.table)
    }
}
