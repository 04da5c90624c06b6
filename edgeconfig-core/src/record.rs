use rusqlite::Row;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::table::{TableDescriptor, Value};

/// One row of a configuration table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Surrogate id assigned by the database
    pub id: i64,
    /// Natural key
    pub key: String,
    pub values: BTreeMap<String, Value>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Form text for `field`, empty when the column is missing
    pub fn display(&self, descriptor: &TableDescriptor, field: &str) -> String {
        match (descriptor.field(field), self.values.get(field)) {
            (Some(spec), Some(value)) => spec.display(value),
            _ => String::new(),
        }
    }

    /// Builds a record from a row selected with `TableDescriptor::select_columns`
    pub(crate) fn from_row(descriptor: &TableDescriptor, row: &Row<'_>) -> rusqlite::Result<Self> {
        let id: i64 = row.get(0)?;
        let key: String = row.get(1)?;
        let mut values = BTreeMap::new();
        for (idx, spec) in descriptor.fields.iter().enumerate() {
            let value = spec.read(row.get_ref(idx + 2)?);
            values.insert(spec.name.to_string(), value);
        }
        Ok(Record { id, key, values })
    }
}
