//! Table descriptors
//!
//! A [`TableDescriptor`] tells the generic record editor everything it needs
//! to know about one configuration table: where it lives, how its natural key
//! is normalised, which columns the form shows and how each column is
//! validated and stored.

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

use crate::validate::canonical_ip;

/// How natural keys are normalised before lookup and storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCase {
    /// Keys are stored upper-cased (cpu, flags, help, ...)
    Upper,
    /// Keys are stored exactly as typed (operator, requesttype)
    Preserve,
}

impl KeyCase {
    /// Trims the key and applies the case policy
    pub fn normalize(&self, key: &str) -> String {
        let key = key.trim();
        match self {
            KeyCase::Upper => key.to_uppercase(),
            KeyCase::Preserve => key.to_string(),
        }
    }
}

/// The type and validation rule of one form field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text {
        required: bool,
        max_len: Option<usize>,
        multiline: bool,
    },
    Int {
        min: i64,
        max: i64,
        /// Matches the column's DEFAULT in the DDL
        default: i64,
    },
    /// Stored as 0/1
    Bool,
    /// IPv4 address, stored zero padded (`010.000.001.002`)
    Ip { required: bool },
    /// Shown as a label, stored as the label's index
    Enum { options: &'static [&'static str] },
}

/// One editable column
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

/// The wide table column whose bits are named by a bitmask table's rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmaskTarget {
    pub table: &'static str,
    pub column: &'static str,
}

/// Everything the record editor needs to know about a table
#[derive(Debug)]
pub struct TableDescriptor {
    /// Table name, which is also the natural key column
    pub name: &'static str,
    /// Logical schema the table lives in
    pub schema: &'static str,
    pub title: &'static str,
    pub key_case: KeyCase,
    pub fields: &'static [FieldSpec],
    pub bitmask: Option<BitmaskTarget>,
}

impl TableDescriptor {
    /// The natural key column
    pub fn key_column(&self) -> &'static str {
        self.name
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn normalize_key(&self, key: &str) -> String {
        self.key_case.normalize(key)
    }

    pub fn is_bitmask(&self) -> bool {
        self.bitmask.is_some()
    }

    /// `id, key, field...` in descriptor order
    pub(crate) fn select_columns(&self) -> String {
        let mut columns = vec!["id", self.key_column()];
        columns.extend(self.fields.iter().map(|f| f.name));
        columns.join(", ")
    }
}

/// A stored column value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(_) => None,
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Text(s) => s.to_sql(),
            Value::Int(i) => i.to_sql(),
            Value::Bool(b) => Ok(ToSqlOutput::from(i64::from(*b))),
        }
    }
}

impl FieldSpec {
    /// Value a brand new record starts with
    pub fn default_value(&self) -> Value {
        match self.kind {
            FieldKind::Text { .. } | FieldKind::Ip { .. } => Value::Text(String::new()),
            FieldKind::Int { default, .. } => Value::Int(default),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Enum { .. } => Value::Int(0),
        }
    }

    /// Parses what the operator typed into a storable value.
    ///
    /// The error is the human readable reason, without the field label.
    pub fn parse(&self, input: &str) -> Result<Value, String> {
        let input = input.trim();
        match self.kind {
            FieldKind::Text {
                required, max_len, ..
            } => {
                if required && input.is_empty() {
                    return Err("must not be empty".to_string());
                }
                if let Some(max) = max_len {
                    if input.chars().count() > max {
                        return Err(format!("must be at most {} characters", max));
                    }
                }
                Ok(Value::Text(input.to_string()))
            }
            FieldKind::Int { min, max, .. } => {
                let n: i64 = input
                    .parse()
                    .map_err(|_| format!("'{}' is not an integer", input))?;
                if n < min || n > max {
                    return Err(format!("{} is out of range {}-{}", n, min, max));
                }
                Ok(Value::Int(n))
            }
            FieldKind::Bool => match input.to_lowercase().as_str() {
                "1" | "true" | "yes" | "y" | "on" => Ok(Value::Bool(true)),
                "0" | "false" | "no" | "n" | "off" | "" => Ok(Value::Bool(false)),
                _ => Err(format!("'{}' is not a yes/no value", input)),
            },
            FieldKind::Ip { required } => {
                if input.is_empty() {
                    if required {
                        return Err("an IP address is required".to_string());
                    }
                    return Ok(Value::Text(String::new()));
                }
                canonical_ip(input)
                    .map(Value::Text)
                    .ok_or_else(|| format!("'{}' is not a valid IPv4 address", input))
            }
            FieldKind::Enum { options } => options
                .iter()
                .position(|o| o.eq_ignore_ascii_case(input))
                .map(|idx| Value::Int(idx as i64))
                .ok_or_else(|| format!("'{}' must be one of {}", input, options.join(", "))),
        }
    }

    /// Renders a stored value the way the form shows it
    pub fn display(&self, value: &Value) -> String {
        match (self.kind, value) {
            (FieldKind::Enum { options }, Value::Int(idx)) => usize::try_from(*idx)
                .ok()
                .and_then(|i| options.get(i))
                .map(|s| s.to_string())
                .unwrap_or_else(|| idx.to_string()),
            (_, Value::Text(s)) => s.clone(),
            (_, Value::Int(i)) => i.to_string(),
            (_, Value::Bool(b)) => b.to_string(),
        }
    }

    /// Reads this field's column from a database row
    pub(crate) fn read(&self, value: ValueRef<'_>) -> Value {
        match self.kind {
            FieldKind::Text { .. } | FieldKind::Ip { .. } => match value {
                ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
                ValueRef::Integer(i) => Value::Text(i.to_string()),
                ValueRef::Real(f) => Value::Text(f.to_string()),
                _ => Value::Text(String::new()),
            },
            FieldKind::Int { .. } | FieldKind::Enum { .. } => Value::Int(read_int(value)),
            FieldKind::Bool => Value::Bool(read_int(value) != 0),
        }
    }
}

fn read_int(value: ValueRef<'_>) -> i64 {
    match value {
        ValueRef::Integer(i) => i,
        ValueRef::Real(f) => f as i64,
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0),
        _ => 0,
    }
}
