//! Form validation
//!
//! Validation never stops at the first problem: every violation is collected
//! so the operator sees them all at once.

use std::collections::BTreeMap;
use std::fmt;

use crate::table::{TableDescriptor, Value};

/// A single rejected field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Column name, or the key column for key problems
    pub field: String,
    pub message: String,
}

/// All violations found in one form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// True if any violation is reported against `field`
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Ok when nothing was collected
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Canonical zero padded form of a dotted quad, e.g. `10.0.1.2` becomes
/// `010.000.001.002`. Returns `None` for anything that is not IPv4.
pub fn canonical_ip(input: &str) -> Option<String> {
    let parts: Vec<&str> = input.trim().split('.').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut octets = Vec::with_capacity(4);
    for part in parts {
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let octet: u8 = part.parse().ok()?;
        octets.push(format!("{:03}", octet));
    }
    Some(octets.join("."))
}

/// Parses every form input against the table's field rules.
///
/// `inputs` maps column name to the text the operator entered. Columns that
/// are absent are not validated and not returned.
pub fn validate_fields(
    descriptor: &TableDescriptor,
    inputs: &BTreeMap<String, String>,
    errors: &mut ValidationErrors,
) -> BTreeMap<String, Value> {
    let mut values = BTreeMap::new();
    for spec in descriptor.fields {
        let Some(input) = inputs.get(spec.name) else {
            continue;
        };
        match spec.parse(input) {
            Ok(value) => {
                values.insert(spec.name.to_string(), value);
            }
            Err(message) => errors.push(spec.name, format!("{} {}", spec.label, message)),
        }
    }
    for name in inputs.keys() {
        if descriptor.field(name).is_none() {
            errors.push(name.clone(), format!("no such field in {}", descriptor.name));
        }
    }
    values
}

/// Checks a natural key is usable
pub fn validate_key(descriptor: &TableDescriptor, key: &str, errors: &mut ValidationErrors) {
    if key.is_empty() {
        errors.push(descriptor.key_column(), "Key must not be empty");
    } else if key.chars().any(char::is_control) {
        errors.push(descriptor.key_column(), "Key must not contain control characters");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn test_canonical_ip() {
        assert_eq!(canonical_ip("10.0.1.2").as_deref(), Some("010.000.001.002"));
        assert_eq!(
            canonical_ip(" 136.177.24.84 ").as_deref(),
            Some("136.177.024.084")
        );
        assert_eq!(
            canonical_ip("010.000.001.002").as_deref(),
            Some("010.000.001.002")
        );
        assert_eq!(canonical_ip("256.1.1.1"), None);
        assert_eq!(canonical_ip("1.2.3"), None);
        assert_eq!(canonical_ip("1.2.3.-4"), None);
        assert_eq!(canonical_ip("gldketchup"), None);
    }

    #[test]
    fn test_errors_are_accumulated() {
        let mut inputs = BTreeMap::new();
        inputs.insert("requestclass".to_string(), String::new());
        inputs.insert("cwbip".to_string(), "1.2.3.999".to_string());
        inputs.insert("cwbport".to_string(), "99999".to_string());
        inputs.insert("fetchtype".to_string(), "CWB".to_string());

        let mut errors = ValidationErrors::new();
        let values = validate_fields(&catalog::REQUESTTYPE, &inputs, &mut errors);

        assert_eq!(errors.len(), 3);
        assert!(errors.has("requestclass"));
        assert!(errors.has("cwbip"));
        assert!(errors.has("cwbport"));
        assert_eq!(values.get("fetchtype"), Some(&Value::Int(1)));
        assert!(errors.to_string().contains("out of range 1-32767"));
    }

    #[test]
    fn test_unknown_field_is_reported() {
        let mut inputs = BTreeMap::new();
        inputs.insert("colour".to_string(), "red".to_string());
        let mut errors = ValidationErrors::new();
        validate_fields(&catalog::CPU, &inputs, &mut errors);
        assert!(errors.has("colour"));
    }

    #[test]
    fn test_validate_key() {
        let mut errors = ValidationErrors::new();
        validate_key(&catalog::CPU, "", &mut errors);
        validate_key(&catalog::CPU, "GLDKETCHUP", &mut errors);
        assert_eq!(errors.len(), 1);
    }
}
