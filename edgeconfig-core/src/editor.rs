//! Generic record editor
//!
//! One editor drives any configuration table described by a
//! [`TableDescriptor`]: pick a key, load the row (or start a new one), edit
//! field text, validate, save, refresh.
//!
//! ```text
//! Empty -> Selected(Existing | New) -> Editing -> Saved -> Empty
//!                                        ^  |
//!                                        |  v
//!                                       Error
//! ```
//!
//! Saving re-reads the row first and writes only the fields the operator
//! touched over the fresh copy. Two editors saving the same field at the same
//! time still race; the last write wins.

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::bitmask;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::repository::Repository;
use crate::table::{TableDescriptor, Value};
use crate::validate::{validate_fields, validate_key, ValidationErrors};

/// Result of looking a natural key up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Record),
    /// No row has this key yet; saving will create it
    New(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Existing,
    New,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorState {
    Empty,
    Selected(Selection),
    Editing,
    Saved(Record),
    Error(String),
}

/// The text the operator sees and types, one entry per field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    key: String,
    rename: String,
    values: BTreeMap<String, String>,
    dirty: BTreeSet<String>,
    original: Option<Record>,
}

impl Form {
    /// Form for a record that does not exist yet, prefilled with defaults
    pub fn blank(table: &TableDescriptor, key: &str) -> Self {
        let values = table
            .fields
            .iter()
            .map(|spec| (spec.name.to_string(), spec.display(&spec.default_value())))
            .collect();
        Self {
            key: table.normalize_key(key),
            rename: String::new(),
            values,
            dirty: BTreeSet::new(),
            original: None,
        }
    }

    pub fn from_record(table: &TableDescriptor, record: &Record) -> Self {
        let values = table
            .fields
            .iter()
            .map(|spec| (spec.name.to_string(), record.display(table, spec.name)))
            .collect();
        Self {
            key: record.key.clone(),
            rename: String::new(),
            values,
            dirty: BTreeSet::new(),
            original: Some(record.clone()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn rename(&self) -> &str {
        &self.rename
    }

    pub fn set_rename(&mut self, key: &str) {
        self.rename = key.to_string();
    }

    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }

    /// Sets a field's text; returns false for unknown fields
    pub fn set(&mut self, field: &str, value: &str) -> bool {
        match self.values.get_mut(field) {
            Some(current) => {
                if current.as_str() != value {
                    *current = value.to_string();
                    self.dirty.insert(field.to_string());
                }
                true
            }
            None => false,
        }
    }

    pub fn is_new(&self) -> bool {
        self.original.is_none()
    }

    /// The row this form was loaded from
    pub fn original(&self) -> Option<&Record> {
        self.original.as_ref()
    }

    /// Inputs that take part in validation: all of them for a new record,
    /// only the touched ones for an existing record
    fn inputs(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .filter(|(name, _)| self.is_new() || self.dirty.contains(*name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// What a successful validation will write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    pub key: String,
    pub values: BTreeMap<String, Value>,
    /// Id of the row to update; `None` inserts
    pub target: Option<i64>,
}

pub struct RecordEditor {
    repo: Arc<Repository>,
    state: EditorState,
    form: Option<Form>,
}

impl RecordEditor {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self {
            repo,
            state: EditorState::Empty,
            form: None,
        }
    }

    pub fn table(&self) -> &'static TableDescriptor {
        self.repo.table()
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repo
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn form(&self) -> Option<&Form> {
        self.form.as_ref()
    }

    /// All rows of the table, sorted by natural key
    pub fn list_all(&self) -> Result<Arc<Vec<Record>>> {
        self.repo.list_all()
    }

    /// Drops the cached list so the next `list_all` sees other sessions' work
    pub fn reload(&self) {
        self.repo.invalidate();
    }

    /// Finds `key` (after normalisation) among the listed rows
    pub fn load_by_key(&self, key: &str) -> Result<Lookup> {
        let key = self.table().normalize_key(key);
        Ok(match self.repo.find_cached(&key)? {
            Some(record) => Lookup::Found(record),
            None => Lookup::New(key),
        })
    }

    /// Back to `Empty`, discarding the form
    pub fn reset(&mut self) {
        self.form = None;
        self.state = EditorState::Empty;
    }

    /// Resets, then loads `key` into the form
    pub fn select(&mut self, key: &str) -> Result<&Form> {
        self.reset();
        let (form, selection) = match self.load_by_key(key)? {
            Lookup::Found(record) => (
                Form::from_record(self.table(), &record),
                Selection::Existing,
            ),
            Lookup::New(key) => (Form::blank(self.table(), &key), Selection::New),
        };
        debug!("{}: selected '{}' ({:?})", self.table().name, form.key(), selection);
        self.state = EditorState::Selected(selection);
        Ok(self.form.insert(form))
    }

    pub fn set_field(&mut self, field: &str, value: &str) -> Result<()> {
        let table = self.table();
        let form = self.form.as_mut().ok_or(Error::NoSelection)?;
        if !form.set(field, value) {
            return Err(Error::UnknownField {
                table: table.name.to_string(),
                field: field.to_string(),
            });
        }
        self.state = EditorState::Editing;
        Ok(())
    }

    /// Sets the rename field; a non-empty value replaces the key on save
    pub fn set_rename(&mut self, key: &str) -> Result<()> {
        let form = self.form.as_mut().ok_or(Error::NoSelection)?;
        form.set_rename(key);
        self.state = EditorState::Editing;
        Ok(())
    }

    /// Checks a form against the field rules and the current database.
    ///
    /// Every violation is collected into one [`Error::Validation`]. The row
    /// is re-read here, so the returned target reflects the database as of
    /// this call.
    pub fn validate(&self, form: &Form) -> Result<Validated> {
        let table = self.table();
        let mut errors = ValidationErrors::new();

        let fresh = match form.original() {
            Some(original) => Some(self.repo.fetch_by_id(original.id)?.ok_or_else(|| {
                Error::StaleRecord {
                    table: table.name.to_string(),
                    key: original.key.clone(),
                }
            })?),
            None => None,
        };

        // Without a rename an existing row keeps whatever key it has now
        let key = match (&fresh, form.rename.trim().is_empty()) {
            (_, false) => table.normalize_key(&form.rename),
            (Some(fresh), true) => fresh.key.clone(),
            (None, true) => table.normalize_key(&form.key),
        };
        validate_key(table, &key, &mut errors);

        let values = validate_fields(table, &form.inputs(), &mut errors);

        let target = match &fresh {
            Some(fresh) => Some(fresh.id),
            None => self.repo.fetch(&key)?.map(|existing| existing.id),
        };

        if !key.is_empty() {
            if let Some(other) = self.repo.fetch(&key)? {
                if target.is_some() && target != Some(other.id) {
                    errors.push(
                        table.key_column(),
                        format!("{} '{}' already exists", table.name, key),
                    );
                }
            }
        }

        if target.is_none() {
            bitmask::check_capacity(table, self.repo.max_id()?, &mut errors);
        }

        errors.into_result(Validated {
            key,
            values,
            target,
        })
        .map_err(Error::from)
    }

    /// Validates and writes a form without touching editor state
    pub fn save_form(&self, form: &Form) -> Result<Record> {
        let validated = self.validate(form)?;
        match validated.target {
            Some(id) => self.repo.update(id, &validated.key, &validated.values),
            None => self.repo.insert(&validated.key, &validated.values),
        }
    }

    /// Saves the current form. On success the editor goes to `Saved` with the
    /// refreshed row and the form is cleared; on failure it goes to `Error`
    /// and the form is kept for correction.
    pub fn save(&mut self) -> Result<Record> {
        let form = self.form.as_ref().ok_or(Error::NoSelection)?;
        match self.save_form(form) {
            Ok(record) => {
                self.form = None;
                self.state = EditorState::Saved(record.clone());
                Ok(record)
            }
            Err(e) => {
                warn!("{}: save of '{}' failed: {}", self.table().name, form.key(), e);
                self.state = EditorState::Error(e.to_string());
                Err(e)
            }
        }
    }

    /// Deletes the row for `key`. Bitmask target columns are left alone;
    /// clearing a bit is a separate, confirmed action.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        let key = self.table().normalize_key(key);
        let removed = self.repo.delete(&key)?;
        if self.form.as_ref().map(|f| f.key() == key).unwrap_or(false) {
            self.reset();
        }
        Ok(removed)
    }

    fn bitmask_row(&self, key: &str) -> Result<Record> {
        let table = self.table();
        if !table.is_bitmask() {
            return Err(Error::NotBitmask(table.name.to_string()));
        }
        let key = table.normalize_key(key);
        self.repo.fetch(&key)?.ok_or_else(|| Error::NotFound {
            table: table.name.to_string(),
            key,
        })
    }

    /// Rows of the wide table that have `key`'s bit set
    pub fn count_bit_users(&self, key: &str) -> Result<usize> {
        let row = self.bitmask_row(key)?;
        bitmask::count_bit_users(self.repo.database(), self.table(), row.id)
    }

    /// Clears `key`'s bit in every row of the wide table. Callers confirm
    /// with the operator first.
    pub fn clear_bit_in_all(&self, key: &str) -> Result<usize> {
        let row = self.bitmask_row(key)?;
        bitmask::clear_bit_in_all(self.repo.database(), self.table(), row.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::db::Database;

    fn editor(table: &'static TableDescriptor) -> RecordEditor {
        let db = Arc::new(Database::open_in_memory(table.schema).unwrap());
        RecordEditor::new(Arc::new(Repository::new(table, db)))
    }

    fn save_cpu(editor: &mut RecordEditor, key: &str, ip: &str) -> Record {
        editor.select(key).unwrap();
        editor.set_field("ipadr", ip).unwrap();
        editor.save().unwrap()
    }

    #[test]
    fn test_missing_key_is_new_not_error() {
        let editor = editor(&catalog::CPU);
        assert_eq!(
            editor.load_by_key("gldketchup").unwrap(),
            Lookup::New("GLDKETCHUP".to_string())
        );
    }

    #[test]
    fn test_state_machine() {
        let mut editor = editor(&catalog::CPU);
        assert_eq!(editor.state(), &EditorState::Empty);

        editor.select("gldketchup").unwrap();
        assert_eq!(editor.state(), &EditorState::Selected(Selection::New));
        assert!(editor.form().unwrap().is_new());

        editor.set_field("ipadr", "10.0.0.1").unwrap();
        assert_eq!(editor.state(), &EditorState::Editing);

        let saved = editor.save().unwrap();
        assert_eq!(editor.state(), &EditorState::Saved(saved.clone()));
        assert!(editor.form().is_none());

        editor.select("GLDKETCHUP").unwrap();
        assert_eq!(editor.state(), &EditorState::Selected(Selection::Existing));
        assert_eq!(editor.form().unwrap().get("ipadr"), "010.000.000.001");

        editor.reset();
        assert_eq!(editor.state(), &EditorState::Empty);
    }

    #[test]
    fn test_validation_error_keeps_form() {
        let mut editor = editor(&catalog::CPU);
        editor.select("GLDKETCHUP").unwrap();
        editor.set_field("ipadr", "10.0.0.300").unwrap();
        let err = editor.save().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(matches!(editor.state(), EditorState::Error(_)));
        assert_eq!(editor.form().unwrap().get("ipadr"), "10.0.0.300");

        editor.set_field("ipadr", "10.0.0.3").unwrap();
        assert_eq!(editor.state(), &EditorState::Editing);
        editor.save().unwrap();
        assert_eq!(editor.repository().count().unwrap(), 1);
    }

    #[test]
    fn test_set_field_without_selection() {
        let mut editor = editor(&catalog::CPU);
        assert!(matches!(
            editor.set_field("ipadr", "10.0.0.1"),
            Err(Error::NoSelection)
        ));
        editor.select("X").unwrap();
        assert!(matches!(
            editor.set_field("colour", "red"),
            Err(Error::UnknownField { .. })
        ));
    }

    #[test]
    fn test_round_trip() {
        let mut editor = editor(&catalog::REQUESTTYPE);
        editor.select("CWBQuery").unwrap();
        editor.set_field("requestclass", "gov.usgs.anss.fetcher.CWBRequest").unwrap();
        editor.set_field("cwbip", "137.227.224.97").unwrap();
        editor.set_field("cwbport", "2061").unwrap();
        editor.set_field("fetchtype", "fdsn").unwrap();
        editor.set_field("throttle", "50000").unwrap();
        editor.set_field("disablerequest", "yes").unwrap();
        editor.save().unwrap();

        editor.reload();
        let form = editor.select("CWBQuery").unwrap();
        assert_eq!(form.key(), "CWBQuery");
        assert_eq!(form.get("requestclass"), "gov.usgs.anss.fetcher.CWBRequest");
        assert_eq!(form.get("cwbip"), "137.227.224.097");
        assert_eq!(form.get("cwbport"), "2061");
        assert_eq!(form.get("fetchtype"), "FDSN");
        assert_eq!(form.get("throttle"), "50000");
        assert_eq!(form.get("disablerequest"), "true");
    }

    #[test]
    fn test_blank_form_matches_column_defaults() {
        for table in catalog::TABLES {
            let db = Database::open_in_memory(table.schema).unwrap();
            let id = db.insert(table, "DEFAULTS", &BTreeMap::new()).unwrap();
            let stored = db.select_by_id(table, id).unwrap().unwrap();
            let blank = Form::blank(table, "DEFAULTS");
            for field in table.fields {
                assert_eq!(
                    blank.get(field.name),
                    stored.display(table, field.name),
                    "{}.{}",
                    table.name,
                    field.name
                );
            }
        }

        let mut editor = editor(&catalog::REQUESTTYPE);
        assert_eq!(editor.select("CWBQuery").unwrap().get("cwbport"), "2061");
    }

    #[test]
    fn test_requesttype_port_out_of_range_is_not_persisted() {
        let mut editor = editor(&catalog::REQUESTTYPE);
        editor.select("CWBQuery").unwrap();
        editor.set_field("requestclass", "CWBRequest").unwrap();
        editor.set_field("cwbport", "99999").unwrap();

        match editor.save() {
            Err(Error::Validation(errors)) => {
                assert!(errors.has("cwbport"));
                assert!(errors.to_string().contains("1-32767"));
            }
            other => panic!("expected a validation error, got {:?}", other),
        }
        assert_eq!(editor.repository().count().unwrap(), 0);
    }

    #[test]
    fn test_key_case_policy_per_table() {
        let mut cpu = editor(&catalog::CPU);
        let saved = save_cpu(&mut cpu, "gldketchup", "10.0.0.1");
        assert_eq!(saved.key, "GLDKETCHUP");

        let mut operator = editor(&catalog::OPERATOR);
        operator.select("dketchum").unwrap();
        operator.set_field("fullname", "Dave Ketchum").unwrap();
        assert_eq!(operator.save().unwrap().key, "dketchum");
    }

    #[test]
    fn test_rename_overrides_key() {
        let mut editor = editor(&catalog::CPU);
        let original = save_cpu(&mut editor, "GLDKETCHUP", "10.0.0.1");

        editor.select("GLDKETCHUP").unwrap();
        editor.set_rename("gldmustard").unwrap();
        let renamed = editor.save().unwrap();
        assert_eq!(renamed.id, original.id);
        assert_eq!(renamed.key, "GLDMUSTARD");
        assert_eq!(
            renamed.get("ipadr"),
            Some(&Value::Text("010.000.000.001".into()))
        );
        assert!(matches!(
            editor.load_by_key("GLDKETCHUP").unwrap(),
            Lookup::New(_)
        ));
    }

    #[test]
    fn test_rename_onto_existing_key_is_rejected() {
        let mut editor = editor(&catalog::CPU);
        save_cpu(&mut editor, "ALPHA", "10.0.0.1");
        save_cpu(&mut editor, "BRAVO", "10.0.0.2");

        editor.select("BRAVO").unwrap();
        editor.set_rename("alpha").unwrap();
        match editor.save() {
            Err(Error::Validation(errors)) => assert!(errors.to_string().contains("already exists")),
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_save_only_writes_touched_fields_over_fresh_row() {
        let mut editor = editor(&catalog::CPU);
        let saved = save_cpu(&mut editor, "GLDKETCHUP", "10.0.0.1");

        // Operator opens the row...
        editor.select("GLDKETCHUP").unwrap();
        // ...meanwhile another session changes the OS
        let mut external = BTreeMap::new();
        external.insert("os".to_string(), Value::Text("Solaris".into()));
        editor
            .repository()
            .database()
            .update(&catalog::CPU, saved.id, "GLDKETCHUP", &external)
            .unwrap();

        editor.set_field("nicks", "ketchup").unwrap();
        let record = editor.save().unwrap();
        assert_eq!(record.get("os"), Some(&Value::Text("Solaris".into())));
        assert_eq!(record.get("nicks"), Some(&Value::Text("ketchup".into())));
    }

    #[test]
    fn test_save_keeps_rename_made_elsewhere() {
        let mut editor = editor(&catalog::CPU);
        let saved = save_cpu(&mut editor, "ALPHA", "10.0.0.1");

        editor.select("ALPHA").unwrap();
        editor
            .repository()
            .database()
            .update(&catalog::CPU, saved.id, "ZULU", &BTreeMap::new())
            .unwrap();

        editor.set_field("os", "Linux").unwrap();
        let record = editor.save().unwrap();
        assert_eq!(record.id, saved.id);
        assert_eq!(record.key, "ZULU");
        assert_eq!(record.get("os"), Some(&Value::Text("Linux".into())));
        assert!(matches!(editor.load_by_key("ALPHA").unwrap(), Lookup::New(_)));
    }

    #[test]
    fn test_save_of_row_deleted_elsewhere_is_stale() {
        let mut editor = editor(&catalog::CPU);
        save_cpu(&mut editor, "GLDKETCHUP", "10.0.0.1");
        editor.select("GLDKETCHUP").unwrap();
        editor
            .repository()
            .database()
            .delete_by_key(&catalog::CPU, "GLDKETCHUP")
            .unwrap();
        editor.set_field("os", "Linux").unwrap();
        assert!(matches!(editor.save(), Err(Error::StaleRecord { .. })));
        assert!(matches!(editor.state(), EditorState::Error(_)));
    }

    #[test]
    fn test_new_key_created_elsewhere_becomes_update() {
        let mut editor = editor(&catalog::ROLE);
        editor.select("EDGE1").unwrap();
        editor
            .repository()
            .database()
            .insert(&catalog::ROLE, "EDGE1", &BTreeMap::new())
            .unwrap();
        editor.set_field("ipadr", "10.0.0.9").unwrap();
        let record = editor.save().unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(editor.repository().count().unwrap(), 1);
    }

    #[test]
    fn test_sixty_fifth_flag_is_rejected() {
        let mut editor = editor(&catalog::FLAGS);
        for i in 1..=64 {
            editor.select(&format!("FLAG{:02}", i)).unwrap();
            editor.save().unwrap();
        }
        assert_eq!(editor.repository().max_id().unwrap(), 64);

        editor.select("FOO").unwrap();
        editor.set_field("description", "one too many").unwrap();
        match editor.save() {
            Err(Error::Validation(errors)) => {
                assert!(errors.has("flags"));
                assert!(errors.to_string().contains("capacity"));
            }
            other => panic!("expected a capacity error, got {:?}", other),
        }
        assert_eq!(editor.repository().count().unwrap(), 64);

        // Existing rows can still be edited
        editor.select("FLAG64").unwrap();
        editor.set_field("description", "last bit").unwrap();
        assert_eq!(editor.save().unwrap().id, 64);
    }

    #[test]
    fn test_delete_leaves_channel_bits_alone() {
        let mut editor = editor(&catalog::FLAGS);
        editor.select("NOISY").unwrap();
        let flag = editor.save().unwrap();
        editor
            .repository()
            .database()
            .insert_channel("USDUG  BHZ00", 1i64 << (flag.id - 1), 0)
            .unwrap();

        assert_eq!(editor.count_bit_users("noisy").unwrap(), 1);
        assert!(editor.delete("noisy").unwrap());
        assert_eq!(
            bitmask::count_bit_users(editor.repository().database(), &catalog::FLAGS, flag.id)
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_clear_bit_through_editor() {
        let mut editor = editor(&catalog::FLAGS);
        editor.select("NOISY").unwrap();
        editor.save().unwrap();
        editor
            .repository()
            .database()
            .insert_channel("USDUG  BHZ00", 0b11, 0)
            .unwrap();
        assert_eq!(editor.clear_bit_in_all("NOISY").unwrap(), 1);
        assert_eq!(editor.count_bit_users("NOISY").unwrap(), 0);
        assert!(matches!(
            editor.clear_bit_in_all("QUIET"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_of_selected_row_resets() {
        let mut editor = editor(&catalog::CPU);
        save_cpu(&mut editor, "GLDKETCHUP", "10.0.0.1");
        editor.select("GLDKETCHUP").unwrap();
        assert!(editor.delete("gldketchup").unwrap());
        assert_eq!(editor.state(), &EditorState::Empty);
        assert!(!editor.delete("gldketchup").unwrap());
    }

    #[test]
    fn test_list_all_sorted_and_stable() {
        let mut editor = editor(&catalog::CPU);
        for (key, ip) in [("ZULU", "10.0.0.3"), ("ALPHA", "10.0.0.1"), ("MIKE", "10.0.0.2")] {
            save_cpu(&mut editor, key, ip);
        }
        let first = editor.list_all().unwrap();
        let keys: Vec<&str> = first.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["ALPHA", "MIKE", "ZULU"]);

        editor.load_by_key("MIKE").unwrap();
        editor.select("ALPHA").unwrap();
        assert_eq!(*editor.list_all().unwrap(), *first);
    }
}
