//! Core library for editing EDGE/CWB configuration tables
//!
//! Shared by the `edgeconfig` CLI and the `edgeconfig-gui` consoles.

pub mod bitmask;
pub mod catalog;
pub mod config;
pub mod db;
pub mod editor;
pub mod error;
pub mod export;
pub mod help_import;
pub mod keystore;
pub mod launcher;
pub mod record;
pub mod repository;
pub mod table;
pub mod validate;

// Re-export commonly used types
pub use catalog::{Console, TABLES};
pub use config::{get_config_path, resolve_path, Config, CONFIG_ENV};
pub use db::{Database, SchemaPool};
pub use editor::{EditorState, Form, Lookup, RecordEditor, Selection};
pub use error::{Error, Result};
pub use export::StationExport;
pub use help_import::{import_help, HelpImportSummary};
pub use keystore::Keytool;
pub use launcher::dispatch;
pub use record::Record;
pub use repository::Repository;
pub use table::{FieldKind, FieldSpec, KeyCase, TableDescriptor, Value};
pub use validate::{FieldError, ValidationErrors};
