use anyhow::Result;
use inquire::{Confirm, Editor, Select, Text};

use edgeconfig_core::{FieldKind, Form, TableDescriptor};

/// Prompts for every field of `form`, pre-filled with its current text.
///
/// Returns the `(field, value)` pairs the operator changed.
pub fn prompt_fields(table: &TableDescriptor, form: &Form) -> Result<Vec<(String, String)>> {
    let mut changes = Vec::new();

    for field in table.fields {
        let current = form.get(field.name);
        let value = match field.kind {
            FieldKind::Bool => {
                let on = matches!(current, "true" | "1");
                Confirm::new(&format!("{}?", field.label))
                    .with_default(on)
                    .prompt()?
                    .to_string()
            }
            FieldKind::Enum { options } => {
                let start = options.iter().position(|o| *o == current).unwrap_or(0);
                Select::new(&format!("{}:", field.label), options.to_vec())
                    .with_starting_cursor(start)
                    .prompt()?
                    .to_string()
            }
            FieldKind::Text {
                multiline: true, ..
            } => Editor::new(&format!("{}:", field.label))
                .with_predefined_text(current)
                .prompt()?,
            _ => Text::new(&format!("{}:", field.label))
                .with_initial_value(current)
                .prompt()?,
        };

        if value != current {
            changes.push((field.name.to_string(), value));
        }
    }

    Ok(changes)
}

/// Optional new key; empty keeps the current one
pub fn prompt_rename(current: &str) -> Result<Option<String>> {
    let prompt = format!("Rename [{}]:", current);
    let new_key = Text::new(&prompt).prompt()?;
    if new_key.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(new_key))
    }
}

/// Yes/no question defaulting to no
pub fn confirm(question: &str) -> Result<bool> {
    Ok(Confirm::new(question).with_default(false).prompt()?)
}
