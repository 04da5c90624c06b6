use eframe::egui;
use std::sync::Arc;

use edgeconfig_core::{
    Console, EditorState, FieldKind, FieldSpec, RecordEditor, Repository, SchemaPool, Selection,
};

/// Actions that need an explicit yes before they run
enum Confirmation {
    Delete(String),
    ClearBit { key: String, users: usize },
}

/// One console window: a tab per table, each with its own record editor
pub struct ConsoleApp {
    console: Console,
    editors: Vec<RecordEditor>,
    active: usize,
    key_input: String,

    // Messages
    message: Option<(String, bool)>, // (message, is_error)
    confirmation: Option<Confirmation>,

    // Pending operations (to avoid borrow checker issues)
    pending_tab: Option<usize>,
    pending_select: Option<String>,
    pending_edits: Vec<(String, String)>,
    pending_rename: Option<String>,
    pending_save: bool,
    pending_cancel: bool,
    pending_reload: bool,
    pending_delete: Option<String>,
    pending_clear: Option<String>,
    pending_confirm: Option<Confirmation>,
}

impl ConsoleApp {
    pub fn new(console: Console, pool: SchemaPool) -> edgeconfig_core::Result<Self> {
        let editors = console
            .tables()
            .iter()
            .map(|&table| Repository::open(&pool, table).map(|repo| RecordEditor::new(Arc::new(repo))))
            .collect::<edgeconfig_core::Result<Vec<_>>>()?;

        Ok(Self {
            console,
            editors,
            active: 0,
            key_input: String::new(),
            message: None,
            confirmation: None,
            pending_tab: None,
            pending_select: None,
            pending_edits: Vec::new(),
            pending_rename: None,
            pending_save: false,
            pending_cancel: false,
            pending_reload: false,
            pending_delete: None,
            pending_clear: None,
            pending_confirm: None,
        })
    }

    fn editor(&self) -> &RecordEditor {
        &self.editors[self.active]
    }

    fn editor_mut(&mut self) -> &mut RecordEditor {
        &mut self.editors[self.active]
    }

    fn error(&mut self, text: impl Into<String>) {
        self.message = Some((text.into(), true));
    }

    fn info(&mut self, text: impl Into<String>) {
        self.message = Some((text.into(), false));
    }

    fn select(&mut self, key: &str) {
        if key.trim().is_empty() {
            self.error("Enter a key first");
            return;
        }
        let result = self.editor_mut().select(key).map(|form| form.key().to_string());
        match result {
            Ok(key) => {
                self.key_input.clear();
                self.message = None;
                log::debug!("Selected '{}'", key);
            }
            Err(e) => self.error(e.to_string()),
        }
    }

    fn save(&mut self) {
        let table = self.editor().table();
        let result = self.editor_mut().save();
        match result {
            Ok(record) => self.info(format!("Saved {} '{}'", table.name, record.key)),
            Err(e) => self.error(e.to_string()),
        }
    }

    fn delete(&mut self, key: &str) {
        let table = self.editor().table();
        let result = self.editor_mut().delete(key);
        match result {
            Ok(true) => self.info(format!("Deleted {} '{}'", table.name, key)),
            Ok(false) => self.error(format!("{} '{}' was already gone", table.name, key)),
            Err(e) => self.error(e.to_string()),
        }
    }

    fn ask_clear_bit(&mut self, key: &str) {
        match self.editor().count_bit_users(key) {
            Ok(users) => {
                self.pending_confirm = Some(Confirmation::ClearBit {
                    key: key.to_string(),
                    users,
                })
            }
            Err(e) => self.error(e.to_string()),
        }
    }

    fn clear_bit(&mut self, key: &str) {
        match self.editor().clear_bit_in_all(key) {
            Ok(changed) => self.info(format!("Cleared '{}' in {} row(s)", key, changed)),
            Err(e) => self.error(e.to_string()),
        }
    }

    fn apply_pending(&mut self) {
        if let Some(tab) = self.pending_tab.take() {
            if tab < self.editors.len() {
                self.active = tab;
                self.key_input.clear();
                self.message = None;
            }
        }
        if let Some(key) = self.pending_select.take() {
            self.select(&key);
        }
        for (field, value) in std::mem::take(&mut self.pending_edits) {
            if let Err(e) = self.editor_mut().set_field(&field, &value) {
                self.error(e.to_string());
            }
        }
        if let Some(rename) = self.pending_rename.take() {
            if let Err(e) = self.editor_mut().set_rename(&rename) {
                self.error(e.to_string());
            }
        }
        if std::mem::take(&mut self.pending_save) {
            self.save();
        }
        if std::mem::take(&mut self.pending_cancel) {
            self.editor_mut().reset();
            self.message = None;
        }
        if std::mem::take(&mut self.pending_reload) {
            self.editor().reload();
            self.info("Reloaded");
        }
        if let Some(key) = self.pending_delete.take() {
            self.delete(&key);
        }
        if let Some(key) = self.pending_clear.take() {
            self.clear_bit(&key);
        }
        if let Some(confirmation) = self.pending_confirm.take() {
            self.confirmation = Some(confirmation);
        }
    }

    fn show_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.strong(self.console.title());
                ui.separator();

                for (idx, editor) in self.editors.iter().enumerate() {
                    if ui
                        .selectable_label(idx == self.active, editor.table().title)
                        .clicked()
                    {
                        self.pending_tab = Some(idx);
                    }
                }

                ui.separator();
                if ui.button("Reload").clicked() {
                    self.pending_reload = true;
                }

                // Show message
                if let Some((msg, is_error)) = &self.message {
                    ui.separator();
                    let color = if *is_error {
                        egui::Color32::RED
                    } else {
                        egui::Color32::GREEN
                    };
                    ui.colored_label(color, msg);
                }
            });
        });
    }

    fn show_list_panel(&mut self, ctx: &egui::Context) {
        let table = self.editor().table();
        let rows = self.editor().list_all();
        let selected_key = self.editor().form().map(|f| f.key().to_string());

        egui::SidePanel::left("list_panel")
            .min_width(260.0)
            .show(ctx, |ui| {
                ui.heading(table.title);
                ui.separator();

                ui.horizontal(|ui| {
                    ui.label("Key:");
                    let response = ui.text_edit_singleline(&mut self.key_input);
                    let entered =
                        response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    if ui.button("Open").clicked() || entered {
                        self.pending_select = Some(self.key_input.clone());
                    }
                });

                ui.separator();

                let rows = match rows {
                    Ok(rows) => rows,
                    Err(e) => {
                        ui.colored_label(egui::Color32::RED, e.to_string());
                        return;
                    }
                };
                ui.label(format!("{} row(s)", rows.len()));

                let filter = self.key_input.to_lowercase();
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for row in rows.iter() {
                        if !filter.is_empty() && !row.key.to_lowercase().contains(&filter) {
                            continue;
                        }
                        let selected = selected_key.as_deref() == Some(row.key.as_str());
                        if ui.selectable_label(selected, &row.key).clicked() {
                            self.pending_select = Some(row.key.clone());
                        }
                    }
                });
            });
    }

    fn show_form(&mut self, ui: &mut egui::Ui) {
        let table = self.editor().table();
        let state = self.editor().state().clone();
        let Some(form) = self.editor().form().cloned() else {
            ui.vertical_centered(|ui| {
                ui.add_space(100.0);
                match &state {
                    EditorState::Saved(record) => {
                        ui.heading(format!("Saved {} '{}'", table.name, record.key));
                    }
                    _ => {
                        ui.heading(format!("Select a {} from the list or enter a new key", table.name));
                    }
                }
            });
            return;
        };

        let heading = if form.is_new() {
            format!("New {} '{}'", table.name, form.key())
        } else {
            format!("{} '{}'", table.name, form.key())
        };
        ui.heading(heading);
        match &state {
            EditorState::Selected(Selection::New) => {
                ui.label("No row has this key yet; saving will create it.");
            }
            EditorState::Error(msg) => {
                ui.colored_label(egui::Color32::RED, msg);
            }
            _ => {}
        }
        ui.separator();

        egui::ScrollArea::vertical().show(ui, |ui| {
            egui::Grid::new("form_grid")
                .num_columns(2)
                .spacing([40.0, 8.0])
                .striped(true)
                .show(ui, |ui| {
                    if !form.is_new() {
                        ui.label("Rename to:");
                        let mut rename = form.rename().to_string();
                        if ui.text_edit_singleline(&mut rename).changed() {
                            self.pending_rename = Some(rename);
                        }
                        ui.end_row();
                    }

                    for field in table.fields {
                        ui.label(format!("{}:", field.label));
                        if let Some(value) = field_widget(ui, field, form.get(field.name)) {
                            self.pending_edits.push((field.name.to_string(), value));
                        }
                        ui.end_row();
                    }
                });
        });

        ui.separator();
        ui.horizontal(|ui| {
            if ui.button("Save").clicked() {
                self.pending_save = true;
            }
            if ui.button("Cancel").clicked() {
                self.pending_cancel = true;
            }
            if !form.is_new() {
                if ui.button("Delete").clicked() {
                    self.pending_confirm = Some(Confirmation::Delete(form.key().to_string()));
                }
                if table.is_bitmask() && ui.button("Clear bit in all rows").clicked() {
                    self.ask_clear_bit(form.key());
                }
            }
        });
    }

    fn show_confirmation(&mut self, ctx: &egui::Context) {
        let text = match &self.confirmation {
            None => return,
            Some(Confirmation::Delete(key)) => {
                format!("Delete {} '{}'?", self.editor().table().name, key)
            }
            Some(Confirmation::ClearBit { key, users }) => {
                let target = self
                    .editor()
                    .table()
                    .bitmask
                    .map(|b| format!("{}.{}", b.table, b.column))
                    .unwrap_or_default();
                format!(
                    "'{}' is set in {} row(s) of {}. Clear it from every row?",
                    key, users, target
                )
            }
        };

        let mut answer = None;
        egui::Window::new("Confirm")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(text);
                ui.horizontal(|ui| {
                    if ui.button("Yes").clicked() {
                        answer = Some(true);
                    }
                    if ui.button("No").clicked() {
                        answer = Some(false);
                    }
                });
            });

        match (answer, self.confirmation.take()) {
            (Some(true), Some(Confirmation::Delete(key))) => self.pending_delete = Some(key),
            (Some(true), Some(Confirmation::ClearBit { key, .. })) => self.pending_clear = Some(key),
            (Some(false), Some(_)) => self.info("Cancelled"),
            (None, pending) => self.confirmation = pending,
            _ => {}
        }
    }
}

/// Draws the input for one field; returns the new text when it changed
fn field_widget(ui: &mut egui::Ui, field: &FieldSpec, current: &str) -> Option<String> {
    match field.kind {
        FieldKind::Bool => {
            let mut on = current == "true";
            ui.checkbox(&mut on, "")
                .changed()
                .then(|| on.to_string())
        }
        FieldKind::Enum { options } => {
            let mut selected = current.to_string();
            egui::ComboBox::new(field.name, "")
                .selected_text(selected.clone())
                .show_ui(ui, |ui| {
                    for option in options {
                        ui.selectable_value(&mut selected, option.to_string(), *option);
                    }
                });
            (selected != current).then_some(selected)
        }
        FieldKind::Text {
            multiline: true, ..
        } => {
            let mut text = current.to_string();
            ui.text_edit_multiline(&mut text).changed().then_some(text)
        }
        _ => {
            let mut text = current.to_string();
            ui.text_edit_singleline(&mut text).changed().then_some(text)
        }
    }
}

impl eframe::App for ConsoleApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Handle pending operations (to avoid borrow checker issues)
        self.apply_pending();

        self.show_top_panel(ctx);
        self.show_list_panel(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_form(ui);
        });

        self.show_confirmation(ctx);
    }
}
