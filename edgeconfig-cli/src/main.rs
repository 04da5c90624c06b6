mod cli;
mod prompts;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

use edgeconfig_core::catalog::{self, SCHEMAS};
use edgeconfig_core::{
    import_help, resolve_path, Config, Error, Keytool, Lookup, Record, RecordEditor, Repository,
    SchemaPool, StationExport, TableDescriptor, TABLES,
};

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config_path = resolve_path(cli.config.as_deref())?;
    debug!("Using configuration {}", config_path.display());
    let config = Config::load(&config_path).context("Failed to load configuration")?;
    let pool = SchemaPool::from_config(&config);

    match &cli.command {
        Command::Init => init(&config, &config_path, &pool)?,
        Command::Tables => list_tables(),
        Command::List { table } => list_rows(&pool, table)?,
        Command::Show { table, key, json } => show_row(&pool, table, key, *json)?,
        Command::Set {
            table,
            key,
            fields,
            rename,
        } => set_row(&pool, table, key, fields, rename.as_deref())?,
        Command::Edit { table, key } => edit_row(&pool, table, key)?,
        Command::Del { table, key, yes } => delete_row(&pool, table, key, *yes)?,
        Command::ClearBit { table, key, yes } => clear_bit(&pool, table, key, *yes)?,
        Command::ExportStations { output } => export_stations(&pool, output.as_deref())?,
        Command::ImportHelp { dir } => import_help_dir(&pool, dir)?,
        Command::ImportCert {
            pem,
            keystore,
            alias,
            storepass,
        } => import_cert(&config, pem, keystore.as_deref(), alias, storepass.as_deref())?,
    }

    Ok(())
}

fn descriptor(name: &str) -> Result<&'static TableDescriptor> {
    catalog::table(name).ok_or_else(|| Error::UnknownTable(name.to_string()).into())
}

fn open_editor(pool: &SchemaPool, table: &str) -> Result<RecordEditor> {
    let table = descriptor(table)?;
    let repo = Repository::open(pool, table)
        .with_context(|| format!("Failed to open schema '{}'", table.schema))?;
    Ok(RecordEditor::new(Arc::new(repo)))
}

fn init(config: &Config, config_path: &Path, pool: &SchemaPool) -> Result<()> {
    if config_path.exists() {
        info!("Keeping existing configuration {}", config_path.display());
    } else {
        config
            .save(config_path)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        println!("{} {}", "Wrote".green(), config_path.display());
    }
    init_schemas(pool)
}

fn init_schemas(pool: &SchemaPool) -> Result<()> {
    for schema in SCHEMAS {
        pool.get(schema)
            .with_context(|| format!("Failed to initialise schema '{}'", schema))?;
        let location = pool
            .path_for(schema)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(memory)".to_string());
        println!("{} {} -> {}", "Ready".green(), schema, location);
    }
    Ok(())
}

fn list_tables() {
    println!("{:<12} | {:<8} | {:<30} | {:<20}", "Table", "Schema", "Title", "Bitmask of");
    println!("{}", "-".repeat(80));
    for table in TABLES {
        let target = table
            .bitmask
            .map(|b| format!("{}.{}", b.table, b.column))
            .unwrap_or_default();
        println!(
            "{:<12} | {:<8} | {:<30} | {:<20}",
            table.name.bold(),
            table.schema,
            table.title,
            target.cyan()
        );
    }
}

fn list_rows(pool: &SchemaPool, table: &str) -> Result<()> {
    let editor = open_editor(pool, table)?;
    let table = editor.table();
    let rows = editor.list_all()?;

    if rows.is_empty() {
        println!("{}", format!("No {} rows found.", table.name).yellow());
        return Ok(());
    }

    let mut header = format!("{:<5} | {:<20}", "Id", table.key_column());
    for field in table.fields {
        header.push_str(&format!(" | {:<16}", field.name));
    }
    println!("{}", header);
    println!("{}", "-".repeat(header.len()));

    for row in rows.iter() {
        let mut line = format!("{:<5} | {:<20}", row.id, row.key.bold());
        for field in table.fields {
            line.push_str(&format!(" | {:<16}", truncate(&row.display(table, field.name), 16)));
        }
        println!("{}", line);
    }
    println!("\n{} row(s)", rows.len());
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    let first_line = text.lines().next().unwrap_or("");
    if first_line.chars().count() > width {
        let mut short: String = first_line.chars().take(width - 1).collect();
        short.push('~');
        short
    } else {
        first_line.to_string()
    }
}

fn print_record(table: &TableDescriptor, record: &Record) {
    println!("{}: {}", "Id".blue(), record.id);
    println!("{}: {}", table.key_column().blue(), record.key);
    for field in table.fields {
        println!("{}: {}", field.label.blue(), record.display(table, field.name));
    }
}

fn show_row(pool: &SchemaPool, table: &str, key: &str, json: bool) -> Result<()> {
    let editor = open_editor(pool, table)?;
    let record = match editor.load_by_key(key)? {
        Lookup::Found(record) => record,
        Lookup::New(key) => bail!("{} '{}' not found", editor.table().name, key),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(editor.table(), &record);
    }
    Ok(())
}

fn parse_assignment(text: &str) -> Result<(&str, &str)> {
    text.split_once('=')
        .map(|(name, value)| (name.trim(), value))
        .with_context(|| format!("Expected NAME=VALUE, got '{}'", text))
}

fn set_row(
    pool: &SchemaPool,
    table: &str,
    key: &str,
    fields: &[String],
    rename: Option<&str>,
) -> Result<()> {
    let mut editor = open_editor(pool, table)?;
    let is_new = editor.select(key)?.is_new();

    for assignment in fields {
        let (name, value) = parse_assignment(assignment)?;
        editor.set_field(name, value)?;
    }
    if let Some(new_key) = rename {
        editor.set_rename(new_key)?;
    }

    save(&mut editor, is_new)
}

fn save(editor: &mut RecordEditor, is_new: bool) -> Result<()> {
    match editor.save() {
        Ok(record) => {
            let verb = if is_new { "Created" } else { "Updated" };
            println!(
                "{} {} '{}' (id {})",
                verb.green(),
                editor.table().name,
                record.key,
                record.id
            );
            Ok(())
        }
        Err(Error::Validation(errors)) => {
            println!("{}", "Not saved:".red());
            for error in errors.errors() {
                println!("  {}: {}", error.field.yellow(), error.message);
            }
            bail!("{} validation error(s)", errors.len())
        }
        Err(e) => Err(e.into()),
    }
}

fn edit_row(pool: &SchemaPool, table: &str, key: &str) -> Result<()> {
    let mut editor = open_editor(pool, table)?;
    let form = editor.select(key)?.clone();
    let table = editor.table();

    if form.is_new() {
        println!("New {} '{}'", table.name, form.key());
    } else {
        println!("Editing {} '{}'", table.name, form.key());
    }

    let changes = prompts::prompt_fields(table, &form)?;
    for (name, value) in &changes {
        editor.set_field(name, value)?;
    }
    let renamed = if form.is_new() {
        None
    } else {
        prompts::prompt_rename(form.key())?
    };
    if let Some(new_key) = &renamed {
        editor.set_rename(new_key)?;
    }

    if changes.is_empty() && renamed.is_none() && !form.is_new() {
        println!("{}", "No changes.".yellow());
        return Ok(());
    }
    save(&mut editor, form.is_new())
}

fn delete_row(pool: &SchemaPool, table: &str, key: &str, skip_confirm: bool) -> Result<()> {
    let mut editor = open_editor(pool, table)?;
    let record = match editor.load_by_key(key)? {
        Lookup::Found(record) => record,
        Lookup::New(key) => bail!("{} '{}' not found", editor.table().name, key),
    };

    println!("{}", format!("{} to delete:", editor.table().name).yellow());
    print_record(editor.table(), &record);
    if editor.table().is_bitmask() {
        let users = editor.count_bit_users(&record.key)?;
        if users > 0 {
            println!(
                "{}",
                format!(
                    "{} row(s) still have this bit set; run clear-bit first to release it.",
                    users
                )
                .yellow()
            );
        }
    }

    if !skip_confirm && !prompts::confirm("Are you sure you want to delete this row?")? {
        println!("{}", "Deletion cancelled.".yellow());
        return Ok(());
    }

    if editor.delete(&record.key)? {
        println!("{} {} '{}'", "Deleted".green(), editor.table().name, record.key);
    }
    Ok(())
}

fn clear_bit(pool: &SchemaPool, table: &str, key: &str, skip_confirm: bool) -> Result<()> {
    let editor = open_editor(pool, table)?;
    let table = editor.table();
    let target = table
        .bitmask
        .ok_or_else(|| Error::NotBitmask(table.name.to_string()))?;
    let users = editor.count_bit_users(key)?;
    let key = table.normalize_key(key);

    println!(
        "{} '{}' is set in {} row(s) of {}.{}",
        table.name, key, users, target.table, target.column
    );
    if users == 0 {
        println!("{}", "Nothing to clear.".yellow());
        return Ok(());
    }

    let question = format!(
        "Clear '{}' from {}.{} in every row?",
        key, target.table, target.column
    );
    if !skip_confirm && !prompts::confirm(&question)? {
        println!("{}", "Cancelled.".yellow());
        return Ok(());
    }

    let changed = editor.clear_bit_in_all(&key)?;
    println!("{} {} row(s)", "Cleared".green(), changed);
    Ok(())
}

fn export_stations(pool: &SchemaPool, output: Option<&Path>) -> Result<()> {
    let export = StationExport::open(pool).context("Failed to open station tables")?;
    match output {
        Some(path) => {
            let count = export.write_file(path)?;
            eprintln!("{} {} station(s) to {}", "Exported".green(), count, path.display());
        }
        None => {
            let (_, text) = export.render()?;
            print!("{}", text);
        }
    }
    Ok(())
}

fn import_help_dir(pool: &SchemaPool, dir: &Path) -> Result<()> {
    let editor = open_editor(pool, catalog::HELP.name)?;
    let summary = import_help(&editor, dir)
        .with_context(|| format!("Failed to import help from {}", dir.display()))?;

    println!(
        "{} {} class description(s), skipped {}",
        "Imported".green(),
        summary.imported,
        summary.skipped
    );
    for (page, reason) in &summary.failed {
        println!("  {} {}: {}", "failed".red(), page.display(), reason);
    }
    if !summary.failed.is_empty() {
        bail!("{} page(s) could not be saved", summary.failed.len());
    }
    Ok(())
}

fn import_cert(
    config: &Config,
    pem: &Path,
    keystore: Option<&Path>,
    alias: &str,
    storepass: Option<&str>,
) -> Result<()> {
    let mut keytool = Keytool::from_config(config, keystore)?;
    if let Some(pass) = storepass {
        keytool = keytool.with_storepass(pass);
    }
    keytool
        .import_file(alias, pem)
        .with_context(|| format!("Failed to import {}", pem.display()))?;
    println!(
        "{} '{}' into {}",
        "Imported".green(),
        alias,
        keytool.keystore().display()
    );
    Ok(())
}
