//! Loads class descriptions from Javadoc HTML into the `help` table

use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::editor::{Form, Lookup, RecordEditor};
use crate::error::{Error, Result};

/// Outcome of an import run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelpImportSummary {
    pub imported: usize,
    pub skipped: usize,
    /// Pages whose save failed, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

static RE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<div class="block">(.*?)</div>"#).expect("block regex")
});

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));

/// True for pages documenting a single class (`EdgeMom.html`), false for the
/// index and summary pages Javadoc also generates
pub fn is_class_page(path: &Path) -> bool {
    let is_html = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("html"))
        .unwrap_or(false);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    is_html
        && stem.chars().next().map(char::is_uppercase).unwrap_or(false)
        && !stem.contains('-')
}

/// Plain text of the first class description block, `None` if there is none
pub fn extract_description(html: &str) -> Option<String> {
    let block = RE_BLOCK.captures(html)?.get(1)?.as_str();
    let text = RE_TAG.replace_all(block, " ");
    let text = decode_entities(&text);
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn collect_pages(dir: &Path, pages: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_dir() {
            collect_pages(&path, pages)?;
        } else if is_class_page(&path) {
            pages.push(path);
        }
    }
    Ok(())
}

/// Walks `dir` and upserts one `help` row per documented class, keyed by the
/// class name. `editor` must be an editor on the `help` table.
pub fn import_help(editor: &RecordEditor, dir: &Path) -> Result<HelpImportSummary> {
    let table = editor.table();
    if table.field("helptext").is_none() {
        return Err(Error::UnknownField {
            table: table.name.to_string(),
            field: "helptext".to_string(),
        });
    }

    let mut pages = Vec::new();
    collect_pages(dir, &mut pages)?;
    pages.sort();

    let mut summary = HelpImportSummary::default();
    for page in pages {
        let html = fs::read_to_string(&page).map_err(|e| Error::io(&page, e))?;
        let Some(description) = extract_description(&html) else {
            warn!("No class description in {}, skipped", page.display());
            summary.skipped += 1;
            continue;
        };
        let class = page
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let mut form = match editor.load_by_key(&class)? {
            Lookup::Found(record) => Form::from_record(table, &record),
            Lookup::New(key) => Form::blank(table, &key),
        };
        form.set("helptext", &description);
        match editor.save_form(&form) {
            Ok(_) => summary.imported += 1,
            Err(e) => {
                warn!("Help for {} not saved: {}", class, e);
                summary.failed.push((page, e.to_string()));
            }
        }
    }

    info!(
        "Help import from {}: {} imported, {} skipped, {} failed",
        dir.display(),
        summary.imported,
        summary.skipped,
        summary.failed.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::db::Database;
    use crate::repository::Repository;
    use std::sync::Arc;
    use tempfile::TempDir;

    const PAGE: &str = r#"<html><body>
<div class="header"><h2 title="Class EdgeMom">Class EdgeMom</h2></div>
<div class="description">
<div class="block">This class is the main <code>EdgeMom</code> thread &amp; it
 starts every   other thread &lt;see config&gt;.</div>
</div>
<div class="block">Method detail, not used</div>
</body></html>"#;

    fn help_editor() -> RecordEditor {
        let db = Arc::new(Database::open_in_memory("edge").unwrap());
        RecordEditor::new(Arc::new(Repository::new(&catalog::HELP, db)))
    }

    #[test]
    fn test_extract_description() {
        assert_eq!(
            extract_description(PAGE).as_deref(),
            Some("This class is the main EdgeMom thread & it starts every other thread <see config>.")
        );
        assert_eq!(extract_description("<html></html>"), None);
        assert_eq!(extract_description(r#"<div class="block"> </div>"#), None);
    }

    #[test]
    fn test_is_class_page() {
        assert!(is_class_page(Path::new("gov/usgs/anss/edge/EdgeMom.html")));
        assert!(!is_class_page(Path::new("gov/usgs/anss/edge/package-summary.html")));
        assert!(!is_class_page(Path::new("index.html")));
        assert!(!is_class_page(Path::new("EdgeMom.txt")));
    }

    #[test]
    fn test_import_walks_tree_and_upserts() {
        let dir = TempDir::new().unwrap();
        let pkg = dir.path().join("gov/usgs/anss/edge");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("EdgeMom.html"), PAGE).unwrap();
        fs::write(pkg.join("Empty.html"), "<html></html>").unwrap();
        fs::write(pkg.join("package-summary.html"), PAGE).unwrap();
        fs::write(dir.path().join("index.html"), PAGE).unwrap();

        let editor = help_editor();
        let summary = import_help(&editor, dir.path()).unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 1);
        assert!(summary.failed.is_empty());

        let rows = editor.list_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "EDGEMOM");
        assert!(rows[0].display(&catalog::HELP, "helptext").starts_with("This class"));

        // A second run updates in place
        fs::write(
            pkg.join("EdgeMom.html"),
            r#"<div class="block">Rewritten.</div>"#,
        )
        .unwrap();
        import_help(&editor, dir.path()).unwrap();
        let rows = editor.list_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].display(&catalog::HELP, "helptext"), "Rewritten.");
    }

    #[test]
    fn test_import_requires_help_table() {
        let db = Arc::new(Database::open_in_memory("edge").unwrap());
        let editor = RecordEditor::new(Arc::new(Repository::new(&catalog::CPU, db)));
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            import_help(&editor, dir.path()),
            Err(Error::UnknownField { .. })
        ));
    }
}
