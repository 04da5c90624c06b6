//! Flat-file export of the ANSS station configuration
//!
//! One block of `key="value"` lines per station, blocks separated by a blank
//! line, stations in natural key order.

use log::info;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::bitmask::ids_in_mask;
use crate::catalog;
use crate::db::SchemaPool;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::repository::Repository;

/// The three cached lookup tables the export is built from
pub struct StationExport {
    stations: Repository,
    rules: Repository,
    groups: Repository,
}

impl StationExport {
    pub fn new(stations: Repository, rules: Repository, groups: Repository) -> Self {
        Self {
            stations,
            rules,
            groups,
        }
    }

    pub fn open(pool: &SchemaPool) -> Result<Self> {
        Ok(Self::new(
            Repository::open(pool, &catalog::SNWSTATION)?,
            Repository::open(pool, &catalog::SNWRULE)?,
            Repository::open(pool, &catalog::SNWGROUP)?,
        ))
    }

    /// Renders every station block, returning the station count and the text
    pub fn render(&self) -> Result<(usize, String)> {
        let stations = self.stations.list_all()?;
        let rules = names_by_id(&self.rules.list_all()?);
        let groups = names_by_id(&self.groups.list_all()?);

        let mut text = String::new();
        for station in stations.iter() {
            write_station(&mut text, station, &rules, &groups);
        }
        Ok((stations.len(), text))
    }

    /// Writes the export file at `path`
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let (count, text) = self.render()?;
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(text.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| Error::io(path, e))?;
        info!("Exported {} station(s) to {}", count, path.display());
        Ok(count)
    }
}

fn names_by_id(rows: &[Record]) -> HashMap<i64, String> {
    rows.iter().map(|r| (r.id, r.key.clone())).collect()
}

fn write_station(
    out: &mut String,
    station: &Record,
    rules: &HashMap<i64, String>,
    groups: &HashMap<i64, String>,
) {
    let text = |field: &str| {
        station
            .get(field)
            .and_then(|v| v.as_text())
            .unwrap_or("")
            .to_string()
    };
    let int = |field: &str| station.get(field).and_then(|v| v.as_int()).unwrap_or(0);

    let rule = rules.get(&int("snwruleid")).cloned().unwrap_or_default();
    let group_names: Vec<String> = ids_in_mask(int("groupmask"))
        .into_iter()
        .filter_map(|id| groups.get(&id).cloned())
        .collect();

    write_pair(out, "station", &station.key);
    write_pair(out, "network", &text("network"));
    write_pair(out, "rule", &rule);
    write_pair(out, "groups", &group_names.join(","));
    write_pair(out, "description", &text("description"));
    out.push('\n');
}

fn write_pair(out: &mut String, key: &str, value: &str) {
    out.push_str(&format!("{}=\"{}\"\n", key, value.replace('"', "'")));
}
