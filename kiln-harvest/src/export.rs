//! Dataset export
//!
//! Writes `<name>.json` and `<name>.csv` from one store snapshot, so both files
//! always describe the same entries in the same (commit) order.
//!
//! JSON: one object keyed by the identifier's decimal string, each value the
//! full [`DatasetEntry`].
//!
//! CSV columns: identifier, title, culture, period, objectDate, classification,
//! era, sub-period, local path. Fields containing a comma, quote, CR or LF are
//! quoted with embedded quotes doubled; records end with CRLF.

use crate::error::{HarvestError, HarvestResult};
use crate::models::DatasetEntry;
use crate::services::MetadataStore;
use crate::utils::write_atomic;
use serde::ser::{SerializeMap, Serializer};
use std::path::{Path, PathBuf};
use tracing::info;

/// CSV header row
pub const CSV_COLUMNS: [&str; 9] = [
    "identifier",
    "title",
    "culture",
    "period",
    "objectDate",
    "classification",
    "era",
    "sub-period",
    "local path",
];

/// Files written by [`export_dataset`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
}

/// Serialize entries as a JSON object keyed by identifier
pub fn to_json(entries: &[DatasetEntry]) -> HarvestResult<String> {
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(
        &mut buffer,
        serde_json::ser::PrettyFormatter::with_indent(b"  "),
    );

    let json_error = |e: serde_json::Error| HarvestError::Export(format!("JSON encoding failed: {}", e));

    let mut map = serializer.serialize_map(Some(entries.len())).map_err(json_error)?;
    for entry in entries {
        map.serialize_entry(&entry.object_id().to_string(), entry)
            .map_err(json_error)?;
    }
    map.end().map_err(json_error)?;

    String::from_utf8(buffer).map_err(|e| HarvestError::Export(e.to_string()))
}

/// Serialize entries as CSV with a header row
pub fn to_csv(entries: &[DatasetEntry]) -> String {
    let mut out = String::new();
    push_row(&mut out, CSV_COLUMNS.iter().map(|c| c.to_string()));

    for entry in entries {
        let record = &entry.record;
        let text = |field: &Option<String>| field.clone().unwrap_or_default();
        push_row(
            &mut out,
            [
                record.object_id.to_string(),
                text(&record.title),
                text(&record.culture),
                text(&record.period),
                text(&record.object_date),
                text(&record.classification),
                entry.classification.era.to_string(),
                entry.classification.sub_period.clone(),
                entry
                    .local_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ],
        );
    }

    out
}

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    for (index, field) in fields.into_iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(&quote_field(&field));
    }
    out.push_str("\r\n");
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Write both export files for the store's current contents into `directory`
pub async fn export_dataset(
    store: &MetadataStore,
    directory: &Path,
    dataset_name: &str,
) -> HarvestResult<ExportPaths> {
    let entries = store.snapshot();

    let paths = ExportPaths {
        json: directory.join(format!("{}.json", dataset_name)),
        csv: directory.join(format!("{}.csv", dataset_name)),
    };

    let json = to_json(&entries)?;
    write_atomic(&paths.json, json.as_bytes()).await.map_err(|e| {
        HarvestError::Export(format!("Failed to write {}: {}", paths.json.display(), e))
    })?;

    write_atomic(&paths.csv, to_csv(&entries).as_bytes()).await.map_err(|e| {
        HarvestError::Export(format!("Failed to write {}: {}", paths.csv.display(), e))
    })?;

    info!(
        entries = entries.len(),
        json = %paths.json.display(),
        csv = %paths.csv.display(),
        "Dataset exported"
    );
    Ok(paths)
}
