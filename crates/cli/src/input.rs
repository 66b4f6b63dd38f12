//! Loading the files the binary is pointed at.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use mf_core::live::{EntityCollection, LiveSnapshot};
use mf_core::schema::{schemas_from_json, SchemaMap};
use mf_core::tabular::UploadFile;
use serde_json::Value;

pub fn load_schemas(path: &Path) -> Result<SchemaMap> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {}", path.display()))?;
    let schemas = schemas_from_json(&raw)
        .with_context(|| format!("Invalid schema file {}", path.display()))?;
    tracing::info!(count = schemas.len(), "Loaded schemas");
    Ok(schemas)
}

pub fn load_upload(path: &Path) -> Result<UploadFile> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Not a file path: {}", path.display()))?;
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read intake file {}", path.display()))?;
    Ok(UploadFile::new(name, bytes))
}

/// Read live records from a JSON object mapping schema names to record
/// arrays.
pub fn load_live(path: &Path) -> Result<LiveSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read live data file {}", path.display()))?;
    let doc: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    let Value::Object(collections) = doc else {
        bail!("Live data file must be a JSON object keyed by schema name");
    };

    let mut snapshot = LiveSnapshot::new();
    for (schema_name, records) in collections {
        let Value::Array(items) = records else {
            bail!("Live data for '{schema_name}' must be an array of records");
        };
        let records = items
            .into_iter()
            .map(|item| match item {
                Value::Object(record) => Ok(record),
                other => Err(anyhow!("Live record for '{schema_name}' is not an object: {other}")),
            })
            .collect::<Result<Vec<_>>>()?;
        snapshot.insert(schema_name, EntityCollection::loaded(records));
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn live_file_loads_each_collection() {
        let file = temp_file(
            ".json",
            r#"{"wave": [{"wave_id": "1", "wave_name": "W1"}], "server": []}"#,
        );
        let snapshot = load_live(file.path()).unwrap();
        assert_eq!(snapshot.records("wave").len(), 1);
        assert!(snapshot.collection("server").unwrap().data.is_empty());
        assert!(snapshot.ensure_ready(&["wave", "server"]).is_ok());
    }

    #[test]
    fn live_file_rejects_non_object_records() {
        let file = temp_file(".json", r#"{"wave": ["W1"]}"#);
        let err = load_live(file.path()).unwrap_err();
        assert!(err.to_string().contains("'wave'"));
    }

    #[test]
    fn upload_takes_the_file_name() {
        let file = temp_file(".csv", "wave_name\nW1\n");
        let upload = load_upload(file.path()).unwrap();
        assert!(upload.name.ends_with(".csv"));
        assert_eq!(upload.size, 13);
    }
}
