#![allow(dead_code)]

use mf_core::live::{EntityCollection, LiveSnapshot};
use mf_core::schema::{schemas_from_json, SchemaMap};
use mf_core::tabular::{decode_delimited, RawRow};
use mf_core::types::Record;
use serde_json::{json, Value};

/// Wave / application / server schemas as served by a default install.
pub fn schemas() -> SchemaMap {
    let doc = json!([
        {
            "schema_name": "wave",
            "schema_type": "user",
            "attributes": [
                {"name": "wave_id", "type": "string", "system": true},
                {"name": "wave_name", "type": "string", "required": true},
                {"name": "wave_status", "type": "list",
                 "listvalue": "Not started,Planning,In progress,Completed"}
            ]
        },
        {
            "schema_name": "application",
            "schema_type": "user",
            "attributes": [
                {"name": "app_id", "type": "string", "system": true},
                {"name": "app_name", "type": "string", "required": true},
                {"name": "wave_id", "type": "relationship", "rel_entity": "wave",
                 "rel_key": "wave_id", "rel_display_attribute": "wave_name"},
                {"name": "aws_region", "type": "string"}
            ]
        },
        {
            "schema_name": "server",
            "schema_type": "user",
            "attributes": [
                {"name": "server_id", "type": "string", "system": true},
                {"name": "server_name", "type": "string", "required": true},
                {"name": "app_id", "type": "relationship", "rel_entity": "application",
                 "rel_key": "app_id", "rel_display_attribute": "app_name", "required": true},
                {"name": "server_os_family", "type": "list", "listvalue": "windows,linux"},
                {"name": "tags", "type": "tag"},
                {"name": "security_group_IDs", "type": "multivalue-string"},
                {"name": "use_fastlaunch", "type": "checkbox"}
            ]
        },
        {
            "schema_name": "secret",
            "schema_type": "system",
            "attributes": [{"name": "secret_name"}]
        }
    ]);
    schemas_from_json(&doc.to_string()).expect("test schemas parse")
}

/// Decode CSV text into rows.
pub fn csv_rows(text: &str) -> Vec<RawRow> {
    decode_delimited(text.as_bytes()).expect("test csv decodes")
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("record literal is an object")
}

pub fn snapshot(collections: &[(&str, Vec<Value>)]) -> LiveSnapshot {
    collections
        .iter()
        .fold(LiveSnapshot::new(), |snapshot, (name, records)| {
            snapshot.with(
                *name,
                EntityCollection::loaded(records.iter().cloned().map(record).collect()),
            )
        })
}
