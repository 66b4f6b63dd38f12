#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use mf_core::live::{EntityCollection, LiveSnapshot};
use mf_core::schema::{schemas_from_json, SchemaMap};
use mf_core::tabular::{decode_delimited, RawRow};
use mf_core::types::{text_at, Record};
use mf_pipeline::notify::{Notification, NotificationId, NotificationSink};
use mf_pipeline::service::{
    CreateResponse, ErrorItem, RecordService, ServiceError, UpdateResponse,
};
use serde_json::{json, Value};

pub fn schemas() -> SchemaMap {
    let doc = json!([
        {
            "schema_name": "wave",
            "attributes": [
                {"name": "wave_id", "system": true},
                {"name": "wave_name", "required": true},
                {"name": "wave_status", "type": "list", "listvalue": "Planning,Completed"}
            ]
        },
        {
            "schema_name": "application",
            "attributes": [
                {"name": "app_id", "system": true},
                {"name": "app_name", "required": true},
                {"name": "wave_id", "type": "relationship", "rel_entity": "wave",
                 "rel_key": "wave_id", "rel_display_attribute": "wave_name"}
            ]
        },
        {
            "schema_name": "server",
            "attributes": [
                {"name": "server_id", "system": true},
                {"name": "server_name", "required": true},
                {"name": "app_id", "type": "relationship", "rel_entity": "application",
                 "rel_key": "app_id", "rel_display_attribute": "app_name"},
                {"name": "server_fqdn"}
            ]
        }
    ]);
    schemas_from_json(&doc.to_string()).expect("test schemas parse")
}

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

// ---------------------------------------------------------------------------
// Mock record service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { schema: String, records: Vec<Record> },
    Update { schema: String, id: String, record: Record },
}

/// In-memory backend that assigns sequential ids and records every call.
#[derive(Default)]
pub struct MockService {
    calls: Mutex<Vec<Call>>,
    next_id: Mutex<u64>,
    /// Business-key values whose create is rejected per item.
    reject_names: HashSet<String>,
    /// Schemas whose bulk create fails in transport.
    unreachable_schemas: HashSet<String>,
    /// Record ids whose update is rejected.
    reject_update_ids: HashSet<String>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(100),
            ..Default::default()
        }
    }

    pub fn rejecting_name(mut self, name: &str) -> Self {
        self.reject_names.insert(name.to_string());
        self
    }

    pub fn unreachable_for(mut self, schema: &str) -> Self {
        self.unreachable_schemas.insert(schema.to_string());
        self
    }

    pub fn rejecting_update(mut self, id: &str) -> Self {
        self.reject_update_ids.insert(id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn id_attribute(schema: &str) -> String {
        match schema {
            "application" => "app_id".to_string(),
            other => format!("{other}_id"),
        }
    }

    fn name_attribute(schema: &str) -> String {
        match schema {
            "application" => "app_name".to_string(),
            other => format!("{other}_name"),
        }
    }
}

#[async_trait]
impl RecordService for MockService {
    async fn create(&self, schema_name: &str, records: &[Record]) -> Result<CreateResponse, ServiceError> {
        self.calls.lock().unwrap().push(Call::Create {
            schema: schema_name.to_string(),
            records: records.to_vec(),
        });

        if self.unreachable_schemas.contains(schema_name) {
            return Err(ServiceError::Transport("connection reset by peer".to_string()));
        }

        let mut response = CreateResponse::default();
        for record in records {
            let name = text_at(record, &Self::name_attribute(schema_name)).unwrap_or_default();
            if self.reject_names.contains(&name) {
                response.errors.push(ErrorItem {
                    cause: Some(format!("{name} already exists")),
                    errors: Vec::new(),
                    item: Some(Value::Object(record.clone())),
                });
                continue;
            }
            let mut created = record.clone();
            let id = {
                let mut next = self.next_id.lock().unwrap();
                *next += 1;
                next.to_string()
            };
            created.insert(Self::id_attribute(schema_name), Value::String(id));
            response.new_items.push(created);
        }
        Ok(response)
    }

    async fn update(
        &self,
        schema_name: &str,
        id: &str,
        record: &Record,
    ) -> Result<UpdateResponse, ServiceError> {
        self.calls.lock().unwrap().push(Call::Update {
            schema: schema_name.to_string(),
            id: id.to_string(),
            record: record.clone(),
        });

        if self.reject_update_ids.contains(id) {
            return Err(ServiceError::Rejected {
                status: 400,
                body: json!({"cause": format!("{schema_name} {id} is locked")}),
            });
        }
        Ok(UpdateResponse::default())
    }
}

// ---------------------------------------------------------------------------
// Recording notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) -> NotificationId {
        let id = notification.id;
        self.notifications.lock().unwrap().push(notification);
        id
    }
}
