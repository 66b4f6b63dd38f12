//! Commit orchestration: push a reconciled Summary to the backend.
//!
//! Creates go first, one bulk call per schema in entity precedence order,
//! so that ids minted for earlier entities can be back-filled into the
//! pending references of later ones. Updates follow, one call per record.
//! Every call is awaited before the next starts. A failed record is
//! recorded as a [`CommitError`] and never stops the run.

use mf_core::intake::{ImportRecord, Summary};
use mf_core::types::Record;
use serde::Serialize;
use serde_json::Value;

use crate::service::{RecordService, ServiceError};

/// Entities committed first, in this order. Their ids are referenced by
/// the entities after them.
pub const DEFAULT_ENTITY_PRECEDENCE: &[&str] = &["wave", "application", "server", "database"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSettings {
    pub entity_precedence: Vec<String>,
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            entity_precedence: DEFAULT_ENTITY_PRECEDENCE
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// One record the backend did not accept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitError {
    #[serde(rename = "itemType")]
    pub item_type: String,
    pub error: String,
    pub item: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitProgress {
    /// Monotonically increasing, 0 to 100.
    pub percent: f64,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    Succeeded,
    PartiallyFailed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitOutcome {
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<CommitError>,
    pub status: CommitStatus,
}

/// Why a commit did not start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitRefused {
    #[error("Nothing to commit: the import contains no new or changed records")]
    NothingToCommit,

    #[error("{0} row(s) have errors that must be fixed before committing")]
    BlockingErrors(usize),

    #[error("No file has been uploaded")]
    NoUpload,

    #[error("Import cannot be reconciled yet: {0}")]
    LiveDataNotReady(String),
}

/// Schemas of `summary` in commit order: the precedence list first, then
/// the rest in discovery order.
pub fn commit_order(summary: &Summary, settings: &CommitSettings) -> Vec<String> {
    let mut order: Vec<String> = settings
        .entity_precedence
        .iter()
        .filter(|name| summary.entities.contains_key(name.as_str()))
        .cloned()
        .collect();
    for name in summary.entities.keys() {
        if !order.contains(name) {
            order.push(name.clone());
        }
    }
    order
}

struct ProgressTracker<F> {
    increment: f64,
    percent: f64,
    on_progress: F,
}

impl<F: FnMut(CommitProgress)> ProgressTracker<F> {
    fn advance(&mut self, records: usize, status: String) {
        self.percent = (self.percent + self.increment * records as f64).min(100.0);
        (self.on_progress)(CommitProgress {
            percent: self.percent,
            status,
        });
    }
}

/// Commit every Create and Update in `summary`.
///
/// Pending references are resolved in place as their targets are created.
/// Refuses without any backend call when the Summary has no changes.
pub async fn commit_summary<S, F>(
    service: &S,
    summary: &mut Summary,
    settings: &CommitSettings,
    on_progress: F,
) -> Result<CommitOutcome, CommitRefused>
where
    S: RecordService + ?Sized,
    F: FnMut(CommitProgress),
{
    if !summary.has_updates {
        return Err(CommitRefused::NothingToCommit);
    }

    let order = commit_order(summary, settings);
    let total = summary.pending_changes();
    let mut progress = ProgressTracker {
        increment: 100.0 / total.max(1) as f64,
        percent: 0.0,
        on_progress,
    };
    let mut outcome = CommitOutcome {
        created: 0,
        updated: 0,
        errors: Vec::new(),
        status: CommitStatus::Succeeded,
    };

    tracing::info!(total, schemas = ?order, "Committing import");

    for schema in &order {
        let batch: Vec<ImportRecord> = summary
            .entities
            .get(schema)
            .map(|e| e.create.clone())
            .unwrap_or_default();
        if batch.is_empty() {
            continue;
        }

        let new_items = create_batch(service, schema, &batch, &mut outcome).await;
        if !new_items.is_empty() {
            let resolved = summary.backfill(schema, &new_items);
            tracing::debug!(schema = %schema, resolved, "Back-filled pending references");
        }
        progress.advance(batch.len(), format!("Created {} {schema} record(s)", new_items.len()));
    }

    for schema in &order {
        let batch: Vec<ImportRecord> = summary
            .entities
            .get(schema)
            .map(|e| e.update.clone())
            .unwrap_or_default();

        for record in &batch {
            update_record(service, schema, record, &mut outcome).await;
            progress.advance(1, format!("Updated {schema} '{}'", record.business_key));
        }
    }

    outcome.status = if outcome.errors.is_empty() {
        CommitStatus::Succeeded
    } else if outcome.created + outcome.updated == 0 {
        CommitStatus::Failed
    } else {
        CommitStatus::PartiallyFailed
    };

    tracing::info!(
        created = outcome.created,
        updated = outcome.updated,
        errors = outcome.errors.len(),
        "Import commit finished"
    );

    Ok(outcome)
}

/// Send one schema's creates. Returns the records the backend created.
async fn create_batch<S: RecordService + ?Sized>(
    service: &S,
    schema: &str,
    batch: &[ImportRecord],
    outcome: &mut CommitOutcome,
) -> Vec<Record> {
    let mut payloads: Vec<Record> = Vec::with_capacity(batch.len());
    for record in batch {
        match record.payload() {
            Ok(payload) => payloads.push(payload),
            Err(pending) => outcome.errors.push(CommitError {
                item_type: schema.to_string(),
                error: pending.to_string(),
                item: Value::Object(record.view()),
            }),
        }
    }
    if payloads.is_empty() {
        return Vec::new();
    }

    tracing::info!(schema = %schema, count = payloads.len(), "Creating records");
    match service.create(schema, &payloads).await {
        Ok(response) => {
            outcome.created += response.new_items.len();
            for item in response.errors {
                outcome.errors.push(CommitError {
                    item_type: schema.to_string(),
                    error: item.message(),
                    item: item.item.clone().unwrap_or(Value::Null),
                });
            }
            response.new_items
        }
        Err(e) => {
            tracing::warn!(schema = %schema, error = %e, "Bulk create failed");
            let message = e.commit_message();
            outcome.errors.extend(payloads.into_iter().map(|p| CommitError {
                item_type: schema.to_string(),
                error: message.clone(),
                item: Value::Object(p),
            }));
            Vec::new()
        }
    }
}

async fn update_record<S: RecordService + ?Sized>(
    service: &S,
    schema: &str,
    record: &ImportRecord,
    outcome: &mut CommitOutcome,
) {
    let fail = |outcome: &mut CommitOutcome, error: String| {
        outcome.errors.push(CommitError {
            item_type: schema.to_string(),
            error,
            item: Value::Object(record.view()),
        });
    };

    let Some(id) = record.existing_id.as_deref() else {
        let e = ServiceError::Malformed(format!("no id for existing {schema} '{}'", record.business_key));
        fail(outcome, e.commit_message());
        return;
    };
    let payload = match record.payload() {
        Ok(payload) => payload,
        Err(pending) => {
            fail(outcome, pending.to_string());
            return;
        }
    };

    tracing::debug!(schema = %schema, id, "Updating record");
    match service.update(schema, id, &payload).await {
        Ok(response) if response.errors.is_empty() => outcome.updated += 1,
        Ok(response) => {
            for item in response.errors {
                fail(outcome, item.message());
            }
        }
        Err(e) => {
            tracing::warn!(schema = %schema, id, error = %e, "Update failed");
            fail(outcome, e.commit_message());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_core::intake::{EntityChanges, NoChangeEntry};

    fn summary_with(schemas: &[&str]) -> Summary {
        let mut summary = Summary::default();
        for name in schemas {
            summary.entities.insert(name.to_string(), EntityChanges::default());
        }
        summary
    }

    #[test]
    fn order_puts_precedence_first_then_discovery_order() {
        let summary = summary_with(&["credential", "server", "pipeline", "wave"]);
        assert_eq!(
            commit_order(&summary, &CommitSettings::default()),
            vec!["wave", "server", "credential", "pipeline"]
        );
    }

    #[test]
    fn custom_precedence() {
        let summary = summary_with(&["wave", "server"]);
        let settings = CommitSettings {
            entity_precedence: vec!["server".to_string()],
        };
        assert_eq!(commit_order(&summary, &settings), vec!["server", "wave"]);
    }

    #[tokio::test]
    async fn nothing_to_commit_is_refused() {
        struct Unreachable;

        #[async_trait::async_trait]
        impl RecordService for Unreachable {
            async fn create(
                &self,
                _: &str,
                _: &[Record],
            ) -> Result<crate::service::CreateResponse, ServiceError> {
                panic!("create must not be called")
            }

            async fn update(
                &self,
                _: &str,
                _: &str,
                _: &Record,
            ) -> Result<crate::service::UpdateResponse, ServiceError> {
                panic!("update must not be called")
            }
        }

        let mut summary = summary_with(&["wave"]);
        summary.entities["wave"].no_change.push(NoChangeEntry {
            name: "Wave1".to_string(),
        });

        let result =
            commit_summary(&Unreachable, &mut summary, &CommitSettings::default(), |_| {}).await;
        assert_eq!(result, Err(CommitRefused::NothingToCommit));
    }
}
