//! The import controller driven by the UI.
//!
//! A session holds at most one upload. Selecting a file or a sheet
//! replaces everything derived from the previous one. The Summary is
//! rebuilt whenever rows change, or on [`ImportSession::refresh`] once live
//! data has finished loading. An upload is committed at most once; to retry
//! failed records, select the file again so it is reconciled afresh.

use std::sync::Arc;

use mf_core::intake::{
    self, ImportedRow, IntakeError, IntakeOutcome, PreparedImport, Summary, ValidationSummary,
};
use mf_core::schema::SchemaMap;
use mf_core::schema_index::SchemaIndex;
use mf_core::tabular::{self, DecodeError, DecodedFile, UploadFile};

use crate::commit::{commit_summary, CommitError, CommitOutcome, CommitSettings, CommitStatus};
use crate::live::{snapshot, LiveDataProvider};
use crate::notify::{Notification, NotificationId, NotificationKind, NotificationSink};
use crate::service::RecordService;

pub use crate::commit::CommitRefused;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error("No file has been uploaded")]
    NoUpload,
}

struct Upload {
    file: UploadFile,
    decoded: DecodedFile,
    prepared: PreparedImport,
    reconciled: Result<IntakeOutcome, IntakeError>,
    committed: bool,
}

pub struct ImportSession<S, L, N> {
    schemas: Arc<SchemaMap>,
    service: S,
    live: L,
    notifier: N,
    settings: CommitSettings,
    upload: Option<Upload>,
    commit_errors: Vec<CommitError>,
}

impl<S, L, N> ImportSession<S, L, N>
where
    S: RecordService,
    L: LiveDataProvider,
    N: NotificationSink,
{
    pub fn new(schemas: Arc<SchemaMap>, service: S, live: L, notifier: N) -> Self {
        Self {
            schemas,
            service,
            live,
            notifier,
            settings: CommitSettings::default(),
            upload: None,
            commit_errors: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: CommitSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Decode `file` (first sheet for workbooks) and rebuild rows and
    /// Summary. A decode failure clears the session.
    pub fn on_file_selected(&mut self, file: UploadFile) -> Result<(), SessionError> {
        self.commit_errors.clear();
        self.upload = None;

        tracing::info!(file = %file.name, size = file.size, "File selected for import");
        let decoded = match tabular::decode(&file, None) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.notifier.notify(
                    Notification::new(NotificationKind::Error, "Unable to read file")
                        .with_message(e.to_string()),
                );
                return Err(e.into());
            }
        };
        self.load(file, decoded);
        Ok(())
    }

    /// Re-decode the current workbook using sheet `name`.
    pub fn on_sheet_selected(&mut self, name: &str) -> Result<(), SessionError> {
        self.commit_errors.clear();
        let upload = self.upload.take().ok_or(SessionError::NoUpload)?;
        let decoded = match tabular::decode(&upload.file, Some(name)) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.upload = Some(upload);
                return Err(e.into());
            }
        };
        self.load(upload.file, decoded);
        Ok(())
    }

    fn load(&mut self, file: UploadFile, decoded: DecodedFile) {
        let index = SchemaIndex::new(&self.schemas);
        let prepared = intake::prepare_rows(&decoded.rows, &index);
        let reconciled = self.reconcile(&prepared);
        tracing::info!(
            rows = prepared.rows.len(),
            sheet = ?decoded.active_sheet,
            reconciled = reconciled.is_ok(),
            "Import rows prepared"
        );
        self.upload = Some(Upload {
            file,
            decoded,
            prepared,
            reconciled,
            committed: false,
        });
    }

    fn reconcile(&self, prepared: &PreparedImport) -> Result<IntakeOutcome, IntakeError> {
        let index = SchemaIndex::new(&self.schemas);
        let live = snapshot(&self.live, &prepared.relevant_schemas());
        intake::reconcile(prepared, &index, &live)
    }

    /// Rebuild the Summary from current live data.
    pub fn refresh(&mut self) -> Result<(), SessionError> {
        let Some(upload) = self.upload.as_ref() else {
            return Err(SessionError::NoUpload);
        };
        let reconciled = self.reconcile(&upload.prepared);
        let result = match &reconciled {
            Ok(_) => Ok(()),
            Err(e) => Err(SessionError::Intake(e.clone())),
        };
        if let Some(upload) = self.upload.as_mut() {
            upload.reconciled = reconciled;
        }
        result
    }

    /// Current rows with all diagnostics, reconciled when possible.
    pub fn rows(&self) -> &[ImportedRow] {
        match &self.upload {
            Some(Upload {
                reconciled: Ok(outcome),
                ..
            }) => &outcome.rows,
            Some(upload) => &upload.prepared.rows,
            None => &[],
        }
    }

    pub fn validation_summary(&self) -> ValidationSummary {
        ValidationSummary::from_rows(self.rows())
    }

    /// The Summary, or `None` before a file is loaded or while live data is
    /// not ready.
    pub fn reconciliation_summary(&self) -> Option<&Summary> {
        self.upload
            .as_ref()
            .and_then(|u| u.reconciled.as_ref().ok())
            .map(|o| &o.summary)
    }

    pub fn sheet_names(&self) -> &[String] {
        self.upload
            .as_ref()
            .map(|u| u.decoded.sheet_names.as_slice())
            .unwrap_or_default()
    }

    pub fn active_sheet(&self) -> Option<&str> {
        self.upload.as_ref()?.decoded.active_sheet.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.upload.as_ref().map(|u| u.file.name.as_str())
    }

    /// Commit the current Summary.
    ///
    /// Refused while nothing is loaded, while any row has an error, when
    /// there is nothing to change, or when this upload was already committed.
    pub async fn commit(&mut self) -> Result<CommitOutcome, CommitRefused> {
        let Self {
            service,
            notifier,
            settings,
            upload,
            commit_errors,
            ..
        } = self;

        let upload = upload.as_mut().ok_or(CommitRefused::NoUpload)?;
        let outcome = upload
            .reconciled
            .as_mut()
            .map_err(|e| CommitRefused::LiveDataNotReady(e.to_string()))?;

        let blocking = outcome
            .rows
            .iter()
            .filter(|r| r.validation.has_errors())
            .count();
        if blocking > 0 {
            return Err(CommitRefused::BlockingErrors(blocking));
        }
        if upload.committed || !outcome.summary.has_updates {
            notifier.notify(
                Notification::new(NotificationKind::Info, "Nothing to commit")
                    .with_message("The import contains no new or changed records"),
            );
            return Err(CommitRefused::NothingToCommit);
        }

        commit_errors.clear();

        let mut progress_id: Option<NotificationId> = None;
        let result = commit_summary(&*service, &mut outcome.summary, settings, |progress| {
            let mut n = Notification::new(NotificationKind::Info, "Committing import")
                .with_message(progress.status)
                .with_progress(progress.percent.round() as u8);
            if let Some(id) = progress_id {
                n = n.with_id(id);
            }
            progress_id = Some(notifier.notify(n));
        })
        .await;

        let committed = result?;
        upload.committed = true;
        commit_errors.clone_from(&committed.errors);

        let summary_line = format!(
            "{} created, {} updated, {} failed",
            committed.created,
            committed.updated,
            committed.errors.len()
        );
        let notification = match committed.status {
            CommitStatus::Succeeded => Notification::new(NotificationKind::Success, "Import complete"),
            CommitStatus::PartiallyFailed => {
                Notification::new(NotificationKind::Warning, "Import completed with errors")
            }
            CommitStatus::Failed => Notification::new(NotificationKind::Error, "Import failed"),
        };
        notifier.notify(notification.with_message(summary_line));

        Ok(committed)
    }

    /// Errors from the last commit. Cleared by the next upload.
    pub fn commit_errors(&self) -> &[CommitError] {
        &self.commit_errors
    }

    /// Discard the current upload and everything derived from it.
    pub fn cancel_upload(&mut self) {
        self.upload = None;
        self.commit_errors.clear();
    }
}
