//! Async orchestration around the intake engine: the record service,
//! live data and notification seams, the commit orchestrator, and the
//! import session driven by the UI.

pub mod commit;
pub mod live;
pub mod notify;
pub mod service;
pub mod session;

pub use commit::{
    commit_order, commit_summary, CommitError, CommitOutcome, CommitProgress, CommitRefused,
    CommitSettings, CommitStatus, DEFAULT_ENTITY_PRECEDENCE,
};
pub use live::{LiveDataProvider, SharedLiveData};
pub use notify::{Notification, NotificationId, NotificationKind, NotificationSink};
pub use service::{CreateResponse, ErrorItem, RecordService, ServiceError, UpdateResponse};
pub use session::{ImportSession, SessionError};
