//! User-facing progress and result notifications.
//!
//! Notifications are informational only; nothing in the pipeline branches
//! on whether one was delivered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type NotificationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A message for the user.
///
/// Built with [`Notification::new`] and the `with_*` methods. Reusing the
/// id of an earlier notification replaces it, which is how commit progress
/// is shown as one updating message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: Option<String>,
    /// Percentage for progress notifications.
    pub progress: Option<u8>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            message: None,
            progress: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: NotificationId) -> Self {
        self.id = id;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_progress(mut self, percent: u8) -> Self {
        self.progress = Some(percent.min(100));
        self
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification) -> NotificationId;
}

impl<T: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<T> {
    fn notify(&self, notification: Notification) -> NotificationId {
        (**self).notify(notification)
    }
}

/// Writes notifications to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, n: Notification) -> NotificationId {
        let message = n.message.as_deref().unwrap_or_default();
        match n.kind {
            NotificationKind::Error => {
                tracing::error!(id = %n.id, title = %n.title, progress = ?n.progress, "{message}")
            }
            NotificationKind::Warning => {
                tracing::warn!(id = %n.id, title = %n.title, progress = ?n.progress, "{message}")
            }
            NotificationKind::Info | NotificationKind::Success => {
                tracing::info!(id = %n.id, kind = n.kind.as_str(), title = %n.title, progress = ?n.progress, "{message}")
            }
        }
        n.id
    }
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fans notifications out to any number of subscribers.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl NotificationSink for BroadcastNotifier {
    fn notify(&self, notification: Notification) -> NotificationId {
        let id = notification.id;
        // Zero receivers is not an error.
        let _ = self.sender.send(notification);
        id
    }
}
