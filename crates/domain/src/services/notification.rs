//! Notification dispatch for reservation events.
//!
//! Delivery channels live outside the reservation core. The coordinator hands
//! a [`NotificationDispatcher`] one call per affected user, only after the
//! transaction committed; a failed dispatch is logged and never undoes anything.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    EventCreated,
    RegistrationConfirmed,
    RegistrationWaitlisted,
    WaitlistPromoted,
    EventEquipmentChanged,
    EventCancelled,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::EventCreated => write!(f, "event_created"),
            NotificationKind::RegistrationConfirmed => write!(f, "registration_confirmed"),
            NotificationKind::RegistrationWaitlisted => write!(f, "registration_waitlisted"),
            NotificationKind::WaitlistPromoted => write!(f, "waitlist_promoted"),
            NotificationKind::EventEquipmentChanged => write!(f, "event_equipment_changed"),
            NotificationKind::EventCancelled => write!(f, "event_cancelled"),
        }
    }
}

/// Content of a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl NotificationPayload {
    pub fn for_event(event_id: Uuid, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            event_id: Some(event_id),
            registration_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_registration(mut self, registration_id: Uuid) -> Self {
        self.registration_id = Some(registration_id);
        self
    }
}

/// Result of a notification send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationResult {
    /// Notification was handed to the channel.
    Sent,
    /// Notification was skipped (dispatch disabled).
    Skipped,
    /// Notification sending failed (but was non-blocking).
    Failed(String),
}

/// Notification dispatcher trait.
#[async_trait::async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        payload: NotificationPayload,
    ) -> NotificationResult;
}

/// One pending dispatch, collected during a transaction and sent after commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub payload: NotificationPayload,
}

impl Notice {
    pub fn new(user_id: Uuid, kind: NotificationKind, payload: NotificationPayload) -> Self {
        Self {
            user_id,
            kind,
            payload,
        }
    }
}

/// Sends notices on a background task. Failures are logged.
pub fn dispatch_detached(dispatcher: Arc<dyn NotificationDispatcher>, notices: Vec<Notice>) {
    if notices.is_empty() {
        return;
    }

    tokio::spawn(async move {
        for notice in notices {
            let result = dispatcher
                .notify(notice.user_id, notice.kind, notice.payload)
                .await;
            match result {
                NotificationResult::Failed(reason) => {
                    tracing::warn!(
                        user_id = %notice.user_id,
                        kind = %notice.kind,
                        error = %reason,
                        "Notification dispatch failed"
                    );
                }
                NotificationResult::Sent | NotificationResult::Skipped => {
                    tracing::debug!(
                        user_id = %notice.user_id,
                        kind = %notice.kind,
                        "Notification dispatched"
                    );
                }
            }
        }
    });
}

/// Mock notification dispatcher for development and testing.
///
/// Records every call instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct MockNotificationDispatcher {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
    sent: Arc<Mutex<Vec<Notice>>>,
}

impl MockNotificationDispatcher {
    /// Create a new mock dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock dispatcher that simulates failures.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Notices received so far.
    pub fn sent(&self) -> Vec<Notice> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Notices received so far of one kind.
    pub fn sent_of(&self, kind: NotificationKind) -> Vec<Notice> {
        self.sent()
            .into_iter()
            .filter(|notice| notice.kind == kind)
            .collect()
    }

    /// Waits until at least `count` notices arrived or `timeout` elapsed.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.sent.lock().unwrap_or_else(|e| e.into_inner()).len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait::async_trait]
impl NotificationDispatcher for MockNotificationDispatcher {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        payload: NotificationPayload,
    ) -> NotificationResult {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Notice::new(user_id, kind, payload.clone()));

        if self.simulate_failure {
            tracing::warn!(
                user_id = %user_id,
                kind = %kind,
                "Mock notification dispatcher simulating failure"
            );
            return NotificationResult::Failed("Simulated failure".to_string());
        }

        tracing::info!(
            user_id = %user_id,
            kind = %kind,
            title = %payload.title,
            "Mock: Would send notification"
        );

        NotificationResult::Sent
    }
}
