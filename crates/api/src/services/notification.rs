//! Notification providers for reservation events.
//!
//! Supported providers:
//! - `console`: Logs notifications (development)
//! - `database`: Stores in-app notifications in the `notifications` table
//! - `disabled`: Drops every notification

use std::sync::Arc;

use async_trait::async_trait;
use domain::services::{
    NotificationDispatcher, NotificationKind, NotificationPayload, NotificationResult,
};
use persistence::repositories::{NewNotification, NotificationRepository};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::config::NotificationProvider;

/// Logs each notification as a structured event.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for ConsoleNotificationDispatcher {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        payload: NotificationPayload,
    ) -> NotificationResult {
        info!(
            user_id = %user_id,
            kind = %kind,
            event_id = ?payload.event_id,
            registration_id = ?payload.registration_id,
            title = %payload.title,
            "Notification"
        );
        NotificationResult::Sent
    }
}

/// Persists notifications for in-app display.
#[derive(Clone)]
pub struct DatabaseNotificationDispatcher {
    repo: NotificationRepository,
}

impl DatabaseNotificationDispatcher {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repo: NotificationRepository::new(pool),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for DatabaseNotificationDispatcher {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        payload: NotificationPayload,
    ) -> NotificationResult {
        let kind = kind.to_string();
        let result = self
            .repo
            .insert(NewNotification {
                user_id,
                kind: &kind,
                title: &payload.title,
                message: &payload.message,
                event_id: payload.event_id,
                registration_id: payload.registration_id,
            })
            .await;

        match result {
            Ok(_) => NotificationResult::Sent,
            Err(e) => NotificationResult::Failed(e.to_string()),
        }
    }
}

/// Skips every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for DisabledNotificationDispatcher {
    async fn notify(
        &self,
        _user_id: Uuid,
        _kind: NotificationKind,
        _payload: NotificationPayload,
    ) -> NotificationResult {
        NotificationResult::Skipped
    }
}

/// Builds the dispatcher for the configured provider.
pub fn build_dispatcher(
    provider: NotificationProvider,
    pool: &PgPool,
) -> Arc<dyn NotificationDispatcher> {
    match provider {
        NotificationProvider::Console => Arc::new(ConsoleNotificationDispatcher),
        NotificationProvider::Database => Arc::new(DatabaseNotificationDispatcher::new(pool.clone())),
        NotificationProvider::Disabled => Arc::new(DisabledNotificationDispatcher),
    }
}
