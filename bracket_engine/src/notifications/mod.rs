//! Notification dispatch.
//!
//! Notifications are collected while a unit of work runs and handed to a
//! [`Notifier`] only after commit. Delivery failures are logged by the engine
//! and never undo bracket state.

use async_trait::async_trait;
use log::info;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

pub mod models;

pub use models::{Notification, NotificationKind};

/// Notification errors
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payload could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for notification delivery
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Delivers notifications to users
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> NotifyResult<()>;
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> NotifyResult<()> {
        let data = serde_json::to_string(&notification.data)?;
        info!(
            "[{}] user {}: {} {}",
            notification.title(),
            notification.user_id,
            notification.message,
            data
        );
        Ok(())
    }
}

/// Stores notifications in the `notifications` table
#[derive(Clone)]
pub struct PgNotifier {
    pool: Arc<PgPool>,
}

impl PgNotifier {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn notify(&self, notification: &Notification) -> NotifyResult<()> {
        let data = serde_json::to_string(&notification.data)?;
        sqlx::query(
            r#"
            INSERT INTO notifications (user_id, title, message, type, data, is_read)
            VALUES ($1, $2, $3, $4, $5::jsonb, FALSE)
            "#,
        )
        .bind(notification.user_id)
        .bind(notification.title())
        .bind(&notification.message)
        .bind(notification.kind.category())
        .bind(data)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }
}
