use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

use super::{Gamification, GamificationEvent, Notifier};

/// Writes gamification events and notifications into outbox tables that the
/// scoring engine and the push service drain on their own schedule.
#[derive(Clone)]
pub struct MySqlOutbox {
    pool: MySqlPool,
}

impl MySqlOutbox {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn insert_notification(
        &self,
        user_id: Option<u64>,
        title: &str,
        message: &str,
        link: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (user_id, title, message, link_target)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(message)
        .bind(link)
        .execute(&self.pool)
        .await
        .context("failed to queue notification")?;
        Ok(())
    }
}

#[async_trait]
impl Gamification for MySqlOutbox {
    async fn process_action(
        &self,
        user_id: u64,
        event: GamificationEvent,
        payload: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO gamification_events (user_id, kind, payload)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(event.as_ref())
        .bind(payload.to_string())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to queue {} event", event))?;

        tracing::debug!(user_id, event = %event, "Gamification event queued");
        Ok(())
    }
}

#[async_trait]
impl Notifier for MySqlOutbox {
    async fn notify(&self, user_id: u64, title: &str, message: &str, link: &str) -> Result<()> {
        self.insert_notification(Some(user_id), title, message, link)
            .await
    }

    async fn broadcast(&self, title: &str, message: &str, link: &str) -> Result<()> {
        self.insert_notification(None, title, message, link).await
    }
}
