use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{conversion_error, from_millis, to_millis},
};
use crate::models::{Notification, NotificationType, UserAction};

fn row_to_notification(row: &Row) -> Result<Notification, rusqlite::Error> {
    let timestamp_ms: i64 = row.get("timestamp_ms")?;
    let notification_type: String = row.get("type")?;
    let user_action: Option<String> = row.get("user_action")?;

    Ok(Notification {
        id: row.get("id")?,
        notification_type: NotificationType::parse(&notification_type)
            .map_err(conversion_error)?,
        timestamp: from_millis(timestamp_ms, "timestamp_ms").map_err(conversion_error)?,
        message: row.get("message")?,
        user_action: user_action
            .map(|raw| UserAction::parse(&raw))
            .transpose()
            .map_err(conversion_error)?,
    })
}

impl Database {
    pub async fn log_notification(&self, notification: &Notification) -> Result<()> {
        let record = notification.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO notifications (id, timestamp_ms, type, message, user_action)
                VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    to_millis(record.timestamp),
                    record.notification_type.as_str(),
                    record.message,
                    record.user_action.map(|a| a.as_str()),
                ],
            )
            .with_context(|| format!("failed to insert notification {}", record.id))?;
            Ok(())
        })
        .await
    }

    /// Notifications with `start <= timestamp < end`, oldest first.
    pub async fn get_notifications(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp_ms, type, message, user_action
                FROM notifications
                WHERE timestamp_ms >= ?1 AND timestamp_ms < ?2
                ORDER BY timestamp_ms ASC",
            )?;

            let rows = stmt.query_map(
                params![to_millis(start), to_millis(end)],
                row_to_notification,
            )?;

            let mut notifications = Vec::new();
            for notification in rows {
                notifications.push(notification?);
            }

            Ok(notifications)
        })
        .await
    }

    pub async fn update_notification_action(&self, id: &str, action: UserAction) -> Result<()> {
        let id = id.to_string();
        self.execute(move |conn| {
            let updated = conn
                .execute(
                    "UPDATE notifications SET user_action = ?1 WHERE id = ?2",
                    params![action.as_str(), id],
                )
                .with_context(|| format!("failed to update notification {id}"))?;

            if updated == 0 {
                bail!("notification {id} not found");
            }

            Ok(())
        })
        .await
    }
}
