use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Drowsy,
    Distracted,
    OverFocus,
}

impl NotificationType {
    /// Evaluation order; the first eligible type wins a tick.
    pub const PRIORITY: [NotificationType; 3] = [
        NotificationType::Drowsy,
        NotificationType::Distracted,
        NotificationType::OverFocus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Drowsy => "drowsy",
            NotificationType::Distracted => "distracted",
            NotificationType::OverFocus => "over_focus",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "drowsy" => Ok(NotificationType::Drowsy),
            "distracted" => Ok(NotificationType::Distracted),
            "over_focus" => Ok(NotificationType::OverFocus),
            other => Err(anyhow!("unknown notification type '{other}'")),
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            NotificationType::Drowsy => {
                "Drowsiness detected. Consider taking a short break or stretching."
            }
            NotificationType::Distracted => {
                "You seem distracted. Try focusing on one task at a time."
            }
            NotificationType::OverFocus => {
                "You have been focused for a long stretch. Take a 5-minute break."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    Accepted,
    Snoozed,
    Dismissed,
}

impl UserAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserAction::Accepted => "accepted",
            UserAction::Snoozed => "snoozed",
            UserAction::Dismissed => "dismissed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "accepted" => Ok(UserAction::Accepted),
            "snoozed" => Ok(UserAction::Snoozed),
            "dismissed" => Ok(UserAction::Dismissed),
            other => Err(anyhow!("unknown user action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub user_action: Option<UserAction>,
}

impl Notification {
    pub fn new(notification_type: NotificationType, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            notification_type,
            timestamp,
            message: notification_type.default_message().to_string(),
            user_action: None,
        }
    }
}
