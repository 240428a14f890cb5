use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationType {
    System,
    Shared,
    Expired,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::System => "SYSTEM",
            NotificationType::Shared => "SHARED",
            NotificationType::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted in-app notification. Only `read` changes after creation.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub description: String,
    pub actor_name: Option<String>,
    pub read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub user_id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub description: String,
    pub actor_name: Option<String>,
}
