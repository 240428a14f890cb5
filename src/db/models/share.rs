use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Share Models
// ============================================================================

/// Permission tier granted by a share. Declaration order is the tier order:
/// `View < Edit < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    View,
    Edit,
    Admin,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::View => "VIEW",
            Permission::Edit => "EDIT",
            Permission::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VIEW" => Ok(Permission::View),
            "EDIT" => Ok(Permission::Edit),
            "ADMIN" => Ok(Permission::Admin),
            other => Err(format!("Unknown permission: {}", other)),
        }
    }
}

/// The kind of thing a share points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Task,
    List,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Task => "task",
            SubjectKind::List => "list",
        }
    }

    /// Share table for this kind. Each table references its subject table
    /// with `ON DELETE CASCADE`.
    pub(crate) fn share_table(&self) -> &'static str {
        match self {
            SubjectKind::Task => "task_shares",
            SubjectKind::List => "list_shares",
        }
    }

    pub(crate) fn subject_table(&self) -> &'static str {
        match self {
            SubjectKind::Task => "tasks",
            SubjectKind::List => "lists",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shareable task or list reduced to what permission checks need.
#[derive(Debug, Clone)]
pub struct Subject {
    pub kind: SubjectKind,
    pub id: String,
    pub name: String,
    pub owner_id: String,
    /// Containing list, only ever set for tasks.
    pub list_id: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Share {
    pub id: String,
    pub subject_id: String,
    pub user_id: String,
    pub permission: Permission,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Share joined with the grantee's identity, used by share listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ShareWithUser {
    pub id: String,
    pub subject_id: String,
    pub user_id: String,
    pub permission: Permission,
    pub user_email: String,
    pub user_name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Incoming share as seen by the grantee.
#[derive(Debug, Clone, Serialize)]
pub struct IncomingShare {
    pub subject_kind: SubjectKind,
    pub subject_id: String,
    pub subject_name: String,
    pub owner_id: String,
    pub permission: Permission,
    pub created_at: NaiveDateTime,
}
