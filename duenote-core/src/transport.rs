//! Collaborator contracts: notification transport, assignment source, settings store.
//!
//! The transport is the ledger of record for what is scheduled. The engine
//! keeps no bookkeeping of its own beyond a per-run index built from
//! [`NotificationTransport::list_scheduled`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assignment::{Assignment, Category};
use crate::ident::NotificationKind;
use crate::settings::NotificationSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Default,
    High,
    Max,
}

/// Delivery channel (maps onto OS notification channels/categories).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Assignments,
    Exams,
    Priority,
    Digest,
}

impl Channel {
    pub fn for_slot(category: Category, kind: NotificationKind) -> Self {
        if kind == NotificationKind::PriorityReminder {
            return Channel::Priority;
        }
        match category {
            Category::Exam | Category::Test | Category::Quiz => Channel::Exams,
            _ => Channel::Assignments,
        }
    }

    pub fn importance(self) -> Importance {
        match self {
            Channel::Priority => Importance::Max,
            Channel::Exams => Importance::High,
            Channel::Assignments => Importance::Default,
            Channel::Digest => Importance::Low,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Channel::Assignments => "assignments",
            Channel::Exams => "exams",
            Channel::Priority => "priority",
            Channel::Digest => "digest",
        }
    }
}

/// Self-describing data attached to every notification we schedule.
///
/// Reading it back lets the reconciler rebuild the (assignment, kind) index
/// from the transport alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NotificationPayload {
    Assignment {
        assignment_id: String,
        kind: NotificationKind,
    },
    Digest {
        assignment_count: usize,
    },
}

impl NotificationPayload {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// `None` when the payload was not written by this engine.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub payload: Value,
}

/// One entry of the transport's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub identifier: String,
    pub fire_at: DateTime<Utc>,
    #[serde(default)]
    pub channel: Option<Channel>,
    /// Derived from the channel when the transport records it.
    #[serde(default)]
    pub importance: Option<Importance>,
    pub content: NotificationContent,
}

#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Schedule `content` to fire at `fire_at`. Callers cancel the identifier first.
    async fn schedule(
        &self,
        identifier: &str,
        content: NotificationContent,
        fire_at: DateTime<Utc>,
        channel: Channel,
    ) -> anyhow::Result<()>;

    /// Cancel one identifier. Cancelling an unknown identifier is not an error.
    async fn cancel(&self, identifier: &str) -> anyhow::Result<()>;

    async fn list_scheduled(&self) -> anyhow::Result<Vec<ScheduledNotification>>;

    async fn cancel_all(&self) -> anyhow::Result<()>;

    /// Whether the platform will actually deliver. A `false` here is logged,
    /// never fatal.
    async fn ensure_permission(&self) -> anyhow::Result<bool> {
        Ok(true)
    }
}

#[async_trait]
pub trait AssignmentSource: Send + Sync {
    /// Read-only snapshot of every assignment.
    async fn get_assignments(&self) -> anyhow::Result<Vec<Assignment>>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    async fn get_notification_settings(&self) -> anyhow::Result<Option<NotificationSettings>>;

    async fn save_notification_settings(&self, settings: &NotificationSettings) -> anyhow::Result<()>;
}

#[async_trait]
impl AssignmentSource for Vec<Assignment> {
    async fn get_assignments(&self) -> anyhow::Result<Vec<Assignment>> {
        Ok(self.clone())
    }
}
