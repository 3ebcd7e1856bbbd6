//! Deterministic notification identifiers.
//!
//! Every (assignment, kind) slot maps to exactly one identifier, and the
//! identifier can be split back into its parts. Cancel-then-schedule on the
//! same identifier is what keeps repeated runs from duplicating notifications.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of the single daily digest notification.
pub const DIGEST_IDENTIFIER: &str = "daily-digest-notification";

const SEPARATOR: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    Due,
    Reminder,
    EarlyReminder,
    Daily,
    PriorityReminder,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 5] = [
        NotificationKind::Due,
        NotificationKind::Reminder,
        NotificationKind::EarlyReminder,
        NotificationKind::Daily,
        NotificationKind::PriorityReminder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Due => "due",
            NotificationKind::Reminder => "reminder",
            NotificationKind::EarlyReminder => "early-reminder",
            NotificationKind::Daily => "daily",
            NotificationKind::PriorityReminder => "priority-reminder",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown notification kind: {0}")]
pub struct ParseKindError(pub String);

impl FromStr for NotificationKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseKindError(s.to_string()))
    }
}

/// Identifier for one assignment slot: `"{kind}:{assignment_id}"`.
pub fn identifier(assignment_id: &str, kind: NotificationKind) -> String {
    format!("{}{SEPARATOR}{assignment_id}", kind.as_str())
}

/// Inverse of [`identifier`]. Returns `None` for the digest and foreign identifiers.
pub fn parse_identifier(identifier: &str) -> Option<(String, NotificationKind)> {
    let (kind, id) = identifier.split_once(SEPARATOR)?;
    let kind = kind.parse().ok()?;
    Some((id.to_string(), kind))
}
