//! duenote-core: assignment notification scheduling engine

pub mod assignment;
pub mod digest;
pub mod engine;
pub mod ident;
pub mod ledger;
pub mod memory;
pub mod reconcile;
pub mod scheduler;
pub mod settings;
pub mod text;
pub mod time;
pub mod transport;
pub mod triggers;

pub use assignment::{Assignment, Category, ParseCategoryError};
pub use digest::{Digest, DigestBucket, build_digest, collect_buckets, schedule_digest};
pub use engine::NotificationEngine;
pub use ident::{DIGEST_IDENTIFIER, NotificationKind, ParseKindError, identifier, parse_identifier};
pub use ledger::{LedgerIndex, SlotKey};
pub use memory::{InMemorySettingsStore, InMemoryTransport, TransportCall};
pub use reconcile::{ReconcileReport, reconcile};
pub use scheduler::{ScheduleReport, cancel_for_assignment, schedule_for_assignment};
pub use settings::{NotificationSettings, SettingsError};
pub use transport::{
    AssignmentSource, Channel, Importance, NotificationContent, NotificationPayload,
    NotificationTransport, ScheduledNotification, SettingsStore,
};
pub use triggers::{Candidate, compute_candidates};
