//! Per-run index over the transport's ledger, keyed by (assignment id, kind).

use std::collections::{BTreeMap, BTreeSet};

use crate::ident::{DIGEST_IDENTIFIER, NotificationKind, identifier, parse_identifier};
use crate::transport::{NotificationPayload, ScheduledNotification};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub assignment_id: String,
    pub kind: NotificationKind,
}

#[derive(Debug)]
pub struct LedgerIndex {
    slots: BTreeMap<SlotKey, ScheduledNotification>,
    digest: Option<ScheduledNotification>,
    /// Second and later entries claiming an already-indexed slot.
    duplicates: Vec<ScheduledNotification>,
    /// Entries not written by this engine; left untouched.
    foreign: usize,
    /// False when the ledger could not be read.
    complete: bool,
}

impl Default for LedgerIndex {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
            digest: None,
            duplicates: Vec::new(),
            foreign: 0,
            complete: true,
        }
    }
}

impl LedgerIndex {
    pub fn from_scheduled(entries: Vec<ScheduledNotification>) -> Self {
        let mut index = Self::default();
        for entry in entries {
            match Self::classify(&entry) {
                Some(Slot::Assignment(key)) => {
                    let canonical = identifier(&key.assignment_id, key.kind);
                    index.insert_slot(key, entry, &canonical);
                }
                Some(Slot::Digest) => {
                    let previous = index.digest.take();
                    index.digest = Some(Self::keep_one(previous, entry, DIGEST_IDENTIFIER, &mut index.duplicates));
                }
                None => index.foreign += 1,
            }
        }
        index
    }

    /// Index for a ledger that could not be listed. Nothing is known to be
    /// live, and nothing is known to be absent either.
    pub fn unknown() -> Self {
        Self {
            complete: false,
            ..Self::default()
        }
    }

    fn insert_slot(&mut self, key: SlotKey, entry: ScheduledNotification, canonical: &str) {
        let previous = self.slots.remove(&key);
        let kept = Self::keep_one(previous, entry, canonical, &mut self.duplicates);
        self.slots.insert(key, kept);
    }

    /// Keep the entry under the canonical identifier (else the first seen);
    /// the other goes to `duplicates`.
    fn keep_one(
        previous: Option<ScheduledNotification>,
        entry: ScheduledNotification,
        canonical: &str,
        duplicates: &mut Vec<ScheduledNotification>,
    ) -> ScheduledNotification {
        match previous {
            None => entry,
            Some(prev) if prev.identifier != canonical && entry.identifier == canonical => {
                duplicates.push(prev);
                entry
            }
            Some(prev) => {
                duplicates.push(entry);
                prev
            }
        }
    }

    /// Prefer the payload; fall back to the identifier when the payload is
    /// missing or unreadable.
    fn classify(entry: &ScheduledNotification) -> Option<Slot> {
        match NotificationPayload::from_value(&entry.content.payload) {
            Some(NotificationPayload::Assignment { assignment_id, kind }) => {
                return Some(Slot::Assignment(SlotKey { assignment_id, kind }));
            }
            Some(NotificationPayload::Digest { .. }) => return Some(Slot::Digest),
            None => {}
        }
        if entry.identifier == DIGEST_IDENTIFIER {
            return Some(Slot::Digest);
        }
        parse_identifier(&entry.identifier)
            .map(|(assignment_id, kind)| Slot::Assignment(SlotKey { assignment_id, kind }))
    }

    pub fn get(&self, assignment_id: &str, kind: NotificationKind) -> Option<&ScheduledNotification> {
        self.slots.get(&SlotKey {
            assignment_id: assignment_id.to_string(),
            kind,
        })
    }

    /// Live slot kinds for one assignment.
    pub fn kinds_for(&self, assignment_id: &str) -> Vec<NotificationKind> {
        self.slots
            .keys()
            .filter(|k| k.assignment_id == assignment_id)
            .map(|k| k.kind)
            .collect()
    }

    pub fn assignment_ids(&self) -> BTreeSet<&str> {
        self.slots.keys().map(|k| k.assignment_id.as_str()).collect()
    }

    pub fn digest(&self) -> Option<&ScheduledNotification> {
        self.digest.as_ref()
    }

    pub fn duplicates(&self) -> &[ScheduledNotification] {
        &self.duplicates
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn foreign_count(&self) -> usize {
        self.foreign
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

enum Slot {
    Assignment(SlotKey),
    Digest,
}
