//! Reconciler: bring the transport's ledger in line with the assignments.
//!
//! Only the differences are written. Slots that already match are left alone
//! so a notification about to fire is never dropped and re-added.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::assignment::Assignment;
use crate::digest::schedule_digest;
use crate::ledger::LedgerIndex;
use crate::ident::DIGEST_IDENTIFIER;
use crate::scheduler::{cancel_for_assignment, commit_candidate, content_for};
use crate::settings::NotificationSettings;
use crate::time::{is_future, same_instant};
use crate::transport::{NotificationTransport, ScheduledNotification};
use crate::triggers::{Candidate, compute_candidates};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scheduled: usize,
    pub replaced: usize,
    pub cancelled: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Entries not written by this engine, left as they were.
    pub foreign: usize,
    pub digest_scheduled: bool,
    /// Notifications were disabled and everything was cleared.
    pub disabled: bool,
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.disabled {
            return f.write_str("notifications disabled; all scheduled notifications cancelled");
        }
        write!(
            f,
            "{} scheduled, {} replaced, {} cancelled, {} unchanged, {} failed; digest {}",
            self.scheduled,
            self.replaced,
            self.cancelled,
            self.unchanged,
            self.failed,
            if self.digest_scheduled { "scheduled" } else { "not scheduled" }
        )?;
        if self.foreign > 0 {
            write!(f, "; {} foreign left untouched", self.foreign)?;
        }
        Ok(())
    }
}

pub async fn reconcile<T>(
    transport: &T,
    assignments: &[Assignment],
    settings: &NotificationSettings,
    now: DateTime<Utc>,
) -> ReconcileReport
where
    T: NotificationTransport + ?Sized,
{
    if !settings.enabled {
        if let Err(e) = transport.cancel_all().await {
            tracing::warn!(error = %e, "failed to cancel all notifications");
        }
        tracing::info!("notifications disabled; ledger cleared");
        return ReconcileReport {
            disabled: true,
            ..Default::default()
        };
    }

    let index = match transport.list_scheduled().await {
        Ok(entries) => LedgerIndex::from_scheduled(entries),
        Err(e) => {
            // Cancel-then-schedule keeps a blind pass safe, just noisier.
            tracing::warn!(error = %e, "could not list scheduled notifications; reconciling blind");
            LedgerIndex::unknown()
        }
    };
    tracing::debug!(
        slots = index.slot_count(),
        duplicates = index.duplicates().len(),
        foreign = index.foreign_count(),
        "ledger indexed"
    );

    let mut report = ReconcileReport {
        foreign: index.foreign_count(),
        ..Default::default()
    };

    // Extra entries claiming a slot that is already indexed.
    for entry in index.duplicates() {
        cancel_entry(transport, entry, &mut report).await;
    }

    let mut known: HashSet<&str> = HashSet::new();

    for assignment in assignments {
        known.insert(assignment.id.as_str());

        if !assignment.is_active(now) {
            cancel_all_slots(transport, &index, &assignment.id, &mut report).await;
            continue;
        }

        let candidates = compute_candidates(assignment, settings, now);

        for kind in index.kinds_for(&assignment.id) {
            if candidates.iter().any(|c| c.kind == kind) {
                continue;
            }
            if let Some(entry) = index.get(&assignment.id, kind) {
                cancel_entry(transport, entry, &mut report).await;
            }
        }

        for candidate in &candidates {
            // A live slot whose time has come is left to fire.
            if !is_future(candidate.fire_at, now) {
                continue;
            }
            match index.get(&assignment.id, candidate.kind) {
                Some(entry) if entry_matches(entry, candidate) => report.unchanged += 1,
                Some(entry) => {
                    if entry.identifier != candidate.identifier() {
                        cancel_entry(transport, entry, &mut report).await;
                    }
                    if commit_candidate(transport, candidate).await {
                        report.replaced += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                None => {
                    if commit_candidate(transport, candidate).await {
                        report.scheduled += 1;
                    } else {
                        report.failed += 1;
                    }
                }
            }
        }
    }

    // Slots for assignments that no longer exist.
    let orphans: Vec<String> = index
        .assignment_ids()
        .into_iter()
        .filter(|id| !known.contains(id))
        .map(str::to_string)
        .collect();
    for id in orphans {
        cancel_all_slots(transport, &index, &id, &mut report).await;
    }

    // The digest is rescheduled under its fixed identifier; drop one living
    // under any other.
    if let Some(entry) = index.digest().filter(|e| e.identifier != DIGEST_IDENTIFIER) {
        cancel_entry(transport, entry, &mut report).await;
    }

    report.digest_scheduled = schedule_digest(transport, assignments, settings, now, false)
        .await
        .is_some();

    tracing::info!(
        scheduled = report.scheduled,
        replaced = report.replaced,
        cancelled = report.cancelled,
        unchanged = report.unchanged,
        failed = report.failed,
        foreign = report.foreign,
        digest = report.digest_scheduled,
        "reconcile complete"
    );
    report
}

fn entry_matches(entry: &ScheduledNotification, candidate: &Candidate) -> bool {
    let wanted = content_for(candidate);
    same_instant(entry.fire_at, candidate.fire_at)
        && entry.content.title == wanted.title
        && entry.content.body == wanted.body
        && entry.channel.is_none_or(|c| c == candidate.channel)
}

async fn cancel_all_slots<T>(
    transport: &T,
    index: &LedgerIndex,
    assignment_id: &str,
    report: &mut ReconcileReport,
) where
    T: NotificationTransport + ?Sized,
{
    // Without a listing every identifier the slot could have is cancelled.
    if !index.is_complete() {
        report.cancelled += cancel_for_assignment(transport, assignment_id).await;
        return;
    }
    for kind in index.kinds_for(assignment_id) {
        if let Some(entry) = index.get(assignment_id, kind) {
            cancel_entry(transport, entry, report).await;
        }
    }
}

async fn cancel_entry<T>(transport: &T, entry: &ScheduledNotification, report: &mut ReconcileReport)
where
    T: NotificationTransport + ?Sized,
{
    match transport.cancel(&entry.identifier).await {
        Ok(()) => {
            tracing::debug!(identifier = %entry.identifier, "stale notification cancelled");
            report.cancelled += 1;
        }
        Err(e) => {
            tracing::warn!(identifier = %entry.identifier, error = %e, "failed to cancel notification");
            report.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::Category;
    use crate::ident::{NotificationKind, identifier};
    use crate::scheduler::schedule_for_assignment;
    use crate::transport::{Channel, NotificationContent, NotificationPayload};
    use crate::memory::{InMemoryTransport, TransportCall};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn second_pass_writes_only_the_digest() {
        let t = InMemoryTransport::new();
        let settings = NotificationSettings::default();
        let items = vec![
            Assignment::new("ex1", "Final", Category::Exam, now() + Duration::days(2)),
            Assignment::new("hw1", "Set 3", Category::Homework, now() + Duration::hours(20)),
        ];

        let first = reconcile(&t, &items, &settings, now()).await;
        assert_eq!(first.scheduled, 4);
        t.clear_calls().await;

        let second = reconcile(&t, &items, &settings, now()).await;
        assert_eq!(second.scheduled, 0);
        assert_eq!(second.unchanged, 4);
        let writes: Vec<_> = t
            .calls()
            .await
            .into_iter()
            .filter(|c| !matches!(c, TransportCall::List))
            .collect();
        assert_eq!(
            writes,
            vec![
                TransportCall::Cancel(DIGEST_IDENTIFIER.to_string()),
                TransportCall::Schedule(DIGEST_IDENTIFIER.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn edited_due_date_replaces_slot() {
        let t = InMemoryTransport::new();
        let settings = NotificationSettings::default();
        let mut a = Assignment::new("p1", "Poster", Category::Project, now() + Duration::hours(10));
        reconcile(&t, std::slice::from_ref(&a), &settings, now()).await;

        a.due_date = a.due_date + Duration::hours(3);
        let report = reconcile(&t, std::slice::from_ref(&a), &settings, now()).await;
        assert_eq!(report.replaced, 1);
        let due = t.get(&identifier("p1", NotificationKind::Due)).await.unwrap();
        assert_eq!(due.fire_at, now() + Duration::hours(12));
    }

    #[tokio::test]
    async fn cleared_priority_flag_cancels_priority_slot() {
        let t = InMemoryTransport::new();
        let settings = NotificationSettings::default();
        let a = Assignment::new("l1", "Lab", Category::Lab, now() + Duration::hours(10)).with_priority(true);
        reconcile(&t, std::slice::from_ref(&a), &settings, now()).await;
        assert!(t.get("priority-reminder:l1").await.is_some());

        let report = reconcile(&t, &[a.with_priority(false)], &settings, now()).await;
        assert_eq!(report.cancelled, 1);
        assert!(t.get("priority-reminder:l1").await.is_none());
        assert!(t.get("due:l1").await.is_some());
    }

    #[tokio::test]
    async fn deleted_and_completed_assignments_are_cleared() {
        let t = InMemoryTransport::new();
        let settings = NotificationSettings::default();
        let a = Assignment::new("a", "Essay", Category::Essay, now() + Duration::hours(30));
        let b = Assignment::new("b", "Quiz", Category::Quiz, now() + Duration::hours(30));
        reconcile(&t, &[a.clone(), b.clone()], &settings, now()).await;

        reconcile(&t, &[a.completed()], &settings, now()).await;
        let left: Vec<_> = t
            .identifiers()
            .await
            .into_iter()
            .filter(|id| id != DIGEST_IDENTIFIER)
            .collect();
        assert!(left.is_empty(), "left over: {left:?}");
    }

    #[tokio::test]
    async fn listing_failure_falls_back_to_full_pass() {
        let t = InMemoryTransport::new().failing_list();
        let settings = NotificationSettings::default();
        let items = vec![Assignment::new("hw1", "Set", Category::Homework, now() + Duration::hours(5))];
        let report = reconcile(&t, &items, &settings, now()).await;
        assert_eq!(report.scheduled, 1);
        assert!(t.get("due:hw1").await.is_some());
    }

    #[tokio::test]
    async fn disabled_clears_everything() {
        let t = InMemoryTransport::new();
        let mut settings = NotificationSettings::default();
        let items = vec![Assignment::new("ex1", "Final", Category::Exam, now() + Duration::days(2))];
        reconcile(&t, &items, &settings, now()).await;
        assert!(!t.entries().await.is_empty());

        settings.enabled = false;
        let report = reconcile(&t, &items, &settings, now()).await;
        assert!(report.disabled);
        assert!(t.entries().await.is_empty());
    }

    #[tokio::test]
    async fn listing_failure_still_clears_completed_work() {
        let t = InMemoryTransport::new().failing_list();
        let settings = NotificationSettings::default();
        let a = Assignment::new("hw", "Set", Category::Homework, now() + Duration::hours(5)).with_priority(true);
        schedule_for_assignment(&t, &a, &settings, now()).await;
        assert_eq!(t.identifiers().await, vec!["due:hw".to_string(), "priority-reminder:hw".to_string()]);

        let report = reconcile(&t, &[a.completed()], &settings, now()).await;
        assert_eq!(report.cancelled, NotificationKind::ALL.len());
        assert!(t.identifiers().await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_slot_entries_collapse_to_one() {
        let t = InMemoryTransport::new();
        let settings = NotificationSettings::default();
        let a = Assignment::new("hw", "Set", Category::Homework, now() + Duration::hours(5));
        reconcile(&t, std::slice::from_ref(&a), &settings, now()).await;

        let canonical = t.get("due:hw").await.unwrap();
        t.seed(ScheduledNotification {
            identifier: "os-1187".to_string(),
            ..canonical.clone()
        })
        .await;
        t.seed(ScheduledNotification {
            identifier: "os-digest".to_string(),
            fire_at: now() + Duration::hours(1),
            channel: Some(Channel::Digest),
            importance: None,
            content: NotificationContent {
                title: "old digest".to_string(),
                body: String::new(),
                payload: NotificationPayload::Digest { assignment_count: 1 }.to_value(),
            },
        })
        .await;
        t.seed(ScheduledNotification {
            identifier: "campus-news".to_string(),
            content: NotificationContent {
                title: "Library hours".to_string(),
                body: String::new(),
                payload: serde_json::json!({"screen": "news"}),
            },
            ..canonical.clone()
        })
        .await;

        let report = reconcile(&t, std::slice::from_ref(&a), &settings, now()).await;
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.foreign, 1);
        let mut ids = t.identifiers().await;
        ids.sort();
        assert_eq!(
            ids,
            vec![
                "campus-news".to_string(),
                DIGEST_IDENTIFIER.to_string(),
                "due:hw".to_string(),
            ]
        );
    }
}
