//! Individual notification scheduler: commits candidates to the transport.
//!
//! Best effort throughout. A failing cancel or schedule is logged and the
//! remaining candidates are still processed.

use chrono::{DateTime, Utc};

use crate::assignment::Assignment;
use crate::ident::{NotificationKind, identifier};
use crate::settings::NotificationSettings;
use crate::text::{BODY_MAX_CHARS, TITLE_MAX_CHARS, truncate_chars};
use crate::time::is_future;
use crate::transport::{NotificationContent, NotificationPayload, NotificationTransport};
use crate::triggers::{Candidate, compute_candidates};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub scheduled: usize,
    pub skipped_past: usize,
    pub cancelled: usize,
    pub failed: usize,
}

/// Cancel-then-schedule every future candidate of one assignment.
///
/// Completed or overdue assignments (and disabled settings) get all of their
/// slots cancelled instead.
pub async fn schedule_for_assignment<T>(
    transport: &T,
    assignment: &Assignment,
    settings: &NotificationSettings,
    now: DateTime<Utc>,
) -> ScheduleReport
where
    T: NotificationTransport + ?Sized,
{
    let mut report = ScheduleReport::default();

    if !settings.enabled || !assignment.is_active(now) {
        report.cancelled = cancel_for_assignment(transport, &assignment.id).await;
        return report;
    }

    for candidate in compute_candidates(assignment, settings, now) {
        if !is_future(candidate.fire_at, now) {
            report.skipped_past += 1;
            continue;
        }
        if commit_candidate(transport, &candidate).await {
            report.scheduled += 1;
        } else {
            report.failed += 1;
        }
    }

    tracing::debug!(
        assignment = %assignment.id,
        scheduled = report.scheduled,
        skipped_past = report.skipped_past,
        failed = report.failed,
        "scheduled assignment notifications"
    );
    report
}

/// Cancel the candidate's identifier, then schedule it. Returns whether the
/// schedule call succeeded.
pub async fn commit_candidate<T>(transport: &T, candidate: &Candidate) -> bool
where
    T: NotificationTransport + ?Sized,
{
    let id = candidate.identifier();

    if let Err(e) = transport.cancel(&id).await {
        // Same-identifier scheduling still replaces on every platform we target.
        tracing::warn!(identifier = %id, error = %e, "cancel before schedule failed");
    }

    match transport
        .schedule(&id, content_for(candidate), candidate.fire_at, candidate.channel)
        .await
    {
        Ok(()) => {
            tracing::debug!(identifier = %id, fire_at = %candidate.fire_at, "notification scheduled");
            true
        }
        Err(e) => {
            tracing::warn!(identifier = %id, error = %e, "failed to schedule notification");
            false
        }
    }
}

/// Transport content for a candidate: truncated text plus a self-describing payload.
pub fn content_for(candidate: &Candidate) -> NotificationContent {
    NotificationContent {
        title: truncate_chars(&candidate.title, TITLE_MAX_CHARS),
        body: truncate_chars(&candidate.body, BODY_MAX_CHARS),
        payload: NotificationPayload::Assignment {
            assignment_id: candidate.assignment_id.clone(),
            kind: candidate.kind,
        }
        .to_value(),
    }
}

/// Cancel every slot an assignment can have. Returns how many cancels succeeded.
pub async fn cancel_for_assignment<T>(transport: &T, assignment_id: &str) -> usize
where
    T: NotificationTransport + ?Sized,
{
    let mut cancelled = 0;
    for kind in NotificationKind::ALL {
        cancelled += usize::from(cancel_slot(transport, assignment_id, kind).await);
    }
    cancelled
}

async fn cancel_slot<T>(transport: &T, assignment_id: &str, kind: NotificationKind) -> bool
where
    T: NotificationTransport + ?Sized,
{
    let id = identifier(assignment_id, kind);
    match transport.cancel(&id).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(identifier = %id, error = %e, "failed to cancel notification");
            false
        }
    }
}
