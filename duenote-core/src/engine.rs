//! Notification engine: the collaborators wired together.
//!
//! Every operation takes `now` explicitly; nothing here reads the clock.

use chrono::{DateTime, Utc};

use crate::assignment::Assignment;
use crate::digest::{Digest, build_digest, schedule_digest};
use crate::reconcile::{ReconcileReport, reconcile};
use crate::scheduler::{ScheduleReport, cancel_for_assignment, schedule_for_assignment};
use crate::settings::NotificationSettings;
use crate::transport::{AssignmentSource, NotificationTransport, SettingsStore};
use crate::triggers::{Candidate, compute_candidates};

pub struct NotificationEngine<T: NotificationTransport, S: SettingsStore> {
    transport: T,
    settings: S,
}

impl<T: NotificationTransport, S: SettingsStore> NotificationEngine<T, S> {
    pub fn new(transport: T, settings: S) -> Self {
        Self { transport, settings }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn settings_store(&self) -> &S {
        &self.settings
    }

    /// Current settings snapshot. Never fails: a read error yields defaults,
    /// and an empty store is seeded with defaults.
    pub async fn current_settings(&self) -> NotificationSettings {
        let settings = match self.settings.get_notification_settings().await {
            Ok(Some(s)) => s,
            Ok(None) => {
                let defaults = NotificationSettings::default();
                if let Err(e) = self.settings.save_notification_settings(&defaults).await {
                    tracing::warn!(error = %e, "could not persist default notification settings");
                }
                defaults
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read notification settings; using defaults");
                NotificationSettings::default()
            }
        };
        if let Err(e) = settings.tz() {
            tracing::warn!(error = %e, "local-day calculations will use UTC");
        }
        settings
    }

    /// Persist new settings, then converge the ledger to them.
    pub async fn update_settings(
        &self,
        settings: &NotificationSettings,
        assignments: &[Assignment],
        now: DateTime<Utc>,
    ) -> anyhow::Result<ReconcileReport> {
        self.settings.save_notification_settings(settings).await?;
        Ok(self.reconcile(assignments, now).await)
    }

    /// Candidates as of `now`, without touching the transport.
    pub async fn preview(&self, assignment: &Assignment, now: DateTime<Utc>) -> Vec<Candidate> {
        let settings = self.current_settings().await;
        compute_candidates(assignment, &settings, now)
    }

    pub async fn preview_digest(&self, assignments: &[Assignment], now: DateTime<Utc>) -> Option<Digest> {
        let settings = self.current_settings().await;
        build_digest(assignments, &settings, now)
    }

    pub async fn schedule_for_assignment(&self, assignment: &Assignment, now: DateTime<Utc>) -> ScheduleReport {
        let settings = self.current_settings().await;
        schedule_for_assignment(&self.transport, assignment, &settings, now).await
    }

    /// Drop every slot of an assignment, e.g. after it was deleted.
    pub async fn cancel_for_assignment(&self, assignment_id: &str) -> usize {
        cancel_for_assignment(&self.transport, assignment_id).await
    }

    pub async fn build_and_schedule_digest(
        &self,
        assignments: &[Assignment],
        send_immediately: bool,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let settings = self.current_settings().await;
        schedule_digest(&self.transport, assignments, &settings, now, send_immediately).await
    }

    pub async fn reconcile(&self, assignments: &[Assignment], now: DateTime<Utc>) -> ReconcileReport {
        let settings = self.current_settings().await;
        if settings.enabled {
            self.check_permission().await;
        }
        reconcile(&self.transport, assignments, &settings, now).await
    }

    /// Reconcile against a fresh snapshot from `source`. A failing source is
    /// treated as "no change": nothing is touched.
    pub async fn reconcile_from_source<A>(&self, source: &A, now: DateTime<Utc>) -> Option<ReconcileReport>
    where
        A: AssignmentSource + ?Sized,
    {
        match source.get_assignments().await {
            Ok(assignments) => Some(self.reconcile(&assignments, now).await),
            Err(e) => {
                tracing::warn!(error = %e, "could not load assignments; skipping reconcile");
                None
            }
        }
    }

    /// Cancel everything, digest included.
    pub async fn clear_all(&self) -> anyhow::Result<()> {
        self.transport.cancel_all().await
    }

    async fn check_permission(&self) {
        match self.transport.ensure_permission().await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("notification permission not granted; scheduled notifications will not be shown"),
            Err(e) => tracing::warn!(error = %e, "could not check notification permission"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::Category;
    use crate::memory::{InMemorySettingsStore, InMemoryTransport};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn first_read_seeds_default_settings() {
        let engine = NotificationEngine::new(InMemoryTransport::new(), InMemorySettingsStore::new());
        let s = engine.current_settings().await;
        assert_eq!(s, NotificationSettings::default());
        assert_eq!(engine.settings_store().stored().await, Some(s));
    }

    #[tokio::test]
    async fn unreadable_settings_fall_back_to_defaults() {
        let store = InMemorySettingsStore::new().failing_reads();
        let engine = NotificationEngine::new(InMemoryTransport::new(), store);
        assert_eq!(engine.current_settings().await, NotificationSettings::default());
    }

    #[tokio::test]
    async fn missing_permission_is_not_fatal() {
        let engine = NotificationEngine::new(
            InMemoryTransport::new().without_permission(),
            InMemorySettingsStore::new(),
        );
        let items = vec![Assignment::new("hw1", "Set", Category::Homework, now() + Duration::hours(5))];
        let report = engine.reconcile(&items, now()).await;
        assert_eq!(report.scheduled, 1);
    }

    #[tokio::test]
    async fn update_settings_saves_and_converges() {
        let engine = NotificationEngine::new(InMemoryTransport::new(), InMemorySettingsStore::new());
        let items = vec![Assignment::new("ex1", "Final", Category::Exam, now() + Duration::days(2))];
        engine.reconcile(&items, now()).await;
        assert!(engine.transport().get("daily:ex1").await.is_some());

        let mut s = engine.current_settings().await;
        s.daily_reminders_for_exams = false;
        engine.update_settings(&s, &items, now()).await.unwrap();
        assert!(engine.transport().get("daily:ex1").await.is_none());
        assert!(!engine.current_settings().await.daily_reminders_for_exams);
    }

    #[tokio::test]
    async fn source_snapshot_drives_reconcile() {
        let engine = NotificationEngine::new(InMemoryTransport::new(), InMemorySettingsStore::new());
        let source = vec![Assignment::new("q1", "Quiz", Category::Quiz, now() + Duration::hours(4))];
        let report = engine.reconcile_from_source(&source, now()).await.unwrap();
        assert_eq!(report.scheduled, 1);
    }
}
