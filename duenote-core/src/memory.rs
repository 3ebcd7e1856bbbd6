//! In-memory collaborators for tests and dry runs.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::settings::NotificationSettings;
use crate::transport::{
    Channel, NotificationContent, NotificationTransport, ScheduledNotification, SettingsStore,
};

/// What the engine asked the transport to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Schedule(String),
    Cancel(String),
    List,
    CancelAll,
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: BTreeMap<String, ScheduledNotification>,
    calls: Vec<TransportCall>,
}

/// Transport double backed by a map. Scheduling an existing identifier
/// replaces it, like the OS schedulers do.
#[derive(Debug)]
pub struct InMemoryTransport {
    state: Mutex<LedgerState>,
    failing: HashSet<String>,
    fail_listing: bool,
    permission: bool,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            failing: HashSet::new(),
            fail_listing: false,
            permission: true,
        }
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `schedule` fail for this identifier.
    pub fn failing_on(mut self, identifier: impl Into<String>) -> Self {
        self.failing.insert(identifier.into());
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn without_permission(mut self) -> Self {
        self.permission = false;
        self
    }

    pub async fn entries(&self) -> Vec<ScheduledNotification> {
        self.state.lock().await.entries.values().cloned().collect()
    }

    pub async fn identifiers(&self) -> Vec<String> {
        self.state.lock().await.entries.keys().cloned().collect()
    }

    pub async fn get(&self, identifier: &str) -> Option<ScheduledNotification> {
        self.state.lock().await.entries.get(identifier).cloned()
    }

    pub async fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Insert an entry directly, bypassing the call log.
    pub async fn seed(&self, entry: ScheduledNotification) {
        self.state
            .lock()
            .await
            .entries
            .insert(entry.identifier.clone(), entry);
    }

    /// Simulate the platform delivering everything due at or before `now`.
    pub async fn deliver_due(&self, now: DateTime<Utc>) -> Vec<ScheduledNotification> {
        let mut state = self.state.lock().await;
        let due: Vec<String> = state
            .entries
            .values()
            .filter(|e| e.fire_at <= now)
            .map(|e| e.identifier.clone())
            .collect();
        due.iter()
            .filter_map(|id| state.entries.remove(id))
            .collect()
    }
}

#[async_trait]
impl NotificationTransport for InMemoryTransport {
    async fn schedule(
        &self,
        identifier: &str,
        content: NotificationContent,
        fire_at: DateTime<Utc>,
        channel: Channel,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(TransportCall::Schedule(identifier.to_string()));
        if self.failing.contains(identifier) {
            anyhow::bail!("schedule rejected for {identifier}");
        }
        state.entries.insert(
            identifier.to_string(),
            ScheduledNotification {
                identifier: identifier.to_string(),
                fire_at,
                channel: Some(channel),
                importance: Some(channel.importance()),
                content,
            },
        );
        Ok(())
    }

    async fn cancel(&self, identifier: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(TransportCall::Cancel(identifier.to_string()));
        state.entries.remove(identifier);
        Ok(())
    }

    async fn list_scheduled(&self) -> anyhow::Result<Vec<ScheduledNotification>> {
        let mut state = self.state.lock().await;
        state.calls.push(TransportCall::List);
        if self.fail_listing {
            anyhow::bail!("listing unavailable");
        }
        Ok(state.entries.values().cloned().collect())
    }

    async fn cancel_all(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(TransportCall::CancelAll);
        state.entries.clear();
        Ok(())
    }

    async fn ensure_permission(&self) -> anyhow::Result<bool> {
        Ok(self.permission)
    }
}

/// Settings store double. Starts empty unless seeded.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    stored: Mutex<Option<NotificationSettings>>,
    fail_reads: bool,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: NotificationSettings) -> Self {
        Self {
            stored: Mutex::new(Some(settings)),
            fail_reads: false,
        }
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub async fn stored(&self) -> Option<NotificationSettings> {
        self.stored.lock().await.clone()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get_notification_settings(&self) -> anyhow::Result<Option<NotificationSettings>> {
        if self.fail_reads {
            anyhow::bail!("settings storage unavailable");
        }
        Ok(self.stored.lock().await.clone())
    }

    async fn save_notification_settings(&self, settings: &NotificationSettings) -> anyhow::Result<()> {
        *self.stored.lock().await = Some(settings.clone());
        Ok(())
    }
}
