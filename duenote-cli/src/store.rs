//! File-backed collaborators for the CLI.
//!
//! The ledger and the settings blob are small JSON files rewritten whole on
//! every change (temp file + rename).

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duenote_core::{
    Assignment, AssignmentSource, Channel, NotificationContent, NotificationSettings,
    NotificationTransport, ScheduledNotification, SettingsStore,
};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

/// Key the settings blob is stored under inside `settings.json`.
pub const SETTINGS_KEY: &str = "notificationSettings";

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
    }
}

async fn write_atomic(path: &Path, contents: String) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .with_context(|| format!("write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Notification ledger kept in a JSON file. Nothing is delivered; the file
/// records what a platform scheduler would hold.
#[derive(Debug)]
pub struct FileTransport {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, ScheduledNotification>> {
        let Some(raw) = read_optional(&self.path).await? else {
            return Ok(BTreeMap::new());
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let entries: Vec<ScheduledNotification> =
            serde_json::from_str(&raw).with_context(|| format!("parse {}", self.path.display()))?;
        Ok(entries.into_iter().map(|e| (e.identifier.clone(), e)).collect())
    }

    async fn store(&self, entries: &BTreeMap<String, ScheduledNotification>) -> Result<()> {
        let list: Vec<&ScheduledNotification> = entries.values().collect();
        let json = serde_json::to_string_pretty(&list).context("serialize ledger")?;
        write_atomic(&self.path, json).await
    }
}

#[async_trait]
impl NotificationTransport for FileTransport {
    async fn schedule(
        &self,
        identifier: &str,
        content: NotificationContent,
        fire_at: DateTime<Utc>,
        channel: Channel,
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(
            identifier.to_string(),
            ScheduledNotification {
                identifier: identifier.to_string(),
                fire_at,
                channel: Some(channel),
                importance: Some(channel.importance()),
                content,
            },
        );
        self.store(&entries).await
    }

    async fn cancel(&self, identifier: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(identifier).is_some() {
            self.store(&entries).await?;
        }
        Ok(())
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_values().collect())
    }

    async fn cancel_all(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.store(&BTreeMap::new()).await
    }
}

/// `settings.json`: a JSON object whose `notificationSettings` key holds the
/// settings blob. Other keys are preserved on save.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load_object(&self) -> Result<Map<String, Value>> {
        let Some(raw) = read_optional(&self.path).await? else {
            return Ok(Map::new());
        };
        match serde_json::from_str(&raw).with_context(|| format!("parse {}", self.path.display()))? {
            Value::Object(map) => Ok(map),
            other => anyhow::bail!("{} holds {other}, expected an object", self.path.display()),
        }
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn get_notification_settings(&self) -> Result<Option<NotificationSettings>> {
        let mut map = self.load_object().await?;
        match map.remove(SETTINGS_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => Ok(Some(serde_json::from_value(v).context("decode notification settings")?)),
        }
    }

    async fn save_notification_settings(&self, settings: &NotificationSettings) -> Result<()> {
        let mut map = self.load_object().await?;
        map.insert(SETTINGS_KEY.to_string(), serde_json::to_value(settings)?);
        let json = serde_json::to_string_pretty(&Value::Object(map))?;
        write_atomic(&self.path, json).await
    }
}

/// Assignments exported as a JSON array.
#[derive(Debug, Clone)]
pub struct JsonAssignmentSource {
    path: PathBuf,
}

impl JsonAssignmentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AssignmentSource for JsonAssignmentSource {
    async fn get_assignments(&self) -> Result<Vec<Assignment>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("read {}", self.path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse {}", self.path.display()))
    }
}
