use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::ensure_duenote_home;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON array of assignments. Relative paths resolve against the state dir.
    pub assignments_file: String,

    /// Ledger of scheduled notifications, relative to the state dir.
    pub ledger_file: String,

    /// `tracing` filter used when neither DUENOTE_LOG nor RUST_LOG is set.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assignments_file: "assignments.json".to_string(),
            ledger_file: "scheduled.json".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn assignments_path(&self, home: &Path) -> PathBuf {
        home.join(&self.assignments_file)
    }

    pub fn ledger_path(&self, home: &Path) -> PathBuf {
        home.join(&self.ledger_file)
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_duenote_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    read_config(&config_path()?)
}

pub fn read_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn write_config(path: &Path, cfg: &Config) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Write the default config unless one exists. Returns whether a file was written.
pub fn init_config() -> Result<bool> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(false);
    }
    write_config(&p, &Config::default())?;
    println!("Wrote {}", p.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = read_config(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        fs::write(&p, "assignments_file = \"/srv/planner/export.json\"\n").unwrap();

        let cfg = read_config(&p).unwrap();
        assert_eq!(cfg.assignments_file, "/srv/planner/export.json");
        assert_eq!(cfg.ledger_file, "scheduled.json");
        // Absolute paths win over the state dir.
        assert_eq!(
            cfg.assignments_path(dir.path()),
            PathBuf::from("/srv/planner/export.json")
        );
    }

    #[test]
    fn written_config_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        let cfg = Config {
            log_filter: "duenote_core=debug".to_string(),
            ..Config::default()
        };
        write_config(&p, &cfg).unwrap();
        assert_eq!(read_config(&p).unwrap(), cfg);
    }
}
