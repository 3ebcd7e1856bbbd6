use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// `$DUENOTE_HOME`, else `~/.duenote`.
pub fn duenote_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("DUENOTE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".duenote"))
}

pub fn ensure_duenote_home() -> Result<PathBuf> {
    let dir = duenote_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(ensure_duenote_home()?.join("settings.json"))
}
