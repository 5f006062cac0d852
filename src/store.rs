//! Per-bot transfer cursor persisted under the bot's partition

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Stores the highest pack number successfully completed for each bot as a
/// single integer in `<root>/<alias>/.cursor`. Single-writer only: running
/// two processes against the same bot partition is unsafe.
pub struct WatermarkStore {
    root: PathBuf,
}

impl WatermarkStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn cursor_path(&self, alias: &str) -> PathBuf {
        self.root.join(alias).join(".cursor")
    }

    /// Last completed pack number, or 0 when the cursor is missing or
    /// unreadable.
    pub fn get(&self, alias: &str) -> u32 {
        match fs::read_to_string(self.cursor_path(alias)) {
            Ok(raw) => raw.trim().parse().unwrap_or(0),
            Err(_) => 0,
        }
    }

    /// Advance the cursor. The cursor never moves backwards; a lower value
    /// is silently ignored.
    pub fn set(&self, alias: &str, seq: u32) -> Result<()> {
        if seq <= self.get(alias) {
            return Ok(());
        }
        let path = self.cursor_path(alias);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, seq.to_string()).with_context(|| format!("write {}", path.display()))
    }
}
