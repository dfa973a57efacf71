//! Durable cursor over the interaction log. Owned by the batch runner;
//! advanced only after a batch's enriched rows are durably persisted, so a
//! crash between persistence and advance replays the same window (the sink
//! is idempotent per source record).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Cursor {
    pub last_seq: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Missing or unreadable state yields the zero cursor; a corrupt file is
    /// surfaced as an error rather than silently restarting from zero.
    pub fn load(&self) -> Result<Cursor> {
        if !self.path.exists() {
            return Ok(Cursor::default());
        }
        let s = fs::read_to_string(&self.path)
            .with_context(|| format!("reading cursor state {}", self.path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parse cursor state {}", self.path.display()))
    }

    /// Persist a new position. Write goes to a temp file first, then an
    /// atomic rename, so a crash never leaves a torn cursor on disk.
    pub fn advance(&self, seq: u64) -> Result<()> {
        let cursor = Cursor {
            last_seq: seq,
            updated_at: Some(Utc::now()),
        };
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating state dir {}", dir.display()))?;
        }
        write_atomic(&self.path, &serde_json::to_vec_pretty(&cursor)?)
            .with_context(|| format!("writing cursor state {}", self.path.display()))
    }
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
