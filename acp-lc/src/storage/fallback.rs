//! Local durable fallback
//!
//! Last line of defense when every remote backend fails: leads are
//! appended to a single JSON array file under the root folder. The file is
//! pretty-printed so an operator can inspect or export it by hand.
//!
//! Appends are serialized through an async mutex and written via a temp
//! file + rename, so a failed append never corrupts records that already
//! landed.

use acp_common::db::FallbackRecord;
use acp_common::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

/// Append-only JSON file store for leads that could not be persisted remotely
pub struct FallbackStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FallbackStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record, creating the file and its parent directory on first use
    pub async fn append(&self, record: FallbackRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut records = self.load()?;
        records.push(record);

        let serialized = serde_json::to_string_pretty(&records)
            .map_err(|e| Error::Internal(format!("Failed to serialize fallback records: {}", e)))?;

        // Write the whole array to a sibling temp file, then rename over the
        // original so a crash mid-write leaves the previous file intact.
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, serialized)?;
        std::fs::rename(&tmp_path, &self.path)?;

        info!(
            path = %self.path.display(),
            total = records.len(),
            "Lead appended to local fallback"
        );

        Ok(())
    }

    /// Read the full current set of fallback records
    ///
    /// Restartable: every call re-reads the file, no cursor state.
    pub async fn read_all(&self) -> Result<Vec<FallbackRecord>> {
        let _guard = self.write_lock.lock().await;
        self.load()
    }

    fn load(&self) -> Result<Vec<FallbackRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            Error::Internal(format!(
                "Fallback file {} is not a valid record array: {}",
                self.path.display(),
                e
            ))
        })
    }
}
