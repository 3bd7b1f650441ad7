//! Durable persistence for the engine's two records.
//!
//! The Time Store keeps exactly two records across restarts, each as one JSON
//! file in the state directory:
//!
//! - `markers.json`: today's [`MarkerSet`], replaced whole once per day,
//! - `recent_time.json`: the last computed [`ActivePeriod`] as the
//!   historical `{"label": ..., "time": ...}` shape.
//!
//! Writes are atomic with respect to readers in the same process: the record
//! is encoded to a single blob, written to a sibling temp file, and renamed
//! into place. A missing or unreadable record is reported as absent, never as
//! an error; corruption falls back to "no data yet" and is repaired by the
//! next successful write.
//!
//! Serialization of concurrent access is the caller's job (the engine holds
//! the store behind a mutex).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::zman::{ActivePeriod, MarkerSet};

const MARKERS_FILE: &str = "markers.json";
const RECENT_TIME_FILE: &str = "recent_time.json";

/// File-backed store for the MarkerSet and ActivePeriod records.
#[derive(Debug)]
pub struct TimeStore {
    dir: PathBuf,
}

impl TimeStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create state directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// The default state directory (`$XDG_STATE_HOME/zmanimd` or the
    /// platform equivalent).
    pub fn default_dir() -> Result<PathBuf> {
        let base = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .context("could not determine a state directory for this platform")?;
        Ok(base.join("zmanimd"))
    }

    pub fn load_markers(&self) -> Option<MarkerSet> {
        self.load_record(MARKERS_FILE)
    }

    pub fn save_markers(&self, markers: &MarkerSet) -> Result<()> {
        self.save_record(MARKERS_FILE, markers)
    }

    pub fn load_active_period(&self) -> Option<ActivePeriod> {
        self.load_record(RECENT_TIME_FILE)
    }

    pub fn save_active_period(&self, period: &ActivePeriod) -> Result<()> {
        self.save_record(RECENT_TIME_FILE, period)
    }

    /// Read and decode one record. Absent files and undecodable contents both
    /// come back as `None`; the latter is logged since it usually means a
    /// truncated write from a crashed predecessor.
    fn load_record<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log_warning!("Could not read {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                log_warning!("Ignoring corrupt record {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Encode and atomically replace one record.
    fn save_record<T: Serialize>(&self, name: &str, record: &T) -> Result<()> {
        let path = self.dir.join(name);
        let blob = serde_json::to_vec_pretty(record)
            .with_context(|| format!("failed to encode {name}"))?;
        write_atomic(&path, &blob)
    }
}

/// Write `contents` to `path` via a sibling temp file and rename, so readers
/// never observe a partial record.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zman::Zman;
    use chrono::{TimeZone, Utc};

    fn test_store() -> (tempfile::TempDir, TimeStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TimeStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn absent_records_load_as_none() {
        let (_dir, store) = test_store();
        assert!(store.load_markers().is_none());
        assert!(store.load_active_period().is_none());
    }

    #[test]
    fn active_period_round_trips() {
        let (_dir, store) = test_store();
        let period = ActivePeriod {
            label: Some(Zman::MinchaKetana),
            evaluated_at: Utc.with_ymd_and_hms(2024, 3, 5, 16, 40, 0).unwrap(),
        };
        store.save_active_period(&period).unwrap();
        assert_eq!(store.load_active_period(), Some(period));
    }

    #[test]
    fn none_period_round_trips() {
        let (_dir, store) = test_store();
        let period = ActivePeriod::none(Utc.with_ymd_and_hms(2024, 3, 5, 3, 0, 0).unwrap());
        store.save_active_period(&period).unwrap();
        assert_eq!(store.load_active_period(), Some(period));
    }

    #[test]
    fn marker_set_round_trips() {
        let (_dir, store) = test_store();
        let mut markers = MarkerSet::new("2024-03-05".parse().unwrap());
        markers.times.insert(
            Zman::Sunrise,
            Utc.with_ymd_and_hms(2024, 3, 5, 12, 28, 0).unwrap(),
        );
        markers.times.insert(
            Zman::Sunset,
            Utc.with_ymd_and_hms(2024, 3, 6, 0, 3, 0).unwrap(),
        );
        store.save_markers(&markers).unwrap();
        assert_eq!(store.load_markers(), Some(markers));
    }

    #[test]
    fn corrupt_record_is_treated_as_absent() {
        crate::logger::Log::set_enabled(false);
        let (dir, store) = test_store();
        fs::write(dir.path().join("recent_time.json"), b"{\"label\": \"chatz").unwrap();
        assert!(store.load_active_period().is_none());

        // The next save repairs the record.
        let period = ActivePeriod {
            label: Some(Zman::Chatzot),
            evaluated_at: Utc.with_ymd_and_hms(2024, 3, 5, 18, 0, 0).unwrap(),
        };
        store.save_active_period(&period).unwrap();
        assert_eq!(store.load_active_period(), Some(period));
    }

    #[test]
    fn save_replaces_previous_record() {
        let (_dir, store) = test_store();
        let first = ActivePeriod {
            label: Some(Zman::Dawn),
            evaluated_at: Utc.with_ymd_and_hms(2024, 3, 5, 11, 0, 0).unwrap(),
        };
        let second = ActivePeriod {
            label: Some(Zman::Sunrise),
            evaluated_at: Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap(),
        };
        store.save_active_period(&first).unwrap();
        store.save_active_period(&second).unwrap();
        assert_eq!(store.load_active_period(), Some(second));
    }
}
