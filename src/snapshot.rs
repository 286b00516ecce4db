// Scheduler state snapshot
//
// A state-only, serde-serializable record of the scheduler's progress,
// written after each meaningful state change and read once at startup. A
// snapshot from a different day is stale and gets discarded rather than
// resumed. Writes go through a temp file and rename, so a crash mid-write
// leaves the previous snapshot intact.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{CACHE_FOLDER, STATE_FILE_PREFIX};
use crate::error::Result;
use crate::registry::{CaptureState, SourceRegistry};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// The day the state belongs to, as YYYY-MM-DD.
    pub day_folder: String,
    /// Last month a summary pass completed for, as YYYY-MM.
    pub last_month_processed: Option<String>,
    /// Per-source capture state, keyed by location name.
    pub sources: BTreeMap<String, CaptureState>,
}

impl SchedulerSnapshot {
    /// Capture the registry's current per-source state.
    pub fn capture(
        day_folder: &str,
        registry: &SourceRegistry,
        last_month_processed: Option<&str>,
    ) -> Self {
        Self {
            day_folder: day_folder.to_string(),
            last_month_processed: last_month_processed.map(|m| m.to_string()),
            sources: registry
                .iter()
                .map(|s| (s.location_name.clone(), s.state.clone()))
                .collect(),
        }
    }

    /// Restore per-source state into the registry. Sources added since the
    /// snapshot keep their defaults; snapshot entries for removed sources
    /// are ignored.
    pub fn apply_to(&self, registry: &mut SourceRegistry) {
        for source in registry.iter_mut() {
            if let Some(state) = self.sources.get(&source.location_name) {
                source.state = state.clone();
            }
        }
    }
}

/// File-backed snapshot persistence, one file per location.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(base_path: &Path, location_key: &str) -> Self {
        let file_name = format!("{STATE_FILE_PREFIX}{location_key}.json");
        Self {
            path: base_path.join(CACHE_FOLDER).join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot atomically (temp file, then rename).
    pub fn save(&self, snapshot: &SchedulerSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(snapshot)?)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Fire-and-forget save: a failed write risks losing partial progress
    /// on the next crash but must not take the capture loop down.
    pub fn persist(&self, snapshot: &SchedulerSnapshot) {
        if let Err(e) = self.save(snapshot) {
            log::warn!("snapshot write failed ({}): {}", self.path.display(), e);
        }
    }

    /// Load the stored snapshot, or None when none was ever written.
    pub fn load(&self) -> Result<Option<SchedulerSnapshot>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Load only if the stored day matches `today_folder`; a mismatched day
    /// is stale and reported as None.
    pub fn load_for_day(&self, today_folder: &str) -> Option<SchedulerSnapshot> {
        match self.load() {
            Ok(Some(snapshot)) if snapshot.day_folder == today_folder => Some(snapshot),
            Ok(Some(snapshot)) => {
                log::info!(
                    "Discarding stale snapshot for {} (today is {})",
                    snapshot.day_folder,
                    today_folder
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("snapshot load failed ({}): {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Source;
    use tempfile::TempDir;

    fn sample_registry() -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        registry.add(Source::new("aleko", "http://cam.example/1"));
        registry.add(Source::new("vitosha", "http://cam.example/2"));
        registry
    }

    #[test]
    fn test_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path(), "Sofia");

        let mut registry = sample_registry();
        registry.get_mut("aleko").unwrap().state.record_frame();
        registry.get_mut("aleko").unwrap().state.record_frame();

        let snapshot = SchedulerSnapshot::capture("2025-01-07", &registry, Some("2024-12"));
        store.save(&snapshot).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.sources["aleko"].images_count, 2);
        assert!(loaded.sources["aleko"].images_partially_collected);
        assert_eq!(loaded.last_month_processed.as_deref(), Some("2024-12"));
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path(), "Sofia");
        assert!(store.load().unwrap().is_none());
        assert!(store.load_for_day("2025-01-07").is_none());
    }

    #[test]
    fn test_stale_day_is_discarded() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path(), "Sofia");

        let registry = sample_registry();
        let snapshot = SchedulerSnapshot::capture("2025-01-06", &registry, None);
        store.save(&snapshot).unwrap();

        assert!(store.load_for_day("2025-01-07").is_none());
        assert!(store.load_for_day("2025-01-06").is_some());
    }

    #[test]
    fn test_apply_restores_partial_progress() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path(), "Sofia");

        let mut registry = sample_registry();
        for _ in 0..5 {
            registry.get_mut("aleko").unwrap().state.record_frame();
        }
        store
            .save(&SchedulerSnapshot::capture("2025-01-07", &registry, None))
            .unwrap();

        // Simulated restart: fresh registry, state restored from disk.
        let mut fresh = sample_registry();
        let loaded = store.load_for_day("2025-01-07").unwrap();
        loaded.apply_to(&mut fresh);

        let state = &fresh.get("aleko").unwrap().state;
        assert_eq!(state.images_count, 5);
        assert!(state.images_partially_collected);
        assert!(!state.all_images_collected);
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path(), "Sofia");
        store
            .save(&SchedulerSnapshot::capture("2025-01-07", &sample_registry(), None))
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec!["state_Sofia.json".to_string()]);
    }
}
