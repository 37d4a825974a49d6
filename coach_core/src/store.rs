//! Collection persistence with file locking.
//!
//! Rules, automations, presets, and preset versions each live in their own
//! JSON array file under the data directory. Reads are fail-open: a missing
//! or corrupted file logs a warning and yields an empty collection so the
//! engine keeps running. Writes are atomic (temp file + exclusive lock +
//! rename).

use crate::types::{Automation, Preset, PresetVersion, Rule};
use crate::{Error, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const RULES_FILE: &str = "chained-rules.json";
pub const AUTOMATIONS_FILE: &str = "recurring-automations.json";
pub const PRESETS_FILE: &str = "automation-presets.json";
pub const PRESET_VERSIONS_FILE: &str = "automation-preset-versions.json";

/// Access to the persisted rule collection.
pub trait RuleRepository {
    fn load_rules(&self) -> Result<Vec<Rule>>;
    fn store_rules(&self, rules: &[Rule]) -> Result<()>;
}

/// Access to the persisted automation collection.
pub trait AutomationRepository {
    fn load_automations(&self) -> Result<Vec<Automation>>;
    fn store_automations(&self, automations: &[Automation]) -> Result<()>;
}

/// Access to the persisted preset collection and its version history.
pub trait PresetRepository {
    fn load_presets(&self) -> Result<Vec<Preset>>;
    fn store_presets(&self, presets: &[Preset]) -> Result<()>;
    fn load_preset_versions(&self) -> Result<Vec<PresetVersion>>;
    fn store_preset_versions(&self, versions: &[PresetVersion]) -> Result<()>;
}

/// JSON-file-backed store rooted at a data directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    /// Read a JSON array file with shared locking.
    ///
    /// Missing, unreadable, or corrupted files log a warning and return an
    /// empty vec so callers never fail on bad state.
    fn read_array<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.path(file);
        if !path.exists() {
            tracing::debug!("No collection file at {:?}, starting empty", path);
            return Ok(Vec::new());
        }

        let handle = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(
                    "Unable to open collection file {:?}: {}. Starting empty.",
                    path,
                    e
                );
                return Ok(Vec::new());
            }
        };

        if let Err(e) = handle.lock_shared() {
            tracing::warn!(
                "Unable to lock collection file {:?}: {}. Starting empty.",
                path,
                e
            );
            return Ok(Vec::new());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&handle);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = handle.unlock();
            tracing::warn!(
                "Failed to read collection file {:?}: {}. Starting empty.",
                path,
                e
            );
            return Ok(Vec::new());
        }

        handle.unlock()?;

        match serde_json::from_str::<Vec<T>>(&contents) {
            Ok(items) => {
                tracing::debug!("Loaded {} items from {:?}", items.len(), path);
                Ok(items)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse collection file {:?}: {}. Starting empty.",
                    path,
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    /// Atomically replace a JSON array file.
    ///
    /// Writes to a locked temp file in the same directory, syncs, then
    /// renames over the original.
    fn write_array<T: Serialize>(&self, file: &str, items: &[T]) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.path(file);

        let temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(items)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} items to {:?}", items.len(), path);
        Ok(())
    }
}

impl RuleRepository for FileStore {
    fn load_rules(&self) -> Result<Vec<Rule>> {
        self.read_array(RULES_FILE)
    }

    fn store_rules(&self, rules: &[Rule]) -> Result<()> {
        self.write_array(RULES_FILE, rules)
    }
}

impl AutomationRepository for FileStore {
    fn load_automations(&self) -> Result<Vec<Automation>> {
        self.read_array(AUTOMATIONS_FILE)
    }

    fn store_automations(&self, automations: &[Automation]) -> Result<()> {
        self.write_array(AUTOMATIONS_FILE, automations)
    }
}

impl PresetRepository for FileStore {
    fn load_presets(&self) -> Result<Vec<Preset>> {
        self.read_array(PRESETS_FILE)
    }

    fn store_presets(&self, presets: &[Preset]) -> Result<()> {
        self.write_array(PRESETS_FILE, presets)
    }

    fn load_preset_versions(&self) -> Result<Vec<PresetVersion>> {
        self.read_array(PRESET_VERSIONS_FILE)
    }

    fn store_preset_versions(&self, versions: &[PresetVersion]) -> Result<()> {
        self.write_array(PRESET_VERSIONS_FILE, versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_rule(name: &str) -> Rule {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            active: true,
            priority: 5,
            conditions: Vec::new(),
            actions: Vec::new(),
            program_id: None,
            client_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_rules_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        let rules = vec![sample_rule("reduce impact"), sample_rule("cap volume")];
        store.store_rules(&rules).unwrap();

        let loaded = store.load_rules().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "reduce impact");
        assert_eq!(loaded[1].name, "cap volume");
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        assert!(store.load_rules().unwrap().is_empty());
        assert!(store.load_automations().unwrap().is_empty());
        assert!(store.load_presets().unwrap().is_empty());
        assert!(store.load_preset_versions().unwrap().is_empty());
    }

    #[test]
    fn test_corrupted_file_starts_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        std::fs::write(temp_dir.path().join(RULES_FILE), "{ not an array }").unwrap();
        assert!(store.load_rules().unwrap().is_empty());
    }

    #[test]
    fn test_write_is_atomic_no_stray_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        store.store_rules(&[sample_rule("only")]).unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != RULES_FILE)
            .collect();
        assert!(extras.is_empty(), "found stray files: {:?}", extras);
    }

    #[test]
    fn test_collections_live_in_separate_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(temp_dir.path());

        store.store_rules(&[sample_rule("a")]).unwrap();
        store.store_automations(&[]).unwrap();

        assert!(temp_dir.path().join(RULES_FILE).exists());
        assert!(temp_dir.path().join(AUTOMATIONS_FILE).exists());
        assert!(!temp_dir.path().join(PRESETS_FILE).exists());
    }
}
