//! Persistence for last-run settings and the generated-audio listing.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::error::{Result, WebdError};
use crate::types::LastRunSettings;

/// Reads and writes the front end's last-run settings file.
///
/// The file is plain JSON. A missing or unreadable file falls back to
/// defaults rather than failing startup.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Persists the settings of a successfully submitted request.
    pub fn save_last_run(&self, settings: &LastRunSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                WebdError::export_failed(format!("Failed to create settings dir: {}", e))
            })?;
        }
        let body = serde_json::to_string_pretty(settings)
            .map_err(|e| WebdError::export_failed(format!("Failed to serialize settings: {}", e)))?;
        fs::write(&self.path, body)
            .map_err(|e| WebdError::export_failed(format!("Failed to write settings: {}", e)))?;
        debug!(path = %self.path.display(), "Saved last-run settings");
        Ok(())
    }

    /// Loads the last-run settings, falling back to defaults when the
    /// file is missing or corrupt.
    pub fn load_last_run(&self) -> LastRunSettings {
        match fs::read_to_string(&self.path) {
            Ok(body) => match serde_json::from_str(&body) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(path = %self.path.display(), "Corrupt settings file, using defaults: {}", e);
                    LastRunSettings::default()
                }
            },
            Err(_) => LastRunSettings::default(),
        }
    }
}

/// Lists complete artifact pairs under `dir`, most recently modified
/// first. A WAV without its JSON sidecar (or vice versa) is skipped.
pub fn list_artifact_pairs(dir: &Path) -> Vec<(String, String)> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut pairs: Vec<(SystemTime, String, String)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("wav") {
            continue;
        }
        let sidecar = path.with_extension("json");
        if !sidecar.exists() {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let wav_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let json_name = match sidecar.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        pairs.push((modified, wav_name, json_name));
    }

    pairs.sort_by(|a, b| b.0.cmp(&a.0));
    pairs.into_iter().map(|(_, w, j)| (w, j)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));

        let mut settings = LastRunSettings::default();
        settings.model = "melody".to_string();
        settings.prompt = "warm tape hiss".to_string();
        store.save_last_run(&settings).unwrap();

        let loaded = store.load_last_run();
        assert_eq!(loaded.model, "melody");
        assert_eq!(loaded.prompt, "warm tape hiss");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("absent.json"));
        let loaded = store.load_last_run();
        assert_eq!(loaded.model, "large");
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();

        let store = SettingsStore::new(path);
        let loaded = store.load_last_run();
        assert_eq!(loaded.model, "large");
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested/deeper/settings.json"));
        store.save_last_run(&LastRunSettings::default()).unwrap();
        assert!(dir.path().join("nested/deeper/settings.json").exists());
    }

    #[test]
    fn lists_only_complete_pairs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.wav"), b"x").unwrap();
        fs::write(dir.path().join("a.json"), b"x").unwrap();
        fs::write(dir.path().join("orphan.wav"), b"x").unwrap();
        fs::write(dir.path().join("stray.json"), b"x").unwrap();

        let pairs = list_artifact_pairs(dir.path());
        assert_eq!(pairs, vec![("a.wav".to_string(), "a.json".to_string())]);
    }

    #[test]
    fn newest_pair_comes_first() {
        let dir = tempdir().unwrap();
        for name in ["old", "new"] {
            fs::write(dir.path().join(format!("{}.wav", name)), b"x").unwrap();
            fs::write(dir.path().join(format!("{}.json", name)), b"x").unwrap();
        }
        let old = dir.path().join("old.wav");
        let past = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
        let file = fs::File::options().write(true).open(&old).unwrap();
        file.set_modified(past).unwrap();

        let pairs = list_artifact_pairs(dir.path());
        assert_eq!(pairs[0].0, "new.wav");
        assert_eq!(pairs[1].0, "old.wav");
    }

    #[test]
    fn missing_dir_is_empty() {
        assert!(list_artifact_pairs(Path::new("/nonexistent/audio")).is_empty());
    }
}
