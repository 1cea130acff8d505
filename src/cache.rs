//! File-backed preference store.
//!
//! Preferences live under `<cache_dir>/<sha256 of server url>/` so two servers
//! never share resume positions for the same audiobook id. The format is a
//! small TOML table of string values.

use glowtalk_core::prefs::{PrefError, PrefKey, PreferenceStore};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PREFERENCES_FILE: &str = "preferences.toml";

pub fn hash_dir(cache_dir: &Path, server_url: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(server_url.trim_end_matches('/').as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    cache_dir.join(hash)
}

#[derive(serde::Serialize, serde::Deserialize, Default)]
struct PreferenceFile {
    #[serde(default)]
    values: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens the store for `server_url`; an unreadable file starts empty.
    pub fn open(cache_dir: &Path, server_url: &str) -> Self {
        let path = hash_dir(cache_dir, server_url).join(PREFERENCES_FILE);
        let values = match fs::read_to_string(&path) {
            Ok(data) => match toml::from_str::<PreferenceFile>(&data) {
                Ok(file) => file.values,
                Err(err) => {
                    warn!(path = %path.display(), "Ignoring unreadable preferences: {err}");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        debug!(path = %path.display(), entries = values.len(), "Opened preference store");
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), PrefError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string(&PreferenceFile {
            values: self.values.clone(),
        })
        .map_err(|err| PrefError::Encode(err.to_string()))?;

        let tmp = self.path.with_extension("toml.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: PrefKey) -> Option<String> {
        self.values.get(&key.as_key()).cloned()
    }

    fn set(&mut self, key: PrefKey, value: String) -> Result<(), PrefError> {
        self.values.insert(key.as_key(), value);
        self.persist()
    }
}
