use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dpam_caps::{CapabilityStore, StoreValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_STORE_PATH: &str = ".dpamvifctl.json";

/// Paths used by the previous invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPaths {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<PathBuf>,
}

/// JSON file carrying editor state between invocations.
///
/// Field values are keyed `"<field>_<port>"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedStore {
    #[serde(default)]
    pub paths: LastPaths,
    #[serde(default)]
    pub fields: BTreeMap<String, StoreValue>,
}

pub fn store_key(field: &str, port: usize) -> String {
    format!("{field}_{port}")
}

/// Split a `"<field>_<port>"` key; field names may contain underscores.
pub fn split_key(key: &str) -> Option<(&str, usize)> {
    let (field, port) = key.rsplit_once('_')?;
    if field.is_empty() {
        return None;
    }
    Some((field, port.parse().ok()?))
}

impl PersistedStore {
    /// Read the store; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no persisted store yet");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read store {}", path.display()))
            }
        };
        serde_json::from_str(&text).with_context(|| format!("parse store {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("serialise store")?;
        fs::write(path, text).with_context(|| format!("write store {}", path.display()))?;
        debug!(path = %path.display(), fields = self.fields.len(), "saved persisted store");
        Ok(())
    }

    /// Seed an in-memory store; keys that do not name a port are dropped.
    pub fn to_capability_store(&self) -> CapabilityStore {
        let mut store = CapabilityStore::new();
        for (key, value) in &self.fields {
            match split_key(key) {
                Some((field, port)) => store.set(field, port, value.clone()),
                None => warn!(key = %key, "ignoring persisted value without a port suffix"),
            }
        }
        store
    }

    /// Copy every entry of `store` into the persisted values.
    pub fn absorb(&mut self, store: &CapabilityStore) {
        for (field, port, value) in store.iter() {
            self.fields.insert(store_key(field, port), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn keys_split_on_last_underscore() {
        assert_eq!(split_key("port_capability_1"), Some(("port_capability", 1)));
        assert_eq!(split_key(&store_key("dp_v1p3_signaling", 12)), Some(("dp_v1p3_signaling", 12)));
        assert_eq!(split_key("port_capability"), None);
        assert_eq!(split_key("_3"), None);
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = TempDir::new().expect("tempdir");
        let store = PersistedStore::load(&dir.path().join("absent.json")).expect("load");
        assert_eq!(store, PersistedStore::default());
    }

    #[test]
    fn save_and_load_keep_paths_and_values() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("store.json");

        let mut capabilities = CapabilityStore::new();
        capabilities.set("port_capability", 1, 2usize);
        capabilities.set("usb_r2_signaling_not_used", 0, true);
        let mut persisted = PersistedStore::default();
        persisted.paths.input = Some(PathBuf::from("in.xml"));
        persisted.absorb(&capabilities);
        persisted.save(&path).expect("save");

        let loaded = PersistedStore::load(&path).expect("load");
        assert_eq!(loaded, persisted);
        assert_eq!(loaded.fields.get("port_capability_1"), Some(&StoreValue::Int(2)));
        assert_eq!(loaded.to_capability_store(), capabilities);
    }

    #[test]
    fn legacy_check_states_and_strings_load() {
        let persisted: PersistedStore = serde_json::from_str(
            r#"{"fields": {"uhbr13p5_support_0": 2, "port_capability_0": "3", "stray": 1}}"#,
        )
        .expect("parse");
        let store = persisted.to_capability_store();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("uhbr13p5_support", 0).map(|v| v.as_checked()), Some(Ok(true)));
        assert_eq!(store.get("port_capability", 0).map(|v| v.as_index()), Some(Ok(3)));
    }
}
