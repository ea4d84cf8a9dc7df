//! UUID ↔ secondary-username identity map
//!
//! The secondary panel has no notion of the shared UUID identity. The link is
//! maintained out of band in a JSON side file (`{"<uuid>": "<username>", ...}`)
//! and loaded here as a bidirectional in-memory map. The file can be edited
//! while the service runs; `reload` swaps the map atomically.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::info;
use uuid::Uuid;

use crate::error::{PanelError, PanelResult};

#[derive(Debug, Default)]
struct MapInner {
    by_uuid: HashMap<Uuid, String>,
    by_name: HashMap<String, Uuid>,
}

/// Bidirectional mapping between the shared UUID identity and the secondary
/// panel's username.
#[derive(Debug)]
pub struct IdentityMap {
    path: PathBuf,
    inner: RwLock<MapInner>,
}

impl IdentityMap {
    /// Load the map from `path`. A missing or unparseable file is an error;
    /// callers that can run without links should start from `empty`.
    pub fn load(path: impl AsRef<Path>) -> PanelResult<Self> {
        let map = Self::empty(path);
        map.reload()?;
        Ok(map)
    }

    /// An empty map bound to `path`, to be filled by a later `reload`.
    pub fn empty(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            inner: RwLock::new(MapInner::default()),
        }
    }

    /// Re-read the side file, replacing the current map. Returns the number
    /// of entries loaded. On failure the previous map stays in place.
    pub fn reload(&self) -> PanelResult<usize> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            PanelError::IdentityMap(format!("read {}: {e}", self.path.display()))
        })?;
        let parsed: HashMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
            PanelError::IdentityMap(format!("parse {}: {e}", self.path.display()))
        })?;

        let mut by_uuid = HashMap::with_capacity(parsed.len());
        let mut by_name = HashMap::with_capacity(parsed.len());
        for (uuid_str, name) in parsed {
            let uuid = Uuid::parse_str(uuid_str.trim()).map_err(|e| {
                PanelError::IdentityMap(format!("bad uuid key {uuid_str:?}: {e}"))
            })?;
            by_uuid.insert(uuid, name.clone());
            by_name.insert(name, uuid);
        }

        let count = by_uuid.len();
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *inner = MapInner { by_uuid, by_name };
        info!(entries = count, path = %self.path.display(), "identity map loaded");
        Ok(count)
    }

    /// The secondary-panel username linked to `uuid`.
    pub fn name_for(&self, uuid: &Uuid) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_uuid.get(uuid).cloned()
    }

    /// The UUID linked to the secondary-panel username `name`.
    pub fn uuid_for(&self, name: &str) -> Option<Uuid> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_name.get(name).copied()
    }

    /// Number of linked identities.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_uuid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_map(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_and_lookup_both_ways() {
        let uuid = Uuid::new_v4();
        let file = write_map(&format!(r#"{{"{uuid}": "alice"}}"#));
        let map = IdentityMap::load(file.path()).unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map.name_for(&uuid), Some("alice".to_string()));
        assert_eq!(map.uuid_for("alice"), Some(uuid));
        assert_eq!(map.uuid_for("bob"), None);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(IdentityMap::load("/nonexistent/map.json").is_err());
    }

    #[test]
    fn test_failed_reload_keeps_previous_map() {
        let uuid = Uuid::new_v4();
        let file = write_map(&format!(r#"{{"{uuid}": "alice"}}"#));
        let map = IdentityMap::load(file.path()).unwrap();

        std::fs::write(file.path(), "not json").unwrap();
        assert!(map.reload().is_err());
        assert_eq!(map.name_for(&uuid), Some("alice".to_string()));
    }

    #[test]
    fn test_reload_replaces_entries() {
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();
        let file = write_map(&format!(r#"{{"{old}": "alice"}}"#));
        let map = IdentityMap::load(file.path()).unwrap();

        std::fs::write(file.path(), format!(r#"{{"{new}": "bob"}}"#)).unwrap();
        assert_eq!(map.reload().unwrap(), 1);
        assert_eq!(map.name_for(&old), None);
        assert_eq!(map.uuid_for("bob"), Some(new));
    }
}
