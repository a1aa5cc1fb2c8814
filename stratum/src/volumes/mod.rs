//! Volume management (spec §3 "Volume", §6 `volume create|ls|rm|inspect|prune`).
//!
//! A named, runtime-managed directory under `<state_dir>/volumes/<name>`.
//! Persisted the same way the State Store persists containers (atomic
//! rename into a JSON record), since both are small, rarely-contended,
//! per-entity records under the same root.

use crate::error::{StratumError, StratumResult};
use crate::model::Volume;
use std::path::Path;
use stratum_shared::layout::StateLayout;

pub struct VolumeStore {
    layout: StateLayout,
}

impl VolumeStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    fn record_path(&self, name: &str) -> std::path::PathBuf {
        self.layout.volume_dir(name).join("volume.json")
    }

    /// `create` (spec §6 `volume create`). Fails if a volume with this name
    /// already exists.
    pub fn create(&self, name: &str) -> StratumResult<Volume> {
        if self.record_path(name).exists() {
            return Err(StratumError::conflict("volumes.create", format!("volume '{name}' already exists")));
        }
        let host_path = self.layout.volume_dir(name);
        std::fs::create_dir_all(&host_path)
            .map_err(|e| StratumError::io("volumes.create", format!("failed to create {}", host_path.display())).with_source(e))?;

        let volume = Volume::new(name.to_string(), host_path);
        self.save(&volume)?;
        Ok(volume)
    }

    pub fn get(&self, name: &str) -> StratumResult<Volume> {
        read_json(&self.record_path(name))
            .map_err(|_| StratumError::not_found("volumes.get", format!("no such volume: {name}")))
    }

    pub fn list(&self) -> StratumResult<Vec<Volume>> {
        let dir = self.layout.volumes_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StratumError::io("volumes.list", format!("failed to read {}", dir.display())).with_source(e)),
        };

        let mut volumes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StratumError::io("volumes.list", "failed to read directory entry").with_source(e))?;
            let record = entry.path().join("volume.json");
            if record.exists() {
                volumes.push(read_json(&record)?);
            }
        }
        volumes.sort_by(|a: &Volume, b: &Volume| a.name.cmp(&b.name));
        Ok(volumes)
    }

    /// `rm` (spec §6): fails iff the referencing-container set is non-empty
    /// (spec §3 invariant, §8 testable property).
    pub fn remove(&self, name: &str) -> StratumResult<()> {
        let volume = self.get(name)?;
        if volume.is_in_use() {
            return Err(StratumError::conflict("volumes.remove", format!("volume '{name}' is in use by {} container(s)", volume.referenced_by.len())));
        }
        std::fs::remove_dir_all(&volume.host_path)
            .map_err(|e| StratumError::io("volumes.remove", format!("failed to remove {}", volume.host_path.display())).with_source(e))
    }

    /// `prune` (spec §6): remove every volume with an empty referencing set.
    /// Returns the names removed.
    pub fn prune(&self) -> StratumResult<Vec<String>> {
        let mut removed = Vec::new();
        for volume in self.list()? {
            if !volume.is_in_use() {
                self.remove(&volume.name)?;
                removed.push(volume.name);
            }
        }
        Ok(removed)
    }

    /// Record that `container_id` now binds this volume; called by the
    /// Lifecycle Engine's `create` when a `ContainerSpec` volume binding
    /// names a volume rather than a bare host path.
    pub fn add_reference(&self, name: &str, container_id: &str) -> StratumResult<()> {
        let mut volume = self.get(name)?;
        volume.referenced_by.insert(container_id.to_string());
        self.save(&volume)
    }

    /// Drop `container_id`'s reference; called on `remove`.
    pub fn remove_reference(&self, name: &str, container_id: &str) -> StratumResult<()> {
        let mut volume = match self.get(name) {
            Ok(v) => v,
            Err(_) => return Ok(()),
        };
        volume.referenced_by.remove(container_id);
        self.save(&volume)
    }

    fn save(&self, volume: &Volume) -> StratumResult<()> {
        let path = self.record_path(&volume.name);
        let dir = path.parent().unwrap();
        std::fs::create_dir_all(dir).map_err(|e| StratumError::io("volumes.save", format!("failed to create {}", dir.display())).with_source(e))?;

        let tmp = dir.join(format!(".volume.json.tmp-{}", std::process::id()));
        let json = serde_json::to_vec_pretty(volume).map_err(|e| StratumError::io("volumes.save", "failed to serialize volume").with_source(e))?;
        std::fs::write(&tmp, json).map_err(|e| StratumError::io("volumes.save", format!("failed to write {}", tmp.display())).with_source(e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StratumError::io("volumes.save", format!("failed to rename into {}", path.display())).with_source(e))
    }
}

fn read_json(path: &Path) -> StratumResult<Volume> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StratumError::not_found("volumes.read", format!("{} does not exist", path.display()))
        } else {
            StratumError::io("volumes.read", format!("failed to read {}", path.display())).with_source(e)
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|e| StratumError::io("volumes.read", format!("corrupt record at {}", path.display())).with_source(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, VolumeStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = VolumeStore::new(StateLayout::new(dir.path()));
        std::fs::create_dir_all(dir.path().join("volumes")).unwrap();
        (dir, store)
    }

    #[test]
    fn create_then_get_round_trips() {
        let (_dir, store) = store();
        let volume = store.create("data").unwrap();
        assert_eq!(store.get("data").unwrap().name, volume.name);
    }

    #[test]
    fn create_rejects_duplicate_names() {
        let (_dir, store) = store();
        store.create("data").unwrap();
        let err = store.create("data").unwrap_err();
        assert_eq!(err.kind(), stratum_shared::ErrorKind::Conflict);
    }

    #[test]
    fn remove_fails_iff_referenced() {
        let (_dir, store) = store();
        store.create("data").unwrap();
        store.add_reference("data", "container1").unwrap();
        assert_eq!(store.remove("data").unwrap_err().kind(), stratum_shared::ErrorKind::Conflict);

        store.remove_reference("data", "container1").unwrap();
        store.remove("data").unwrap();
        assert!(store.get("data").is_err());
    }

    #[test]
    fn prune_removes_only_unreferenced_volumes() {
        let (_dir, store) = store();
        store.create("used").unwrap();
        store.create("unused").unwrap();
        store.add_reference("used", "c1").unwrap();

        let removed = store.prune().unwrap();
        assert_eq!(removed, vec!["unused".to_string()]);
        assert!(store.get("used").is_ok());
    }

    #[test]
    fn list_is_sorted_by_name() {
        let (_dir, store) = store();
        store.create("zeta").unwrap();
        store.create("alpha").unwrap();
        let names: Vec<_> = store.list().unwrap().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
