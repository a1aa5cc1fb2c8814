//! The per-container State Store (spec §4.1).
//!
//! Each container gets a directory `<root>/containers/<id>/` holding
//! `config.json` (the full [`Container`] record) and `status.json` (just
//! the status/pid/exit fields, cheap to read without deserializing the
//! whole record — used by `GET /health`-adjacent status checks that must
//! never block on a write).

use crate::error::{StratumError, StratumResult};
use crate::model::{resolve_prefix, Container, ContainerStatus, PrefixMatch};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stratum_shared::layout::StateLayout;

use super::lock::RecordLock;

#[derive(Serialize, Deserialize)]
struct StatusRecord {
    status: ContainerStatus,
    pid: Option<u32>,
    exit_code: Option<i32>,
}

impl From<&Container> for StatusRecord {
    fn from(c: &Container) -> Self {
        Self {
            status: c.status,
            pid: c.pid,
            exit_code: c.exit_code,
        }
    }
}

pub struct StateStore {
    layout: StateLayout,
}

impl StateStore {
    pub fn new(layout: StateLayout) -> StratumResult<Self> {
        layout.prepare().map_err(|e| StratumError::io("state.new", "failed to prepare state directories").with_source(e))?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    /// Atomic: write to a sibling temp file, then `rename` into place, per
    /// spec §4.1. `rename` on the same filesystem is atomic on every
    /// platform this runtime targets, so a crash mid-write never leaves a
    /// torn record.
    pub fn save(&self, container: &Container) -> StratumResult<()> {
        let dir = self.layout.container_dir(&container.id);
        let _lock = RecordLock::acquire(&dir)?;

        atomic_write_json(&self.layout.container_config(&container.id), container)?;
        atomic_write_json(&self.layout.container_status(&container.id), &StatusRecord::from(container))?;
        Ok(())
    }

    pub fn load(&self, id: &str) -> StratumResult<Container> {
        let path = self.layout.container_config(id);
        read_json(&path).map_err(|e| match e.kind() {
            stratum_shared::ErrorKind::NotFound => {
                StratumError::not_found("state.load", format!("no such container: {id}"))
            }
            _ => e,
        })
    }

    pub fn delete(&self, id: &str) -> StratumResult<()> {
        let dir = self.layout.container_dir(id);
        let _lock = RecordLock::acquire(&dir)?;
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StratumError::io("state.delete", format!("failed to remove {}", dir.display())).with_source(e)),
        }
    }

    pub fn list(&self) -> StratumResult<Vec<Container>> {
        let dir = self.layout.containers_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StratumError::io("state.list", format!("failed to read {}", dir.display())).with_source(e)),
        };

        let mut containers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StratumError::io("state.list", "failed to read directory entry").with_source(e))?;
            let config_path = entry.path().join("config.json");
            if !config_path.exists() {
                continue;
            }
            containers.push(read_json(&config_path)?);
        }
        containers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(containers)
    }

    pub fn update_status(&self, id: &str, status: ContainerStatus) -> StratumResult<Container> {
        let dir = self.layout.container_dir(id);
        let _lock = RecordLock::acquire(&dir)?;

        let mut container: Container = read_json(&self.layout.container_config(id))?;
        container.status = status;
        atomic_write_json(&self.layout.container_config(id), &container)?;
        atomic_write_json(&self.layout.container_status(id), &StatusRecord::from(&container))?;
        Ok(container)
    }

    /// Resolve a short prefix (>=4 chars) or a container name to a full
    /// identifier (spec §4.1, §8 testable property). Ambiguous prefixes are
    /// reported as `CONFLICT` with a `resolution=ambiguous` context tag —
    /// spec §7 enumerates eleven error kinds and has no dedicated
    /// `AMBIGUOUS` kind, so this resolves spec's own internal inconsistency
    /// (§4.1 names `AMBIGUOUS`, §7's table does not) in favor of the
    /// authoritative kind table; see DESIGN.md.
    pub fn resolve(&self, reference: &str) -> StratumResult<String> {
        let containers = self.list()?;
        let by_id = containers.iter().map(|c| c.id.as_str());

        match resolve_prefix(reference, by_id) {
            PrefixMatch::Unique(id) => return Ok(id.to_string()),
            PrefixMatch::Ambiguous(matches) => {
                return Err(StratumError::conflict(
                    "state.resolve",
                    format!("ambiguous reference '{reference}' matches {} containers", matches.len()),
                )
                .with_context("resolution", "ambiguous"));
            }
            PrefixMatch::None => {}
        }

        if let Some(container) = containers.iter().find(|c| c.name.as_deref() == Some(reference)) {
            return Ok(container.id.clone());
        }

        Err(StratumError::not_found("state.resolve", format!("no such container: {reference}")))
    }

    /// True if a non-removed container is already using `name` (spec §3
    /// invariant: a name cannot be reused while the prior holder still
    /// exists in a non-`removed` state).
    pub fn name_in_use(&self, name: &str) -> StratumResult<bool> {
        Ok(self
            .list()?
            .iter()
            .any(|c| c.name.as_deref() == Some(name) && c.status != ContainerStatus::Removed))
    }
}

fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> StratumResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| StratumError::io("state.write", format!("failed to create {}", dir.display())).with_source(e))?;

    let tmp_path = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("record"),
        std::process::id()
    ));

    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| StratumError::io("state.write", "failed to serialize record").with_source(e))?;
    std::fs::write(&tmp_path, json).map_err(|e| StratumError::io("state.write", format!("failed to write {}", tmp_path.display())).with_source(e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| StratumError::io("state.write", format!("failed to rename into {}", path.display())).with_source(e))?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> StratumResult<T> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StratumError::not_found("state.read", format!("{} does not exist", path.display()))
        } else {
            StratumError::io("state.read", format!("failed to read {}", path.display())).with_source(e)
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|e| StratumError::io("state.read", format!("corrupt record at {}", path.display())).with_source(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainerSpec, NetworkMode, ResourceLimits};

    fn store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(StateLayout::new(dir.path())).unwrap();
        (dir, store)
    }

    fn sample(id: &str, name: Option<&str>) -> Container {
        let spec = ContainerSpec {
            name: name.map(str::to_string),
            image: "alpine".into(),
            command: vec!["true".into()],
            env: vec![],
            working_dir: None,
            limits: ResourceLimits::default(),
            volumes: vec![],
            ports: vec![],
            network_mode: NetworkMode::Bridge,
            tty: false,
            interactive: false,
        };
        Container::new(id.to_string(), &spec, PathBuf::from("/tmp/rootfs"))
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, store) = store();
        let container = sample("abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd12", Some("web"));
        store.save(&container).unwrap();
        let loaded = store.load(&container.id).unwrap();
        assert_eq!(loaded.id, container.id);
        assert_eq!(loaded.name.as_deref(), Some("web"));
    }

    #[test]
    fn load_missing_container_is_not_found() {
        let (_dir, store) = store();
        let err = store.load("deadbeef").unwrap_err();
        assert_eq!(err.kind(), stratum_shared::ErrorKind::NotFound);
    }

    #[test]
    fn list_is_ordered_by_creation_time() {
        let (_dir, store) = store();
        let a = sample("a1", None);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = sample("b2", None);
        store.save(&b).unwrap();
        store.save(&a).unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed[0].id, "a1");
        assert_eq!(listed[1].id, "b2");
    }

    #[test]
    fn resolve_unique_prefix_succeeds() {
        let (_dir, store) = store();
        store.save(&sample("abcd1234xyz", None)).unwrap();
        assert_eq!(store.resolve("abcd").unwrap(), "abcd1234xyz");
    }

    #[test]
    fn resolve_ambiguous_prefix_is_conflict() {
        let (_dir, store) = store();
        store.save(&sample("abcd1111", None)).unwrap();
        store.save(&sample("abcd2222", None)).unwrap();
        let err = store.resolve("abcd").unwrap_err();
        assert_eq!(err.kind(), stratum_shared::ErrorKind::Conflict);
        assert_eq!(err.context().get("resolution").map(String::as_str), Some("ambiguous"));
    }

    #[test]
    fn resolve_by_name_works() {
        let (_dir, store) = store();
        store.save(&sample("abcd1234", Some("web"))).unwrap();
        assert_eq!(store.resolve("web").unwrap(), "abcd1234");
    }

    #[test]
    fn update_status_persists() {
        let (_dir, store) = store();
        let container = sample("abcd1234", None);
        store.save(&container).unwrap();
        let updated = store.update_status("abcd1234", ContainerStatus::Running).unwrap();
        assert_eq!(updated.status, ContainerStatus::Running);
        assert_eq!(store.load("abcd1234").unwrap().status, ContainerStatus::Running);
    }

    #[test]
    fn name_in_use_ignores_removed_containers() {
        let (_dir, store) = store();
        let mut container = sample("abcd1234", Some("web"));
        container.status = ContainerStatus::Removed;
        store.save(&container).unwrap();
        assert!(!store.name_in_use("web").unwrap());
    }
}
