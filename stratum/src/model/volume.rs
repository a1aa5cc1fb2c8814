//! The Volume entity (spec §3, §6 `volume create|ls|rm|inspect|prune`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    /// Only `local` is required by spec §3.
    pub driver: String,
    pub host_path: PathBuf,
    pub created_at: DateTime<Utc>,
    /// Identifiers of containers currently referencing this volume. A
    /// non-empty set blocks removal (spec invariant).
    pub referenced_by: BTreeSet<String>,
}

impl Volume {
    pub fn new(name: String, host_path: PathBuf) -> Self {
        Self {
            name,
            driver: "local".to_string(),
            host_path,
            created_at: Utc::now(),
            referenced_by: BTreeSet::new(),
        }
    }

    pub fn is_in_use(&self) -> bool {
        !self.referenced_by.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshly_created_volume_is_not_in_use() {
        let vol = Volume::new("data".into(), PathBuf::from("/var/lib/stratum/volumes/data"));
        assert!(!vol.is_in_use());
    }

    #[test]
    fn referenced_volume_is_in_use() {
        let mut vol = Volume::new("data".into(), PathBuf::from("/var/lib/stratum/volumes/data"));
        vol.referenced_by.insert("abc123".into());
        assert!(vol.is_in_use());
    }
}
