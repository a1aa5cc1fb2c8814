//! On-disk layout shared between host and guest (spec §6).
//!
//! ```text
//! <root>/containers/<id>/{config.json,status.json,rootfs/}
//! <root>/images/<digest>/{config.json,layers/}
//! <root>/images/tags.json
//! <root>/volumes/<name>/
//! ```
//!
//! `<root>` is `/var/lib/<rt>` on a Linux host acting as a daemon, or
//! `dirs::data_dir()/<rt>` for a non-root/non-Linux install; the guest always
//! uses `/var/lib/<rt>` since it is a disposable, single-tenant Linux VM.

use std::path::{Path, PathBuf};

/// Root-relative directory names.
pub mod dirs {
    pub const CONTAINERS: &str = "containers";
    pub const IMAGES: &str = "images";
    pub const VOLUMES: &str = "volumes";
    pub const VMS: &str = "vms";
    pub const ROOTFS: &str = "rootfs";
    pub const LAYERS: &str = "layers";
}

/// Root-relative file names.
pub mod files {
    pub const CONFIG: &str = "config.json";
    pub const STATUS: &str = "status.json";
    pub const TAGS_INDEX: &str = "tags.json";
    pub const LOCK: &str = ".lock";
}

/// Top-level runtime state directory layout, rooted at `<RT>_STATE_DIR` or a
/// platform default.
#[derive(Clone, Debug)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn containers_dir(&self) -> PathBuf {
        self.root.join(dirs::CONTAINERS)
    }

    pub fn container_dir(&self, id: &str) -> PathBuf {
        self.containers_dir().join(id)
    }

    pub fn container_config(&self, id: &str) -> PathBuf {
        self.container_dir(id).join(files::CONFIG)
    }

    pub fn container_status(&self, id: &str) -> PathBuf {
        self.container_dir(id).join(files::STATUS)
    }

    pub fn container_rootfs(&self, id: &str) -> PathBuf {
        self.container_dir(id).join(dirs::ROOTFS)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(dirs::IMAGES)
    }

    pub fn image_dir(&self, digest: &str) -> PathBuf {
        self.images_dir().join(sanitize_digest(digest))
    }

    pub fn image_config(&self, digest: &str) -> PathBuf {
        self.image_dir(digest).join(files::CONFIG)
    }

    pub fn image_layers_dir(&self, digest: &str) -> PathBuf {
        self.image_dir(digest).join(dirs::LAYERS)
    }

    pub fn tags_index(&self) -> PathBuf {
        self.images_dir().join(files::TAGS_INDEX)
    }

    pub fn volumes_dir(&self) -> PathBuf {
        self.root.join(dirs::VOLUMES)
    }

    pub fn volume_dir(&self, name: &str) -> PathBuf {
        self.volumes_dir().join(name)
    }

    pub fn vms_dir(&self) -> PathBuf {
        self.root.join(dirs::VMS)
    }

    pub fn vm_dir(&self, name: &str) -> PathBuf {
        self.vms_dir().join(name)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(files::LOCK)
    }

    /// Create the directories every installation needs up front. Per-entity
    /// directories are created lazily by their owning store.
    pub fn prepare(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.containers_dir())?;
        std::fs::create_dir_all(self.images_dir())?;
        std::fs::create_dir_all(self.volumes_dir())?;
        std::fs::create_dir_all(self.vms_dir())?;
        Ok(())
    }
}

/// Digests are `sha256:hex`; replace `:` so the digest is a valid single
/// path component on every host filesystem.
pub fn sanitize_digest(digest: &str) -> String {
    digest.replace(':', "-")
}

/// `<user-state>/vms/<vm-name>/{disk.qcow2, kernel, initramfs, seed.iso}` (spec §6).
#[derive(Clone, Debug)]
pub struct VmWorkspace {
    root: PathBuf,
}

impl VmWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn disk(&self) -> PathBuf {
        self.root.join("disk.qcow2")
    }

    pub fn kernel(&self) -> PathBuf {
        self.root.join("kernel")
    }

    pub fn initramfs(&self) -> PathBuf {
        self.root.join("initramfs")
    }

    pub fn seed_iso(&self) -> PathBuf {
        self.root.join("seed.iso")
    }

    pub fn prepare(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_paths_nest_under_root() {
        let layout = StateLayout::new("/var/lib/stratum");
        assert_eq!(
            layout.container_config("abc123"),
            PathBuf::from("/var/lib/stratum/containers/abc123/config.json")
        );
        assert_eq!(
            layout.container_rootfs("abc123"),
            PathBuf::from("/var/lib/stratum/containers/abc123/rootfs")
        );
    }

    #[test]
    fn image_digest_is_sanitized_for_the_filesystem() {
        let layout = StateLayout::new("/var/lib/stratum");
        assert_eq!(
            layout.image_dir("sha256:deadbeef"),
            PathBuf::from("/var/lib/stratum/images/sha256-deadbeef")
        );
    }

    #[test]
    fn vm_workspace_paths_match_spec() {
        let ws = VmWorkspace::new("/home/user/.stratum/vms/default");
        assert_eq!(ws.disk(), PathBuf::from("/home/user/.stratum/vms/default/disk.qcow2"));
        assert_eq!(ws.seed_iso(), PathBuf::from("/home/user/.stratum/vms/default/seed.iso"));
    }
}
