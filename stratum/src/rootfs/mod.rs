//! Rootfs Builder (spec §4.5).
//!
//! Builds a container-scoped filesystem tree in the documented order:
//! extract layers, ensure pseudo-directories exist, bind-mount `/proc` and
//! `/sys`, populate a `devtmpfs` replacement, apply volume bindings, then
//! pivot (or chroot) into it. Teardown runs the inverse order.

use crate::error::{StratumError, StratumResult};
use crate::images::ImageStore;
use crate::model::VolumeBinding;
use nix::mount::{mount, umount2, MntFlags, MsFlags};
use std::path::{Path, PathBuf};

const PSEUDO_DIRS: &[&str] = &["proc", "sys", "dev", "tmp", "etc"];
const DEVICE_NODES: &[(&str, u64, u64, libc::mode_t)] = &[
    ("null", 1, 3, libc::S_IFCHR | 0o666),
    ("zero", 1, 5, libc::S_IFCHR | 0o666),
    ("random", 1, 8, libc::S_IFCHR | 0o666),
    ("urandom", 1, 9, libc::S_IFCHR | 0o666),
    ("tty", 5, 0, libc::S_IFCHR | 0o666),
    ("console", 5, 1, libc::S_IFCHR | 0o600),
];

pub struct RootfsBuilder<'a> {
    images: &'a ImageStore,
}

impl<'a> RootfsBuilder<'a> {
    pub fn new(images: &'a ImageStore) -> Self {
        Self { images }
    }

    /// Build the rootfs for container `container_id` from image `image_digest`
    /// at `root`, per spec §4.5's six numbered steps. Does not pivot — that
    /// happens in the isolated child via [`pivot`], after namespaces are
    /// unshared, since `pivot_root` requires the calling process to already
    /// be in its own mount namespace.
    pub fn build(&self, root: &Path, image_digest: &str, volumes: &[VolumeBinding]) -> StratumResult<()> {
        std::fs::create_dir_all(root).map_err(|e| StratumError::io("rootfs.build", format!("failed to create {}", root.display())).with_source(e))?;

        self.images.extract(image_digest, root)?;

        for dir in PSEUDO_DIRS {
            std::fs::create_dir_all(root.join(dir)).map_err(|e| StratumError::io("rootfs.build", format!("failed to create {dir}")).with_source(e))?;
        }

        mount_pseudo_filesystems(root)?;
        populate_device_nodes(root)?;

        for binding in volumes {
            apply_volume_binding(root, binding)?;
        }

        Ok(())
    }

    /// Reverse of [`build`]'s mounts. Lazy (detached) unmount is permitted
    /// for `/proc` and `/sys` under forced removal (spec §4.5).
    pub fn teardown(&self, root: &Path, volumes: &[VolumeBinding], force: bool) -> StratumResult<()> {
        let mut first_err = None;
        for binding in volumes.iter().rev() {
            let target = root.join(strip_leading_slash(&binding.container_path));
            if let Err(e) = unmount(&target, force) {
                first_err.get_or_insert(e);
            }
        }
        if let Err(e) = unmount(&root.join("sys"), force) {
            first_err.get_or_insert(e);
        }
        if let Err(e) = unmount(&root.join("proc"), force) {
            first_err.get_or_insert(e);
        }
        if let Err(e) = unmount(&root.join("dev"), force) {
            first_err.get_or_insert(e);
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn mount_pseudo_filesystems(root: &Path) -> StratumResult<()> {
    mount_fs(None, &root.join("proc"), Some("proc"), MsFlags::empty())?;
    mount_fs(None, &root.join("sys"), Some("sysfs"), MsFlags::empty())?;
    mount_fs(None, &root.join("dev"), Some("tmpfs"), MsFlags::empty())?;
    Ok(())
}

fn populate_device_nodes(root: &Path) -> StratumResult<()> {
    for (name, major, minor, mode) in DEVICE_NODES {
        let path = root.join("dev").join(name);
        let dev = nix::sys::stat::makedev(*major, *minor);
        let result = unsafe {
            let c_path = std::ffi::CString::new(path.as_os_str().to_string_lossy().as_bytes()).unwrap();
            libc::mknod(c_path.as_ptr(), *mode, dev)
        };
        if result != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EEXIST) {
                return Err(StratumError::io("rootfs.devices", format!("mknod {} failed", path.display())).with_source(err));
            }
        }
    }
    Ok(())
}

fn apply_volume_binding(root: &Path, binding: &VolumeBinding) -> StratumResult<()> {
    let target = root.join(strip_leading_slash(&binding.container_path));
    std::fs::create_dir_all(&target).map_err(|e| StratumError::io("rootfs.volumes", format!("failed to create {}", target.display())).with_source(e))?;

    let mut flags = MsFlags::MS_BIND | MsFlags::MS_REC;
    if binding.read_only {
        flags |= MsFlags::MS_RDONLY;
    }
    mount_fs(Some(&binding.host_path), &target, None, flags)
}

fn mount_fs(source: Option<&Path>, target: &Path, fstype: Option<&str>, flags: MsFlags) -> StratumResult<()> {
    mount(source, target, fstype, flags, None::<&str>)
        .map_err(|e| StratumError::system("rootfs.mount", format!("mount {} failed", target.display())).with_source(e))
}

fn unmount(target: &Path, force: bool) -> StratumResult<()> {
    let flags = if force { MntFlags::MNT_DETACH } else { MntFlags::empty() };
    match umount2(target, flags) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::EINVAL) => Ok(()), // not a mount point, nothing to do
        Err(e) => Err(StratumError::system("rootfs.unmount", format!("unmount {} failed", target.display())).with_source(e)),
    }
}

fn strip_leading_slash(path: &Path) -> PathBuf {
    path.strip_prefix("/").map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}

/// Allocate the per-container rootfs directory path under the State Store
/// layout. Exposed separately from [`RootfsBuilder::build`] so the
/// Lifecycle Engine can record the path before the build completes.
pub fn rootfs_path(state_root: &Path, container_id: &str) -> PathBuf {
    state_root.join("containers").join(container_id).join("rootfs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rootfs_path_nests_under_the_container_directory() {
        let path = rootfs_path(Path::new("/var/lib/stratum"), "abc123");
        assert_eq!(path, PathBuf::from("/var/lib/stratum/containers/abc123/rootfs"));
    }
}
