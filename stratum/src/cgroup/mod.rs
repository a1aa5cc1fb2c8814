//! Resource Controller (spec §4.4): cgroup v2 (preferred) or v1 (fallback).
//!
//! Grounded in the rlimit-application style of
//! `jailer::common::rlimit::apply_limits_raw` (a flat "apply what's set,
//! skip what isn't" pass), but cgroups are filesystem-based rather than
//! syscall-based, so this module writes controller files directly instead
//! of calling into libc.

use crate::error::{retry_transient, StratumError, StratumResult};
use crate::model::ResourceLimits;
use std::path::{Path, PathBuf};
use std::time::Duration;

const V2_ROOT: &str = "/sys/fs/cgroup";
const V1_ROOT: &str = "/sys/fs/cgroup";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Version {
    V2,
    V1,
}

pub struct Cgroup {
    version: Version,
    path: PathBuf,
}

impl Cgroup {
    /// Detect the unified hierarchy (a `cgroup.controllers` file at the
    /// v2 root) and fall back to v1 per-controller directories otherwise.
    fn detect_version() -> Version {
        if Path::new(V2_ROOT).join("cgroup.controllers").exists() {
            Version::V2
        } else {
            Version::V1
        }
    }

    /// Create `<root>/stratum/<container-id>` (v2) or the per-controller
    /// equivalent (v1) and apply `limits`.
    pub fn create(container_id: &str, limits: &ResourceLimits) -> StratumResult<Self> {
        let version = Self::detect_version();
        let cgroup = match version {
            Version::V2 => {
                let path = Path::new(V2_ROOT).join("stratum").join(container_id);
                std::fs::create_dir_all(&path).map_err(|e| StratumError::system("cgroup.create", format!("failed to create {}", path.display())).with_source(e))?;
                Self { version, path }
            }
            Version::V1 => {
                for controller in ["memory", "cpu", "pids"] {
                    let path = Path::new(V1_ROOT).join(controller).join("stratum").join(container_id);
                    std::fs::create_dir_all(&path).map_err(|e| StratumError::system("cgroup.create", format!("failed to create {}", path.display())).with_source(e))?;
                }
                Self { version, path: Path::new(V1_ROOT).join("stratum").join(container_id) }
            }
        };
        cgroup.apply_limits(limits)?;
        Ok(cgroup)
    }

    /// Re-locate an already-created cgroup by container id, without
    /// touching its limits. Used by teardown, which runs in a fresh
    /// `Cgroup` value obtained after the process that originally called
    /// [`create`] may be long gone (e.g. a daemon restart).
    pub fn open(container_id: &str) -> Self {
        let version = Self::detect_version();
        let path = match version {
            Version::V2 => Path::new(V2_ROOT).join("stratum").join(container_id),
            Version::V1 => Path::new(V1_ROOT).join("stratum").join(container_id),
        };
        Self { version, path }
    }

    fn apply_limits(&self, limits: &ResourceLimits) -> StratumResult<()> {
        match self.version {
            Version::V2 => {
                if limits.memory_bytes > 0 {
                    self.write_v2("memory.max", &limits.memory_bytes.to_string())?;
                }
                if let Some(shares) = limits.cpu_shares {
                    // cgroup v2 weight is 1-10000; translate legacy 2-262144 shares
                    // by the same linear scale the kernel docs recommend.
                    let weight = ((shares.max(2) as f64 / 1024.0) * 100.0).round().clamp(1.0, 10000.0) as u64;
                    self.write_v2("cpu.weight", &weight.to_string())?;
                }
                if let Some(pids) = limits.pid_limit {
                    self.write_v2("pids.max", &pids.to_string())?;
                }
            }
            Version::V1 => {
                if limits.memory_bytes > 0 {
                    self.write_v1("memory", "memory.limit_in_bytes", &limits.memory_bytes.to_string())?;
                }
                if let Some(shares) = limits.cpu_shares {
                    self.write_v1("cpu", "cpu.shares", &shares.to_string())?;
                }
                if let Some(pids) = limits.pid_limit {
                    self.write_v1("pids", "pids.max", &pids.to_string())?;
                }
            }
        }
        Ok(())
    }

    /// Move `pid` into this cgroup; descendants inherit it automatically.
    pub fn attach(&self, pid: u32) -> StratumResult<()> {
        match self.version {
            Version::V2 => self.write_v2("cgroup.procs", &pid.to_string()),
            Version::V1 => {
                for controller in ["memory", "cpu", "pids"] {
                    self.write_v1(controller, "cgroup.procs", &pid.to_string())?;
                }
                Ok(())
            }
        }
    }

    fn write_v2(&self, file: &str, value: &str) -> StratumResult<()> {
        let path = self.path.join(file);
        write_controller_file(&path, value)
    }

    fn write_v1(&self, controller: &str, file: &str, value: &str) -> StratumResult<()> {
        let path = Path::new(V1_ROOT).join(controller).join("stratum").join(self.path.file_name().unwrap()).join(file);
        write_controller_file(&path, value)
    }

    /// Destroy the cgroup directory. `BUSY` (lingering process from a fork
    /// race) is retried up to three times with 100ms backoff before
    /// surfacing (spec §4.4).
    pub async fn destroy(self) -> StratumResult<()> {
        let dirs = self.controller_dirs();
        retry_transient("cgroup.destroy", 3, Duration::from_millis(100), || {
            let dirs = dirs.clone();
            async move {
                for dir in &dirs {
                    match std::fs::remove_dir(dir) {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) if e.raw_os_error() == Some(libc::EBUSY) => {
                            return Err(StratumError::transient("cgroup.destroy", format!("{} is busy", dir.display())).with_source(e));
                        }
                        Err(e) => return Err(StratumError::system("cgroup.destroy", format!("failed to remove {}", dir.display())).with_source(e)),
                    }
                }
                Ok(())
            }
        })
        .await
    }

    fn controller_dirs(&self) -> Vec<PathBuf> {
        match self.version {
            Version::V2 => vec![self.path.clone()],
            Version::V1 => {
                let id = self.path.file_name().unwrap();
                ["memory", "cpu", "pids"].iter().map(|c| Path::new(V1_ROOT).join(c).join("stratum").join(id)).collect()
            }
        }
    }
}

fn write_controller_file(path: &Path, value: &str) -> StratumResult<()> {
    std::fs::write(path, value).map_err(|e| StratumError::system("cgroup.write", format!("failed to write {} into {}", value, path.display())).with_source(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_shares_translate_to_a_bounded_v2_weight() {
        let limits = ResourceLimits { memory_bytes: 0, cpu_shares: Some(1024), pid_limit: None };
        // 1024 shares -> weight 100, the cgroup v2 default.
        let weight = ((limits.cpu_shares.unwrap().max(2) as f64 / 1024.0) * 100.0).round().clamp(1.0, 10000.0) as u64;
        assert_eq!(weight, 100);
    }
}
