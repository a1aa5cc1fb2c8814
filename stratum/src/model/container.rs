//! The Container entity (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerStatus {
    Created,
    Running,
    Stopped,
    Exited,
    Removed,
}

impl ContainerStatus {
    /// Non-terminal means still occupying a slot a user would care about in
    /// a default `ls` (spec §4.7 `list({all})`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContainerStatus::Exited | ContainerStatus::Removed)
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContainerStatus::Created => "created",
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Exited => "exited",
            ContainerStatus::Removed => "removed",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkMode {
    Bridge,
    Host,
    None,
}

impl Default for NetworkMode {
    fn default() -> Self {
        NetworkMode::Bridge
    }
}

impl std::str::FromStr for NetworkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bridge" => Ok(NetworkMode::Bridge),
            "host" => Ok(NetworkMode::Host),
            "none" => Ok(NetworkMode::None),
            other => Err(format!("unknown network mode '{other}', expected bridge|host|none")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBinding {
    pub host_path: PathBuf,
    pub container_path: PathBuf,
    pub read_only: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortProtocol {
    Tcp,
    Udp,
}

impl Default for PortProtocol {
    fn default() -> Self {
        PortProtocol::Tcp
    }
}

impl PortProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortProtocol::Tcp => "tcp",
            PortProtocol::Udp => "udp",
        }
    }
}

impl std::fmt::Display for PortProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: PortProtocol,
}

/// Resource limits; `memory_bytes: 0` means unlimited (spec §4.4).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_bytes: u64,
    pub cpu_shares: Option<u64>,
    pub pid_limit: Option<u64>,
}

/// Input to `LifecycleEngine::create` (spec §4.7).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: Option<String>,
    pub image: String,
    pub command: Vec<String>,
    pub env: Vec<(String, String)>,
    pub working_dir: Option<String>,
    pub limits: ResourceLimits,
    pub volumes: Vec<VolumeBinding>,
    pub ports: Vec<PortMapping>,
    pub network_mode: NetworkMode,
    pub tty: bool,
    pub interactive: bool,
}

impl ContainerSpec {
    /// Validate the parts of the spec the Lifecycle Engine checks before
    /// allocating an identifier (spec §4.7 `create`).
    pub fn validate(&self) -> Result<(), String> {
        if self.image.trim().is_empty() {
            return Err("image reference must not be empty".to_string());
        }
        if let Some(name) = &self.name {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.') {
                return Err(format!("invalid container name '{name}'"));
            }
        }
        for binding in &self.volumes {
            if binding.host_path.as_os_str().is_empty() || binding.container_path.as_os_str().is_empty() {
                return Err("volume bindings require both a host and container path".to_string());
            }
        }
        Ok(())
    }

    pub fn env_as_map(&self) -> BTreeMap<String, String> {
        self.env.iter().cloned().collect()
    }
}

/// The durable, persisted Container record (spec §3, §4.1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub name: Option<String>,
    pub image: String,
    pub command: Vec<String>,
    pub env: Vec<(String, String)>,
    pub working_dir: Option<String>,
    pub limits: ResourceLimits,
    pub volumes: Vec<VolumeBinding>,
    pub ports: Vec<PortMapping>,
    pub network_mode: NetworkMode,
    pub status: ContainerStatus,
    /// Host-side PID on the native path, guest-side PID under VM mode.
    pub pid: Option<u32>,
    pub rootfs_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    /// Set when this container's lifecycle is proxied into a VM guest
    /// (spec §4.8); `None` on the native Linux path.
    pub vm_name: Option<String>,
}

impl Container {
    pub fn new(id: String, spec: &ContainerSpec, rootfs_path: PathBuf) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            image: spec.image.clone(),
            command: spec.command.clone(),
            env: spec.env.clone(),
            working_dir: spec.working_dir.clone(),
            limits: spec.limits,
            volumes: spec.volumes.clone(),
            ports: spec.ports.clone(),
            network_mode: spec.network_mode,
            status: ContainerStatus::Created,
            pid: None,
            rootfs_path,
            created_at: Utc::now(),
            started_at: None,
            exit_code: None,
            vm_name: None,
        }
    }

    pub fn short_id(&self) -> &str {
        &self.id[..12.min(self.id.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> ContainerSpec {
        ContainerSpec {
            name: Some("web".into()),
            image: "alpine".into(),
            command: vec!["echo".into(), "hi".into()],
            env: vec![],
            working_dir: None,
            limits: ResourceLimits::default(),
            volumes: vec![],
            ports: vec![],
            network_mode: NetworkMode::Bridge,
            tty: false,
            interactive: false,
        }
    }

    #[test]
    fn rejects_empty_image() {
        let mut spec = sample_spec();
        spec.image = "".into();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn rejects_invalid_name() {
        let mut spec = sample_spec();
        spec.name = Some("not a valid name!".into());
        assert!(spec.validate().is_err());
    }

    #[test]
    fn accepts_well_formed_spec() {
        assert!(sample_spec().validate().is_ok());
    }

    #[test]
    fn non_terminal_excludes_exited_and_removed() {
        assert!(!ContainerStatus::Running.is_terminal());
        assert!(ContainerStatus::Exited.is_terminal());
        assert!(ContainerStatus::Removed.is_terminal());
    }

    #[test]
    fn network_mode_parses_from_flag_values() {
        assert_eq!("host".parse::<NetworkMode>().unwrap(), NetworkMode::Host);
        assert!("nonsense".parse::<NetworkMode>().is_err());
    }
}
