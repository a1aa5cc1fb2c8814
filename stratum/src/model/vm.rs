//! The VM instance entity (spec §3, §4.8). One instance per host; a
//! singleton in practice but modeled as ordinary data so tests can construct
//! several.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmStatus {
    Stopped,
    Booting,
    Ready,
    Error,
}

impl std::fmt::Display for VmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            VmStatus::Stopped => "stopped",
            VmStatus::Booting => "booting",
            VmStatus::Ready => "ready",
            VmStatus::Error => "error",
        })
    }
}

/// Provider tag (spec §3). Selection order among these is host-dependent;
/// see [`crate::vm::provider::select_provider`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    QemuHvf,
    QemuKvm,
    HyperV,
    VirtualBox,
    Wsl2,
    VirtualizationFramework,
    /// Software-emulated QEMU; the universal fallback on every host.
    QemuTcg,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderKind::QemuHvf => "qemu-hvf",
            ProviderKind::QemuKvm => "qemu-kvm",
            ProviderKind::HyperV => "hyperv",
            ProviderKind::VirtualBox => "virtualbox",
            ProviderKind::Wsl2 => "wsl2",
            ProviderKind::VirtualizationFramework => "virtualization-framework",
            ProviderKind::QemuTcg => "qemu-tcg",
        };
        f.write_str(s)
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qemu-hvf" => Ok(ProviderKind::QemuHvf),
            "qemu-kvm" => Ok(ProviderKind::QemuKvm),
            "hyperv" => Ok(ProviderKind::HyperV),
            "virtualbox" => Ok(ProviderKind::VirtualBox),
            "wsl2" => Ok(ProviderKind::Wsl2),
            "virtualization-framework" => Ok(ProviderKind::VirtualizationFramework),
            "qemu-tcg" => Ok(ProviderKind::QemuTcg),
            other => Err(format!("unknown VM provider '{other}'")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VmInstance {
    pub name: String,
    pub disk_path: PathBuf,
    pub kernel_path: PathBuf,
    pub initramfs_path: PathBuf,
    pub seed_path: PathBuf,
    pub ssh_port: u16,
    pub status: VmStatus,
    pub provider: ProviderKind,
    pub vcpus: u32,
    pub memory_mib: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_round_trips_through_display_and_parse() {
        for kind in [
            ProviderKind::QemuHvf,
            ProviderKind::QemuKvm,
            ProviderKind::HyperV,
            ProviderKind::VirtualBox,
            ProviderKind::Wsl2,
            ProviderKind::VirtualizationFramework,
            ProviderKind::QemuTcg,
        ] {
            assert_eq!(kind.to_string().parse::<ProviderKind>().unwrap(), kind);
        }
    }
}
