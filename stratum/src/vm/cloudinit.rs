//! Builds the NoCloud cloud-init seed ISO (spec §4.8 step 1, §9).
//!
//! Grounded in the teacher's "shell out to an external image-building tool,
//! capture and log stderr on failure" idiom (`network/mod.rs::run`, reused
//! here for `genisoimage`/`mkisofs` rather than `ip`/`iptables`).

use crate::error::{StratumError, StratumResult};
use std::path::Path;
use stratum_shared::constants::vm_defaults;

const META_DATA: &str = "instance-id: stratum-guest\nlocal-hostname: stratum-guest\n";

/// The guest-side bootstrap script: enables password auth for the fixed
/// administrative account, starts sshd, loads the kernel modules the
/// Namespace Isolator and Network Manager expect to already be present
/// (overlay, bridge, veth), and writes a completion marker the boot-readiness
/// probe could additionally check via SSH if TCP reachability alone proved
/// too eager in practice (spec §9 open question, deferred — see DESIGN.md).
fn autosetup_script() -> String {
    format!(
        r#"#!/bin/sh
set -e
echo '{user}:{password}' | chpasswd
sed -i 's/^#\?PasswordAuthentication.*/PasswordAuthentication yes/' /etc/ssh/sshd_config
sed -i 's/^#\?PermitRootLogin.*/PermitRootLogin no/' /etc/ssh/sshd_config
systemctl enable ssh || systemctl enable sshd || true
systemctl restart ssh || systemctl restart sshd || true
modprobe overlay || true
modprobe bridge || true
modprobe veth || true
touch /var/lib/stratum-guest-ready
"#,
        user = vm_defaults::GUEST_USER,
        password = vm_defaults::GUEST_PASSWORD,
    )
}

fn user_data() -> String {
    format!(
        "#cloud-config\nruncmd:\n  - [ sh, -c, \"{}\" ]\n",
        autosetup_script().replace('\n', "; ").replace('"', "\\\"")
    )
}

/// Write a NoCloud-format seed ISO at `path` by staging `user-data` and
/// `meta-data` in a temp directory and invoking `genisoimage` (falling back
/// to `mkisofs`, which ships the same CLI surface on most distributions).
pub fn write_seed_iso(path: &Path) -> StratumResult<()> {
    let staging = tempfile::tempdir().map_err(|e| StratumError::io("vm.cloudinit", "failed to create staging directory").with_source(e))?;

    std::fs::write(staging.path().join("user-data"), user_data())
        .map_err(|e| StratumError::io("vm.cloudinit", "failed to write user-data").with_source(e))?;
    std::fs::write(staging.path().join("meta-data"), META_DATA)
        .map_err(|e| StratumError::io("vm.cloudinit", "failed to write meta-data").with_source(e))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StratumError::io("vm.cloudinit", format!("failed to create {}", parent.display())).with_source(e))?;
    }

    for tool in ["genisoimage", "mkisofs"] {
        let output = std::process::Command::new(tool)
            .args(["-output"])
            .arg(path)
            .args(["-volid", "cidata", "-joliet", "-rock"])
            .arg(staging.path().join("user-data"))
            .arg(staging.path().join("meta-data"))
            .output();

        match output {
            Ok(output) if output.status.success() => return Ok(()),
            Ok(output) => {
                tracing::warn!(tool, stderr = %String::from_utf8_lossy(&output.stderr), "seed ISO build failed");
            }
            Err(e) => {
                tracing::debug!(tool, error = %e, "seed ISO builder not available");
            }
        }
    }

    Err(StratumError::system("vm.cloudinit", "neither genisoimage nor mkisofs produced a seed ISO"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_data_embeds_the_fixed_guest_credentials() {
        let data = user_data();
        assert!(data.contains(vm_defaults::GUEST_USER));
        assert!(data.contains(vm_defaults::GUEST_PASSWORD));
    }
}
