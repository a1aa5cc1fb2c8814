//! VM Provider (spec §4.8): boots a Linux guest on a non-Linux host and
//! proxies Lifecycle Engine operations into it over SSH.
//!
//! Grounded in the teacher's general "spawn an external binary via
//! `std::process::Command`, supervise the `Child`" idiom (the deleted
//! `vmm/controller/spawn.rs`), its `disk::qcow2` native qcow2-header writer
//! (`disk.rs` here), and its provider-selection shape (`model::vm::ProviderKind`)
//! — but talks to the guest over `ssh2` short-lived sessions rather than the
//! teacher's vsock/gRPC transport, since spec §4.8 specifies cloud-init-driven
//! SSH automation. See DESIGN.md for why `qemu-system-*` + `ssh2` replace the
//! teacher's `libkrun`/`libgvproxy` FFI engine.

mod cloudinit;
mod disk;
mod process;
mod provider;
mod ssh;

pub use provider::{select_provider, VmProvider};
pub use ssh::SshSession;

use crate::error::{retry_transient, StratumError, StratumResult};
use crate::model::{ProviderKind, VmInstance, VmStatus};
use std::time::{Duration, Instant};
use stratum_shared::constants::vm_defaults;
use stratum_shared::layout::VmWorkspace;

/// Boots and supervises the single host VM instance (spec §3: "VM instance
/// ... singleton"). Holds no lock itself; callers serialize access the way
/// every other process-wide resource in spec §5 is serialized (one `Mutex`
/// in the owning `LifecycleEngine`).
pub struct VmManager {
    workspace: VmWorkspace,
    instance: Option<VmInstance>,
    child: Option<process::Supervised>,
}

impl VmManager {
    pub fn new(workspace: VmWorkspace) -> Self {
        Self { workspace, instance: None, child: None }
    }

    pub fn status(&self) -> VmStatus {
        self.instance.as_ref().map(|i| i.status).unwrap_or(VmStatus::Stopped)
    }

    pub fn instance(&self) -> Option<&VmInstance> {
        self.instance.as_ref()
    }

    /// Boot sequence (spec §4.8 steps 1-4).
    pub async fn start(&mut self, vcpus: u32, memory_mib: u64, disk_gib: u64) -> StratumResult<()> {
        if self.status() == VmStatus::Ready {
            return Ok(());
        }

        self.workspace.prepare().map_err(|e| StratumError::io("vm.start", "failed to create VM workspace").with_source(e))?;

        let provider = select_provider();
        let disk_path = self.workspace.disk();
        if !disk_path.exists() {
            disk::create_qcow2(&disk_path, disk_gib)?;
        }

        let kernel = self.workspace.kernel();
        let initramfs = self.workspace.initramfs();
        ensure_boot_artifacts(&kernel, &initramfs)?;

        let seed = self.workspace.seed_iso();
        cloudinit::write_seed_iso(&seed)?;

        let mut instance = VmInstance {
            name: "default".to_string(),
            disk_path: disk_path.clone(),
            kernel_path: kernel.clone(),
            initramfs_path: initramfs.clone(),
            seed_path: seed.clone(),
            ssh_port: stratum_shared::constants::ports::VM_SSH,
            status: VmStatus::Booting,
            provider,
            vcpus,
            memory_mib,
        };

        let child = process::launch(&provider, &instance, &disk_path, &kernel, &initramfs, &seed)?;
        self.child = Some(child);
        self.instance = Some(instance.clone());

        match self.wait_for_ready().await {
            Ok(()) => {
                instance.status = VmStatus::Ready;
                self.instance = Some(instance);
                self.deploy_guest_binary().await?;
                Ok(())
            }
            Err(e) => {
                instance.status = VmStatus::Error;
                self.instance = Some(instance);
                Err(e)
            }
        }
    }

    /// Poll SSH readiness every `SSH_POLL_INTERVAL_SECS`, logging progress
    /// every `SSH_PROGRESS_EVERY_SECS`, until `BOOT_DEADLINE_SECS` elapses
    /// (spec §4.8 step 3).
    async fn wait_for_ready(&self) -> StratumResult<()> {
        let deadline = Duration::from_secs(vm_defaults::BOOT_DEADLINE_SECS);
        let poll = Duration::from_secs(vm_defaults::SSH_POLL_INTERVAL_SECS);
        let progress_every = vm_defaults::SSH_PROGRESS_EVERY_SECS;

        let started = Instant::now();
        let mut last_progress = 0u64;
        loop {
            if started.elapsed() >= deadline {
                return Err(StratumError::transient("vm.boot", format!("guest did not become SSH-reachable within {}s", deadline.as_secs())));
            }

            let elapsed = started.elapsed().as_secs();
            if elapsed / progress_every > last_progress / progress_every {
                tracing::info!(elapsed_secs = elapsed, "waiting for guest SSH readiness");
                last_progress = elapsed;
            }

            if ssh::probe(vm_defaults::GUEST_USER, stratum_shared::constants::ports::VM_SSH).is_ok() {
                return Ok(());
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Deploy the in-guest runtime binary over SSH (spec §4.8 step 4).
    async fn deploy_guest_binary(&self) -> StratumResult<()> {
        let local_binary = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join("stratum-guest")))
            .filter(|p| p.exists());

        let Some(local_binary) = local_binary else {
            tracing::warn!("stratum-guest binary not found alongside the current executable; skipping deploy");
            return Ok(());
        };

        retry_transient("vm.deploy", vm_defaults::SSH_RETRY_ATTEMPTS, Duration::from_millis(500), || {
            let local_binary = local_binary.clone();
            async move {
                let session = ssh::SshSession::connect(vm_defaults::GUEST_USER, stratum_shared::constants::ports::VM_SSH)?;
                session.upload(&local_binary, vm_defaults::GUEST_BINARY_PATH)?;
                session.exec(&format!("chmod +x {}", vm_defaults::GUEST_BINARY_PATH))?;
                Ok(())
            }
        })
        .await
    }

    /// Forward `command` to the in-guest runtime over a short-lived SSH
    /// session (spec §4.8 "Lifecycle proxying", "SSH channel policy": one
    /// session per operation, retried up to three times with linear backoff).
    pub async fn proxy(&self, command: &str) -> StratumResult<String> {
        if self.status() != VmStatus::Ready {
            return Err(StratumError::system("vm.proxy", "VM is not ready"));
        }
        let port = self.instance.as_ref().map(|i| i.ssh_port).unwrap_or(stratum_shared::constants::ports::VM_SSH);
        let command = command.to_string();
        retry_transient("vm.proxy", vm_defaults::SSH_RETRY_ATTEMPTS, Duration::from_millis(200), move || {
            let command = command.clone();
            async move {
                let session = ssh::SshSession::connect(vm_defaults::GUEST_USER, port)?;
                session.exec(&command)
            }
        })
        .await
    }

    pub fn stop(&mut self) -> StratumResult<()> {
        if let Some(mut child) = self.child.take() {
            child.terminate()?;
        }
        if let Some(instance) = &mut self.instance {
            instance.status = VmStatus::Stopped;
        }
        Ok(())
    }
}

/// Fetch or generate a minimal Linux kernel and initramfs the first time the
/// VM workspace is used (spec §4.8 step 1). Real kernel/initramfs artifacts
/// are environment-specific build outputs; this runtime expects them staged
/// at `STRATUM_VM_KERNEL`/`STRATUM_VM_INITRAMFS` or already present in the
/// workspace, and fails fast with a clear `SYSTEM` error otherwise rather
/// than silently booting a non-functional guest.
fn ensure_boot_artifacts(kernel: &std::path::Path, initramfs: &std::path::Path) -> StratumResult<()> {
    for (path, env_var, label) in [
        (kernel, "STRATUM_VM_KERNEL", "kernel"),
        (initramfs, "STRATUM_VM_INITRAMFS", "initramfs"),
    ] {
        if path.exists() {
            continue;
        }
        if let Ok(source) = std::env::var(env_var) {
            std::fs::copy(&source, path).map_err(|e| StratumError::io("vm.boot_artifacts", format!("failed to stage {label} from {source}")).with_source(e))?;
        } else {
            return Err(StratumError::system(
                "vm.boot_artifacts",
                format!("no {label} found at {} and {env_var} is unset", path.display()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_manager_reports_stopped() {
        let ws = VmWorkspace::new(tempfile::tempdir().unwrap().path());
        let manager = VmManager::new(ws);
        assert_eq!(manager.status(), VmStatus::Stopped);
    }
}
