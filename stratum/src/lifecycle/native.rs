//! Native Linux execution path (spec §9 "Platform dispatch": native on
//! Linux, VM-proxied elsewhere). Wires the Namespace Isolator, Resource
//! Controller, Rootfs Builder, and Network Manager together around a single
//! container's lifecycle.

use crate::cgroup::Cgroup;
use crate::error::{StratumError, StratumResult};
use crate::images::ImageStore;
use crate::isolation::{self, IdentityMapping, Namespace, NamespaceMask, SpawnConfig};
use crate::model::{Container, NetworkMode};
use crate::network::NetworkManager;
use crate::rootfs::RootfsBuilder;
use crate::util::{is_process_alive, kill_process};
use std::time::{Duration, Instant};

/// Build the container's rootfs (spec §4.5) ahead of `start`. Split out of
/// `start` because `create` is expected to leave a container in `Created`
/// state with its filesystem already materialized (spec §4.7).
pub fn prepare_rootfs(images: &ImageStore, container: &Container) -> StratumResult<()> {
    RootfsBuilder::new(images).build(&container.rootfs_path, &container.image, &container.volumes)
}

/// Namespace mask applied to every native container: PID/mount/IPC/UTS
/// isolation is unconditional, network isolation only when the spec
/// requests anything other than host networking (spec §4.3, §4.6).
fn namespace_mask(network_mode: NetworkMode) -> NamespaceMask {
    let mut mask = NamespaceMask::new();
    mask.insert(Namespace::Process);
    mask.insert(Namespace::Mount);
    mask.insert(Namespace::Ipc);
    mask.insert(Namespace::Uts);
    if network_mode != NetworkMode::Host {
        mask.insert(Namespace::Network);
    }
    mask
}

/// Fork, isolate, and exec the container's entry command; attach the
/// resulting pid to a freshly created cgroup; wire up networking. Returns
/// the host-visible pid (spec §4.7 `start`).
pub fn start(network: &NetworkManager, container: &Container) -> StratumResult<u32> {
    let log_dir = container.rootfs_path.parent().map(|p| p.join("logs")).unwrap_or_default();
    std::fs::create_dir_all(&log_dir).map_err(|e| StratumError::io("lifecycle.start", format!("failed to create {}", log_dir.display())).with_source(e))?;

    let config = SpawnConfig {
        program: container.command.first().cloned().unwrap_or_else(|| "/bin/sh".to_string()),
        args: container.command.iter().skip(1).cloned().collect(),
        env: container.env.clone(),
        root: container.rootfs_path.clone(),
        hostname: Some(container.short_id().to_string()),
        namespaces: namespace_mask(container.network_mode),
        // User-namespace identity mapping is left unset: spec §4.3 treats it
        // as an optional hardening layer the caller opts into, not a
        // default every container pays for.
        uid_mapping: None::<IdentityMapping>,
        gid_mapping: None::<IdentityMapping>,
        stdout_path: Some(log_dir.join("stdout.log")),
        stderr_path: Some(log_dir.join("stderr.log")),
    };

    let pid = isolation::spawn(config)?;
    let pid_u32 = pid.as_raw() as u32;

    let cgroup = Cgroup::create(&container.id, &container.limits)?;
    cgroup.attach(pid_u32)?;

    network.setup(&container.id, pid_u32, container.network_mode, &container.ports)?;

    Ok(pid_u32)
}

/// Request a graceful shutdown: SIGTERM, then SIGKILL after
/// `STOP_GRACE_SECS` (spec §4.7 `stop`).
pub fn stop(pid: u32, grace: Duration) -> StratumResult<()> {
    if !is_process_alive(pid) {
        return Ok(());
    }
    unsafe {
        libc::kill(pid as i32, libc::SIGTERM);
    }
    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !is_process_alive(pid) {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    if kill_process(pid) {
        Ok(())
    } else {
        Err(StratumError::system("lifecycle.stop", format!("failed to stop pid {pid}")))
    }
}

/// Immediate delivery of `signal` (spec §4.7 `kill(ref, signal)`), defaulting
/// to `SIGKILL` when the caller doesn't name one.
pub fn kill(pid: u32, signal: Option<i32>) -> StratumResult<()> {
    let delivered = match signal {
        Some(sig) => crate::util::signal_process(pid, sig),
        None => kill_process(pid),
    };
    if delivered {
        Ok(())
    } else {
        Err(StratumError::system("lifecycle.kill", format!("failed to signal pid {pid}")))
    }
}

/// Block until the container's initial process exits and return its exit
/// code (spec §4.7 "Exit accounting"). A signalled process is reported as
/// 128+signal, matching shell convention.
pub fn wait_exit(pid: u32) -> StratumResult<i32> {
    use nix::sys::wait::{waitpid, WaitStatus};
    use nix::unistd::Pid;

    match waitpid(Pid::from_raw(pid as i32), None) {
        Ok(WaitStatus::Exited(_, code)) => Ok(code),
        Ok(WaitStatus::Signaled(_, signal, _)) => Ok(128 + signal as i32),
        Ok(_) => Ok(0),
        Err(nix::errno::Errno::ECHILD) => Ok(0),
        Err(e) => Err(StratumError::system("lifecycle.wait", format!("waitpid on pid {pid} failed")).with_source(e)),
    }
}

/// Run `command` inside the container's namespaces via `nsenter` (spec
/// §4.7 `exec`). Grounded in the Network Manager's own use of `nsenter -t
/// <pid> -n` to reach into a container's network namespace; `exec` widens
/// the same tool to every namespace the container was started with.
pub fn exec(pid: u32, root: &std::path::Path, command: &[String]) -> StratumResult<String> {
    if command.is_empty() {
        return Err(StratumError::validation("lifecycle.exec", "command must not be empty"));
    }
    let output = std::process::Command::new("nsenter")
        .args(["-t", &pid.to_string(), "-m", "-u", "-i", "-n", "-p", "-r"])
        .arg(root)
        .args(command)
        .output()
        .map_err(|e| StratumError::system("lifecycle.exec", "failed to spawn nsenter").with_source(e))?;

    if !output.status.success() {
        return Err(StratumError::container(
            "lifecycle.exec",
            format!("command exited with status {}: {}", output.status, String::from_utf8_lossy(&output.stderr)),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Tear down networking, destroy the cgroup, and unmount the rootfs (spec
/// §4.7 `remove`). Runs best-effort: later steps still run even if an
/// earlier one fails, and the first error is reported once all have been
/// attempted, so a half-torn-down container never blocks `remove` forever.
/// `force` only relaxes mount teardown to a lazy unmount (spec §4.5 "lazy
/// unmount is permitted for `/proc` and `/sys` under forced removal"); it
/// does not suppress a reported error, which the caller still surfaces
/// after every cleanup step has run (spec §4.7).
pub async fn teardown(images: &ImageStore, network: &NetworkManager, container: &Container, force: bool) -> StratumResult<()> {
    let mut first_err = None;

    if let Err(e) = network.teardown(&container.id, container.network_mode) {
        first_err.get_or_insert(e);
    }

    if let Err(e) = Cgroup::open(&container.id).destroy().await {
        first_err.get_or_insert(e);
    }

    if let Err(e) = RootfsBuilder::new(images).teardown(&container.rootfs_path, &container.volumes, force) {
        first_err.get_or_insert(e);
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_network_mode_excludes_the_network_namespace() {
        let mask = namespace_mask(NetworkMode::Host);
        assert!(!mask.contains(&Namespace::Network));
        assert!(mask.contains(&Namespace::Mount));
    }

    #[test]
    fn bridge_network_mode_includes_the_network_namespace() {
        let mask = namespace_mask(NetworkMode::Bridge);
        assert!(mask.contains(&Namespace::Network));
    }
}
