//! Runtime-wide configuration: environment variables (spec §6) folded into
//! a builder struct, the way the teacher's `runtime/options.rs` folds
//! `BOXLITE_HOME` into `BoxliteOptions`.

use std::path::PathBuf;
use std::time::Duration;
use stratum_shared::constants::{env, net_defaults, ports, timeouts};

/// Whether the Lifecycle Engine dispatches to the native Linux path or
/// forwards operations into a VM guest (spec §4.7, §9 "Platform dispatch").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    Native,
    Vm,
}

impl ExecutionMode {
    /// Host detection, the `STRATUM_VM_MODE` override, then a persisted
    /// `vm enable`/`vm disable` marker under the default state directory,
    /// in that priority order.
    pub fn detect() -> Self {
        let state_dir = std::env::var(env::STATE_DIR).map(PathBuf::from).unwrap_or_else(default_state_dir);
        Self::detect_in(&state_dir)
    }

    /// Same as [`Self::detect`] but against an explicit state directory,
    /// used once `Options::state_dir` has already been resolved.
    pub fn detect_in(state_dir: &std::path::Path) -> Self {
        match std::env::var(env::VM_MODE).ok().as_deref() {
            Some("on") | Some("true") | Some("1") => return ExecutionMode::Vm,
            Some("off") | Some("false") | Some("0") => return ExecutionMode::Native,
            _ => {}
        }
        match std::fs::read_to_string(vm_mode_marker(state_dir)).ok().as_deref().map(str::trim) {
            Some("on") => return ExecutionMode::Vm,
            Some("off") => return ExecutionMode::Native,
            _ => {}
        }
        if cfg!(target_os = "linux") {
            ExecutionMode::Native
        } else {
            ExecutionMode::Vm
        }
    }
}

fn vm_mode_marker(state_dir: &std::path::Path) -> PathBuf {
    state_dir.join("vm_mode")
}

/// Persist (or clear) the `vm enable`/`vm disable` marker (spec §6 `vm
/// enable|disable`), read back by [`ExecutionMode::detect`] on every
/// subsequent invocation that doesn't pass `--vm` or set `STRATUM_VM_MODE`.
pub fn set_persisted_vm_mode(state_dir: &std::path::Path, enabled: bool) -> std::io::Result<()> {
    std::fs::create_dir_all(state_dir)?;
    std::fs::write(vm_mode_marker(state_dir), if enabled { "on" } else { "off" })
}

#[derive(Clone, Debug)]
pub struct Options {
    /// Overridden by `STRATUM_STATE_DIR`; defaults to `/var/lib/<rt>` when
    /// running as root on Linux, else a per-user data directory.
    pub state_dir: PathBuf,
    pub execution_mode: ExecutionMode,
    pub daemon_port: u16,
    pub orchestrator_port: u16,
    pub bridge_cidr: String,
    pub bridge_name: String,
    pub start_timeout: Duration,
    pub stop_grace: Duration,
}

impl Default for Options {
    fn default() -> Self {
        let state_dir = std::env::var(env::STATE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(default_state_dir);

        Self {
            execution_mode: ExecutionMode::detect_in(&state_dir),
            state_dir,
            daemon_port: ports::DAEMON,
            orchestrator_port: ports::ORCHESTRATOR,
            bridge_cidr: net_defaults::BRIDGE_CIDR.to_string(),
            bridge_name: net_defaults::BRIDGE_NAME.to_string(),
            start_timeout: Duration::from_secs(timeouts::START_SECS),
            stop_grace: Duration::from_secs(timeouts::STOP_GRACE_SECS),
        }
    }
}

fn default_state_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let is_root = unsafe { libc::geteuid() } == 0;
        if is_root {
            return PathBuf::from(format!("/var/lib/{}", stratum_shared::constants::RUNTIME_NAME));
        }
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(stratum_shared::constants::RUNTIME_NAME)
}

impl Options {
    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_dir_is_under_runtime_name() {
        let opts = Options::default();
        assert!(opts.state_dir.to_string_lossy().contains("stratum"));
    }

    #[test]
    fn builder_methods_override_fields() {
        let opts = Options::default()
            .with_state_dir("/tmp/custom")
            .with_execution_mode(ExecutionMode::Vm);
        assert_eq!(opts.state_dir, PathBuf::from("/tmp/custom"));
        assert_eq!(opts.execution_mode, ExecutionMode::Vm);
    }
}
