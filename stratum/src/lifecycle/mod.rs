//! The Lifecycle Engine (spec §4.7): create/start/stop/kill/remove/exec/
//! list/logs, dispatched to the native Linux path or proxied into the VM
//! guest depending on [`crate::config::ExecutionMode`] (spec §9 "Platform
//! dispatch").
//!
//! Concurrency matches spec §5: one lock per container id serializes
//! operations against that container, while distinct containers proceed
//! independently. The VM instance itself is a second, coarser lock since
//! only one guest boots per host.

mod locks;

#[cfg(target_os = "linux")]
mod native;
#[cfg(not(target_os = "linux"))]
#[path = "native_unavailable.rs"]
mod native;

use crate::config::{ExecutionMode, Options};
use crate::error::{StratumError, StratumResult};
use crate::images::ImageStore;
use crate::model::{generate_container_id, Container, ContainerSpec, ContainerStatus};
use crate::network::NetworkManager;
use crate::state::StateStore;
use crate::vm::VmManager;
use crate::volumes::VolumeStore;
use std::time::Duration;
use stratum_shared::constants::vm_defaults;
use stratum_shared::layout::{StateLayout, VmWorkspace};
use tokio::sync::Mutex;

use locks::ContainerLocks;

pub struct LifecycleEngine {
    state: StateStore,
    images: ImageStore,
    volumes: VolumeStore,
    network: NetworkManager,
    mode: ExecutionMode,
    vm: Option<Mutex<VmManager>>,
    locks: ContainerLocks,
    stop_grace: Duration,
}

impl LifecycleEngine {
    pub fn new(options: &Options) -> StratumResult<Self> {
        let layout = StateLayout::new(&options.state_dir);
        let state = StateStore::new(layout.clone())?;
        let images = ImageStore::new(layout.clone())?;
        let volumes = VolumeStore::new(layout.clone());
        let network = NetworkManager::new(options.bridge_name.clone(), &options.bridge_cidr)?;

        let vm = match options.execution_mode {
            ExecutionMode::Native => None,
            ExecutionMode::Vm => Some(Mutex::new(VmManager::new(VmWorkspace::new(layout.vm_dir("default"))))),
        };

        Ok(Self {
            state,
            images,
            volumes,
            network,
            mode: options.execution_mode,
            vm,
            locks: ContainerLocks::new(),
            stop_grace: options.stop_grace,
        })
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn volumes(&self) -> &VolumeStore {
        &self.volumes
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Boot the guest VM if this engine runs in VM mode and it isn't
    /// already up (spec §4.8). A no-op on the native path.
    async fn ensure_vm_ready(&self) -> StratumResult<()> {
        let Some(vm) = &self.vm else { return Ok(()) };
        let mut vm = vm.lock().await;
        if vm.status() != crate::model::VmStatus::Ready {
            vm.start(vm_defaults::VCPUS, vm_defaults::MEMORY_MIB, vm_defaults::DISK_GIB).await?;
        }
        Ok(())
    }

    /// Forward a guest CLI invocation and parse its JSON stdout as `T`
    /// (spec §4.8 "Lifecycle proxying"). The guest binary is a thin wrapper
    /// around the same [`LifecycleEngine`] running natively inside the VM
    /// (`stratum-guest`), so the wire format is exactly this crate's own
    /// serde types.
    async fn proxy_json<T: serde::de::DeserializeOwned>(&self, args: &str) -> StratumResult<T> {
        let vm = self.vm.as_ref().ok_or_else(|| StratumError::system("lifecycle.proxy", "engine is not running in VM mode"))?;
        let output = {
            let vm = vm.lock().await;
            vm.proxy(&format!("{} {args}", vm_defaults::GUEST_BINARY_PATH)).await?
        };
        serde_json::from_str(&output).map_err(|e| StratumError::system("lifecycle.proxy", "guest returned malformed JSON").with_source(e))
    }

    /// `create` (spec §4.7): validate, resolve the image, allocate an
    /// identifier, materialize the rootfs (native) or delegate to the guest
    /// (VM), and persist the new `Created` record.
    pub async fn create(&self, spec: ContainerSpec) -> StratumResult<Container> {
        spec.validate().map_err(|msg| StratumError::validation("lifecycle.create", msg))?;
        if let Some(name) = &spec.name {
            if self.state.name_in_use(name)? {
                return Err(StratumError::conflict("lifecycle.create", format!("name '{name}' is already in use")));
            }
        }

        let digest = self.images.resolve(&spec.image)?;
        let id = generate_container_id();
        let _guard = self.locks.acquire(&id).await;

        let mut container = match self.mode {
            ExecutionMode::Native => {
                let rootfs_path = self.state.layout().container_rootfs(&id);
                let container = Container::new(id.clone(), &spec, rootfs_path);
                native::prepare_rootfs(&self.images, &container)?;
                container
            }
            ExecutionMode::Vm => {
                self.ensure_vm_ready().await?;
                let spec_json = serde_json::to_string(&spec).map_err(|e| StratumError::system("lifecycle.create", "failed to serialize spec").with_source(e))?;
                let encoded = shell_quote(&spec_json);
                let mut container: Container = self.proxy_json(&format!("create --id {id} --spec {encoded}")).await?;
                container.vm_name = Some("default".to_string());
                container
            }
        };

        container.image = digest;
        let volumes_dir = self.state.layout().volumes_dir();
        for binding in &spec.volumes {
            if let Some(name) = volume_name_reference(binding, &volumes_dir) {
                let _ = self.volumes.add_reference(&name, &container.id);
            }
        }

        self.state.save(&container)?;
        container.status = ContainerStatus::Created;
        Ok(container)
    }

    /// `start` (spec §4.7).
    pub async fn start(&self, reference: &str) -> StratumResult<Container> {
        let id = self.state.resolve(reference)?;
        let _guard = self.locks.acquire(&id).await;
        let mut container = self.state.load(&id)?;

        match self.mode {
            ExecutionMode::Native => {
                let pid = native::start(&self.network, &container)?;
                container.pid = Some(pid);
            }
            ExecutionMode::Vm => {
                self.ensure_vm_ready().await?;
                let _: serde_json::Value = self.proxy_json(&format!("start {id}")).await?;
            }
        }

        container.status = ContainerStatus::Running;
        container.started_at = Some(chrono::Utc::now());
        self.state.save(&container)?;
        Ok(container)
    }

    /// `stop` (spec §4.7): graceful SIGTERM, SIGKILL after the grace period.
    /// `timeout` overrides the engine-wide default grace period for this
    /// call only (spec §5 "all timeouts are configurable per invocation").
    /// A no-op on an already-stopped container (spec §8 "stop is idempotent
    /// on already-stopped containers... no signals sent").
    pub async fn stop(&self, reference: &str, timeout: Option<Duration>) -> StratumResult<Container> {
        let id = self.state.resolve(reference)?;
        let _guard = self.locks.acquire(&id).await;
        let mut container = self.state.load(&id)?;

        if container.status.is_terminal() || container.status == ContainerStatus::Stopped {
            return Ok(container);
        }

        match self.mode {
            ExecutionMode::Native => {
                if let Some(pid) = container.pid {
                    native::stop(pid, timeout.unwrap_or(self.stop_grace))?;
                }
            }
            ExecutionMode::Vm => {
                let args = match timeout {
                    Some(t) => format!("stop {id} --time {}", t.as_secs()),
                    None => format!("stop {id}"),
                };
                let _: serde_json::Value = self.proxy_json(&args).await?;
            }
        }

        container.status = ContainerStatus::Stopped;
        self.state.save(&container)?;
        Ok(container)
    }

    /// `kill` (spec §4.7): immediate delivery of `signal`, defaulting to
    /// `SIGKILL` when the caller doesn't name one, no grace period.
    pub async fn kill(&self, reference: &str, signal: Option<i32>) -> StratumResult<Container> {
        let id = self.state.resolve(reference)?;
        let _guard = self.locks.acquire(&id).await;
        let mut container = self.state.load(&id)?;

        match self.mode {
            ExecutionMode::Native => {
                if let Some(pid) = container.pid {
                    native::kill(pid, signal)?;
                }
            }
            ExecutionMode::Vm => {
                let args = match signal {
                    Some(sig) => format!("kill {id} --signal {sig}"),
                    None => format!("kill {id}"),
                };
                let _: serde_json::Value = self.proxy_json(&args).await?;
            }
        }

        container.status = ContainerStatus::Stopped;
        self.state.save(&container)?;
        Ok(container)
    }

    /// `remove` (spec §4.7): refuses a still-running container unless
    /// `force` is set, then tears down networking/cgroup/rootfs and drops
    /// the state record and volume references.
    pub async fn remove(&self, reference: &str, force: bool) -> StratumResult<()> {
        let id = self.state.resolve(reference)?;
        let _guard = self.locks.acquire(&id).await;
        let container = self.state.load(&id)?;

        if container.status == ContainerStatus::Running && !force {
            return Err(StratumError::conflict("lifecycle.remove", format!("container {id} is running; stop it first or pass force")));
        }

        // Every cleanup step below runs regardless of an earlier step's
        // failure (spec §4.7 "All cleanup steps run even if earlier ones
        // fail; the first error is retained and returned after
        // completion"); the state record and volume references are dropped
        // even if teardown reported an error, so a half-torn-down container
        // never lingers in the State Store.
        let mut first_err = match self.mode {
            ExecutionMode::Native => native::teardown(&self.images, &self.network, &container, force).await.err(),
            ExecutionMode::Vm => self.proxy_json::<serde_json::Value>(&format!("remove {id}{}", if force { " --force" } else { "" })).await.err(),
        };

        let volumes_dir = self.state.layout().volumes_dir();
        for binding in &container.volumes {
            if let Some(name) = volume_name_reference(binding, &volumes_dir) {
                let _ = self.volumes.remove_reference(&name, &id);
            }
        }

        if let Err(e) = self.state.delete(&id) {
            first_err.get_or_insert(e);
        }
        self.locks.forget(&id);

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// `exec` (spec §4.7): run an additional command inside a running
    /// container's namespaces and return its captured output.
    pub async fn exec(&self, reference: &str, command: &[String]) -> StratumResult<String> {
        let id = self.state.resolve(reference)?;
        let _guard = self.locks.acquire(&id).await;
        let container = self.state.load(&id)?;

        if container.status != ContainerStatus::Running {
            return Err(StratumError::conflict("lifecycle.exec", format!("container {id} is not running")));
        }

        match self.mode {
            ExecutionMode::Native => {
                let pid = container.pid.ok_or_else(|| StratumError::system("lifecycle.exec", "running container has no recorded pid"))?;
                native::exec(pid, &container.rootfs_path, command)
            }
            ExecutionMode::Vm => {
                let joined = command.join(" ");
                self.proxy_json(&format!("exec {id} -- {joined}")).await
            }
        }
    }

    /// Block until a running container's initial process exits, record the
    /// exit code, and transition its status to `exited` (spec §4.7 "Exit
    /// accounting"). Used by `run` in non-detached mode, which "proxies
    /// standard output/error and waits" per spec §4.7 `start`.
    pub async fn wait(&self, reference: &str) -> StratumResult<Container> {
        let id = self.state.resolve(reference)?;
        let mut container = self.state.load(&id)?;

        let exit_code = match self.mode {
            ExecutionMode::Native => {
                let pid = container.pid.ok_or_else(|| StratumError::system("lifecycle.wait", "container has no recorded pid"))?;
                native::wait_exit(pid)?
            }
            ExecutionMode::Vm => {
                let reply: serde_json::Value = self.proxy_json(&format!("wait {id}")).await?;
                reply.get("exit_code").and_then(|v| v.as_i64()).unwrap_or(0) as i32
            }
        };

        let _guard = self.locks.acquire(&id).await;
        container.status = ContainerStatus::Exited;
        container.exit_code = Some(exit_code);
        self.state.save(&container)?;
        Ok(container)
    }

    /// `list` (spec §4.7); `all` includes terminal (`exited`/`removed`)
    /// containers.
    pub fn list(&self, all: bool) -> StratumResult<Vec<Container>> {
        let containers = self.state.list()?;
        if all {
            Ok(containers)
        } else {
            Ok(containers.into_iter().filter(|c| !c.status.is_terminal()).collect())
        }
    }

    /// `logs` (spec §4.7): the captured stdout/stderr of the container's
    /// entry command, concatenated in that order.
    pub async fn logs(&self, reference: &str) -> StratumResult<String> {
        let id = self.state.resolve(reference)?;
        let container = self.state.load(&id)?;

        match self.mode {
            ExecutionMode::Native => {
                let log_dir = self.state.layout().container_dir(&id).join("logs");
                let mut combined = String::new();
                for name in ["stdout.log", "stderr.log"] {
                    if let Ok(contents) = std::fs::read_to_string(log_dir.join(name)) {
                        combined.push_str(&contents);
                    }
                }
                Ok(combined)
            }
            ExecutionMode::Vm => {
                let vm = self.vm.as_ref().ok_or_else(|| StratumError::system("lifecycle.logs", "engine is not running in VM mode"))?;
                let vm = vm.lock().await;
                vm.proxy(&format!("{} logs {}", vm_defaults::GUEST_BINARY_PATH, container.id)).await
            }
        }
    }
}

/// A volume binding whose host path is actually `<volumes_dir>/<name>` is
/// treated as a named-volume reference for bookkeeping purposes; anything
/// else is a bare host-path bind mount the Volume Store doesn't track.
fn volume_name_reference(binding: &crate::model::VolumeBinding, volumes_dir: &std::path::Path) -> Option<String> {
    let parent = binding.host_path.parent()?;
    if parent != volumes_dir {
        return None;
    }
    binding.host_path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::model::{NetworkMode, ResourceLimits};

    fn engine() -> (tempfile::TempDir, LifecycleEngine) {
        let dir = tempfile::tempdir().unwrap();
        let options = Options::default().with_state_dir(dir.path()).with_execution_mode(ExecutionMode::Native);
        let engine = LifecycleEngine::new(&options).unwrap();
        (dir, engine)
    }

    fn spec() -> ContainerSpec {
        ContainerSpec {
            name: Some("web".into()),
            image: "sha256:deadbeef".into(),
            command: vec!["/bin/true".into()],
            env: vec![],
            working_dir: None,
            limits: ResourceLimits::default(),
            volumes: vec![],
            ports: vec![],
            network_mode: NetworkMode::Host,
            tty: false,
            interactive: false,
        }
    }

    #[tokio::test]
    async fn create_rejects_an_unresolvable_image_reference() {
        let (_dir, engine) = engine();
        let err = engine.create(spec()).await.unwrap_err();
        assert_eq!(err.kind(), stratum_shared::ErrorKind::NotFound);
    }

    #[test]
    fn shell_quote_escapes_embedded_single_quotes() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }
}
