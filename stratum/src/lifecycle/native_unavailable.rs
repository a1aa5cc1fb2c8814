//! Stand-in for [`super::native`] on non-Linux hosts, where the Namespace
//! Isolator is absent (spec §4.3: "on non-Linux hosts this component is
//! absent; the caller must route through the VM Provider"). Every function
//! has the same signature as its Linux counterpart so `LifecycleEngine`
//! never needs to `cfg`-gate its own match arms — `ExecutionMode::Native`
//! is simply unreachable here at runtime (`ExecutionMode::detect` never
//! selects it off-Linux), but a forced override via `STRATUM_VM_MODE=off`
//! should fail loudly rather than silently miscompile.

use crate::error::{StratumError, StratumResult};
use crate::images::ImageStore;
use crate::model::Container;
use crate::network::NetworkManager;
use std::time::Duration;

fn unavailable(operation: &str) -> StratumError {
    StratumError::permission(operation, "the native execution path requires Linux; use VM mode on this host")
}

pub fn prepare_rootfs(_images: &ImageStore, _container: &Container) -> StratumResult<()> {
    Err(unavailable("lifecycle.prepare_rootfs"))
}

pub fn start(_network: &NetworkManager, _container: &Container) -> StratumResult<u32> {
    Err(unavailable("lifecycle.start"))
}

pub fn stop(_pid: u32, _grace: Duration) -> StratumResult<()> {
    Err(unavailable("lifecycle.stop"))
}

pub fn kill(_pid: u32, _signal: Option<i32>) -> StratumResult<()> {
    Err(unavailable("lifecycle.kill"))
}

pub fn wait_exit(_pid: u32) -> StratumResult<i32> {
    Err(unavailable("lifecycle.wait"))
}

pub fn exec(_pid: u32, _root: &std::path::Path, _command: &[String]) -> StratumResult<String> {
    Err(unavailable("lifecycle.exec"))
}

pub async fn teardown(_images: &ImageStore, _network: &NetworkManager, _container: &Container, _force: bool) -> StratumResult<()> {
    Err(unavailable("lifecycle.remove"))
}
