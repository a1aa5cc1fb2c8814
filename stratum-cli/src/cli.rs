//! Global flags and the shared `LifecycleEngine` construction every
//! subcommand starts from, mirroring the teacher's `GlobalFlags::create_runtime`.

use clap::Parser;
use std::path::PathBuf;
use stratum::config::{ExecutionMode, Options};
use stratum::LifecycleEngine;

#[derive(Parser, Debug, Clone)]
pub struct GlobalFlags {
    /// Override the runtime state directory (defaults to `STRATUM_STATE_DIR`
    /// or the platform default).
    #[arg(long, global = true, env = "STRATUM_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Force VM execution mode even on Linux.
    #[arg(long, global = true)]
    pub vm: bool,
}

impl GlobalFlags {
    pub fn options(&self) -> Options {
        let mut options = Options::default();
        if let Some(dir) = &self.state_dir {
            options = options.with_state_dir(dir.clone());
        }
        if self.vm {
            options = options.with_execution_mode(ExecutionMode::Vm);
        }
        options
    }

    pub fn create_engine(&self) -> anyhow::Result<LifecycleEngine> {
        Ok(LifecycleEngine::new(&self.options())?)
    }
}
