use clap::{Args, Subcommand};
use std::path::PathBuf;
use stratum_shared::transport::Transport;

#[derive(Args, Debug)]
pub struct CriArgs {
    #[command(subcommand)]
    pub command: CriCommand,
}

#[derive(Subcommand, Debug)]
pub enum CriCommand {
    /// Run the orchestrator-facing HTTP surface in the foreground
    Start,
    /// Signal a running orchestrator-facing surface to shut down
    Stop,
}

fn pid_file(state_dir: &std::path::Path) -> PathBuf {
    state_dir.join("cri.pid")
}

pub async fn execute(args: CriArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.options();

    match args.command {
        CriCommand::Start => {
            std::fs::create_dir_all(&options.state_dir)?;
            std::fs::write(pid_file(&options.state_dir), std::process::id().to_string())?;

            let engine = stratum::LifecycleEngine::new(&options)?;
            let app = stratum::api::router(engine);
            let result = super::serve_until_interrupt(Transport::tcp(options.orchestrator_port), app).await;
            let _ = std::fs::remove_file(pid_file(&options.state_dir));
            result?
        }
        CriCommand::Stop => {
            let path = pid_file(&options.state_dir);
            let pid: u32 = std::fs::read_to_string(&path)
                .map_err(|_| anyhow::anyhow!("no running orchestrator-facing endpoint found at {}", path.display()))?
                .trim()
                .parse()?;
            if !stratum::util::kill_process(pid) {
                anyhow::bail!("failed to signal pid {pid}");
            }
            let _ = std::fs::remove_file(&path);
            println!("stopped (pid {pid})");
        }
    }
    Ok(())
}
