use clap::Args;
use std::path::PathBuf;
use stratum_shared::transport::Transport;

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Port to bind the orchestrator-facing HTTP surface to
    #[arg(long)]
    pub port: Option<u16>,
    /// Bind a Unix domain socket instead, for a rootless per-user install
    #[arg(long, conflicts_with = "port")]
    pub socket: Option<PathBuf>,
}

pub async fn execute(args: DaemonArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.options();
    let engine = stratum::LifecycleEngine::new(&options)?;
    let app = stratum::api::router(engine);

    let transport = match args.socket {
        Some(path) => Transport::unix(path),
        None => Transport::tcp(args.port.unwrap_or(options.daemon_port)),
    };
    super::serve_until_interrupt(transport, app).await
}
