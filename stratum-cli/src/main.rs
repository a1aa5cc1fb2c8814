//! CLI entry point for the `stratum` container runtime.

mod cli;
mod commands;

use clap::{Parser, Subcommand};
use cli::GlobalFlags;

#[derive(Parser, Debug)]
#[command(name = "stratum", version, about = "A cross-platform container runtime")]
struct Cli {
    #[command(flatten)]
    global: GlobalFlags,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create and start a container in one step
    Run(commands::run::RunArgs),
    /// List containers
    Ls(commands::ls::LsArgs),
    /// Start one or more created/stopped containers
    Start(commands::start::StartArgs),
    /// Stop one or more running containers
    Stop(commands::stop::StopArgs),
    /// Send a signal to one or more running containers
    Kill(commands::kill::KillArgs),
    /// Remove one or more containers
    Rm(commands::rm::RmArgs),
    /// Run a command inside a running container
    Exec(commands::exec::ExecArgs),
    /// Print a container's captured output
    Logs(commands::logs::LogsArgs),
    /// Manage images
    Image(commands::image::ImageArgs),
    /// Manage volumes
    Volume(commands::volume::VolumeArgs),
    /// Manage the Universal VM
    Vm(commands::vm::VmArgs),
    /// Run the HTTP runtime endpoint in the foreground
    Daemon(commands::daemon::DaemonArgs),
    /// Run the orchestrator-facing CRI surface
    Cri(commands::cri::CriArgs),
}

#[tokio::main]
async fn main() {
    let _logging_guard = stratum::logging::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &cli.global).await,
        Commands::Ls(args) => commands::ls::execute(args, &cli.global).await,
        Commands::Start(args) => commands::start::execute(args, &cli.global).await,
        Commands::Stop(args) => commands::stop::execute(args, &cli.global).await,
        Commands::Kill(args) => commands::kill::execute(args, &cli.global).await,
        Commands::Rm(args) => commands::rm::execute(args, &cli.global).await,
        Commands::Exec(args) => commands::exec::execute(args, &cli.global).await,
        Commands::Logs(args) => commands::logs::execute(args, &cli.global).await,
        Commands::Image(args) => commands::image::execute(args, &cli.global).await,
        Commands::Volume(args) => commands::volume::execute(args, &cli.global).await,
        Commands::Vm(args) => commands::vm::execute(args, &cli.global).await,
        Commands::Daemon(args) => commands::daemon::execute(args, &cli.global).await,
        Commands::Cri(args) => commands::cri::execute(args, &cli.global).await,
    };

    if let Err(e) = result {
        std::process::exit(commands::report_error(&e));
    }
}
