//! In-guest runtime agent (spec §4.8 "Lifecycle proxying").
//!
//! A thin CLI over the same [`stratum::LifecycleEngine`] the host links,
//! forced into [`stratum::ExecutionMode::Native`] since the guest is
//! always a disposable, single-tenant Linux VM. The host's VM Provider
//! deploys this binary to `GUEST_BINARY_PATH` and invokes it over SSH for
//! every lifecycle operation proxied into VM mode; its stdout is the wire
//! format (JSON for structured results, raw text for `logs`/`exec`).

#[cfg(not(target_os = "linux"))]
compile_error!("the stratum guest agent is Linux-only; build it with a Linux target");

use clap::{Parser, Subcommand};
use stratum::{ExecutionMode, LifecycleEngine, Options};

#[derive(Parser, Debug)]
#[command(name = "stratum-guest", about = "In-guest stratum runtime agent")]
struct GuestArgs {
    #[command(subcommand)]
    command: GuestCommand,
}

#[derive(Subcommand, Debug)]
enum GuestCommand {
    Create {
        #[arg(long)]
        id: String,
        #[arg(long)]
        spec: String,
    },
    Start {
        id: String,
    },
    Stop {
        id: String,
        #[arg(long = "time")]
        timeout_secs: Option<u64>,
    },
    Kill {
        id: String,
        #[arg(long = "signal")]
        signal: Option<i32>,
    },
    Remove {
        id: String,
        #[arg(long)]
        force: bool,
    },
    Exec {
        id: String,
        #[arg(trailing_var_arg = true, num_args = 0..)]
        command: Vec<String>,
    },
    Logs {
        id: String,
    },
    Wait {
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let _logging_guard = stratum::logging::init();

    let args = GuestArgs::parse();
    // The guest is always a disposable, single-tenant Linux VM, so it uses
    // the same state root a rootful Linux install would regardless of the
    // SSH account's privilege level (spec §6 layout note).
    let state_dir = format!("/var/lib/{}", stratum_shared::constants::RUNTIME_NAME);
    let options = Options::default().with_state_dir(state_dir).with_execution_mode(ExecutionMode::Native);
    let engine = match LifecycleEngine::new(&options) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(e.kind().exit_code());
        }
    };

    if let Err(e) = run(&engine, args.command).await {
        eprintln!("{e}");
        std::process::exit(e.kind().exit_code());
    }
}

async fn run(engine: &LifecycleEngine, command: GuestCommand) -> stratum::StratumResult<()> {
    match command {
        GuestCommand::Create { id: _, spec } => {
            // The host's proposed id is informational only; the guest's
            // own State Store assigns the authoritative identifier, which
            // the host adopts from this response (spec §4.8: "container
            // identifiers are shared between host and guest").
            let spec: stratum::model::ContainerSpec = serde_json::from_str(&spec)
                .map_err(|e| stratum::StratumError::validation("guest.create", "malformed container spec").with_source(e))?;
            print_json(&engine.create(spec).await?)
        }
        GuestCommand::Start { id } => print_json(&engine.start(&id).await?),
        GuestCommand::Stop { id, timeout_secs } => {
            print_json(&engine.stop(&id, timeout_secs.map(std::time::Duration::from_secs)).await?)
        }
        GuestCommand::Kill { id, signal } => print_json(&engine.kill(&id, signal).await?),
        GuestCommand::Remove { id, force } => {
            engine.remove(&id, force).await?;
            println!("{{}}");
            Ok(())
        }
        GuestCommand::Exec { id, command } => {
            let output = engine.exec(&id, &command).await?;
            print!("{output}");
            Ok(())
        }
        GuestCommand::Logs { id } => {
            let logs = engine.logs(&id).await?;
            print!("{logs}");
            Ok(())
        }
        GuestCommand::Wait { id } => print_json(&engine.wait(&id).await?),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> stratum::StratumResult<()> {
    let json = serde_json::to_string(value)
        .map_err(|e| stratum::StratumError::system("guest.print_json", "failed to serialize response").with_source(e))?;
    println!("{json}");
    Ok(())
}
