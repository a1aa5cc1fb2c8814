use clap::Args;

#[derive(Args, Debug)]
pub struct KillArgs {
    /// Signal to send, by name (TERM, KILL, ...) or number
    #[arg(short, long = "signal", value_name = "S")]
    pub signal: Option<String>,

    /// Name or ID of the container(s) to kill
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,
}

pub async fn execute(args: KillArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let engine = global.create_engine()?;

    let signal = args.signal.map(|s| stratum::util::parse_signal(&s)).transpose()?;

    let mut errors = Vec::new();
    let mut success_count = 0;

    for target in args.targets {
        match engine.kill(&target, signal).await {
            Ok(container) => {
                println!("{}", container.id);
                success_count += 1;
            }
            Err(e) => {
                eprintln!("Error killing container '{}': {}", target, e);
                errors.push(format!("{}: {}", target, e));
            }
        }
    }

    if !errors.is_empty() {
        let error_summary = if success_count > 0 {
            format!("Failed to kill {} of {} container(s)", errors.len(), errors.len() + success_count)
        } else {
            format!("Failed to kill all {} container(s)", errors.len())
        };
        anyhow::bail!("{}\nErrors:\n  {}", error_summary, errors.join("\n  "));
    }
    Ok(())
}
