use clap::Args;

#[derive(Args, Debug)]
pub struct StopArgs {
    /// Seconds to wait before escalating to kill
    #[arg(long = "time", value_name = "N")]
    pub timeout: Option<u64>,

    /// Name or ID of the container(s) to stop
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,
}

pub async fn execute(args: StopArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let engine = global.create_engine()?;

    let mut errors = Vec::new();
    let mut success_count = 0;

    let timeout = args.timeout.map(std::time::Duration::from_secs);
    for target in args.targets {
        match engine.stop(&target, timeout).await {
            Ok(container) => {
                println!("{}", container.id);
                success_count += 1;
            }
            Err(e) => {
                eprintln!("Error stopping container '{}': {}", target, e);
                errors.push(format!("{}: {}", target, e));
            }
        }
    }

    if !errors.is_empty() {
        let error_summary = if success_count > 0 {
            format!("Failed to stop {} of {} container(s)", errors.len(), errors.len() + success_count)
        } else {
            format!("Failed to stop all {} container(s)", errors.len())
        };
        anyhow::bail!("{}\nErrors:\n  {}", error_summary, errors.join("\n  "));
    }
    Ok(())
}
