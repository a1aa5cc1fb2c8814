use clap::Args;

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Name or ID of the container(s) to start
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,
}

pub async fn execute(args: StartArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let engine = global.create_engine()?;

    let mut errors = Vec::new();
    let mut success_count = 0;

    for target in args.targets {
        match engine.start(&target).await {
            Ok(container) => {
                println!("{}", container.id);
                success_count += 1;
            }
            Err(e) => {
                eprintln!("Error starting container '{}': {}", target, e);
                errors.push(format!("{}: {}", target, e));
            }
        }
    }

    if !errors.is_empty() {
        let error_summary = if success_count > 0 {
            format!("Failed to start {} of {} container(s)", errors.len(), errors.len() + success_count)
        } else {
            format!("Failed to start all {} container(s)", errors.len())
        };
        anyhow::bail!("{}\nErrors:\n  {}", error_summary, errors.join("\n  "));
    }
    Ok(())
}
