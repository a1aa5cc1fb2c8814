use clap::Args;

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Remove the container even if it is running
    #[arg(short, long)]
    pub force: bool,

    /// Remove every container
    #[arg(long = "all")]
    pub all: bool,

    /// Name or ID of the container(s) to remove
    #[arg(num_args = 0..)]
    pub targets: Vec<String>,
}

pub async fn execute(args: RmArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let engine = global.create_engine()?;

    let targets = if args.all {
        engine.list(true)?.into_iter().map(|c| c.id).collect()
    } else {
        if args.targets.is_empty() {
            anyhow::bail!("no containers specified (pass a name/ID or --all)");
        }
        args.targets
    };

    let mut active_error = false;
    for target in targets {
        if let Err(e) = engine.remove(&target, args.force).await {
            eprintln!("Error removing container '{}': {}", target, e);
            active_error = true;
        } else {
            println!("{}", target);
        }
    }

    if active_error {
        anyhow::bail!("Some containers could not be removed");
    }
    Ok(())
}
