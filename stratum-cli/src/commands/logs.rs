use clap::Args;

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Keep streaming new output as it is produced
    #[arg(short, long)]
    pub follow: bool,

    /// Name or ID of the container
    pub target: String,
}

pub async fn execute(args: LogsArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let engine = global.create_engine()?;

    if !args.follow {
        let logs = engine.logs(&args.target).await?;
        print!("{logs}");
        return Ok(());
    }

    let mut printed = 0usize;
    loop {
        let logs = engine.logs(&args.target).await?;
        if logs.len() > printed {
            print!("{}", &logs[printed..]);
            printed = logs.len();
        }
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }
}
