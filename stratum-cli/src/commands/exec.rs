use clap::Args;

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Allocate a pseudo-terminal for the new process
    #[arg(short, long)]
    pub tty: bool,

    /// Name or ID of the running container
    pub target: String,

    /// Command and arguments to run inside the container
    #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
    pub command: Vec<String>,
}

pub async fn execute(args: ExecArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let engine = global.create_engine()?;
    let output = engine.exec(&args.target, &args.command).await?;
    print!("{output}");
    Ok(())
}
