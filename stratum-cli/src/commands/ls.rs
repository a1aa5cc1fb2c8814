use clap::Args;

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Include stopped, exited, and removed containers
    #[arg(short, long)]
    pub all: bool,
}

pub async fn execute(args: LsArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let engine = global.create_engine()?;
    let containers = engine.list(args.all)?;

    println!("{:<14}{:<16}{:<24}{:<10}{}", "ID", "NAME", "IMAGE", "STATUS", "COMMAND");
    for c in containers {
        println!(
            "{:<14}{:<16}{:<24}{:<10}{}",
            c.short_id(),
            c.name.as_deref().unwrap_or("-"),
            c.image,
            c.status,
            c.command.join(" "),
        );
    }
    Ok(())
}
