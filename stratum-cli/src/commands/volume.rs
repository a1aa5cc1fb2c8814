use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct VolumeArgs {
    #[command(subcommand)]
    pub command: VolumeCommand,
}

#[derive(Subcommand, Debug)]
pub enum VolumeCommand {
    /// Create a named volume
    Create { name: String },
    /// List volumes
    Ls,
    /// Remove a volume (fails while any container still references it)
    Rm { name: String },
    /// Print a volume's full record
    Inspect { name: String },
    /// Remove every volume with no remaining references
    Prune,
}

pub async fn execute(args: VolumeArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let engine = global.create_engine()?;
    let volumes = engine.volumes();

    match args.command {
        VolumeCommand::Create { name } => {
            volumes.create(&name)?;
            println!("{name}");
        }
        VolumeCommand::Ls => {
            println!("{:<20}{:<10}{}", "NAME", "DRIVER", "REFERENCED BY");
            for volume in volumes.list()? {
                println!("{:<20}{:<10}{}", volume.name, volume.driver, volume.referenced_by.len());
            }
        }
        VolumeCommand::Rm { name } => {
            volumes.remove(&name)?;
            println!("{name}");
        }
        VolumeCommand::Inspect { name } => {
            let volume = volumes.get(&name)?;
            println!("{}", serde_json::to_string_pretty(&volume)?);
        }
        VolumeCommand::Prune => {
            for name in volumes.prune()? {
                println!("{name}");
            }
        }
    }
    Ok(())
}
