use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ImageArgs {
    #[command(subcommand)]
    pub command: ImageCommand,
}

#[derive(Subcommand, Debug)]
pub enum ImageCommand {
    /// List known images
    Ls,
    /// Import a `docker save`/OCI-archive directory
    Import { path: PathBuf },
    /// Pull an image from a remote registry
    Pull { reference: String },
    /// Add a tag to an existing image
    Tag { source: String, target: String },
    /// Remove an image
    Rm {
        reference: String,
        #[arg(short, long)]
        force: bool,
    },
    /// Print an image's full record
    Inspect { reference: String },
}

pub async fn execute(args: ImageArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let engine = global.create_engine()?;
    let images = engine.images();

    match args.command {
        ImageCommand::Ls => {
            println!("{:<20}{:<10}{}", "DIGEST", "SIZE", "TAGS");
            for image in images.list()? {
                println!("{:<20}{:<10}{}", &image.digest[..20.min(image.digest.len())], image.size, image.tags.join(","));
            }
        }
        ImageCommand::Import { path } => {
            let image = images.import_archive(&path)?;
            println!("{}", image.digest);
        }
        ImageCommand::Pull { reference } => {
            let image = images.pull(&reference).await?;
            println!("{}", image.digest);
        }
        ImageCommand::Tag { source, target } => {
            images.tag(&source, &target)?;
            println!("{target}");
        }
        ImageCommand::Rm { reference, force } => {
            let digest = match images.resolve(&reference) {
                Ok(d) => d,
                Err(e) if force && e.kind() == stratum_shared::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            let referenced = engine.list(true)?.iter().any(|c| c.image == digest);
            images.remove(&reference, referenced)?;
            println!("{reference}");
        }
        ImageCommand::Inspect { reference } => {
            let image = images.get(&reference)?;
            println!("{}", serde_json::to_string_pretty(&image)?);
        }
    }
    Ok(())
}
