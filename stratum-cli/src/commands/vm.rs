use clap::{Args, Subcommand};
use stratum::config;
use stratum::model::ProviderKind;
use stratum::vm::{select_provider, VmManager};
use stratum_shared::constants::vm_defaults;
use stratum_shared::layout::{StateLayout, VmWorkspace};

#[derive(Args, Debug)]
pub struct VmArgs {
    #[command(subcommand)]
    pub command: VmCommand,
}

#[derive(Subcommand, Debug)]
pub enum VmCommand {
    /// Boot the guest VM if it isn't already running
    Start,
    /// Gracefully shut down the guest VM
    Stop,
    /// Print the guest VM's current status
    Status,
    /// Prepare the VM workspace and boot the guest for the first time
    Init,
    /// Make VM mode the default execution path on this host
    Enable,
    /// Make native execution the default on this host (Linux only)
    Disable,
    /// List supported VM providers and mark the one this host would select
    ListProviders,
}

fn manager(global: &crate::cli::GlobalFlags) -> VmManager {
    let options = global.options();
    let layout = StateLayout::new(&options.state_dir);
    VmManager::new(VmWorkspace::new(layout.vm_dir("default")))
}

pub async fn execute(args: VmArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    match args.command {
        VmCommand::Start | VmCommand::Init => {
            let mut manager = manager(global);
            manager.start(vm_defaults::VCPUS, vm_defaults::MEMORY_MIB, vm_defaults::DISK_GIB).await?;
            println!("{}", manager.status());
        }
        VmCommand::Stop => {
            let mut manager = manager(global);
            manager.stop()?;
            println!("{}", manager.status());
        }
        VmCommand::Status => {
            let manager = manager(global);
            println!("{}", manager.status());
        }
        VmCommand::Enable => {
            config::set_persisted_vm_mode(&global.options().state_dir, true)?;
            println!("VM mode enabled by default on this host");
        }
        VmCommand::Disable => {
            config::set_persisted_vm_mode(&global.options().state_dir, false)?;
            println!("Native execution enabled by default on this host");
        }
        VmCommand::ListProviders => {
            let selected = select_provider();
            for provider in [
                ProviderKind::QemuHvf,
                ProviderKind::QemuKvm,
                ProviderKind::HyperV,
                ProviderKind::VirtualBox,
                ProviderKind::Wsl2,
                ProviderKind::VirtualizationFramework,
                ProviderKind::QemuTcg,
            ] {
                let marker = if provider == selected { "*" } else { " " };
                println!("{marker} {provider}");
            }
        }
    }
    Ok(())
}
