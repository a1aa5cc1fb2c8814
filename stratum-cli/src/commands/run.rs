use clap::Args;
use stratum::model::{ContainerSpec, NetworkMode, PortMapping, PortProtocol, ResourceLimits, VolumeBinding};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(long)]
    pub name: Option<String>,

    /// Memory limit, e.g. `512m` or a raw byte count
    #[arg(long)]
    pub memory: Option<String>,

    #[arg(long)]
    pub cpus: Option<u64>,

    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    #[arg(long = "volume", value_name = "HOST:GUEST[:ro]")]
    pub volume: Vec<String>,

    #[arg(long = "publish", value_name = "HOST:CONTAINER[/proto]")]
    pub publish: Vec<String>,

    #[arg(long)]
    pub workdir: Option<String>,

    #[arg(long, default_value = "bridge")]
    pub network: String,

    #[arg(short, long)]
    pub detach: bool,

    #[arg(short, long)]
    pub interactive: bool,

    #[arg(short, long)]
    pub tty: bool,

    /// Force VM execution mode for this container
    #[arg(long)]
    pub vm: bool,

    pub image: String,

    #[arg(num_args = 0.., trailing_var_arg = true)]
    pub cmd: Vec<String>,
}

fn parse_env(raw: &str) -> anyhow::Result<(String, String)> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| anyhow::anyhow!("invalid --env '{raw}', expected KEY=VALUE"))
}

fn parse_volume(raw: &str) -> anyhow::Result<VolumeBinding> {
    let mut parts = raw.splitn(3, ':');
    let host = parts.next().ok_or_else(|| anyhow::anyhow!("invalid --volume '{raw}'"))?;
    let guest = parts.next().ok_or_else(|| anyhow::anyhow!("invalid --volume '{raw}', expected HOST:GUEST[:ro]"))?;
    let read_only = matches!(parts.next(), Some("ro"));
    Ok(VolumeBinding {
        host_path: PathBuf::from(host),
        container_path: PathBuf::from(guest),
        read_only,
    })
}

fn parse_publish(raw: &str) -> anyhow::Result<PortMapping> {
    let (ports, proto) = match raw.split_once('/') {
        Some((p, proto)) => (p, proto),
        None => (raw, "tcp"),
    };
    let (host, container) = ports.split_once(':').ok_or_else(|| anyhow::anyhow!("invalid --publish '{raw}', expected HOST:CONTAINER[/proto]"))?;
    let protocol = match proto {
        "tcp" => PortProtocol::Tcp,
        "udp" => PortProtocol::Udp,
        other => anyhow::bail!("unknown protocol '{other}' in --publish '{raw}'"),
    };
    Ok(PortMapping {
        host_port: host.parse().map_err(|_| anyhow::anyhow!("invalid host port in --publish '{raw}'"))?,
        container_port: container.parse().map_err(|_| anyhow::anyhow!("invalid container port in --publish '{raw}'"))?,
        protocol,
    })
}

fn parse_memory(raw: &str) -> anyhow::Result<u64> {
    let raw = raw.trim();
    let (digits, multiplier) = match raw.chars().last() {
        Some('k') | Some('K') => (&raw[..raw.len() - 1], 1024),
        Some('m') | Some('M') => (&raw[..raw.len() - 1], 1024 * 1024),
        Some('g') | Some('G') => (&raw[..raw.len() - 1], 1024 * 1024 * 1024),
        _ => (raw, 1),
    };
    Ok(digits.parse::<u64>().map_err(|_| anyhow::anyhow!("invalid --memory '{raw}'"))? * multiplier)
}

pub async fn execute(args: RunArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let mut global = global.clone();
    global.vm = global.vm || args.vm;
    let engine = global.create_engine()?;

    let env = args.env.iter().map(|e| parse_env(e)).collect::<anyhow::Result<Vec<_>>>()?;
    let volumes = args.volume.iter().map(|v| parse_volume(v)).collect::<anyhow::Result<Vec<_>>>()?;
    let ports = args.publish.iter().map(|p| parse_publish(p)).collect::<anyhow::Result<Vec<_>>>()?;
    let network_mode = NetworkMode::from_str(&args.network).map_err(anyhow::Error::msg)?;
    let limits = ResourceLimits {
        memory_bytes: args.memory.as_deref().map(parse_memory).transpose()?.unwrap_or(0),
        cpu_shares: args.cpus,
        pid_limit: None,
    };

    let spec = ContainerSpec {
        name: args.name,
        image: args.image,
        command: args.cmd,
        env,
        working_dir: args.workdir,
        limits,
        volumes,
        ports,
        network_mode,
        tty: args.tty,
        interactive: args.interactive,
    };

    let container = engine.create(spec).await?;
    let container = engine.start(&container.id).await?;
    println!("{}", container.id);

    if args.detach {
        return Ok(());
    }

    // Non-detached mode proxies the container's exit and forwards runtime-
    // process signals onto it (spec §4.7 "Signal semantics"): a first
    // interrupt becomes a graceful `stop`, a second within the grace period
    // escalates to `kill` immediately.
    let mut wait_fut = Box::pin(engine.wait(&container.id));
    let finished = loop {
        tokio::select! {
            result = &mut wait_fut => break result?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(id = %container.id, "received interrupt, stopping container");
                engine.stop(&container.id, None).await?;
                tokio::select! {
                    result = &mut wait_fut => break result?,
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!(id = %container.id, "received second interrupt, killing container");
                        engine.kill(&container.id, None).await?;
                        break wait_fut.await?;
                    }
                }
            }
        }
    };
    let logs = engine.logs(&finished.id).await?;
    print!("{logs}");

    if let Some(code) = finished.exit_code {
        if code != 0 {
            std::process::exit(code);
        }
    }
    Ok(())
}
