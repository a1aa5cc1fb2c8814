pub mod cri;
pub mod daemon;
pub mod exec;
pub mod image;
pub mod kill;
pub mod logs;
pub mod ls;
pub mod rm;
pub mod run;
pub mod start;
pub mod stop;
pub mod vm;
pub mod volume;

use stratum_shared::transport::Transport;

/// Print `[KIND] operation: message (caused by: ...)` the way spec §7
/// prescribes and return the exit code to terminate the process with.
pub fn report_error(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<stratum::StratumError>() {
        eprintln!("{e}");
        e.kind().exit_code()
    } else {
        eprintln!("Error: {err}");
        1
    }
}

/// Bind the Runtime Endpoint's router to whichever [`Transport`] was
/// requested and serve it until `ctrl_c`. Shared between `daemon` and `cri`,
/// since both expose the same HTTP surface on different default ports.
pub async fn serve_until_interrupt(transport: Transport, app: axum::Router) -> anyhow::Result<()> {
    tracing::info!(transport = %transport.to_uri(), "runtime endpoint listening");
    match transport {
        Transport::Tcp { port } => {
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
            tokio::select! {
                result = axum::serve(listener, app) => result.map_err(anyhow::Error::from)?,
                _ = tokio::signal::ctrl_c() => tracing::info!("received interrupt, shutting down"),
            }
        }
        Transport::Unix { socket_path } => {
            let _ = std::fs::remove_file(&socket_path);
            if let Some(parent) = socket_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let listener = tokio::net::UnixListener::bind(&socket_path)?;
            let result = tokio::select! {
                result = axum::serve(listener, app) => result.map_err(anyhow::Error::from),
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received interrupt, shutting down");
                    Ok(())
                }
            };
            let _ = std::fs::remove_file(&socket_path);
            result?
        }
    }
    Ok(())
}
