//! Short-lived SSH sessions to the guest VM (spec §4.8 "Lifecycle proxying").
//!
//! One [`SshSession`] is opened per operation and dropped immediately after;
//! the VM Provider never holds a persistent connection, so a guest reboot or
//! transient network hiccup cannot wedge the host runtime — only the next
//! proxied call, which `retry_transient` already retries.

use crate::error::{StratumError, StratumResult};
use ssh2::Session;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;
use stratum_shared::constants::vm_defaults;

pub struct SshSession {
    session: Session,
}

impl SshSession {
    /// Open a session to `127.0.0.1:<port>` (the QEMU hostfwd target) and
    /// authenticate as `user` with the fixed guest password (spec §9: the
    /// seed image provisions a password account specifically so automation
    /// never needs to manage a keypair).
    pub fn connect(user: &str, port: u16) -> StratumResult<Self> {
        let addr = format!("127.0.0.1:{port}");
        let stream = TcpStream::connect_timeout(
            &addr.parse().map_err(|e| StratumError::system("vm.ssh", format!("invalid address {addr}")).with_source(std::io::Error::other(format!("{e}"))))?,
            Duration::from_secs(vm_defaults::SSH_CONNECT_TIMEOUT_SECS),
        )
        .map_err(|e| StratumError::network("vm.ssh", format!("failed to connect to {addr}")).with_source(e))?;

        let mut session = Session::new().map_err(|e| StratumError::system("vm.ssh", "failed to create SSH session").with_source(std::io::Error::other(e.to_string())))?;
        session.set_tcp_stream(stream);
        session.handshake().map_err(|e| StratumError::network("vm.ssh", "SSH handshake failed").with_source(std::io::Error::other(e.to_string())))?;
        session
            .userauth_password(user, vm_defaults::GUEST_PASSWORD)
            .map_err(|e| StratumError::network("vm.ssh", "SSH authentication failed").with_source(std::io::Error::other(e.to_string())))?;

        Ok(Self { session })
    }

    /// Run `command` to completion on the guest and return its combined
    /// stdout. A non-zero exit status is reported as a `Container` error
    /// (the guest operation itself failed, as opposed to the SSH transport).
    pub fn exec(&self, command: &str) -> StratumResult<String> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| StratumError::network("vm.ssh", "failed to open channel").with_source(std::io::Error::other(e.to_string())))?;
        channel
            .exec(command)
            .map_err(|e| StratumError::network("vm.ssh", format!("failed to exec '{command}'")).with_source(std::io::Error::other(e.to_string())))?;

        let mut output = String::new();
        channel.read_to_string(&mut output).map_err(|e| StratumError::network("vm.ssh", "failed to read command output").with_source(e))?;
        channel.wait_close().ok();

        let status = channel.exit_status().unwrap_or(-1);
        if status != 0 {
            return Err(StratumError::container("vm.ssh", format!("guest command '{command}' exited with status {status}")).with_context("output", output));
        }
        Ok(output)
    }

    /// Upload `local` to `remote` via SCP, then chmod is left to the caller
    /// (exec'd separately, matching the teacher's "one channel, one purpose"
    /// shape rather than multiplexing operations onto a single channel).
    pub fn upload(&self, local: &Path, remote: &str) -> StratumResult<()> {
        let data = std::fs::read(local).map_err(|e| StratumError::io("vm.ssh", format!("failed to read {}", local.display())).with_source(e))?;
        let mode = 0o755;
        let mut channel = self
            .session
            .scp_send(Path::new(remote), mode, data.len() as u64, None)
            .map_err(|e| StratumError::network("vm.ssh", format!("failed to open SCP channel for {remote}")).with_source(std::io::Error::other(e.to_string())))?;
        channel.write_all(&data).map_err(|e| StratumError::network("vm.ssh", format!("failed to upload {remote}")).with_source(e))?;
        channel.send_eof().ok();
        channel.wait_eof().ok();
        channel.close().ok();
        channel.wait_close().ok();
        Ok(())
    }
}

/// Readiness probe (spec §4.8 step 3): a bare TCP connect attempt, cheap
/// enough to run every `SSH_POLL_INTERVAL_SECS` without spamming the guest's
/// auth log with failed logins.
pub fn probe(_user: &str, port: u16) -> StratumResult<()> {
    let addr = format!("127.0.0.1:{port}");
    let socket_addr = addr
        .parse()
        .map_err(|e| StratumError::system("vm.ssh", format!("invalid address {addr}")).with_source(std::io::Error::other(format!("{e}"))))?;
    TcpStream::connect_timeout(&socket_addr, Duration::from_secs(1))
        .map(|_| ())
        .map_err(|e| StratumError::transient("vm.ssh.probe", format!("guest not yet reachable on {addr}")).with_source(e))
}
