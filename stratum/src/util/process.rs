//! Process validation utilities for PID checking (spec §4.7 stop/kill, §3
//! "a running Container has a non-zero process identifier" invariant).

use crate::error::{StratumError, StratumResult};
use std::path::Path;

/// Read a PID written by the Lifecycle Engine at start time.
pub fn read_pid_file(path: &Path) -> StratumResult<u32> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| StratumError::io("util.process", format!("failed to read PID file {}", path.display())).with_source(e))?;

    content
        .trim()
        .parse::<u32>()
        .map_err(|e| StratumError::system("util.process", format!("invalid PID in {}: '{}'", path.display(), content.trim())).with_source(e))
}

/// Terminate `pid` unconditionally. Returns `true` if the process was
/// killed or was already gone. `SIGKILL` on Unix; `taskkill /F` on Windows,
/// since there is no signal-based process model to reuse there.
pub fn kill_process(pid: u32) -> bool {
    #[cfg(unix)]
    {
        signal_process(pid, libc::SIGKILL)
    }
    #[cfg(windows)]
    {
        std::process::Command::new("taskkill")
            .args(["/F", "/PID", &pid.to_string()])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
            || !is_process_alive(pid)
    }
}

/// Send a specific signal to `pid` (spec §4.7 `kill(ref, signal)` "forwards
/// a specific signal immediately"). Returns `true` if the signal was
/// delivered or the process was already gone. Windows has no per-signal
/// delivery primitive, so every signal there forces termination, matching
/// `kill_process`'s existing fallback.
pub fn signal_process(pid: u32, signal: i32) -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::kill(pid as i32, signal) == 0 || !is_process_alive(pid) }
    }
    #[cfg(windows)]
    {
        let _ = signal;
        kill_process(pid)
    }
}

/// Parse a CLI-supplied signal name or number into its numeric value (spec
/// §6 `kill --signal S`). Accepts a bare number, a name (`KILL`, `TERM`),
/// or the `SIG`-prefixed form, case-insensitively.
pub fn parse_signal(raw: &str) -> StratumResult<i32> {
    if let Ok(n) = raw.parse::<i32>() {
        return Ok(n);
    }
    let name = raw.trim().to_ascii_uppercase();
    let name = name.strip_prefix("SIG").unwrap_or(&name);
    let value = match name {
        "HUP" => libc::SIGHUP,
        "INT" => libc::SIGINT,
        "QUIT" => libc::SIGQUIT,
        "KILL" => libc::SIGKILL,
        "TERM" => libc::SIGTERM,
        "USR1" => libc::SIGUSR1,
        "USR2" => libc::SIGUSR2,
        "STOP" => libc::SIGSTOP,
        "CONT" => libc::SIGCONT,
        _ => return Err(StratumError::validation("util.process", format!("unknown signal '{raw}'"))),
    };
    Ok(value)
}

/// Existence probe — sends no signal on Unix, only checks that the PID is
/// live and we have permission to signal it.
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::kill(pid as i32, 0) == 0 }
    }
    #[cfg(windows)]
    {
        std::process::Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}")])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn parse_signal_accepts_numbers_names_and_sig_prefix() {
        assert_eq!(parse_signal("9").unwrap(), 9);
        assert_eq!(parse_signal("KILL").unwrap(), libc::SIGKILL);
        assert_eq!(parse_signal("SIGKILL").unwrap(), libc::SIGKILL);
        assert_eq!(parse_signal("term").unwrap(), libc::SIGTERM);
        assert!(parse_signal("NOTASIGNAL").is_err());
    }

    #[test]
    fn implausible_pids_are_not_alive() {
        assert!(!is_process_alive(999_999_999));
    }

    #[test]
    fn read_pid_file_parses_trailing_newline() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "12345").unwrap();
        assert_eq!(read_pid_file(file.path()).unwrap(), 12345);
    }

    #[test]
    fn read_pid_file_rejects_non_numeric_content() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not-a-pid").unwrap();
        assert!(read_pid_file(file.path()).is_err());
    }

    #[test]
    fn read_pid_file_missing_is_an_io_error() {
        assert!(read_pid_file(Path::new("/nonexistent/pid/file")).is_err());
    }
}
