//! Bind-address transport for the Runtime Endpoint (spec §4.9).

use std::path::PathBuf;

/// Where the HTTP Runtime Endpoint listens.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Transport {
    /// TCP, the default for both the daemon and orchestrator ports.
    Tcp { port: u16 },
    /// Unix domain socket, useful for a rootless per-user install.
    Unix { socket_path: PathBuf },
}

impl Transport {
    pub fn tcp(port: u16) -> Self {
        Self::Tcp { port }
    }

    pub fn unix(socket_path: PathBuf) -> Self {
        Self::Unix { socket_path }
    }

    pub fn to_uri(&self) -> String {
        match self {
            Transport::Tcp { port } => format!("tcp://127.0.0.1:{}", port),
            Transport::Unix { socket_path } => format!("unix://{}", socket_path.display()),
        }
    }

    pub fn from_uri(uri: &str) -> Result<Self, String> {
        if let Some(rest) = uri.strip_prefix("tcp://") {
            let port = rest
                .rsplit(':')
                .next()
                .ok_or_else(|| format!("invalid TCP URI '{}': missing port", uri))?
                .parse::<u16>()
                .map_err(|e| format!("invalid TCP port in '{}': {}", uri, e))?;
            Ok(Self::tcp(port))
        } else if let Some(path) = uri.strip_prefix("unix://") {
            Ok(Self::unix(PathBuf::from(path)))
        } else {
            Err(format!("invalid transport URI '{}': expected tcp:// or unix://", uri))
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

impl std::str::FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uri(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_round_trips_through_uri() {
        let t = Transport::tcp(8080);
        assert_eq!(Transport::from_uri(&t.to_uri()).unwrap(), t);
    }

    #[test]
    fn unix_round_trips_through_uri() {
        let t = Transport::unix(PathBuf::from("/tmp/stratum.sock"));
        assert_eq!(Transport::from_uri(&t.to_uri()).unwrap(), t);
    }
}
