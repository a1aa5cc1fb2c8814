//! The Image entity (spec §3, §4.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Runtime configuration carried by an image: entrypoint, default command,
/// default environment, exposed ports. Parsed out of an OCI `config.json`
/// by [`crate::images::oci`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ImageConfig {
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
    pub env: Vec<String>,
    pub working_dir: Option<String>,
    pub exposed_ports: Vec<String>,
}

impl ImageConfig {
    /// The effective command: entrypoint followed by cmd, the way every OCI
    /// runtime resolves it, overridden entirely if the caller passed an
    /// explicit command.
    pub fn resolve_command(&self, override_cmd: &[String]) -> Vec<String> {
        if !override_cmd.is_empty() {
            return override_cmd.to_vec();
        }
        let mut resolved = self.entrypoint.clone();
        resolved.extend(self.cmd.clone());
        resolved
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Image {
    pub digest: String,
    pub layers: Vec<String>,
    pub config: ImageConfig,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

impl Image {
    pub fn new(digest: String, layers: Vec<String>, config: ImageConfig, size: u64) -> Self {
        Self {
            digest,
            layers,
            config,
            size,
            created_at: Utc::now(),
            tags: Vec::new(),
        }
    }
}

/// Parse and validate a `repository:tag` reference (spec §3's tag form).
pub fn split_tag_ref(reference: &str) -> Result<(&str, &str), String> {
    match reference.rsplit_once(':') {
        Some((repo, tag)) if !repo.is_empty() && !tag.is_empty() && !tag.contains('/') => Ok((repo, tag)),
        _ => Err(format!("'{reference}' is not a valid repository:tag reference")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_command_falls_back_to_entrypoint_and_cmd() {
        let config = ImageConfig {
            entrypoint: vec!["/bin/sh".into(), "-c".into()],
            cmd: vec!["echo hi".into()],
            ..Default::default()
        };
        assert_eq!(config.resolve_command(&[]), vec!["/bin/sh", "-c", "echo hi"]);
    }

    #[test]
    fn resolve_command_prefers_explicit_override() {
        let config = ImageConfig {
            entrypoint: vec!["/bin/sh".into()],
            ..Default::default()
        };
        assert_eq!(config.resolve_command(&["/bin/bash".into()]), vec!["/bin/bash"]);
    }

    #[test]
    fn splits_repository_and_tag() {
        assert_eq!(split_tag_ref("nginx:alpine").unwrap(), ("nginx", "alpine"));
        assert_eq!(
            split_tag_ref("docker.io/library/nginx:1.27").unwrap(),
            ("docker.io/library/nginx", "1.27")
        );
    }

    #[test]
    fn rejects_bare_digest_as_a_tag_ref() {
        assert!(split_tag_ref("nginx").is_err());
    }
}
