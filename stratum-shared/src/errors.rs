//! The runtime's single error type.
//!
//! Every fallible operation in `stratum` and `stratum-guest` returns
//! [`StratumResult<T>`]. Errors carry a domain [`ErrorKind`] (used to pick an
//! HTTP status or CLI exit code), the operation that failed, a chained
//! source, and a small string-keyed context map for diagnostics.

use std::collections::BTreeMap;
use std::fmt;

/// Domain-tagged error kinds. See spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// Input malformed or out of range.
    Validation,
    /// Referenced entity does not exist.
    NotFound,
    /// State transition or name collision rejected.
    Conflict,
    /// Missing privilege (e.g. non-root on the Linux native path).
    Permission,
    /// Host kernel or external tool failed.
    System,
    /// Filesystem read/write failure.
    Io,
    /// Network setup or teardown failure.
    Network,
    /// Retryable; surfaced only after the retry budget is exhausted.
    Transient,
    /// Container-local failure (process spawn, init).
    Container,
    /// Image operation failure.
    Image,
    /// Volume operation failure.
    Volume,
}

impl ErrorKind {
    /// Short uppercase tag used in CLI output: `[KIND] operation: message`.
    pub fn as_tag(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Permission => "PERMISSION",
            ErrorKind::System => "SYSTEM",
            ErrorKind::Io => "IO",
            ErrorKind::Network => "NETWORK",
            ErrorKind::Transient => "TRANSIENT",
            ErrorKind::Container => "CONTAINER",
            ErrorKind::Image => "IMAGE",
            ErrorKind::Volume => "VOLUME",
        }
    }

    /// CLI exit code per spec §6. Most kinds map to the generic runtime
    /// internal error; validation and not-found get their own codes so
    /// scripts can distinguish "you asked wrong" from "we broke".
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Validation => 2,
            ErrorKind::NotFound | ErrorKind::Conflict => 1,
            _ => 125,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// The runtime's error type.
///
/// Context entries are ordered (`BTreeMap`) so error messages are
/// deterministic across runs, which matters for tests that assert on
/// rendered output.
#[derive(Debug)]
pub struct StratumError {
    kind: ErrorKind,
    operation: String,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    context: BTreeMap<String, String>,
}

impl StratumError {
    pub fn new(kind: ErrorKind, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation: operation.into(),
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    pub fn validation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, operation, message)
    }

    pub fn not_found(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, operation, message)
    }

    pub fn conflict(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, operation, message)
    }

    pub fn permission(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, operation, message)
    }

    pub fn system(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::System, operation, message)
    }

    pub fn io(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, operation, message)
    }

    pub fn network(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, operation, message)
    }

    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, operation, message)
    }

    pub fn container(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Container, operation, message)
    }

    pub fn image(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Image, operation, message)
    }

    pub fn volume(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Volume, operation, message)
    }

    /// Attach a chained cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attach a key/value diagnostic. Chainable.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }
}

impl fmt::Display for StratumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.as_tag(), self.operation, self.message)?;
        if let Some(source) = &self.source {
            write!(f, " (caused by: {})", source)?;
        }
        if !self.context.is_empty() {
            write!(f, " {{")?;
            for (i, (k, v)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}={}", k, v)?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}

impl std::error::Error for StratumError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for StratumError {
    fn from(err: std::io::Error) -> Self {
        StratumError::new(ErrorKind::Io, "io", err.to_string()).with_source(err)
    }
}

pub type StratumResult<T> = Result<T, StratumError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_operation_message() {
        let err = StratumError::not_found("container.start", "no such container: abc123");
        let rendered = err.to_string();
        assert_eq!(rendered, "[NOT_FOUND] container.start: no such container: abc123");
    }

    #[test]
    fn display_includes_chained_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "enoent");
        let err = StratumError::io("state.load", "failed to read record").with_source(io_err);
        assert!(err.to_string().contains("caused by: enoent"));
    }

    #[test]
    fn context_is_deterministically_ordered() {
        let err = StratumError::conflict("container.remove", "in use")
            .with_context("zzz", "1")
            .with_context("aaa", "2");
        assert!(err.to_string().ends_with("{aaa=2, zzz=1}"));
    }

    #[test]
    fn exit_codes_match_spec() {
        assert_eq!(ErrorKind::Validation.exit_code(), 2);
        assert_eq!(ErrorKind::NotFound.exit_code(), 1);
        assert_eq!(ErrorKind::System.exit_code(), 125);
    }
}
