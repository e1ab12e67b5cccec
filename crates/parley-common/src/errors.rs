use std::path::PathBuf;

use crate::id::ConnectionId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Everything that can go wrong inside the hub.
///
/// Apart from [`HubError::Accept`] and start-up failures, every variant is
/// scoped to a single connection or request and never takes the hub down.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("access to {channel} denied: {reason}")]
    AuthorizationDenied { channel: String, reason: String },

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("invalid channel name: {0}")]
    InvalidChannel(String),

    #[error("identity boundary unavailable: {0}")]
    BoundaryUnavailable(String),

    #[error("outbound queue overflow on connection {0}")]
    QueueOverflow(ConnectionId),

    #[error("listener cannot accept connections: {0}")]
    Accept(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HubError {
    pub fn denied(channel: &str, reason: impl Into<String>) -> Self {
        HubError::AuthorizationDenied {
            channel: channel.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable code sent to clients in error frames.
    pub fn code(&self) -> &'static str {
        match self {
            HubError::Protocol(_) => "protocol_error",
            HubError::AuthorizationDenied { .. } => "authorization_denied",
            HubError::CapacityExceeded(_) => "capacity_exceeded",
            HubError::UnknownConnection(_) => "unknown_connection",
            HubError::UnknownChannel(_) => "unknown_channel",
            HubError::InvalidChannel(_) => "invalid_channel",
            HubError::BoundaryUnavailable(_) => "boundary_unavailable",
            HubError::QueueOverflow(_) => "queue_overflow",
            HubError::Accept(_) => "accept_failed",
            HubError::Config(_) => "config_error",
            HubError::Io(_) => "io_error",
        }
    }

    /// Whether the offending connection has to be closed.
    pub fn closes_connection(&self) -> bool {
        matches!(self, HubError::Protocol(_) | HubError::QueueOverflow(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("server.port = 0".into());
        assert_eq!(err.to_string(), "config validation error: server.port = 0");
    }

    #[test]
    fn hub_error_display() {
        let err = HubError::denied("private-chat", "no identity");
        assert_eq!(err.to_string(), "access to private-chat denied: no identity");

        let err = HubError::QueueOverflow(ConnectionId::from("c1"));
        assert_eq!(err.to_string(), "outbound queue overflow on connection c1");

        let err = HubError::Protocol("expected JSON object".into());
        assert_eq!(err.to_string(), "protocol error: expected JSON object");
    }

    #[test]
    fn hub_error_from_config() {
        let err: HubError = ConfigError::ParseError("bad toml".into()).into();
        assert!(matches!(err, HubError::Config(_)));
        assert_eq!(err.code(), "config_error");
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn hub_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err: HubError = io_err.into();
        assert!(matches!(err, HubError::Io(_)));
        assert!(err.to_string().contains("port taken"));
    }

    #[test]
    fn codes_are_snake_case() {
        let errors = [
            HubError::Protocol(String::new()),
            HubError::denied("c", "r"),
            HubError::CapacityExceeded(String::new()),
            HubError::UnknownConnection(ConnectionId::from("c")),
            HubError::UnknownChannel(String::new()),
            HubError::InvalidChannel(String::new()),
            HubError::BoundaryUnavailable(String::new()),
            HubError::QueueOverflow(ConnectionId::from("c")),
            HubError::Accept(String::new()),
        ];
        for err in errors {
            let code = err.code();
            assert!(code.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }

    #[test]
    fn only_protocol_and_overflow_close_the_connection() {
        assert!(HubError::Protocol("x".into()).closes_connection());
        assert!(HubError::QueueOverflow(ConnectionId::from("c")).closes_connection());
        assert!(!HubError::denied("c", "r").closes_connection());
        assert!(!HubError::CapacityExceeded("x".into()).closes_connection());
        assert!(!HubError::BoundaryUnavailable("x".into()).closes_connection());
    }
}
