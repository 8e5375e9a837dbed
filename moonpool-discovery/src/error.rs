//! Error types for the discovery engine.
//!
//! An unresolved identity or adapter is reported as `None`, never as an
//! error.

use thiserror::Error;

/// Local failure to issue a lookup query.
///
/// Returned synchronously by a [`LookupTransport`](crate::LookupTransport).
/// The resolver converts it into an absent result for every waiter and
/// never retries it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// No network interface is able to carry the query.
    #[error("no usable network interface")]
    NoInterface,

    /// The underlying socket reported an I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,
}

impl From<std::io::Error> for SendError {
    fn from(err: std::io::Error) -> Self {
        SendError::Io(err.to_string())
    }
}

/// Invalid discovery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The per-attempt timeout must be strictly positive.
    #[error("lookup timeout must be non-zero")]
    ZeroTimeout,

    /// The latency multiplier (a percentage) must be at least 1.
    #[error("latency multiplier must be at least 1 percent, got {0}")]
    InvalidLatencyMultiplier(u32),
}

/// Errors parsing identities, endpoints and tokens from their string forms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The identity has an empty name.
    #[error("identity name is empty")]
    EmptyIdentity,

    /// The IP address could not be parsed.
    #[error("invalid IP address")]
    InvalidIp,

    /// The port number could not be parsed.
    #[error("invalid port number")]
    InvalidPort,

    /// No port separator (`:`) found in the input.
    #[error("missing port separator")]
    MissingPort,

    /// Endpoint string lacks a `scheme://` prefix.
    #[error("missing transport scheme in {0:?}")]
    MissingScheme(String),

    /// Unknown transport scheme.
    #[error("unknown transport {0:?}")]
    UnknownTransport(String),

    /// Correlation token is not 32 hex digits.
    #[error("malformed correlation token {0:?}")]
    InvalidToken(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_display() {
        assert_eq!(
            SendError::NoInterface.to_string(),
            "no usable network interface"
        );
        assert_eq!(SendError::Closed.to_string(), "transport closed");
    }

    #[test]
    fn test_send_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no route");
        let err: SendError = io.into();
        assert_eq!(err, SendError::Io("no route".to_string()));
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::InvalidLatencyMultiplier(0).to_string(),
            "latency multiplier must be at least 1 percent, got 0"
        );
    }
}
