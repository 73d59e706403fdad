use thiserror::Error;

/// Errors this crate's own fallible surface can produce: address parsing and
/// peer discovery. Transient peer errors (socket failures, protocol
/// violations) are never returned as `Error` — they are observed only
/// through state transitions and the `connection_state_changed` hook.
#[derive(Debug, Error)]
pub enum Error {
    /// A `host:port` string could not be parsed or resolved.
    #[error("invalid peer address {0:?}")]
    InvalidAddress(String),

    /// No DNS seed was configured for the active chain parameters.
    #[error(transparent)]
    Config(#[from] iop_common::ConfigError),

    /// DNS resolution of a seed hostname failed.
    #[error("dns resolution failed for {host}: {source}")]
    Resolve {
        /// Hostname that failed to resolve.
        host: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
