use thiserror::Error;

/// The union of everything that can send the `scan` binary home with a
/// non-zero exit code.
#[derive(Debug, Error)]
pub enum Error {
    /// Peer discovery failed (bad address list, or no DNS seed configured/resolvable).
    #[error(transparent)]
    Discovery(#[from] iop_p2p::Error),

    /// The reactor failed to initialize or its poll loop errored out.
    #[error(transparent)]
    Reactor(#[from] iop_net_poll::Error),

    /// Writing the `-f` peer report file failed.
    #[error("failed to write peer report to {path}: {source}")]
    WriteFile {
        /// Path that could not be written.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Installing the `SIGINT` handler failed.
    #[error(transparent)]
    Signal(#[from] std::io::Error),
}
