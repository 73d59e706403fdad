use thiserror::Error;

/// Errors produced while decoding or encoding wire data.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Fewer bytes were buffered than the field being decoded requires.
    #[error("truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required to complete the decode.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A `data_len` field exceeded [`crate::wire::MAX_MESSAGE_SIZE`].
    #[error("message length {0} exceeds maximum")]
    MessageTooLarge(u32),

    /// A length-prefixed string was not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// A command field contained bytes outside the NUL-padded-ASCII space.
    #[error("invalid command name")]
    InvalidCommand,
}

/// Errors produced while parsing chain parameters or peer addresses.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An unrecognized network name was supplied.
    #[error("invalid network specified {0:?}")]
    InvalidNetwork(String),

    /// No DNS seed was available for the requested network.
    #[error("no dns seed configured for this network")]
    NoSeedConfigured,
}
