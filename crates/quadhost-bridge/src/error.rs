//! Error types for the bridge crate.

use thiserror::Error;

/// Bridge error type
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Handle was never issued by the object table
    #[error("unknown handle {0}")]
    UnknownHandle(u32),

    /// Handle was issued but has since been released
    #[error("stale handle {0} (already released)")]
    StaleHandle(u32),

    /// Stored value has a different kind than the operation needs
    #[error("handle {handle} holds a {found}, expected a {expected}")]
    TypeMismatch {
        /// Offending handle
        handle: u32,
        /// Kind the operation needs
        expected: &'static str,
        /// Kind actually stored
        found: &'static str,
    },

    /// Record has no field with the requested name
    #[error("handle {handle} has no field '{field}'")]
    MissingField {
        /// Record handle
        handle: u32,
        /// Requested field name
        field: String,
    },

    /// Guest memory region lies outside the linear memory
    #[error("guest memory access out of bounds: offset {offset}, len {len}, memory size {memory_size}")]
    OutOfBounds {
        /// Start of the region
        offset: u32,
        /// Length of the region
        len: u32,
        /// Current size of the linear memory
        memory_size: usize,
    },

    /// Payload does not fit in the destination buffer supplied by the guest
    #[error("buffer overflow: {needed} bytes do not fit in {capacity}")]
    BufferOverflow {
        /// Bytes that had to be written
        needed: usize,
        /// Bytes the guest made available
        capacity: u32,
    },

    /// Index past the end of a snapshot
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Requested index
        index: i64,
        /// Number of entries
        len: usize,
    },

    /// A key counter reached `u32::MAX`; keys are never reused
    #[error("{0} keys exhausted")]
    KeysExhausted(&'static str),

    /// Audio call made before `audio_init`
    #[error("audio context not initialized")]
    AudioNotInitialized,

    /// Audio backend failure
    #[error("audio backend error: {0}")]
    AudioBackend(String),

    /// Malformed page URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// WebAssembly runtime error
    #[error("WASM runtime error: {0}")]
    WasmError(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
