//! Error handling for the hexmind coordination layer
//!
//! This module defines the crate-wide error type and a Result alias.
//! Errors fall into four families: protocol errors (logged and dropped at
//! the unit that sees them), setup errors (unit-fatal, surfaced to the
//! bootstrapper), ordering errors (decode attempted before a codec was
//! bound), and channel errors (a peer endpoint went away).

use crate::protocol::{QueueName, Role};
use thiserror::Error;

/// Main error type for hexmind operations
#[derive(Error, Debug)]
pub enum HexmindError {
    /// A channel endpoint was disconnected while sending or receiving
    #[error("channel error: {0}")]
    Channel(String),

    /// An item could not be encoded or decoded with the queue's codec
    #[error("codec error on '{queue}' queue: {message}")]
    Codec { queue: QueueName, message: String },

    /// An item was injected into a queue before the memory handoff bound
    /// its codec (or into a queue the unit does not own)
    #[error("queue '{0}' is not ready: memory handoff not received")]
    QueueNotReady(QueueName),

    /// A message violated the wiring/injection protocol
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A unit failed to load its environment or activate its module
    #[error("setup error in {role} unit: {message}")]
    Setup { role: Role, message: String },

    /// Errors related to configuration loading/saving
    #[error("configuration error: {0}")]
    Config(String),

    /// Out-of-range access into the shared memory buffer
    #[error("memory access error at offset {offset}: {message}")]
    MemoryAccess { offset: usize, message: String },

    /// An application worker reported a failure
    #[error("worker error: {0}")]
    Worker(String),

    /// A bounded wait elapsed
    #[error("timeout: {0}")]
    Timeout(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HexmindError {
    /// Shorthand for a setup error in the given role
    pub fn setup(role: Role, message: impl Into<String>) -> Self {
        HexmindError::Setup {
            role,
            message: message.into(),
        }
    }

    /// Shorthand for a codec error on the given queue
    pub fn codec(queue: QueueName, message: impl Into<String>) -> Self {
        HexmindError::Codec {
            queue,
            message: message.into(),
        }
    }
}

/// Result type alias for hexmind operations
pub type Result<T> = std::result::Result<T, HexmindError>;
