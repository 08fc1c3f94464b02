//! pyina: length-prefixed string transfer and communicator helpers on top of
//! MPI.
//!
//! The protocol functions in [`message`] are generic over [`Communicator`],
//! which is implemented by the MPI backend ([`MpiComm`], behind the default
//! `mpi` feature) and by an in-process backend ([`LocalComm`]) that runs every
//! rank as a thread.
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub mod binding;
pub use binding::Binding;
pub mod communicator;
pub use communicator::{Communicator, Group, Source, TagSelector};
pub mod config;
pub use config::{Config, NullCommPolicy};
mod consts;
pub use consts::{MpiConstants, CONSTANT_NAMES};
pub mod local;
pub use local::{LocalComm, LocalGroup, LocalUniverse};
pub mod message;
pub use message::Received;

#[cfg(feature = "mpi")]
mod comm;
#[cfg(feature = "mpi")]
pub use comm::{MpiComm, MpiGroup};
#[cfg(feature = "mpi")]
mod context;
#[cfg(feature = "mpi")]
pub use context::{error_string, is_finalized, is_initialized, Context, ThreadLevel};

/// Greeting returned by the sanity check call.
pub const HELLO: &str = "pyina says Hello.";

/// For sanity checks.
pub fn hello() -> &'static str {
    HELLO
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// MPI was initialized more than once in this process.
    #[error("MPI has already been initialized")]
    AlreadyInitialized,

    /// An MPI call was made before initialization or after finalization.
    #[error("MPI has not been initialized")]
    NotInitialized,

    /// MPI_Init_thread() failed.
    #[error("failed to initialize MPI (code {0})")]
    InitFailure(i32),

    /// An error was returned by the MPI library.
    #[error("MPI error in {op} (code {code})")]
    Mpi { op: &'static str, code: i32 },

    /// Rank outside of the communicator.
    #[error("invalid rank {rank} for communicator of size {size}")]
    InvalidRank { rank: i32, size: i32 },

    /// Negative or otherwise unusable tag.
    #[error("invalid tag {0}")]
    InvalidTag(i32),

    /// A length prefix that cannot describe a payload.
    #[error("invalid message length {0}")]
    InvalidLength(i32),

    /// Payload does not fit the 4-byte length prefix.
    #[error("message of {0} bytes is too long")]
    MessageTooLong(usize),

    /// Incoming message is larger than the posted receive buffer.
    #[error("receive buffer of {expected} bytes too small for message of {received} bytes")]
    Truncated { expected: usize, received: usize },

    /// Incoming message does not have the size of the expected datatype.
    #[error("expected a {expected} byte message, received {received} bytes")]
    Mismatch { expected: usize, received: usize },

    /// A null communicator was passed while the binding rejects them.
    #[error("null communicator")]
    NullCommunicator,

    /// The job has fewer ranks than the caller requires.
    #[error("at least {required} processes are required, only {actual} are running")]
    WorldTooSmall { required: i32, actual: i32 },

    /// A bounded receive gave up waiting.
    #[error("timed out waiting for a message")]
    Timeout,

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Status of a completed receive.
///
/// Serializes with the keys the host side expects (`MPI_SOURCE`, `MPI_TAG`,
/// `MPI_ERROR`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecvStatus {
    /// Rank of the process that sent the message.
    #[serde(rename = "MPI_SOURCE")]
    pub source: i32,

    /// Tag the message was sent with.
    #[serde(rename = "MPI_TAG")]
    pub tag: i32,

    /// Error code of the receive (MPI_SUCCESS when it completed).
    #[serde(rename = "MPI_ERROR")]
    pub error: i32,
}

impl RecvStatus {
    /// Return the status as a `name -> value` mapping.
    pub fn to_map(&self) -> BTreeMap<&'static str, i32> {
        BTreeMap::from([
            ("MPI_SOURCE", self.source),
            ("MPI_TAG", self.tag),
            ("MPI_ERROR", self.error),
        ])
    }
}

impl fmt::Display for RecvStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{source: {}, tag: {}, error: {}}}",
            self.source, self.tag, self.error
        )
    }
}
