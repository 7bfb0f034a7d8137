//! Error taxonomy for the multiplexer.
//!
//! Only [`Error::SetupFailed`] is fatal. Every other variant is handled inside the
//! event loop: it is reported to the observer and the loop moves on.

use std::io;
use std::os::unix::io::RawFd;

use thiserror::Error;

/// Errors raised by the listener, the registry, the pollers and the handlers.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket creation, bind, listen or poller creation failed.
    #[error("setup failed ({context}): {source}")]
    SetupFailed {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// The readiness wait itself failed (not a timeout).
    #[error("readiness query failed: {0}")]
    QueryFailed(#[source] io::Error),

    /// `accept` on the listening socket failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    /// `recv` on a connection failed.
    #[error("receive failed on fd {fd}: {source}")]
    ReceiveFailed {
        fd: RawFd,
        #[source]
        source: io::Error,
    },

    /// The registry already holds its maximum number of connections.
    #[error("registry full ({capacity} connections)")]
    RegistryFull { capacity: usize },

    /// The fd is already registered.
    #[error("fd {0} is already registered")]
    DuplicateHandle(RawFd),

    /// The fd is not registered.
    #[error("fd {0} is not registered")]
    UnknownHandle(RawFd),

    /// The fd value does not fit in the descriptor set.
    #[error("fd {fd} does not fit in a descriptor set of {limit}")]
    HandleOutOfRange { fd: RawFd, limit: usize },

    /// Adding or removing the fd from the kernel interest set failed.
    #[error("interest update failed for fd {fd}: {source}")]
    RegisterFailed {
        fd: RawFd,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn setup(context: &'static str, source: io::Error) -> Self {
        Error::SetupFailed { context, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
