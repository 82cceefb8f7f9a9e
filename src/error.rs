//! # Error Taxonomy and Translation
//!
//! Every public operation in this crate fails with exactly one [`QueueError`],
//! which carries a closed [`ErrorKind`] plus the native description of the
//! failure when one exists. Raw `errno` values never escape to callers.
//!
//! ## Translation
//!
//! [`translate`] is the single table mapping a native failure code to an
//! [`ErrorKind`]. All ten queue operations route their failures through it, so
//! the same underlying failure always surfaces as the same kind regardless of
//! which call observed it. The only code whose meaning depends on the caller
//! is `EAGAIN`, which reads as "queue full" when sending and "queue empty"
//! when receiving; [`Operation::direction`] supplies that context.

use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Convenience alias used by every fallible operation in the crate
pub type Result<T> = std::result::Result<T, QueueError>;

/// Closed set of failure categories a queue operation can report
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[error("permission denied")]
    Permission,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("descriptor limit reached")]
    DescriptorLimitReached,
    #[error("name too long")]
    NameTooLong,
    #[error("queue not found")]
    NotFound,
    #[error("queue already exists")]
    AlreadyExists,
    #[error("insufficient memory")]
    InsufficientMemory,
    #[error("insufficient space")]
    InsufficientSpace,
    #[error("bad descriptor")]
    BadDescriptor,
    #[error("queue empty")]
    QueueEmpty,
    #[error("queue full")]
    QueueFull,
    #[error("interrupted by signal")]
    Interrupted,
    #[error("message too large")]
    MessageTooLarge,
    #[error("timed out")]
    TimedOut,
    #[error("unknown error")]
    Unknown,
}

/// Queue operations, used to give direction-dependent codes their meaning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Open,
    Create,
    Close,
    Unlink,
    GetAttributes,
    SetAttributes,
    Send,
    Receive,
    TimedSend,
    TimedReceive,
}

/// Which way data flows for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
    None,
}

impl Operation {
    pub fn direction(self) -> Direction {
        match self {
            Operation::Send | Operation::TimedSend => Direction::Send,
            Operation::Receive | Operation::TimedReceive => Direction::Receive,
            _ => Direction::None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Open => "open",
            Operation::Create => "create",
            Operation::Close => "close",
            Operation::Unlink => "unlink",
            Operation::GetAttributes => "get attributes",
            Operation::SetAttributes => "set attributes",
            Operation::Send => "send",
            Operation::Receive => "receive",
            Operation::TimedSend => "timed send",
            Operation::TimedReceive => "timed receive",
        };
        f.write_str(name)
    }
}

/// Map a native failure code to its [`ErrorKind`].
///
/// Total and deterministic: codes outside the queue operation set map to
/// [`ErrorKind::Unknown`] instead of being dropped.
pub fn translate(code: Errno, operation: Operation) -> ErrorKind {
    match code {
        Errno::EACCES => ErrorKind::Permission,
        Errno::EINVAL => ErrorKind::InvalidArgument,
        Errno::EMFILE | Errno::ENFILE => ErrorKind::DescriptorLimitReached,
        Errno::ENAMETOOLONG => ErrorKind::NameTooLong,
        Errno::ENOENT => ErrorKind::NotFound,
        Errno::EEXIST => ErrorKind::AlreadyExists,
        Errno::ENOMEM => ErrorKind::InsufficientMemory,
        Errno::ENOSPC => ErrorKind::InsufficientSpace,
        Errno::EBADF => ErrorKind::BadDescriptor,
        Errno::EAGAIN => match operation.direction() {
            Direction::Send => ErrorKind::QueueFull,
            Direction::Receive => ErrorKind::QueueEmpty,
            Direction::None => ErrorKind::Unknown,
        },
        Errno::EINTR => ErrorKind::Interrupted,
        Errno::EMSGSIZE => ErrorKind::MessageTooLarge,
        Errno::ETIMEDOUT => ErrorKind::TimedOut,
        _ => ErrorKind::Unknown,
    }
}

/// A failed queue operation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct QueueError {
    kind: ErrorKind,
    message: String,
    errno: Option<Errno>,
}

impl QueueError {
    /// Build an error detected by this crate before reaching the native layer
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errno: None,
        }
    }

    /// Build an error from a native failure code
    pub fn from_native(code: Errno, operation: Operation, context: &str) -> Self {
        Self {
            kind: translate(code, operation),
            message: format!("{} {} failed: {}", operation, context, code.desc()),
            errno: Some(code),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The native code behind this error, if it came from the native layer
    pub fn errno(&self) -> Option<Errno> {
        self.errno
    }

    /// Whether repeating the same call may succeed without changing anything
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Interrupted | ErrorKind::QueueFull | ErrorKind::QueueEmpty
        )
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }
}
