//! # POSIX Message Queue Client
//!
//! A typed client for the kernel's named message queues (`mq_overview(7)`).
//! The kernel keeps sole responsibility for storing, ordering and delivering
//! messages; this library turns its raw status codes into structured errors
//! and guards the lifetime of each queue descriptor.
//!
//! ## Architecture Overview
//!
//! - `error`: the closed [`ErrorKind`] taxonomy and the single errno translation table
//! - `flags`, `name`, `attributes`, `deadline`: validated value types
//! - `native`: the [`NativeQueueService`] contract and its Linux implementation
//! - `handle`: [`QueueHandle`], the Open → Closed state machine and per-queue operations
//! - `client`: [`QueueClient`], which opens, creates and unlinks queues by name
//! - `platform`: one-time probing of platform limits
//! - `cli`, `logging`: argument parsing and log formatting for the `pmq` tool
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use pmq_client::{CreateMode, Deadline, OpenFlags, QueueAttributes, QueueClient};
//! use std::time::Duration;
//!
//! fn main() -> pmq_client::Result<()> {
//!     let client = QueueClient::native();
//!     let mut queue = client.open_or_create(
//!         "/orders",
//!         OpenFlags::READ_WRITE,
//!         CreateMode::new(0o600),
//!         Some(QueueAttributes::new(10, 1024)),
//!     )?;
//!
//!     queue.send(b"hello", 5)?;
//!     let message = queue.timed_receive(Deadline::after(Duration::from_millis(100)))?;
//!     assert_eq!(message.payload, b"hello");
//!
//!     queue.close()?;
//!     client.unlink("/orders")
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`Result`], whose error carries exactly one
//! [`ErrorKind`]. Nothing is retried behind the caller's back except signal
//! interruptions inside the deadline-bounded operations.

/// Command-line interface of the `pmq` tool
///
/// Argument parsing with clap, including human-readable durations ("500ms",
/// "2s") for timed operations and octal permission bits for queue creation.
pub mod cli;

/// Opening, creating and unlinking queues by name
pub mod client;

/// Absolute deadlines for timed operations
pub mod deadline;

/// Error taxonomy and errno translation
///
/// Holds the one table that maps native failure codes to [`ErrorKind`], so
/// the same failure reads the same way from every operation.
pub mod error;

pub mod flags;

/// Queue handles and the per-descriptor operations
///
/// Contains the lifecycle state machine guarding each descriptor:
/// - Use after close fails with `BadDescriptor` before touching the kernel
/// - Closing twice fails the second time
/// - Dropping an open handle closes it
pub mod handle;

pub mod attributes;

/// Colorized log formatting for the `pmq` tool
pub mod logging;

pub mod name;

/// The native queue contract and its platform implementations
pub mod native;

/// One-time probing of platform limits
pub mod platform;

pub use attributes::{BlockingMode, QueueAttributes};
pub use client::QueueClient;
pub use deadline::Deadline;
pub use error::{translate, ErrorKind, Operation, QueueError, Result};
pub use flags::{CreateMode, OpenFlags};
pub use handle::{LifecycleState, Message, QueueHandle};
pub use name::QueueName;
pub use native::NativeQueueService;
pub use platform::{InitState, PlatformLimits};

#[cfg(target_os = "linux")]
pub use native::PosixQueueService;

/// The current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Permission bits for queues created by the `pmq` tool: owner read/write
    pub const CREATE_MODE: u32 = 0o600;

    /// Default queue capacity
    ///
    /// Matches the Linux default for `msg_max`, so unprivileged processes can
    /// always create a queue this deep.
    pub const MAX_MESSAGES: usize = 10;

    /// Default maximum message size in bytes
    ///
    /// Matches the Linux default for `msgsize_max`.
    pub const MESSAGE_SIZE: usize = 8192;

    /// Priority used when none is given
    pub const PRIORITY: u32 = 0;
}
