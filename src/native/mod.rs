//! # Native Queue Service
//!
//! The [`NativeQueueService`] trait is the narrow contract between the typed
//! façade and whatever actually stores and delivers messages. Every method
//! reports failure as a raw [`Errno`]; turning that into a typed error is the
//! façade's job, not the service's.
//!
//! On Linux the contract is fulfilled by [`PosixQueueService`], a thin layer
//! over `mq_open(3)` and friends. Tests substitute their own implementation.

use crate::attributes::QueueAttributes;
use crate::deadline::Deadline;
use crate::flags::{CreateMode, OpenFlags};
use crate::name::QueueName;
use nix::errno::Errno;
use std::fmt;

#[cfg(target_os = "linux")]
pub mod posix_message_queue;

#[cfg(target_os = "linux")]
pub use posix_message_queue::PosixQueueService;

/// Result of a native call: a value or the raw failure code
pub type NativeResult<T> = std::result::Result<T, Errno>;

/// Operations offered by the platform's named message queue facility
///
/// Blocking behavior of `send`/`receive` follows the descriptor's
/// non-blocking flag. Implementations must be safe to call from several
/// threads on the same descriptor.
pub trait NativeQueueService: Send + Sync {
    /// Opaque identifier of an open queue
    type Descriptor: Copy + Eq + fmt::Debug + Send + Sync;

    fn open(&self, name: &QueueName, flags: OpenFlags) -> NativeResult<Self::Descriptor>;

    /// Open with `CREATE` set; `None` attributes select the platform defaults
    fn open_create(
        &self,
        name: &QueueName,
        flags: OpenFlags,
        mode: CreateMode,
        attributes: Option<&QueueAttributes>,
    ) -> NativeResult<Self::Descriptor>;

    fn close(&self, descriptor: Self::Descriptor) -> NativeResult<()>;

    fn unlink(&self, name: &QueueName) -> NativeResult<()>;

    fn get_attr(&self, descriptor: Self::Descriptor) -> NativeResult<QueueAttributes>;

    /// Apply new attributes and return the previous ones
    fn set_attr(
        &self,
        descriptor: Self::Descriptor,
        attributes: &QueueAttributes,
    ) -> NativeResult<QueueAttributes>;

    fn send(&self, descriptor: Self::Descriptor, message: &[u8], priority: u32) -> NativeResult<()>;

    /// Returns the message length written into `buffer` and its priority
    fn receive(&self, descriptor: Self::Descriptor, buffer: &mut [u8]) -> NativeResult<(usize, u32)>;

    fn timed_send(
        &self,
        descriptor: Self::Descriptor,
        message: &[u8],
        priority: u32,
        deadline: Deadline,
    ) -> NativeResult<()>;

    fn timed_receive(
        &self,
        descriptor: Self::Descriptor,
        buffer: &mut [u8],
        deadline: Deadline,
    ) -> NativeResult<(usize, u32)>;
}
