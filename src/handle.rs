//! # Queue Handle
//!
//! A [`QueueHandle`] owns one native descriptor from the moment a queue is
//! opened until it is closed. All per-descriptor operations live here, and
//! all of them check the handle's [`LifecycleState`] first, so a closed
//! handle reports [`ErrorKind::BadDescriptor`] without ever reaching the
//! native layer.
//!
//! ## Blocking Behavior
//!
//! `send`/`receive` block on the calling thread unless the descriptor is
//! non-blocking, and surface signal interruptions as
//! [`ErrorKind::Interrupted`]. The timed variants instead retry interrupted
//! waits on their own until the deadline passes, then fail with
//! [`ErrorKind::TimedOut`]. A deadline that has already passed fails
//! immediately without attempting the transfer.

use crate::attributes::{BlockingMode, QueueAttributes};
use crate::deadline::Deadline;
use crate::error::{ErrorKind, Operation, QueueError, Result};
use crate::name::QueueName;
use crate::native::{NativeQueueService, NativeResult};
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Open,
    Closed,
}

/// A received message and the priority it was sent with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub payload: Vec<u8>,
    pub priority: u32,
}

impl Message {
    pub fn new(payload: Vec<u8>, priority: u32) -> Self {
        Self { payload, priority }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload as text, with invalid UTF-8 replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// An open connection to a named queue
pub struct QueueHandle<S: NativeQueueService> {
    service: Arc<S>,
    descriptor: S::Descriptor,
    name: QueueName,
    state: LifecycleState,
    message_size: usize,
    priority_max: u32,
}

impl<S: NativeQueueService> QueueHandle<S> {
    pub(crate) fn new(
        service: Arc<S>,
        descriptor: S::Descriptor,
        name: QueueName,
        message_size: usize,
        priority_max: u32,
    ) -> Self {
        Self {
            service,
            descriptor,
            name,
            state: LifecycleState::Open,
            message_size,
            priority_max,
        }
    }

    pub fn name(&self) -> &QueueName {
        &self.name
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == LifecycleState::Open
    }

    /// The native descriptor, or `None` once the handle is closed
    pub fn descriptor(&self) -> Option<S::Descriptor> {
        self.is_open().then_some(self.descriptor)
    }

    /// Largest message this queue accepts, fixed when it was created
    pub fn message_size(&self) -> usize {
        self.message_size
    }

    fn live_descriptor(&self, operation: Operation) -> Result<S::Descriptor> {
        match self.state {
            LifecycleState::Open => Ok(self.descriptor),
            LifecycleState::Closed => Err(QueueError::new(
                ErrorKind::BadDescriptor,
                format!("{} on closed queue '{}'", operation, self.name),
            )),
        }
    }

    fn native_error(&self, code: Errno, operation: Operation) -> QueueError {
        QueueError::from_native(code, operation, &format!("on '{}'", self.name))
    }

    fn check_outgoing(&self, message: &[u8], priority: u32) -> Result<()> {
        if priority > self.priority_max {
            return Err(QueueError::invalid(format!(
                "priority {} exceeds the maximum of {}",
                priority, self.priority_max
            )));
        }
        if message.len() > self.message_size {
            return Err(QueueError::new(
                ErrorKind::MessageTooLarge,
                format!(
                    "message of {} bytes exceeds the {} byte limit of '{}'",
                    message.len(),
                    self.message_size,
                    self.name
                ),
            ));
        }
        Ok(())
    }

    fn check_buffer(&self, capacity: usize) -> Result<()> {
        if capacity < self.message_size {
            return Err(QueueError::new(
                ErrorKind::MessageTooLarge,
                format!(
                    "receive buffer of {} bytes is smaller than the {} byte message size of '{}'",
                    capacity, self.message_size, self.name
                ),
            ));
        }
        Ok(())
    }

    /// Close the descriptor. A second call fails with `BadDescriptor`.
    pub fn close(&mut self) -> Result<()> {
        let descriptor = self.live_descriptor(Operation::Close)?;
        // The descriptor is released even when mq_close reports an error.
        self.state = LifecycleState::Closed;
        self.service
            .close(descriptor)
            .map_err(|code| self.native_error(code, Operation::Close))?;
        debug!("Closed message queue '{}' ({:?})", self.name, descriptor);
        Ok(())
    }

    /// Remove this handle's queue name from the system.
    ///
    /// The handle itself stays open; the kernel keeps the queue alive until
    /// the last descriptor is closed.
    pub fn unlink(&self) -> Result<()> {
        self.service
            .unlink(&self.name)
            .map_err(|code| self.native_error(code, Operation::Unlink))?;
        debug!("Unlinked message queue '{}'", self.name);
        Ok(())
    }

    pub fn send(&self, message: &[u8], priority: u32) -> Result<()> {
        let descriptor = self.live_descriptor(Operation::Send)?;
        self.check_outgoing(message, priority)?;
        self.service
            .send(descriptor, message, priority)
            .map_err(|code| self.native_error(code, Operation::Send))?;
        debug!(
            "Sent {} bytes at priority {} to '{}'",
            message.len(),
            priority,
            self.name
        );
        Ok(())
    }

    pub fn send_str(&self, message: &str, priority: u32) -> Result<()> {
        self.send(message.as_bytes(), priority)
    }

    /// Receive the highest-priority message, allocating a buffer for it
    pub fn receive(&self) -> Result<Message> {
        let mut buffer = vec![0u8; self.message_size];
        let (len, priority) = self.receive_into(&mut buffer)?;
        buffer.truncate(len);
        Ok(Message::new(buffer, priority))
    }

    /// Receive into a caller buffer of at least `message_size()` bytes.
    ///
    /// Returns the message length and its priority.
    pub fn receive_into(&self, buffer: &mut [u8]) -> Result<(usize, u32)> {
        let descriptor = self.live_descriptor(Operation::Receive)?;
        self.check_buffer(buffer.len())?;
        let (len, priority) = self
            .service
            .receive(descriptor, buffer)
            .map_err(|code| self.native_error(code, Operation::Receive))?;
        debug!(
            "Received {} bytes at priority {} from '{}'",
            len, priority, self.name
        );
        Ok((len, priority))
    }

    pub fn receive_string(&self) -> Result<String> {
        self.receive().map(|message| message.text())
    }

    pub fn timed_send(&self, message: &[u8], priority: u32, deadline: Deadline) -> Result<()> {
        let descriptor = self.live_descriptor(Operation::TimedSend)?;
        self.check_outgoing(message, priority)?;
        self.retry_until(deadline, Operation::TimedSend, || {
            self.service
                .timed_send(descriptor, message, priority, deadline)
        })?;
        debug!(
            "Sent {} bytes at priority {} to '{}' before {}",
            message.len(),
            priority,
            self.name,
            deadline
        );
        Ok(())
    }

    pub fn timed_receive(&self, deadline: Deadline) -> Result<Message> {
        let mut buffer = vec![0u8; self.message_size];
        let (len, priority) = self.timed_receive_into(&mut buffer, deadline)?;
        buffer.truncate(len);
        Ok(Message::new(buffer, priority))
    }

    pub fn timed_receive_into(&self, buffer: &mut [u8], deadline: Deadline) -> Result<(usize, u32)> {
        let descriptor = self.live_descriptor(Operation::TimedReceive)?;
        self.check_buffer(buffer.len())?;
        let (len, priority) = self.retry_until(deadline, Operation::TimedReceive, || {
            self.service.timed_receive(descriptor, buffer, deadline)
        })?;
        debug!(
            "Received {} bytes at priority {} from '{}' before {}",
            len, priority, self.name, deadline
        );
        Ok((len, priority))
    }

    /// Run `attempt` until it completes, fails with something other than
    /// `EINTR`, or the deadline passes. The deadline is checked before every
    /// attempt, so an expired deadline never reaches the native layer.
    fn retry_until<T>(
        &self,
        deadline: Deadline,
        operation: Operation,
        mut attempt: impl FnMut() -> NativeResult<T>,
    ) -> Result<T> {
        let mut interruptions = 0u32;
        loop {
            if deadline.has_passed() {
                return Err(QueueError::new(
                    ErrorKind::TimedOut,
                    format!(
                        "{} on '{}' did not complete before {}",
                        operation, self.name, deadline
                    ),
                ));
            }
            match attempt() {
                Ok(value) => return Ok(value),
                Err(Errno::EINTR) => {
                    interruptions += 1;
                    debug!(
                        "{} on '{}' interrupted, retrying ({} so far)",
                        operation, self.name, interruptions
                    );
                }
                Err(code) => return Err(self.native_error(code, operation)),
            }
        }
    }

    pub fn get_attributes(&self) -> Result<QueueAttributes> {
        let descriptor = self.live_descriptor(Operation::GetAttributes)?;
        self.service
            .get_attr(descriptor)
            .map_err(|code| self.native_error(code, Operation::GetAttributes))
    }

    /// Apply `attributes` and return the previous ones.
    ///
    /// Only the blocking mode can change; a different `max_messages` or
    /// `message_size` fails with `InvalidArgument`. `current_messages` is
    /// ignored. The read and the write are two native calls, not one atomic
    /// step.
    pub fn set_attributes(&self, attributes: &QueueAttributes) -> Result<QueueAttributes> {
        let descriptor = self.live_descriptor(Operation::SetAttributes)?;
        let current = self.get_attributes()?;
        attributes.validate_update(&current)?;
        let previous = self
            .service
            .set_attr(descriptor, attributes)
            .map_err(|code| self.native_error(code, Operation::SetAttributes))?;
        debug!(
            "Set '{}' to {} (was {})",
            self.name, attributes.blocking_mode, previous.blocking_mode
        );
        Ok(previous)
    }

    pub fn set_blocking_mode(&self, blocking_mode: BlockingMode) -> Result<QueueAttributes> {
        let current = self.get_attributes()?;
        self.set_attributes(&current.with_blocking_mode(blocking_mode))
    }
}

impl<S: NativeQueueService> fmt::Debug for QueueHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueHandle")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("state", &self.state)
            .field("message_size", &self.message_size)
            .finish()
    }
}

impl<S: NativeQueueService> Drop for QueueHandle<S> {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                warn!("Failed to close message queue '{}' on drop: {}", self.name, e);
            }
        }
    }
}
