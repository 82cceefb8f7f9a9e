use crate::error::{QueueError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether send/receive wait on a full/empty queue or fail immediately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockingMode {
    #[default]
    Blocking,
    NonBlocking,
}

impl fmt::Display for BlockingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockingMode::Blocking => write!(f, "blocking"),
            BlockingMode::NonBlocking => write!(f, "non-blocking"),
        }
    }
}

/// Snapshot of a queue's configuration and depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueAttributes {
    pub blocking_mode: BlockingMode,
    pub max_messages: usize,
    pub message_size: usize,
    /// Read-only; ignored when creating a queue or setting attributes
    pub current_messages: usize,
}

impl QueueAttributes {
    /// Attributes for creating a queue with the given capacity
    pub fn new(max_messages: usize, message_size: usize) -> Self {
        Self {
            blocking_mode: BlockingMode::Blocking,
            max_messages,
            message_size,
            current_messages: 0,
        }
    }

    pub fn with_blocking_mode(mut self, blocking_mode: BlockingMode) -> Self {
        self.blocking_mode = blocking_mode;
        self
    }

    pub fn is_non_blocking(&self) -> bool {
        self.blocking_mode == BlockingMode::NonBlocking
    }

    pub fn is_full(&self) -> bool {
        self.current_messages >= self.max_messages
    }

    /// Capacity must be positive for a queue to be created
    pub fn validate_for_create(&self) -> Result<()> {
        if self.max_messages == 0 {
            return Err(QueueError::invalid("max_messages must be greater than 0"));
        }
        if self.message_size == 0 {
            return Err(QueueError::invalid("message_size must be greater than 0"));
        }
        Ok(())
    }

    /// Only the blocking mode may change on an existing queue.
    pub fn validate_update(&self, current: &QueueAttributes) -> Result<()> {
        if self.max_messages != current.max_messages {
            return Err(QueueError::invalid(format!(
                "max_messages cannot be changed on an existing queue ({} -> {})",
                current.max_messages, self.max_messages
            )));
        }
        if self.message_size != current.message_size {
            return Err(QueueError::invalid(format!(
                "message_size cannot be changed on an existing queue ({} -> {})",
                current.message_size, self.message_size
            )));
        }
        Ok(())
    }
}

impl Default for QueueAttributes {
    fn default() -> Self {
        Self::new(crate::defaults::MAX_MESSAGES, crate::defaults::MESSAGE_SIZE)
    }
}
