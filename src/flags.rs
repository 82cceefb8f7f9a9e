use crate::error::{QueueError, Result};
use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Flags for opening a queue
    ///
    /// The bit layout is this crate's own and never leaks to the kernel; the
    /// native service translates it to the platform encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        /// Receive only
        const READ_ONLY = 0b000_0001;
        /// Send only
        const WRITE_ONLY = 0b000_0010;
        /// Send and receive
        const READ_WRITE = 0b000_0100;
        /// Close the descriptor on exec
        const CLOSE_ON_EXEC = 0b000_1000;
        /// Create the queue if it does not exist
        const CREATE = 0b001_0000;
        /// Fail if the queue already exists (with CREATE)
        const EXCLUSIVE_CREATE = 0b010_0000;
        /// Fail instead of waiting on a full or empty queue
        const NON_BLOCKING = 0b100_0000;
    }
}

impl OpenFlags {
    const ACCESS_MODES: OpenFlags = OpenFlags::READ_ONLY
        .union(OpenFlags::WRITE_ONLY)
        .union(OpenFlags::READ_WRITE);

    /// Check the combination rules: exactly one access mode, and
    /// `EXCLUSIVE_CREATE` only together with `CREATE`.
    pub fn validate(self) -> Result<()> {
        let access = self.intersection(Self::ACCESS_MODES);
        if access.bits().count_ones() != 1 {
            return Err(QueueError::invalid(format!(
                "exactly one of READ_ONLY, WRITE_ONLY, READ_WRITE must be set (got {:?})",
                self
            )));
        }
        if self.contains(OpenFlags::EXCLUSIVE_CREATE) && !self.contains(OpenFlags::CREATE) {
            return Err(QueueError::invalid(
                "EXCLUSIVE_CREATE is only meaningful together with CREATE",
            ));
        }
        Ok(())
    }

    pub fn can_send(self) -> bool {
        self.intersects(OpenFlags::WRITE_ONLY | OpenFlags::READ_WRITE)
    }

    pub fn can_receive(self) -> bool {
        self.intersects(OpenFlags::READ_ONLY | OpenFlags::READ_WRITE)
    }
}

/// Permission bits applied to a newly created queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CreateMode(u32);

impl CreateMode {
    /// Only permission, setuid/setgid and sticky bits are kept
    pub const fn new(bits: u32) -> Self {
        Self(bits & 0o7777)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl Default for CreateMode {
    fn default() -> Self {
        Self::new(crate::defaults::CREATE_MODE)
    }
}

impl fmt::Display for CreateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}
