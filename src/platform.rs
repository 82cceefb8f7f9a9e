//! # Process-Wide Initialization
//!
//! The native queue facility needs no explicit setup, but the limits it
//! enforces (highest priority, default and maximum queue sizes) are platform
//! properties that this crate validates against. [`init`] probes them once per
//! process and moves the module from [`InitState::Uninitialized`] to
//! [`InitState::Ready`]; further calls return the cached values.

use crate::attributes::QueueAttributes;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Longest queue name accepted, not counting the leading `/`
pub const NAME_MAX: usize = 255;

/// `MQ_PRIO_MAX` guaranteed by Linux; priorities run from 0 to this minus one
const FALLBACK_PRIO_MAX: u32 = 32768;

const MQUEUE_PROC_DIR: &str = "/proc/sys/fs/mqueue";

static LIMITS: OnceCell<PlatformLimits> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Ready,
}

/// Limits of the native queue facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformLimits {
    /// Highest priority a message may carry
    pub priority_max: u32,
    pub name_max: usize,
    /// Capacity used when a queue is created without attributes
    pub default_max_messages: usize,
    pub default_message_size: usize,
    /// Largest capacity an unprivileged process may request
    pub max_messages_ceiling: usize,
    pub message_size_ceiling: usize,
}

impl Default for PlatformLimits {
    fn default() -> Self {
        Self {
            priority_max: FALLBACK_PRIO_MAX - 1,
            name_max: NAME_MAX,
            default_max_messages: crate::defaults::MAX_MESSAGES,
            default_message_size: crate::defaults::MESSAGE_SIZE,
            max_messages_ceiling: crate::defaults::MAX_MESSAGES,
            message_size_ceiling: crate::defaults::MESSAGE_SIZE,
        }
    }
}

impl PlatformLimits {
    fn probe() -> Self {
        let fallback = Self::default();
        let dir = Path::new(MQUEUE_PROC_DIR);
        let limits = Self {
            priority_max: probe_priority_max().unwrap_or(fallback.priority_max),
            name_max: NAME_MAX,
            default_max_messages: read_limit(&dir.join("msg_default"))
                .unwrap_or(fallback.default_max_messages),
            default_message_size: read_limit(&dir.join("msgsize_default"))
                .unwrap_or(fallback.default_message_size),
            max_messages_ceiling: read_limit(&dir.join("msg_max"))
                .unwrap_or(fallback.max_messages_ceiling),
            message_size_ceiling: read_limit(&dir.join("msgsize_max"))
                .unwrap_or(fallback.message_size_ceiling),
        };
        debug!("Probed message queue limits: {:?}", limits);
        limits
    }

    /// Attributes the platform applies to a queue created without any
    pub fn default_attributes(&self) -> QueueAttributes {
        QueueAttributes::new(self.default_max_messages, self.default_message_size)
    }

    /// Whether an unprivileged process may create a queue this large
    pub fn within_ceilings(&self, attributes: &QueueAttributes) -> bool {
        attributes.max_messages <= self.max_messages_ceiling
            && attributes.message_size <= self.message_size_ceiling
    }
}

#[cfg(target_os = "linux")]
fn probe_priority_max() -> Option<u32> {
    // SAFETY: sysconf has no preconditions and only reads configuration.
    let value = unsafe { libc::sysconf(libc::_SC_MQ_PRIO_MAX) };
    if value > 0 {
        u32::try_from(value - 1).ok()
    } else {
        None
    }
}

#[cfg(not(target_os = "linux"))]
fn probe_priority_max() -> Option<u32> {
    None
}

fn read_limit(path: &Path) -> Option<usize> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Probe platform limits once; later calls return the cached result
pub fn init() -> &'static PlatformLimits {
    LIMITS.get_or_init(PlatformLimits::probe)
}

pub fn state() -> InitState {
    if LIMITS.get().is_some() {
        InitState::Ready
    } else {
        InitState::Uninitialized
    }
}
