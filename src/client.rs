use crate::attributes::QueueAttributes;
use crate::error::{Operation, QueueError, Result};
use crate::flags::{CreateMode, OpenFlags};
use crate::handle::QueueHandle;
use crate::name::QueueName;
use crate::native::NativeQueueService;
use crate::platform::{self, PlatformLimits};
use std::sync::Arc;
use tracing::{debug, warn};

#[cfg(target_os = "linux")]
use crate::native::PosixQueueService;

/// Entry point for opening, creating and unlinking named queues
///
/// Validates names, flags and attributes before anything reaches the native
/// service, and hands out [`QueueHandle`]s for the queues it opens.
#[derive(Debug)]
pub struct QueueClient<S: NativeQueueService> {
    service: Arc<S>,
    limits: PlatformLimits,
}

#[cfg(target_os = "linux")]
impl QueueClient<PosixQueueService> {
    /// A client for the kernel's POSIX message queues
    pub fn native() -> Self {
        Self::new(PosixQueueService::new())
    }
}

impl<S: NativeQueueService> QueueClient<S> {
    /// Create a client, initializing the process-wide platform limits if needed
    pub fn new(service: S) -> Self {
        Self::with_limits(service, *platform::init())
    }

    pub fn with_limits(service: S, limits: PlatformLimits) -> Self {
        Self {
            service: Arc::new(service),
            limits,
        }
    }

    pub fn limits(&self) -> &PlatformLimits {
        &self.limits
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Open an existing queue. `CREATE` is rejected; use [`Self::open_or_create`].
    pub fn open(&self, name: impl AsRef<str>, flags: OpenFlags) -> Result<QueueHandle<S>> {
        let name = QueueName::new(name.as_ref())?;
        flags.validate()?;
        if flags.contains(OpenFlags::CREATE) {
            return Err(QueueError::invalid(
                "open does not create queues; use open_or_create",
            ));
        }

        let descriptor = self
            .service
            .open(&name, flags)
            .map_err(|code| QueueError::from_native(code, Operation::Open, &format!("'{}'", name)))?;
        debug!("Opened message queue '{}' with descriptor {:?}", name, descriptor);
        self.attach(name, descriptor)
    }

    /// Open a queue, creating it first if it does not exist.
    ///
    /// `CREATE` is implied. With `EXCLUSIVE_CREATE` the call fails with
    /// `AlreadyExists` when the queue is present. `None` attributes leave the
    /// capacity to the platform defaults. The blocking mode of a new queue's
    /// descriptor comes from `NON_BLOCKING` in `flags`, not from `attributes`.
    pub fn open_or_create(
        &self,
        name: impl AsRef<str>,
        flags: OpenFlags,
        mode: CreateMode,
        attributes: Option<QueueAttributes>,
    ) -> Result<QueueHandle<S>> {
        let name = QueueName::new(name.as_ref())?;
        let flags = flags | OpenFlags::CREATE;
        flags.validate()?;
        if let Some(attributes) = &attributes {
            attributes.validate_for_create()?;
        }

        let descriptor = self
            .service
            .open_create(&name, flags, mode, attributes.as_ref())
            .map_err(|code| {
                QueueError::from_native(code, Operation::Create, &format!("'{}'", name))
            })?;
        debug!(
            "Opened or created message queue '{}' (mode {}, {:?}) with descriptor {:?}",
            name, mode, attributes, descriptor
        );
        self.attach(name, descriptor)
    }

    /// Remove a queue name. Open descriptors keep working until closed.
    pub fn unlink(&self, name: impl AsRef<str>) -> Result<()> {
        let name = QueueName::new(name.as_ref())?;
        self.service
            .unlink(&name)
            .map_err(|code| QueueError::from_native(code, Operation::Unlink, &format!("'{}'", name)))?;
        debug!("Unlinked message queue '{}'", name);
        Ok(())
    }

    /// Wrap a fresh descriptor, learning the queue's fixed message size.
    fn attach(&self, name: QueueName, descriptor: S::Descriptor) -> Result<QueueHandle<S>> {
        let attributes = match self.service.get_attr(descriptor) {
            Ok(attributes) => attributes,
            Err(code) => {
                if let Err(close_err) = self.service.close(descriptor) {
                    warn!("Failed to release descriptor for '{}': {}", name, close_err);
                }
                return Err(QueueError::from_native(
                    code,
                    Operation::GetAttributes,
                    &format!("'{}'", name),
                ));
            }
        };
        Ok(QueueHandle::new(
            Arc::clone(&self.service),
            descriptor,
            name,
            attributes.message_size,
            self.limits.priority_max,
        ))
    }
}
