use super::{NativeQueueService, NativeResult};
use crate::attributes::{BlockingMode, QueueAttributes};
use crate::deadline::Deadline;
use crate::flags::{CreateMode, OpenFlags};
use crate::name::QueueName;
use nix::errno::Errno;
use nix::mqueue::{
    mq_close, mq_getattr, mq_open, mq_receive, mq_send, mq_setattr, mq_unlink, MQ_OFlag, MqAttr,
    MqdT,
};
use nix::sys::stat::Mode;
use std::mem::ManuallyDrop;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use tracing::trace;

/// POSIX message queues via `mq_open(3)` and friends
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixQueueService;

impl PosixQueueService {
    pub fn new() -> Self {
        Self
    }
}

/// Translate the crate's flag layout to the platform encoding
fn to_oflag(flags: OpenFlags) -> MQ_OFlag {
    let mut oflag = MQ_OFlag::empty();
    if flags.contains(OpenFlags::READ_ONLY) {
        oflag |= MQ_OFlag::O_RDONLY;
    }
    if flags.contains(OpenFlags::WRITE_ONLY) {
        oflag |= MQ_OFlag::O_WRONLY;
    }
    if flags.contains(OpenFlags::READ_WRITE) {
        oflag |= MQ_OFlag::O_RDWR;
    }
    if flags.contains(OpenFlags::CLOSE_ON_EXEC) {
        oflag |= MQ_OFlag::O_CLOEXEC;
    }
    if flags.contains(OpenFlags::CREATE) {
        oflag |= MQ_OFlag::O_CREAT;
    }
    if flags.contains(OpenFlags::EXCLUSIVE_CREATE) {
        oflag |= MQ_OFlag::O_EXCL;
    }
    if flags.contains(OpenFlags::NON_BLOCKING) {
        oflag |= MQ_OFlag::O_NONBLOCK;
    }
    oflag
}

fn to_mq_attr(attributes: &QueueAttributes) -> MqAttr {
    let flags = match attributes.blocking_mode {
        BlockingMode::Blocking => 0,
        BlockingMode::NonBlocking => MQ_OFlag::O_NONBLOCK.bits(),
    };
    MqAttr::new(
        flags as _,
        attributes.max_messages as _,
        attributes.message_size as _,
        attributes.current_messages as _,
    )
}

fn from_mq_attr(attr: &MqAttr) -> QueueAttributes {
    let blocking_mode = if attr.flags() & (libc::O_NONBLOCK as libc::c_long) != 0 {
        BlockingMode::NonBlocking
    } else {
        BlockingMode::Blocking
    };
    QueueAttributes {
        blocking_mode,
        max_messages: attr.maxmsg() as usize,
        message_size: attr.msgsize() as usize,
        current_messages: attr.curmsgs() as usize,
    }
}

/// Borrow a descriptor owned elsewhere without closing it afterwards
fn borrow_mqd<T>(fd: RawFd, f: impl FnOnce(&MqdT) -> T) -> T {
    // SAFETY: `fd` came from a successful mq_open and the wrapper is never
    // dropped, so ownership stays with the caller's handle.
    let mqd = ManuallyDrop::new(unsafe { MqdT::from_raw_fd(fd) });
    f(&mqd)
}

impl NativeQueueService for PosixQueueService {
    type Descriptor = RawFd;

    fn open(&self, name: &QueueName, flags: OpenFlags) -> NativeResult<RawFd> {
        let mqd = mq_open(name.as_str(), to_oflag(flags), Mode::empty(), None)?;
        Ok(mqd.as_raw_fd())
    }

    fn open_create(
        &self,
        name: &QueueName,
        flags: OpenFlags,
        mode: CreateMode,
        attributes: Option<&QueueAttributes>,
    ) -> NativeResult<RawFd> {
        let attr = attributes.map(to_mq_attr);
        let mqd = mq_open(
            name.as_str(),
            to_oflag(flags | OpenFlags::CREATE),
            Mode::from_bits_truncate(mode.bits() as _),
            attr.as_ref(),
        )?;
        Ok(mqd.as_raw_fd())
    }

    fn close(&self, descriptor: RawFd) -> NativeResult<()> {
        // SAFETY: the caller gives up the descriptor; mq_close consumes it.
        mq_close(unsafe { MqdT::from_raw_fd(descriptor) })
    }

    fn unlink(&self, name: &QueueName) -> NativeResult<()> {
        mq_unlink(name.as_str())
    }

    fn get_attr(&self, descriptor: RawFd) -> NativeResult<QueueAttributes> {
        let attr = borrow_mqd(descriptor, mq_getattr)?;
        Ok(from_mq_attr(&attr))
    }

    fn set_attr(&self, descriptor: RawFd, attributes: &QueueAttributes) -> NativeResult<QueueAttributes> {
        let new_attr = to_mq_attr(attributes);
        let old = borrow_mqd(descriptor, |mqd| mq_setattr(mqd, &new_attr))?;
        Ok(from_mq_attr(&old))
    }

    fn send(&self, descriptor: RawFd, message: &[u8], priority: u32) -> NativeResult<()> {
        trace!("mq_send fd={} len={} prio={}", descriptor, message.len(), priority);
        borrow_mqd(descriptor, |mqd| mq_send(mqd, message, priority))
    }

    fn receive(&self, descriptor: RawFd, buffer: &mut [u8]) -> NativeResult<(usize, u32)> {
        let mut priority = 0u32;
        let len = borrow_mqd(descriptor, |mqd| mq_receive(mqd, buffer, &mut priority))?;
        trace!("mq_receive fd={} len={} prio={}", descriptor, len, priority);
        Ok((len, priority))
    }

    fn timed_send(
        &self,
        descriptor: RawFd,
        message: &[u8],
        priority: u32,
        deadline: Deadline,
    ) -> NativeResult<()> {
        let timespec = deadline.to_timespec();
        let abs_timeout: &libc::timespec = timespec.as_ref();
        trace!("mq_timedsend fd={} len={} deadline={}", descriptor, message.len(), deadline);
        // SAFETY: the pointers reference live buffers for the duration of the call.
        let res = unsafe {
            libc::mq_timedsend(
                descriptor as libc::mqd_t,
                message.as_ptr() as *const libc::c_char,
                message.len(),
                priority as libc::c_uint,
                abs_timeout,
            )
        };
        Errno::result(res).map(drop)
    }

    fn timed_receive(
        &self,
        descriptor: RawFd,
        buffer: &mut [u8],
        deadline: Deadline,
    ) -> NativeResult<(usize, u32)> {
        let timespec = deadline.to_timespec();
        let abs_timeout: &libc::timespec = timespec.as_ref();
        let mut priority: libc::c_uint = 0;
        // SAFETY: `buffer` is valid for `buffer.len()` writable bytes.
        let res = unsafe {
            libc::mq_timedreceive(
                descriptor as libc::mqd_t,
                buffer.as_mut_ptr() as *mut libc::c_char,
                buffer.len(),
                &mut priority,
                abs_timeout,
            )
        };
        let len = Errno::result(res)? as usize;
        trace!("mq_timedreceive fd={} len={} prio={}", descriptor, len, priority);
        Ok((len, priority as u32))
    }
}
