//! Shared test support: an in-memory queue service and property checks that
//! run against any `NativeQueueService`.

#![allow(dead_code)]

use nix::errno::Errno;
use parking_lot::{Condvar, Mutex, MutexGuard};
use pmq_client::native::NativeResult;
use pmq_client::{
    BlockingMode, CreateMode, Deadline, ErrorKind, NativeQueueService, OpenFlags, QueueAttributes,
    QueueClient, QueueName,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct StoredMessage {
    priority: u32,
    sequence: u64,
    payload: Vec<u8>,
}

struct MemoryQueue {
    max_messages: usize,
    message_size: usize,
    messages: Vec<StoredMessage>,
    next_sequence: u64,
}

impl MemoryQueue {
    /// Highest priority first, oldest first within a priority
    fn pop(&mut self) -> Option<StoredMessage> {
        let index = self
            .messages
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.priority
                    .cmp(&b.priority)
                    .then(b.sequence.cmp(&a.sequence))
            })
            .map(|(index, _)| index)?;
        Some(self.messages.remove(index))
    }
}

struct OpenDescription {
    queue_id: u64,
    flags: OpenFlags,
    non_blocking: bool,
}

#[derive(Default)]
struct State {
    names: HashMap<String, u64>,
    queues: HashMap<u64, MemoryQueue>,
    descriptors: HashMap<u32, OpenDescription>,
    next_id: u64,
    next_descriptor: u32,
    pending_interrupts: usize,
}

/// In-process stand-in for the kernel's message queues
///
/// Honours priority/FIFO ordering, capacity, non-blocking descriptors and
/// absolute deadlines. Unlinking removes only the name, as the kernel does.
#[derive(Default)]
pub struct MemoryQueueService {
    state: Mutex<State>,
    changed: Condvar,
}

impl MemoryQueueService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` waits fail with `EINTR`, as a signal would
    pub fn interrupt_next(&self, count: usize) {
        self.state.lock().pending_interrupts = count;
    }

    /// Drop a descriptor behind the handle's back
    pub fn invalidate(&self, descriptor: u32) {
        self.state.lock().descriptors.remove(&descriptor);
    }

    pub fn queue_exists(&self, name: &str) -> bool {
        self.state.lock().names.contains_key(name)
    }

    fn describe(state: &State, descriptor: u32) -> NativeResult<&OpenDescription> {
        state.descriptors.get(&descriptor).ok_or(Errno::EBADF)
    }

    fn register(state: &mut State, queue_id: u64, flags: OpenFlags) -> u32 {
        state.next_descriptor += 1;
        let descriptor = state.next_descriptor;
        state.descriptors.insert(
            descriptor,
            OpenDescription {
                queue_id,
                flags,
                non_blocking: flags.contains(OpenFlags::NON_BLOCKING),
            },
        );
        descriptor
    }

    /// Block until something changes; `None` waits without a bound
    fn wait(&self, state: &mut MutexGuard<'_, State>, deadline: Option<Deadline>) -> NativeResult<()> {
        if state.pending_interrupts > 0 {
            state.pending_interrupts -= 1;
            return Err(Errno::EINTR);
        }
        match deadline {
            None => {
                self.changed.wait(state);
                Ok(())
            }
            Some(deadline) => {
                let remaining = deadline.remaining();
                if remaining.is_zero() {
                    return Err(Errno::ETIMEDOUT);
                }
                self.changed.wait_for(state, remaining);
                Ok(())
            }
        }
    }

    fn do_send(
        &self,
        descriptor: u32,
        message: &[u8],
        priority: u32,
        deadline: Option<Deadline>,
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        loop {
            let open = Self::describe(&state, descriptor)?;
            if !open.flags.can_send() {
                return Err(Errno::EBADF);
            }
            let non_blocking = open.non_blocking;
            let queue_id = open.queue_id;
            let queue = state.queues.get_mut(&queue_id).ok_or(Errno::EBADF)?;
            if message.len() > queue.message_size {
                return Err(Errno::EMSGSIZE);
            }
            if queue.messages.len() < queue.max_messages {
                let sequence = queue.next_sequence;
                queue.next_sequence += 1;
                queue.messages.push(StoredMessage {
                    priority,
                    sequence,
                    payload: message.to_vec(),
                });
                self.changed.notify_all();
                return Ok(());
            }
            if non_blocking {
                return Err(Errno::EAGAIN);
            }
            self.wait(&mut state, deadline)?;
        }
    }

    fn do_receive(
        &self,
        descriptor: u32,
        buffer: &mut [u8],
        deadline: Option<Deadline>,
    ) -> NativeResult<(usize, u32)> {
        let mut state = self.state.lock();
        loop {
            let open = Self::describe(&state, descriptor)?;
            if !open.flags.can_receive() {
                return Err(Errno::EBADF);
            }
            let non_blocking = open.non_blocking;
            let queue_id = open.queue_id;
            let queue = state.queues.get_mut(&queue_id).ok_or(Errno::EBADF)?;
            if buffer.len() < queue.message_size {
                return Err(Errno::EMSGSIZE);
            }
            if let Some(message) = queue.pop() {
                buffer[..message.payload.len()].copy_from_slice(&message.payload);
                self.changed.notify_all();
                return Ok((message.payload.len(), message.priority));
            }
            if non_blocking {
                return Err(Errno::EAGAIN);
            }
            self.wait(&mut state, deadline)?;
        }
    }
}

impl NativeQueueService for MemoryQueueService {
    type Descriptor = u32;

    fn open(&self, name: &QueueName, flags: OpenFlags) -> NativeResult<u32> {
        let mut state = self.state.lock();
        let queue_id = *state.names.get(name.as_str()).ok_or(Errno::ENOENT)?;
        Ok(Self::register(&mut state, queue_id, flags))
    }

    fn open_create(
        &self,
        name: &QueueName,
        flags: OpenFlags,
        _mode: CreateMode,
        attributes: Option<&QueueAttributes>,
    ) -> NativeResult<u32> {
        let mut state = self.state.lock();
        if let Some(&queue_id) = state.names.get(name.as_str()) {
            if flags.contains(OpenFlags::EXCLUSIVE_CREATE) {
                return Err(Errno::EEXIST);
            }
            return Ok(Self::register(&mut state, queue_id, flags));
        }
        let attributes = attributes.copied().unwrap_or_default();
        state.next_id += 1;
        let queue_id = state.next_id;
        state.queues.insert(
            queue_id,
            MemoryQueue {
                max_messages: attributes.max_messages,
                message_size: attributes.message_size,
                messages: Vec::new(),
                next_sequence: 0,
            },
        );
        state.names.insert(name.as_str().to_string(), queue_id);
        Ok(Self::register(&mut state, queue_id, flags))
    }

    fn close(&self, descriptor: u32) -> NativeResult<()> {
        self.state
            .lock()
            .descriptors
            .remove(&descriptor)
            .map(drop)
            .ok_or(Errno::EBADF)
    }

    fn unlink(&self, name: &QueueName) -> NativeResult<()> {
        self.state
            .lock()
            .names
            .remove(name.as_str())
            .map(drop)
            .ok_or(Errno::ENOENT)
    }

    fn get_attr(&self, descriptor: u32) -> NativeResult<QueueAttributes> {
        let state = self.state.lock();
        let open = Self::describe(&state, descriptor)?;
        let queue = state.queues.get(&open.queue_id).ok_or(Errno::EBADF)?;
        Ok(QueueAttributes {
            blocking_mode: if open.non_blocking {
                BlockingMode::NonBlocking
            } else {
                BlockingMode::Blocking
            },
            max_messages: queue.max_messages,
            message_size: queue.message_size,
            current_messages: queue.messages.len(),
        })
    }

    fn set_attr(&self, descriptor: u32, attributes: &QueueAttributes) -> NativeResult<QueueAttributes> {
        let previous = self.get_attr(descriptor)?;
        let mut state = self.state.lock();
        let open = state.descriptors.get_mut(&descriptor).ok_or(Errno::EBADF)?;
        open.non_blocking = attributes.is_non_blocking();
        Ok(previous)
    }

    fn send(&self, descriptor: u32, message: &[u8], priority: u32) -> NativeResult<()> {
        self.do_send(descriptor, message, priority, None)
    }

    fn receive(&self, descriptor: u32, buffer: &mut [u8]) -> NativeResult<(usize, u32)> {
        self.do_receive(descriptor, buffer, None)
    }

    fn timed_send(
        &self,
        descriptor: u32,
        message: &[u8],
        priority: u32,
        deadline: Deadline,
    ) -> NativeResult<()> {
        self.do_send(descriptor, message, priority, Some(deadline))
    }

    fn timed_receive(
        &self,
        descriptor: u32,
        buffer: &mut [u8],
        deadline: Deadline,
    ) -> NativeResult<(usize, u32)> {
        self.do_receive(descriptor, buffer, Some(deadline))
    }
}

pub fn small_queue() -> QueueAttributes {
    QueueAttributes::new(4, 64)
}

fn create<S: NativeQueueService>(
    client: &QueueClient<S>,
    name: &str,
    flags: OpenFlags,
) -> pmq_client::QueueHandle<S> {
    client
        .open_or_create(
            name,
            OpenFlags::READ_WRITE | flags,
            CreateMode::new(0o600),
            Some(small_queue()),
        )
        .expect("create queue")
}

pub fn check_round_trip<S: NativeQueueService>(client: &QueueClient<S>, name: &str) {
    let mut queue = create(client, name, OpenFlags::empty());
    let payloads: [&[u8]; 3] = [b"", b"hello", &[0xAB; 64]];
    for (priority, payload) in payloads.iter().enumerate() {
        queue.send(payload, priority as u32).unwrap();
        let message = queue.receive().unwrap();
        assert_eq!(message.payload, *payload);
        assert_eq!(message.priority, priority as u32);
    }
    queue.close().unwrap();
}

pub fn check_priority_then_fifo<S: NativeQueueService>(client: &QueueClient<S>, name: &str) {
    let mut queue = create(client, name, OpenFlags::empty());
    queue.send(b"low", 1).unwrap();
    queue.send(b"high", 5).unwrap();
    queue.send(b"mid", 3).unwrap();
    let order: Vec<u32> = (0..3).map(|_| queue.receive().unwrap().priority).collect();
    assert_eq!(order, vec![5, 3, 1]);

    queue.send(b"a", 2).unwrap();
    queue.send(b"b", 2).unwrap();
    assert_eq!(queue.receive().unwrap().payload, b"a");
    assert_eq!(queue.receive().unwrap().payload, b"b");
    queue.close().unwrap();
}

pub fn check_open_missing<S: NativeQueueService>(client: &QueueClient<S>, name: &str) {
    let err = client.open(name, OpenFlags::READ_ONLY).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

pub fn check_exclusive_create<S: NativeQueueService>(client: &QueueClient<S>, name: &str) {
    let mut queue = create(client, name, OpenFlags::empty());
    let err = client
        .open_or_create(
            name,
            OpenFlags::READ_WRITE | OpenFlags::EXCLUSIVE_CREATE,
            CreateMode::new(0o600),
            Some(small_queue()),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    queue.close().unwrap();
}

pub fn check_oversized_send<S: NativeQueueService>(client: &QueueClient<S>, name: &str) {
    let mut queue = create(client, name, OpenFlags::empty());
    queue.send(b"keep", 0).unwrap();
    let before = queue.get_attributes().unwrap().current_messages;

    let oversized = vec![0u8; small_queue().message_size + 1];
    let err = queue.send(&oversized, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MessageTooLarge);
    assert_eq!(queue.get_attributes().unwrap().current_messages, before);
    queue.close().unwrap();
}

pub fn check_non_blocking_full<S: NativeQueueService>(client: &QueueClient<S>, name: &str) {
    let mut queue = create(client, name, OpenFlags::NON_BLOCKING);
    for i in 0..small_queue().max_messages {
        queue.send(&[i as u8], 0).unwrap();
    }
    let started = Instant::now();
    let err = queue.send(b"overflow", 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueueFull);
    assert!(started.elapsed() < Duration::from_secs(1));

    for _ in 0..small_queue().max_messages {
        queue.receive().unwrap();
    }
    let err = queue.receive().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueueEmpty);
    queue.close().unwrap();
}

pub fn check_timed_receive_times_out<S: NativeQueueService>(client: &QueueClient<S>, name: &str) {
    let mut queue = create(client, name, OpenFlags::empty());
    let started = Instant::now();
    let err = queue
        .timed_receive(Deadline::after(Duration::from_millis(100)))
        .unwrap_err();
    let elapsed = started.elapsed();
    assert_eq!(err.kind(), ErrorKind::TimedOut);
    assert!(elapsed >= Duration::from_millis(100), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5));
    queue.close().unwrap();
}

pub fn check_timed_send_times_out<S: NativeQueueService>(client: &QueueClient<S>, name: &str) {
    let mut queue = create(client, name, OpenFlags::empty());
    for i in 0..small_queue().max_messages {
        queue.send(&[i as u8], 0).unwrap();
    }
    let started = Instant::now();
    let err = queue
        .timed_send(b"overflow", 0, Deadline::after(Duration::from_millis(100)))
        .unwrap_err();
    let elapsed = started.elapsed();
    assert_eq!(err.kind(), ErrorKind::TimedOut);
    assert!(elapsed >= Duration::from_millis(100), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5));
    assert_eq!(
        queue.get_attributes().unwrap().current_messages,
        small_queue().max_messages
    );
    queue.close().unwrap();
}

pub fn check_double_close<S: NativeQueueService>(client: &QueueClient<S>, name: &str) {
    let mut queue = create(client, name, OpenFlags::empty());
    queue.close().unwrap();
    assert_eq!(queue.close().unwrap_err().kind(), ErrorKind::BadDescriptor);
}

pub fn check_attribute_mutation<S: NativeQueueService>(client: &QueueClient<S>, name: &str) {
    let mut queue = create(client, name, OpenFlags::empty());
    let current = queue.get_attributes().unwrap();
    assert_eq!(current.blocking_mode, BlockingMode::Blocking);

    let resized = QueueAttributes {
        max_messages: current.max_messages + 1,
        ..current
    };
    assert_eq!(
        queue.set_attributes(&resized).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );

    let toggled = current.with_blocking_mode(BlockingMode::NonBlocking);
    let previous = queue.set_attributes(&toggled).unwrap();
    assert_eq!(previous.blocking_mode, BlockingMode::Blocking);
    let after = queue.get_attributes().unwrap();
    assert_eq!(after.blocking_mode, BlockingMode::NonBlocking);
    assert_eq!(after.max_messages, current.max_messages);

    assert_eq!(queue.receive().unwrap_err().kind(), ErrorKind::QueueEmpty);
    queue.close().unwrap();
}
