//! Execution contexts.
//!
//! A context is a thread with an identity the access monitor knows about.
//! Code running inside one receives an [`ExecContext`], the only way to
//! touch channel data; every call checks the grant table before doing
//! anything. An `ExecContext` has no public constructor and never leaves
//! its thread, so code handed one cannot act under any other identity.
//! Spawning a context needs the monitor's `Arc`, which only its owner
//! holds, and a channel answers to the first monitor that governs it.
//!
//! A context ends in one of three ways, recorded as its [`ContextExit`]:
//! its body returns, it panics, or the monitor faults it.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::{ChannelError, SystemError};
use crate::IPC::{ChannelHandle, Structs::Message};
use crate::Security::{AccessMonitor, ContextId, PermissionFault, Rights};

pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// How a context stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextExit {
    Returned,
    Faulted(PermissionFault),
    Panicked(String),
}

impl fmt::Display for ContextExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextExit::Returned => f.write_str("returned"),
            ContextExit::Faulted(fault) => write!(f, "faulted ({fault})"),
            ContextExit::Panicked(msg) => write!(f, "panicked ({msg})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Returned,
    Faulted,
    Panicked,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContextState::Running => "running",
            ContextState::Returned => "returned",
            ContextState::Faulted => "faulted",
            ContextState::Panicked => "panicked",
        })
    }
}

/// Operator requests delivered to a running context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Try to read the channel this context was never granted.
    ProbeUnauthorized,
}

#[derive(Debug, Clone)]
pub struct ContextSpec {
    pub id: ContextId,
    pub name: String,
    pub stack_size: usize,
}

impl ContextSpec {
    pub fn new(id: ContextId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }
}

/// Fill pattern for the unused part of a context stack.
const STACK_PAINT: usize = 0xA5A5_A5A5_A5A5_A5A5_u64 as usize;
const WORD: usize = std::mem::size_of::<usize>();
/// Kept clear of paint at the far end of the stack: thread-local storage,
/// the guard page and whatever ran before the body.
const PAINT_RESERVE: usize = 16 * 1024;
/// Kept clear of paint just below the painting frame.
const PAINT_GAP: usize = 1024;

/// High-water stack depth of one context.
///
/// On Linux the thread paints the free part of its own stack at entry.
/// Sampling scans up from the bottom of the painted band for the first word
/// that was overwritten, so anything that ever ran deeper (a sink, a
/// `tracing` call, a recursive handler) shows up even if it returned long
/// before the sample. Elsewhere only the sampling frame's own depth is seen.
///
/// Only the owning thread paints and scans. Other threads read `deepest`.
#[derive(Debug, Default)]
struct StackProbe {
    base: AtomicUsize,
    painted_low: AtomicUsize,
    painted_high: AtomicUsize,
    deepest: AtomicUsize,
}

impl StackProbe {
    #[inline(never)]
    fn marker() -> usize {
        let marker = 0u8;
        std::hint::black_box(&marker) as *const u8 as usize
    }

    /// Record the entry depth and paint the rest. Call first thing on the
    /// context thread.
    fn arm(&self, stack_size: usize) {
        let base = Self::marker();
        self.base.store(base, Ordering::Relaxed);

        let floor = base.saturating_sub(stack_size.saturating_sub(PAINT_RESERVE));
        if let Some((low, high)) = paint_below(floor) {
            self.painted_low.store(low, Ordering::Relaxed);
            self.painted_high.store(high, Ordering::Relaxed);
        }
    }

    /// Fold the deepest point reached so far into the high-water mark.
    /// Owning thread only.
    #[inline(never)]
    fn sample(&self) {
        let base = self.base.load(Ordering::Relaxed);
        if base == 0 {
            return;
        }
        let mut depth = base.abs_diff(Self::marker());

        let low = self.painted_low.load(Ordering::Relaxed);
        let high = self.painted_high.load(Ordering::Relaxed);
        if low != 0 {
            let floor = low + untouched_above(low, high);
            depth = depth.max(base.saturating_sub(floor));
        }
        self.deepest.fetch_max(depth, Ordering::Relaxed);
    }

    fn headroom(&self, stack_size: usize) -> usize {
        stack_size.saturating_sub(self.deepest.load(Ordering::Relaxed))
    }
}

/// Paint from just below the caller's frame down to `floor`. Returns the
/// painted band, or `None` if there is no room.
#[cfg(target_os = "linux")]
#[inline(never)]
fn paint_below(floor: usize) -> Option<(usize, usize)> {
    let high = StackProbe::marker().saturating_sub(PAINT_GAP) & !(WORD - 1);
    let low = (floor + WORD - 1) & !(WORD - 1);
    if low == 0 || low >= high {
        return None;
    }
    let mut addr = low;
    while addr < high {
        // SAFETY: [low, high) lies below every live frame of this thread and
        // above its guard page (PAINT_RESERVE). Linux maps thread stacks in
        // full at creation.
        unsafe { std::ptr::write_volatile(addr as *mut usize, STACK_PAINT) };
        addr += WORD;
    }
    Some((low, high))
}

#[cfg(not(target_os = "linux"))]
fn paint_below(_floor: usize) -> Option<(usize, usize)> {
    None
}

/// Bytes of intact paint from `low` upward.
fn untouched_above(low: usize, high: usize) -> usize {
    let mut addr = low;
    // SAFETY: same band `paint_below` wrote, read on the owning thread
    // while it is alive.
    while addr < high && unsafe { std::ptr::read_volatile(addr as *const usize) } == STACK_PAINT {
        addr += WORD;
    }
    addr - low
}

struct ContextShared {
    spec: ContextSpec,
    directive: Mutex<Option<Directive>>,
    directive_pending: AtomicBool,
    blocked_on: Mutex<Option<ChannelHandle>>,
    stack: StackProbe,
    exit: Mutex<Option<ContextExit>>,
}

/// Capability-checked access to channels, held by code running inside a
/// context.
///
/// Neither `Send` nor `Sync`: it is created on the context thread and stays
/// there.
pub struct ExecContext {
    shared: Arc<ContextShared>,
    monitor: Arc<AccessMonitor>,
    _not_send: PhantomData<*const ()>,
}

impl ExecContext {
    pub fn id(&self) -> ContextId {
        self.shared.spec.id
    }

    pub fn name(&self) -> &str {
        &self.shared.spec.name
    }

    /// Non-blocking send. Needs `SEND` on `channel`.
    pub fn try_send(&self, channel: &ChannelHandle, message: Message) -> Result<(), ChannelError> {
        self.monitor.check(self.id(), channel.channel(), Rights::SEND);
        channel.channel().try_enqueue(message)
    }

    /// Non-blocking receive. Needs `RECV` on `channel`.
    pub fn try_recv(&self, channel: &ChannelHandle) -> Option<Message> {
        self.monitor.check(self.id(), channel.channel(), Rights::RECV);
        channel.channel().try_dequeue()
    }

    /// Block until `channel` yields a message. Needs `RECV`.
    pub fn recv_wait(&self, channel: &ChannelHandle) -> Message {
        self.monitor.check(self.id(), channel.channel(), Rights::RECV);
        channel.channel().dequeue_wait()
    }

    /// Block until `channel` yields a message or a directive is posted to
    /// this context. `None` means: call [`take_directive`](Self::take_directive).
    pub fn recv_wait_or_directive(&self, channel: &ChannelHandle) -> Option<Message> {
        self.monitor.check(self.id(), channel.channel(), Rights::RECV);
        *self.shared.blocked_on.lock() = Some(channel.clone());
        let received = channel
            .channel()
            .dequeue_wait_interruptible(&self.shared.directive_pending);
        *self.shared.blocked_on.lock() = None;
        received
    }

    pub fn take_directive(&self) -> Option<Directive> {
        let mut slot = self.shared.directive.lock();
        self.shared.directive_pending.store(false, Ordering::SeqCst);
        slot.take()
    }

    /// Fold the deepest stack use so far into the headroom figure.
    pub fn sample_stack(&self) {
        self.shared.stack.sample();
    }
}

/// Owner-side handle to a spawned context.
pub struct ContextHandle {
    shared: Arc<ContextShared>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl ContextHandle {
    pub fn id(&self) -> ContextId {
        self.shared.spec.id
    }

    pub fn name(&self) -> &str {
        &self.shared.spec.name
    }

    pub fn exit(&self) -> Option<ContextExit> {
        self.shared.exit.lock().clone()
    }

    pub fn state(&self) -> ContextState {
        match self.shared.exit.lock().as_ref() {
            None => ContextState::Running,
            Some(ContextExit::Returned) => ContextState::Returned,
            Some(ContextExit::Faulted(_)) => ContextState::Faulted,
            Some(ContextExit::Panicked(_)) => ContextState::Panicked,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == ContextState::Running
    }

    /// Stack never touched as of the context's last sample, in bytes.
    /// Frames the runtime pushed before the body started are not counted.
    pub fn stack_headroom(&self) -> usize {
        self.shared.stack.headroom(self.shared.spec.stack_size)
    }

    /// Post `directive` and wake the context if it is parked on a channel.
    /// Returns `false` if the context already stopped.
    pub fn post(&self, directive: Directive) -> bool {
        if !self.is_running() {
            return false;
        }
        {
            let mut slot = self.shared.directive.lock();
            *slot = Some(directive);
            self.shared.directive_pending.store(true, Ordering::SeqCst);
        }
        if let Some(channel) = self.shared.blocked_on.lock().as_ref() {
            channel.channel().wake_waiters();
        }
        debug!(context = %self.name(), ?directive, "directive posted");
        true
    }

    /// Wait for the context to stop and return how it stopped.
    ///
    /// Blocks forever on a context whose body never returns and never
    /// faults.
    pub fn wait_exit(&self) -> ContextExit {
        {
            let mut join = self.join.lock();
            if let Some(handle) = join.take() {
                if let Err(payload) = handle.join() {
                    self.shared
                        .exit
                        .lock()
                        .get_or_insert_with(|| ContextExit::Panicked(panic_message(&*payload)));
                }
            }
        }
        self.exit()
            .unwrap_or_else(|| ContextExit::Panicked("context thread vanished".to_owned()))
    }
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHandle")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

/// Start `body` on a new thread running as context `spec.id`.
pub fn spawn<F>(
    spec: ContextSpec,
    monitor: Arc<AccessMonitor>,
    body: F,
) -> Result<ContextHandle, SystemError>
where
    F: FnOnce(ExecContext) + Send + 'static,
{
    let name = spec.name.clone();
    let stack_size = spec.stack_size;
    let shared = Arc::new(ContextShared {
        spec,
        directive: Mutex::new(None),
        directive_pending: AtomicBool::new(false),
        blocked_on: Mutex::new(None),
        stack: StackProbe::default(),
        exit: Mutex::new(None),
    });

    let thread_shared = Arc::clone(&shared);
    let join = thread::Builder::new()
        .name(name.clone())
        .stack_size(stack_size)
        .spawn(move || {
            thread_shared.stack.arm(stack_size);
            let ctx = ExecContext {
                shared: Arc::clone(&thread_shared),
                monitor,
                _not_send: PhantomData,
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(move || body(ctx)));
            thread_shared.stack.sample();
            let exit = match outcome {
                Ok(()) => ContextExit::Returned,
                Err(payload) => match payload.downcast::<PermissionFault>() {
                    Ok(fault) => ContextExit::Faulted(*fault),
                    Err(other) => ContextExit::Panicked(panic_message(&*other)),
                },
            };
            match &exit {
                ContextExit::Returned => info!(context = %thread_shared.spec.name, "context returned"),
                ContextExit::Faulted(fault) => error!(
                    context = %thread_shared.spec.name,
                    channel = %fault.channel_name,
                    "context terminated by permission fault"
                ),
                ContextExit::Panicked(msg) => {
                    error!(context = %thread_shared.spec.name, panic = %msg, "context panicked")
                }
            }
            *thread_shared.exit.lock() = Some(exit);
        })
        .map_err(|source| SystemError::Spawn {
            what: name.clone(),
            source,
        })?;

    debug!(context = %name, stack_size, "context spawned");
    Ok(ContextHandle {
        shared,
        join: Mutex::new(Some(join)),
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
