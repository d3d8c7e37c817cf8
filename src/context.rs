//! Per-context interception state and its propagation
//!
//! Every thread owns a [`Context`]: for each router, the innermost frame of
//! the chain of sinks it is currently intercepting into. Frames link to
//! their parent, so the chain is the frame plus its ancestors.
//!
//! Child work does not see its parent's context on its own. It has to be
//! handed a copy taken with [`Context::current`], either through
//! [`spawn`] for threads or [`Context::wrap`] / [`ContextExt`] for futures.
//! The copy is a value: frames pushed or popped later on either side never
//! cross over, which is how captures flow forward into children but never
//! back into the parent or sideways into siblings.

use crate::router::RouterId;
use crate::sink::{Sink, same_sink};
use parking_lot::{Mutex, MutexGuard};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::num::NonZeroU64;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{self, Poll};
use std::thread;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: RefCell<Context> = RefCell::new(Context::default());
}

/// Identifies one logical execution context while it has frames alive.
///
/// Assigned when a context with no live frame begins intercepting, shared
/// by every frame pushed on top of that and by child work inheriting them,
/// and retired once all of those frames are disposed. Ids are never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalContextId(NonZeroU64);

impl LogicalContextId {
    pub(crate) fn next() -> Self {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        // the counter starts at one and a u64 does not wrap in practice
        Self(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
    }

    pub fn as_u64(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for LogicalContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry in a context's chain of active sinks.
pub(crate) struct Frame {
    pub(crate) context: LogicalContextId,
    pub(crate) sink: Arc<dyn Sink>,
    pub(crate) parent: Option<Arc<Frame>>,
    disposed: AtomicBool,
    /// Serialises dispose attempts, so a rejected attempt that briefly marks
    /// the frame cannot make a concurrent valid one return without popping.
    dispose_lock: Mutex<()>,
}

impl Frame {
    pub(crate) fn new(
        context: LogicalContextId,
        sink: Arc<dyn Sink>,
        parent: Option<Arc<Frame>>,
    ) -> Self {
        Self {
            context,
            sink,
            parent,
            disposed: AtomicBool::new(false),
            dispose_lock: Mutex::new(()),
        }
    }

    pub(crate) fn lock_dispose(&self) -> MutexGuard<'_, ()> {
        self.dispose_lock.lock()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Marks the frame disposed, returning whether it already was.
    pub(crate) fn mark_disposed(&self) -> bool {
        self.disposed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn unmark_disposed(&self) {
        self.disposed.store(false, Ordering::Release);
    }

    pub(crate) fn holds(&self, sink: &Arc<dyn Sink>) -> bool {
        same_sink(&self.sink, sink)
    }

    /// Number of frames in the chain ending here, disposed ones included.
    pub(crate) fn depth(&self) -> usize {
        chain(Some(self)).count()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("context", &self.context)
            .field("depth", &self.depth())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

/// Walks from `frame` outwards through its ancestors.
pub(crate) fn chain(frame: Option<&Frame>) -> Chain<'_> {
    Chain { next: frame }
}

pub(crate) struct Chain<'a> {
    next: Option<&'a Frame>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Frame;

    fn next(&mut self) -> Option<&'a Frame> {
        let frame = self.next?;
        self.next = frame.parent.as_deref();
        Some(frame)
    }
}

/// The innermost frame at or above `frame` that has not been disposed.
pub(crate) fn live(mut frame: Option<Arc<Frame>>) -> Option<Arc<Frame>> {
    while let Some(current) = frame {
        if !current.is_disposed() {
            return Some(current);
        }
        frame = current.parent.clone();
    }
    None
}

pub(crate) fn current_frame(router: RouterId) -> Option<Arc<Frame>> {
    CURRENT
        .try_with(|current| current.borrow().frames.get(&router).cloned())
        .ok()
        .flatten()
}

pub(crate) fn set_current_frame(router: RouterId, frame: Option<Arc<Frame>>) {
    // during thread teardown the slot is gone and there is nothing to update
    let _ = CURRENT.try_with(|current| {
        let mut current = current.borrow_mut();
        match frame {
            Some(frame) => current.frames.insert(router, frame),
            None => current.frames.remove(&router),
        };
    });
}

/// A snapshot of the interception state of one logical context.
#[derive(Clone, Default)]
pub struct Context {
    frames: HashMap<RouterId, Arc<Frame>>,
}

impl Context {
    /// A copy of the calling thread's context.
    pub fn current() -> Self {
        CURRENT
            .try_with(|current| current.borrow().clone())
            .unwrap_or_default()
    }

    /// Whether this context routes into at least one live sink.
    pub fn is_intercepting(&self) -> bool {
        self.frames.values().any(|frame| live(Some(frame.clone())).is_some())
    }

    /// Runs `f` with this context installed as the calling thread's context.
    ///
    /// Sessions begun and ended inside `f` update `self`; the thread's own
    /// context is put back afterwards, also when `f` panics.
    pub fn in_scope<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let _entered = Entered::new(self);
        f()
    }

    /// Wraps `future` so every poll runs inside this context.
    pub fn wrap<F: Future>(self, future: F) -> WithContext<F> {
        WithContext {
            context: self,
            inner: Some(Box::pin(future)),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.frames.values().map(|frame| frame.context))
            .finish()
    }
}

/// Swaps a context into the thread slot and back out on drop.
struct Entered<'a> {
    context: &'a mut Context,
}

impl<'a> Entered<'a> {
    fn new(context: &'a mut Context) -> Self {
        swap_current(context);
        Self { context }
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        swap_current(self.context);
    }
}

fn swap_current(context: &mut Context) {
    let _ = CURRENT.try_with(|current| std::mem::swap(&mut *current.borrow_mut(), context));
}

/// A future that runs inside its own copy of a [`Context`].
///
/// Created by [`Context::wrap`] or [`ContextExt::in_current_context`].
pub struct WithContext<F> {
    context: Context,
    inner: Option<Pin<Box<F>>>,
}

impl<F: Future> Future for WithContext<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<F::Output> {
        let this = self.get_mut();
        let inner = &mut this.inner;
        this.context.in_scope(|| {
            let Some(future) = inner.as_mut() else {
                return Poll::Pending;
            };
            let poll = future.as_mut().poll(cx);
            if poll.is_ready() {
                // drop the finished future while its context is still installed
                *inner = None;
            }
            poll
        })
    }
}

impl<F> Drop for WithContext<F> {
    fn drop(&mut self) {
        // sessions held by a cancelled future end inside the future's context
        if let Some(future) = self.inner.take() {
            self.context.in_scope(move || drop(future));
        }
    }
}

impl<F> fmt::Debug for WithContext<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithContext")
            .field("context", &self.context)
            .field("done", &self.inner.is_none())
            .finish()
    }
}

/// Propagates the calling context into a future.
pub trait ContextExt: Future + Sized {
    /// Captures [`Context::current`] now, at creation time, not at first poll.
    fn in_current_context(self) -> WithContext<Self> {
        Context::current().wrap(self)
    }
}

impl<F: Future> ContextExt for F {}

/// Spawns a thread that inherits the calling thread's context.
pub fn spawn<F, T>(f: F) -> thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let mut context = Context::current();
    thread::spawn(move || context.in_scope(f))
}
