//! Routing of writes to the original destination and every active sink

use crate::config::{ConsoleConfig, OutputTarget};
use crate::context::{self, Frame, LogicalContextId};
use crate::error::InterceptError;
use crate::observer::Observer;
use crate::session::Session;
use crate::sink::{Sink, StringSink, WriterSink, same_sink};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, trace};

static NEXT_ROUTER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct RouterId(u64);

/// Fans every write out to an original destination and to the sinks the
/// writing context is intercepting into.
///
/// A write goes to the original destination first, then to the calling
/// context's sinks from the innermost session outwards, then to observers in
/// subscription order. A failing destination does not stop the others; the
/// first error is returned once all of them were attempted.
///
/// The router counts as installed while any context has a live session or
/// any observer is subscribed. The flag is diagnostic only: routing is
/// identical either way, and the process stream itself is never swapped.
/// With no live session and no observer a write simply finds nothing but
/// the original destination to reach.
///
/// Cloning is cheap and yields a handle to the same router.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    id: RouterId,
    name: &'static str,
    original: Arc<dyn Sink>,
    flush_on_write: bool,
    registry: Mutex<Registry>,
    observer_count: AtomicUsize,
}

/// Push/pop bookkeeping shared by all contexts of one router.
#[derive(Default)]
struct Registry {
    /// Live frames per context; a context is retired when its count hits zero.
    contexts: HashMap<LogicalContextId, usize>,
    observers: Vec<Arc<dyn Sink>>,
    installed: bool,
}

impl Registry {
    fn should_be_installed(&self) -> bool {
        !self.contexts.is_empty() || !self.observers.is_empty()
    }
}

impl Router {
    /// A router whose original destination is the configured process stream.
    pub fn new(config: ConsoleConfig) -> Self {
        let original: Arc<dyn Sink> = match config.target {
            OutputTarget::Stdout => Arc::new(WriterSink::new(io::stdout())),
            OutputTarget::Stderr => Arc::new(WriterSink::new(io::stderr())),
        };
        Self::with_original(original, config)
    }

    /// A router whose original destination is `original`, standing in for
    /// the process stream `config.target` names.
    pub fn with_original(original: Arc<dyn Sink>, config: ConsoleConfig) -> Self {
        let id = RouterId(NEXT_ROUTER_ID.fetch_add(1, Ordering::Relaxed));
        debug!(
            router = %config.target,
            id = id.0,
            flush_on_write = config.flush_on_write,
            "Created output router"
        );
        Self {
            inner: Arc::new(RouterInner {
                id,
                name: config.target.name(),
                original,
                flush_on_write: config.flush_on_write,
                registry: Mutex::new(Registry::default()),
                observer_count: AtomicUsize::new(0),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn original(&self) -> &Arc<dyn Sink> {
        &self.inner.original
    }

    /// Whether any context anywhere is intercepting, or any observer listening.
    pub fn is_installed(&self) -> bool {
        self.inner.registry.lock().installed
    }

    /// Number of logical contexts that currently have a live session.
    pub fn active_contexts(&self) -> usize {
        self.inner.registry.lock().contexts.len()
    }

    /// The calling context's id, if it has a live session on this router.
    pub fn current_context(&self) -> Option<LogicalContextId> {
        context::live(context::current_frame(self.inner.id)).map(|frame| frame.context)
    }

    /// Starts copying the calling context's output into `sink`.
    ///
    /// Output keeps reaching the original destination and every session
    /// already active in this context. Fails with
    /// [`InterceptError::DuplicateSink`] if `sink` is one of those.
    pub fn begin_intercept(&self, sink: Arc<dyn Sink>) -> Result<Session, InterceptError> {
        let parent = context::live(context::current_frame(self.inner.id));

        if same_sink(&self.inner.original, &sink)
            || context::chain(parent.as_deref())
                .filter(|frame| !frame.is_disposed())
                .any(|frame| frame.holds(&sink))
        {
            return Err(InterceptError::DuplicateSink);
        }

        let context_id = match &parent {
            Some(parent) => parent.context,
            None => LogicalContextId::next(),
        };
        let frame = Arc::new(Frame::new(context_id, sink, parent));
        context::set_current_frame(self.inner.id, Some(frame.clone()));
        trace!(
            router = %self.inner.name,
            context = %context_id,
            depth = frame.depth(),
            "Pushed intercept frame"
        );

        self.update_registry(|registry| {
            *registry.contexts.entry(context_id).or_insert(0) += 1;
        });

        Ok(Session::new(self.clone(), frame))
    }

    /// Pops `frame`, which must be the calling context's innermost live frame.
    ///
    /// The caller has already marked the frame disposed. Frames above it that
    /// were abandoned earlier do not count.
    pub(crate) fn end_intercept(&self, frame: &Arc<Frame>) -> Result<(), InterceptError> {
        let current = context::current_frame(self.inner.id);
        let innermost = context::chain(current.as_deref())
            .find(|candidate| std::ptr::eq(*candidate, &**frame) || !candidate.is_disposed());
        if !innermost.is_some_and(|innermost| std::ptr::eq(innermost, &**frame)) {
            return Err(InterceptError::OutOfOrderDispose {
                context: frame.context,
            });
        }

        context::set_current_frame(self.inner.id, context::live(frame.parent.clone()));
        trace!(
            router = %self.inner.name,
            context = %frame.context,
            depth = frame.depth(),
            "Popped intercept frame"
        );

        self.release_context(frame.context);
        Ok(())
    }

    /// Gives up on a frame that could not be popped in order.
    ///
    /// The frame stays disposed, so writes and later pops skip it wherever
    /// a copy of it is still reachable; only its live count is dropped.
    pub(crate) fn abandon_intercept(&self, frame: &Arc<Frame>) {
        trace!(
            router = %self.inner.name,
            context = %frame.context,
            depth = frame.depth(),
            "Abandoned intercept frame"
        );
        self.release_context(frame.context);
    }

    fn release_context(&self, context_id: LogicalContextId) {
        self.update_registry(|registry| {
            if let Some(count) = registry.contexts.get_mut(&context_id) {
                *count -= 1;
                if *count == 0 {
                    registry.contexts.remove(&context_id);
                    trace!(context = %context_id, "Retired logical context");
                }
            }
        });
    }

    /// Subscribes a fresh in-memory sink to every write, from every context.
    pub fn observe(&self) -> Observer {
        let sink = Arc::new(StringSink::new());
        self.update_registry(|registry| {
            registry.observers.push(sink.clone());
        });
        self.inner.observer_count.fetch_add(1, Ordering::AcqRel);
        Observer::new(self.clone(), sink)
    }

    pub(crate) fn unobserve(&self, sink: &Arc<dyn Sink>) {
        self.update_registry(|registry| {
            if let Some(index) = registry
                .observers
                .iter()
                .position(|observer| same_sink(observer, sink))
            {
                registry.observers.remove(index);
                self.inner.observer_count.fetch_sub(1, Ordering::AcqRel);
            }
        });
    }

    fn update_registry(&self, update: impl FnOnce(&mut Registry)) {
        let mut registry = self.inner.registry.lock();
        update(&mut registry);

        let should_be_installed = registry.should_be_installed();
        if should_be_installed != registry.installed {
            registry.installed = should_be_installed;
            if should_be_installed {
                debug!(router = %self.inner.name, "Installed output router");
            } else {
                debug!(router = %self.inner.name, "Restored original destination");
            }
        }
    }

    /// Writes `text` to every destination the calling context routes to.
    pub fn write_str(&self, text: &str) -> io::Result<()> {
        let mut first_error = None;
        let mut deliver = |result: io::Result<()>| {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        };

        deliver(self.inner.original.write_str(text));
        if self.inner.flush_on_write {
            deliver(self.inner.original.flush());
        }

        let top = context::current_frame(self.inner.id);
        for frame in context::chain(top.as_deref()).filter(|frame| !frame.is_disposed()) {
            deliver(frame.sink.write_str(text));
        }

        if self.inner.observer_count.load(Ordering::Acquire) > 0 {
            let observers = self.inner.registry.lock().observers.clone();
            for observer in &observers {
                deliver(observer.write_str(text));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Formats `args` once, then routes the result as a single write.
    pub fn write_fmt(&self, args: fmt::Arguments<'_>) -> io::Result<()> {
        match args.as_str() {
            Some(text) => self.write_str(text),
            None => self.write_str(&args.to_string()),
        }
    }

    /// Flushes the original destination and the calling context's sinks.
    pub fn flush(&self) -> io::Result<()> {
        let mut result = self.inner.original.flush();
        let top = context::current_frame(self.inner.id);
        for frame in context::chain(top.as_deref()).filter(|frame| !frame.is_disposed()) {
            let flushed = frame.sink.flush();
            if result.is_ok() {
                result = flushed;
            }
        }
        result
    }
}

thread_local! {
    static PENDING_BYTES: RefCell<HashMap<RouterId, Vec<u8>>> = RefCell::new(HashMap::new());
}

/// Decodes `buf` behind whatever the calling thread left incomplete for this
/// router last time, holding back a trailing partial UTF-8 sequence.
/// Invalid bytes become U+FFFD.
fn decode_utf8(router: RouterId, buf: &[u8]) -> String {
    PENDING_BYTES
        .try_with(|pending| {
            let mut pending = pending.borrow_mut();
            let mut bytes = pending.remove(&router).unwrap_or_default();
            bytes.extend_from_slice(buf);

            let mut text = String::with_capacity(bytes.len());
            let mut rest = &bytes[..];
            loop {
                match std::str::from_utf8(rest) {
                    Ok(valid) => {
                        text.push_str(valid);
                        break;
                    }
                    Err(e) => {
                        let (valid, after) = rest.split_at(e.valid_up_to());
                        // from_utf8 vouched for everything before valid_up_to
                        text.push_str(&String::from_utf8_lossy(valid));
                        match e.error_len() {
                            Some(invalid) => {
                                text.push(char::REPLACEMENT_CHARACTER);
                                rest = &after[invalid..];
                            }
                            None => {
                                pending.insert(router, after.to_vec());
                                break;
                            }
                        }
                    }
                }
            }
            text
        })
        .unwrap_or_else(|_| String::from_utf8_lossy(buf).into_owned())
}

/// Byte-level access for code that expects an [`io::Write`].
///
/// A UTF-8 sequence split across two calls on the same thread is held back
/// until it completes; bytes that can never form valid UTF-8 are replaced.
impl io::Write for &Router {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = decode_utf8(self.inner.id, buf);
        if !text.is_empty() {
            self.write_str(&text)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Router::flush(*self)
    }
}

impl io::Write for Router {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        <&Router as io::Write>::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Router::flush(self)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("name", &self.inner.name)
            .field("installed", &self.is_installed())
            .finish_non_exhaustive()
    }
}
