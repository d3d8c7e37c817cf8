//! Write destinations for intercepted output
//!
//! A [`Sink`] is shared between the session that registered it and every
//! context that routes writes into it, so it is held as `Arc<dyn Sink>` and
//! mutated through `&self`. Identity (the `Arc` allocation), not content, is
//! what the duplicate-sink check compares.

use crate::lines::Lines;
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A destination for intercepted text.
///
/// Implementations synchronise individual calls however they like, but no
/// ordering is promised between writes arriving from different contexts: two
/// contexts intercepting into the same sink at the same time interleave
/// their output call by call. Sharing one sink between concurrently running
/// contexts is therefore unsupported.
pub trait Sink: Send + Sync {
    fn write_str(&self, text: &str) -> io::Result<()>;

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Whether two sinks are the same instance.
pub(crate) fn same_sink(a: &Arc<dyn Sink>, b: &Arc<dyn Sink>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// An in-memory sink that accumulates everything written to it.
#[derive(Default)]
pub struct StringSink {
    buffer: Mutex<String>,
    closed: AtomicBool,
}

impl StringSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything written so far. Still readable after close.
    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }

    /// The captured text split into lines, see [`Lines`].
    pub fn read_lines(&self) -> Lines {
        Lines::new(self.contents())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Sink for StringSink {
    fn write_str(&self, text: &str) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "cannot write to a closed StringSink",
            ));
        }
        self.buffer.lock().push_str(text);
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

impl fmt::Display for StringSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buffer.lock())
    }
}

impl fmt::Debug for StringSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringSink")
            .field("len", &self.buffer.lock().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Adapts any [`io::Write`] (a file, a process stream, a socket) into a sink.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn write_str(&self, text: &str) -> io::Result<()> {
        self.writer.lock().write_all(text.as_bytes())
    }

    fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }

    fn close(&self) -> io::Result<()> {
        self.flush()
    }
}

impl<W> fmt::Debug for WriterSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterSink").finish_non_exhaustive()
    }
}
