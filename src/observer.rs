//! Context-insensitive observation of a router
//!
//! An [`Observer`] sees every write made through its router, from any
//! context, with no nesting rules. It is the simpler alternative to
//! sessions: useful when a whole process run should be recorded, useless
//! when concurrent tests need to tell their output apart.

use crate::lines::Lines;
use crate::router::Router;
use crate::sink::{Sink, StringSink};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// A subscription that records everything written through a router.
#[must_use = "dropping an observer stops recording immediately"]
pub struct Observer {
    router: Router,
    sink: Arc<StringSink>,
    final_text: OnceLock<String>,
}

impl Observer {
    pub(crate) fn new(router: Router, sink: Arc<StringSink>) -> Self {
        Self {
            router,
            sink,
            final_text: OnceLock::new(),
        }
    }

    /// The lines captured so far.
    ///
    /// Trailing line terminators are removed; see [`Lines`] for the exact
    /// splitting rules.
    pub fn read_lines(&self) -> Lines {
        Lines::new(self.to_string())
    }

    pub fn is_disposed(&self) -> bool {
        self.final_text.get().is_some()
    }

    /// Stops recording. The captured text stays readable.
    pub fn dispose(&self) {
        let mut first = false;
        self.final_text.get_or_init(|| {
            first = true;
            let sink: Arc<dyn Sink> = self.sink.clone();
            self.router.unobserve(&sink);
            self.sink.contents()
        });

        if first {
            if let Err(e) = self.sink.close() {
                warn!("Ignored error while closing observer sink: {}", e);
            }
        }
    }
}

impl fmt::Display for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.final_text.get() {
            Some(text) => f.write_str(text),
            None => fmt::Display::fmt(&self.sink, f),
        }
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("router", &self.router.name())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
