//! console-intercept - Scoped, nested capture of standard output
//!
//! This crate copies everything a delimited region of code prints into
//! sinks of the caller's choosing, while the real output stream keeps
//! receiving all of it. Captures nest, must end innermost first, and are
//! kept apart per thread, task or async continuation: a test capturing its
//! output never sees output printed by another test running next to it.
//!
//! ```no_run
//! use console_intercept::{StringSink, begin_intercept, println};
//! use std::sync::Arc;
//!
//! let sink = Arc::new(StringSink::new());
//! let session = begin_intercept(sink.clone()).unwrap();
//! println!("hello");
//! session.dispose().unwrap();
//! assert_eq!(sink.contents(), "hello\n");
//! ```

mod macros;

pub mod config;
pub mod console;
pub mod context;
pub mod error;
pub mod lines;
pub mod observer;
pub mod router;
pub mod session;
pub mod sink;

pub use config::{ConsoleConfig, OutputTarget};
pub use console::{begin_intercept, observe, stderr, stdout};
pub use context::{Context, ContextExt, LogicalContextId, WithContext, spawn};
pub use error::InterceptError;
pub use lines::Lines;
pub use observer::Observer;
pub use router::Router;
pub use session::Session;
pub use sink::{Sink, StringSink, WriterSink};
