//! The process-wide routers behind [`print!`](crate::print) and friends
//!
//! Each router captures its process stream the first time it is used and
//! keeps it for the rest of the process. Code that prints through these
//! routers can be intercepted; code that prints through `std::print!` or
//! writes to `std::io::stdout()` directly cannot.

use crate::config::{ConsoleConfig, OutputTarget};
use crate::error::InterceptError;
use crate::observer::Observer;
use crate::router::Router;
use crate::session::Session;
use crate::sink::Sink;
use std::fmt;
use std::sync::{Arc, OnceLock};

static STDOUT: OnceLock<Router> = OnceLock::new();
static STDERR: OnceLock<Router> = OnceLock::new();

/// The router whose original destination is the process's standard output.
pub fn stdout() -> &'static Router {
    STDOUT.get_or_init(|| Router::new(ConsoleConfig::default()))
}

/// The router whose original destination is the process's standard error.
pub fn stderr() -> &'static Router {
    STDERR.get_or_init(|| {
        Router::new(ConsoleConfig {
            target: OutputTarget::Stderr,
            ..ConsoleConfig::default()
        })
    })
}

/// Starts copying the calling context's standard output into `sink`.
///
/// See [`Router::begin_intercept`].
pub fn begin_intercept(sink: Arc<dyn Sink>) -> Result<Session, InterceptError> {
    stdout().begin_intercept(sink)
}

/// Records all standard output, from every context, until dropped.
pub fn observe() -> Observer {
    stdout().observe()
}

#[doc(hidden)]
pub fn _print_to(router: &Router, args: fmt::Arguments<'_>) {
    if let Err(e) = router.write_fmt(args) {
        panic!("failed printing to {}: {}", router.name(), e);
    }
}
