use crate::context::LogicalContextId;
use thiserror::Error;

/// Errors raised by the interception machinery itself.
///
/// Failures of a sink's own writes are reported as [`std::io::Error`] by the
/// write that hit them and never wrapped here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterceptError {
    /// The sink is already part of the calling context's active chain, or is
    /// the router's original destination.
    #[error("You are already intercepting into this sink")]
    DuplicateSink,

    /// A session was disposed while a session begun after it, in the same
    /// context, is still active.
    #[error(
        "Disposing of sessions out of order is not supported (context {context}); dispose the innermost session first"
    )]
    OutOfOrderDispose { context: LogicalContextId },
}
