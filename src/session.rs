use crate::context::{Frame, LogicalContextId};
use crate::error::InterceptError;
use crate::router::Router;
use crate::sink::Sink;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// An active interception, ended by [`Session::dispose`] or by dropping it.
///
/// Sessions of one context must end innermost first. Disposal is checked
/// against the context that calls it, so end a session from the context (or
/// the future) that began it.
#[must_use = "dropping a session ends the interception immediately"]
pub struct Session {
    router: Router,
    frame: Arc<Frame>,
}

impl Session {
    pub(crate) fn new(router: Router, frame: Arc<Frame>) -> Self {
        Self { router, frame }
    }

    pub fn context(&self) -> LogicalContextId {
        self.frame.context
    }

    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.frame.sink
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn is_disposed(&self) -> bool {
        self.frame.is_disposed()
    }

    /// Ends the interception.
    ///
    /// Calling it again afterwards is a no-op, also from several threads at
    /// once: attempts are serialised and at most one of them pops. If a
    /// session begun later in the same context is still active this fails
    /// with [`InterceptError::OutOfOrderDispose`] and leaves the session
    /// active, so it can still be ended once the inner one is.
    pub fn dispose(&self) -> Result<(), InterceptError> {
        self.release(false)
    }

    fn release(&self, abandon_on_error: bool) -> Result<(), InterceptError> {
        let _attempt = self.frame.lock_dispose();
        if self.frame.mark_disposed() {
            return Ok(());
        }

        match self.router.end_intercept(&self.frame) {
            Ok(()) => Ok(()),
            Err(e) if abandon_on_error => {
                self.router.abandon_intercept(&self.frame);
                Err(e)
            }
            Err(e) => {
                self.frame.unmark_disposed();
                Err(e)
            }
        }
    }
}

/// A session dropped out of order, or away from its context, cannot be
/// retried later, so it is abandoned: its sink stops receiving output at
/// once and the frame is skipped when the sessions around it end.
impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.release(true) {
            warn!("Abandoned intercept session dropped out of order: {}", e);
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("router", &self.router.name())
            .field("frame", &self.frame)
            .finish()
    }
}
