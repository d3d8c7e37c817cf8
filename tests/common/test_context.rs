//! Test context with a router whose original destination can be read back

use console_intercept::{ConsoleConfig, Router, StringSink};
use std::sync::Arc;

/// A private router standing in for the process's standard output
pub struct TestContext {
    pub original: Arc<StringSink>,
    pub router: Router,
}

impl TestContext {
    pub fn new() -> Self {
        super::test_util::init_tracing();
        let original = Arc::new(StringSink::new());
        let router = Router::with_original(original.clone(), ConsoleConfig::default());
        Self { original, router }
    }

    pub fn write(&self, text: &str) {
        self.router
            .write_str(text)
            .expect("Failed to write through router");
    }

    pub fn original_content(&self) -> String {
        self.original.contents()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
