use std::fmt;

/// The process stream a router treats as its original destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputTarget {
    #[default]
    Stdout,
    Stderr,
}

impl OutputTarget {
    pub fn name(self) -> &'static str {
        match self {
            OutputTarget::Stdout => "stdout",
            OutputTarget::Stderr => "stderr",
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for an output [`Router`](crate::Router)
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// The process stream that receives every write, whether or not any
    /// interception is active.
    pub target: OutputTarget,

    /// Whether to flush the original destination after every routed write.
    /// The process streams are line buffered, so partial lines otherwise
    /// show up late.
    pub flush_on_write: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            target: OutputTarget::Stdout,
            flush_on_write: false,
        }
    }
}
