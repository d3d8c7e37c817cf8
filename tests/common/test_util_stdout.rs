//! Byte-level writer whose output can be inspected after it was handed off

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Captured writer content, shared between clones
#[derive(Clone)]
pub struct CapturedStdout {
    content: Arc<Mutex<Vec<u8>>>,
    flushes: Arc<Mutex<usize>>,
}

impl CapturedStdout {
    pub fn new() -> Self {
        Self {
            content: Arc::new(Mutex::new(Vec::new())),
            flushes: Arc::new(Mutex::new(0)),
        }
    }

    pub fn get_content(&self) -> String {
        let content = self.content.lock().unwrap();
        String::from_utf8_lossy(&content).to_string()
    }

    pub fn flush_count(&self) -> usize {
        *self.flushes.lock().unwrap()
    }
}

impl Default for CapturedStdout {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for CapturedStdout {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.content.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        *self.flushes.lock().unwrap() += 1;
        Ok(())
    }
}
