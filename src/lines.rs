//! Line splitting for captured text

/// Lines of a captured snapshot.
///
/// `\n`, `\r` and `\r\n` each terminate a line and are stripped. A trailing
/// terminator does not start another line, so `"foo\r\n"` yields just
/// `"foo"` while `"foo\r\n\r\n\r\n"` yields `"foo"`, `""`, `""`.
///
/// The iterator owns its snapshot; clone it to restart from the current
/// position, or call `read_lines` again for a fresh snapshot.
#[derive(Debug, Clone)]
pub struct Lines {
    text: String,
    position: usize,
}

impl Lines {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position: 0,
        }
    }
}

impl Iterator for Lines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let rest = &self.text[self.position..];
        if rest.is_empty() {
            return None;
        }

        match rest.find(|c: char| c == '\r' || c == '\n') {
            Some(end) => {
                let line = rest[..end].to_owned();
                let bytes = rest.as_bytes();
                let mut consumed = end + 1;
                if bytes[end] == b'\r' && bytes.get(end + 1) == Some(&b'\n') {
                    consumed += 1;
                }
                self.position += consumed;
                Some(line)
            }
            None => {
                self.position = self.text.len();
                Some(rest.to_owned())
            }
        }
    }
}
