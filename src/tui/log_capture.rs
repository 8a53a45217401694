//! In-memory log sink for TUI mode
//!
//! tracing output written to stderr would tear through the alternate screen,
//! so the fmt layer writes here instead and the debug pane drains it.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

/// Lines kept between two drains. Older lines are dropped first.
const DEFAULT_CAPACITY: usize = 500;

/// Shared bounded queue of formatted log lines.
#[derive(Clone)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        // A panic while logging must not take the UI down with it.
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append one line, evicting the oldest when full.
    pub fn push(&self, line: String) {
        let mut lines = self.lock();
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Take every queued line, oldest first.
    pub fn drain(&self) -> Vec<String> {
        self.lock().drain(..).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-event writer. Splits on newlines; a trailing partial line is pushed
/// when the writer is flushed or dropped.
pub struct LineWriter {
    sink: LogBuffer,
    partial: Vec<u8>,
}

impl LineWriter {
    fn new(sink: LogBuffer) -> Self {
        Self {
            sink,
            partial: Vec::new(),
        }
    }

    fn push_bytes(&self, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        self.sink.push(text.trim_end_matches('\r').to_string());
    }
}

impl Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            if self.partial.is_empty() {
                self.push_bytes(&rest[..pos]);
            } else {
                self.partial.extend_from_slice(&rest[..pos]);
                let line = std::mem::take(&mut self.partial);
                self.push_bytes(&line);
            }
            rest = &rest[pos + 1..];
        }
        self.partial.extend_from_slice(rest);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.push_bytes(&line);
        }
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain() {
        let buf = LogBuffer::new();
        buf.push("connected".to_string());
        buf.push("bootstrapped".to_string());
        assert_eq!(buf.len(), 2);

        assert_eq!(buf.drain(), vec!["connected", "bootstrapped"]);
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn test_oldest_lines_evicted() {
        let buf = LogBuffer::with_capacity(3);
        for i in 0..5 {
            buf.push(format!("refresh #{}", i));
        }
        assert_eq!(buf.drain(), vec!["refresh #2", "refresh #3", "refresh #4"]);
    }

    #[test]
    fn test_writer_splits_lines_across_writes() {
        let buf = LogBuffer::new();
        let mut writer = buf.make_writer();

        write!(writer, "INFO sub").unwrap();
        write!(writer, "mitted\nWARN skip").unwrap();
        assert_eq!(buf.drain(), vec!["INFO submitted"]);

        drop(writer);
        assert_eq!(buf.drain(), vec!["WARN skip"]);
    }

    #[test]
    fn test_writer_strips_carriage_return() {
        let buf = LogBuffer::new();
        let mut writer = buf.make_writer();
        writer.write_all(b"line\r\n").unwrap();
        assert_eq!(buf.drain(), vec!["line"]);
    }
}
