use crate::command::Stdout;
use std::cell::RefCell;
use std::io::{Result as IoResult, Write};
use std::process::Stdio;
use std::rc::Rc;

/// Memory-backed writer for capturing output of builtins and diagnostics.
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.borrow()).into_owned()
    }

    /// Return inner Rc so caller can read collected bytes after command execution.
    pub fn into_inner(self) -> Rc<RefCell<Vec<u8>>> {
        self.buf
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl Stdout for MemWriter {
    /// Child processes cannot write into process memory; their output is discarded.
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}

/// Where a command's output stream goes.
#[derive(Debug, Clone)]
pub enum Sink {
    /// The interpreter's own standard output.
    Stdout,
    /// The interpreter's own standard error.
    Stderr,
    /// An in-memory buffer.
    Memory(MemWriter),
}

impl Sink {
    /// A fresh handle for one command.
    pub fn open(&self) -> Box<dyn Stdout> {
        match self {
            Sink::Stdout => Box::new(std::io::stdout()),
            Sink::Stderr => Box::new(std::io::stderr()),
            Sink::Memory(writer) => Box::new(writer.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_buffer() {
        let writer = MemWriter::new();
        let mut handle = Sink::Memory(writer.clone()).open();
        handle.write_all(b"hello ").unwrap();
        let mut other = writer.clone();
        other.write_all(b"world").unwrap();

        assert_eq!(writer.contents(), "hello world");
        assert_eq!(&*writer.into_inner().borrow(), b"hello world");
    }
}
