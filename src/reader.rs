//! Acquisition of logical lines.
//!
//! A logical line is one or more physical lines joined by `\n` until the
//! tokenizer accepts the text, i.e. every quote opened on the line is closed
//! and it does not end in an escaping backslash.

use crate::error::ShellResult;
use crate::lexer::{Lexer, LexingError, Word};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::BufRead;

/// Prompt printed while a logical line is still open.
pub const CONTINUATION_PROMPT: &str = "> ";

/// A provider of physical lines.
pub trait LineSource {
    /// Next physical line without its terminator, or `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> ShellResult<Option<String>>;

    /// Whether a person is typing the input.
    fn is_interactive(&self) -> bool {
        false
    }

    /// Called with every complete, non-blank logical line.
    fn remember(&mut self, _line: &str) {}
}

/// Terminal input through the `rustyline` editor.
pub struct EditorSource {
    editor: DefaultEditor,
}

impl EditorSource {
    pub fn new() -> ShellResult<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> ShellResult<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn is_interactive(&self) -> bool {
        true
    }

    fn remember(&mut self, line: &str) {
        if let Err(e) = self.editor.add_history_entry(line) {
            tracing::warn!(error = %e, "failed to update editor history");
        }
    }
}

/// Scripts and piped standard input. Prompts are never printed.
pub struct BufferedSource<R> {
    reader: R,
}

impl<R: BufRead> BufferedSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for BufferedSource<R> {
    fn read_line(&mut self, _prompt: &str) -> ShellResult<Option<String>> {
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }
}

/// One unit of work for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A complete logical line and its words.
    Line { text: String, words: Vec<Word> },
    /// A logical line the tokenizer rejected for good.
    Invalid { text: String, error: LexingError },
    /// No more input.
    Eof,
}

/// Assembles logical lines from a [`LineSource`], counting physical lines.
pub struct LineReader<S> {
    source: S,
    lexer: Lexer,
    lines_read: usize,
    start_line: usize,
}

impl<S: LineSource> LineReader<S> {
    pub fn new(source: S, lexer: Lexer) -> Self {
        Self {
            source,
            lexer,
            lines_read: 0,
            start_line: 0,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.source.is_interactive()
    }

    /// 1-based number of the physical line the last logical line started on.
    pub fn start_line(&self) -> usize {
        self.start_line
    }

    /// Read the next logical line, showing `prompt` before its first physical line.
    ///
    /// While the text ends inside a quote or after an escaping backslash another
    /// physical line is read (with [`CONTINUATION_PROMPT`] on a terminal) and
    /// appended after a newline. Each physical line is scanned once; the whole
    /// text is tokenized only when it is complete. End of input in that state
    /// yields [`Input::Invalid`] for an open quote; a dangling backslash is dropped.
    pub fn read_logical(&mut self, prompt: &str) -> ShellResult<Input> {
        let Some(mut text) = self.source.read_line(prompt)? else {
            return Ok(Input::Eof);
        };
        self.lines_read += 1;
        self.start_line = self.lines_read;

        let continuation = if self.is_interactive() {
            CONTINUATION_PROMPT
        } else {
            ""
        };
        let mut scanner = self.lexer.scanner();
        scanner.feed(&text);

        let input = loop {
            match scanner.pending() {
                Some(error) if error.needs_more_input() => {
                    tracing::debug!(%error, line = self.lines_read, "reading continuation line");
                    match self.source.read_line(continuation)? {
                        Some(next) => {
                            self.lines_read += 1;
                            text.push('\n');
                            text.push_str(&next);
                            scanner.feed("\n");
                            scanner.feed(&next);
                        }
                        None => break self.finish_at_eof(text, error),
                    }
                }
                _ => {
                    break match self.lexer.split(&text) {
                        Ok(words) => Input::Line { text, words },
                        Err(error) => Input::Invalid { text, error },
                    };
                }
            }
        };

        if let Input::Line { text, .. } | Input::Invalid { text, .. } = &input {
            if !text.trim().is_empty() {
                self.source.remember(text);
            }
        }
        Ok(input)
    }

    fn finish_at_eof(&self, mut text: String, error: LexingError) -> Input {
        if error == LexingError::TrailingEscape {
            text.pop();
            return match self.lexer.split(&text) {
                Ok(words) => Input::Line { text, words },
                Err(error) => Input::Invalid { text, error },
            };
        }
        Input::Invalid { text, error }
    }
}
