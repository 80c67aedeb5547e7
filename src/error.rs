//! Errors that stop the read loop or reach the top level.

use crate::lexer::LexingError;
use rustyline::error::ReadlineError;
use std::io;
use thiserror::Error;

pub type ShellResult<T> = Result<T, ShellError>;

#[derive(Debug, Error)]
pub enum ShellError {
    /// Reading from a script or pipe failed.
    #[error("read error: {0}")]
    Read(#[from] io::Error),

    /// The line editor failed.
    #[error("line editor error: {0}")]
    Editor(ReadlineError),

    /// Input ended inside an unfinished construct, or a `${...}` is malformed.
    #[error("Syntax error: {0}")]
    Syntax(#[from] LexingError),

    /// Ctrl-C at the prompt.
    #[error("interrupted")]
    Interrupted,
}

impl From<ReadlineError> for ShellError {
    fn from(e: ReadlineError) -> Self {
        match e {
            ReadlineError::Interrupted => ShellError::Interrupted,
            ReadlineError::Io(e) => ShellError::Read(e),
            other => ShellError::Editor(other),
        }
    }
}
