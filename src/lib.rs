//! A small command-line interpreter: the "Homemade shell".
//!
//! Lines are read from a terminal, a pipe or a script file, assembled into
//! logical lines across open quotes, tokenized, expanded (aliases on the
//! command word, then `$` parameters) and dispatched either to a built-in
//! running in-process or to an external program found through `PATH`.
//!
//! The main entry point is [`Interpreter`]. Session state (variables, aliases,
//! history, `$?`) lives in [`Environment`], which is passed explicitly through
//! every stage. The public modules [`command`] and [`env`] expose the traits and
//! types for implementing your own commands and inspecting the session.

pub mod alias;
pub mod builtin;
pub mod command;
pub mod env;
pub mod error;
pub mod expand;
mod external;
pub mod history;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod output;
pub mod reader;
pub mod vars;

#[cfg(test)]
mod test_support;

pub use env::Environment;
pub use error::{ShellError, ShellResult};
pub use external::{Resolution, SpawnError, find_command_path};
pub use history::DEFAULT_HISTORY_SIZE;
/// Just a convenient re-export of the command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, PROMPT};
