use crate::alias::Aliases;
use crate::command::ExitCode;
use crate::history::{DEFAULT_HISTORY_SIZE, History};
use crate::vars::Variables;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable session state threaded through the interpreter.
///
/// The environment contains:
/// - `vars`, `aliases`, `history`: the session's state stores.
/// - `current_dir`: the working directory for command execution.
/// - `name`, `positional`, `pid`, `last_status`: sources of `$0`, `$1..`, `$$` and `$?`.
/// - `line_number`: input line the current command started on, used in diagnostics.
/// - `exit_request`: set by `exit`; the driver loop stops once it is present.
///
/// Fields are public so built-ins can reach the stores directly.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Shell variables; exported ones form the environment of child processes.
    pub vars: Variables,
    /// Alias definitions applied to the command word.
    pub aliases: Aliases,
    /// Raw input lines of this session.
    pub history: History,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// Invocation name of the interpreter (`$0`).
    pub name: String,
    /// Positional parameters (`$1`, `$2`, ...).
    pub positional: Vec<String>,
    /// Process id of the interpreter (`$$`).
    pub pid: u32,
    /// Status of the most recently completed command (`$?`).
    pub last_status: ExitCode,
    /// Line number of the command being executed.
    pub line_number: usize,
    /// Status the session should terminate with, once requested.
    pub exit_request: Option<ExitCode>,
}

impl Environment {
    /// Capture the current process state into a new session.
    ///
    /// Variables are imported from `std::env::vars()` (all exported) and
    /// `current_dir` from `std::env::current_dir()`. History starts empty.
    pub fn new(name: impl Into<String>, positional: Vec<String>, history_size: usize) -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars: Variables::from_process(),
            aliases: Aliases::default(),
            history: History::new(history_size),
            current_dir,
            name: name.into(),
            positional,
            pid: std::process::id(),
            last_status: 0,
            line_number: 0,
            exit_request: None,
        }
    }

    /// Value of a parameter: special names (`?`, `$`, `#`, `0`-`9`) first,
    /// then shell variables.
    pub fn get_var(&self, key: &str) -> Option<String> {
        match key {
            "?" => Some(self.last_status.to_string()),
            "$" => Some(self.pid.to_string()),
            "#" => Some(self.positional.len().to_string()),
            "0" => Some(self.name.clone()),
            _ => match key.parse::<usize>() {
                Ok(index) if key.bytes().all(|b| b.is_ascii_digit()) => {
                    index.checked_sub(1).and_then(|i| self.positional.get(i).cloned())
                }
                _ => self.vars.get(key).map(str::to_owned),
            },
        }
    }

    /// Set or override a shell variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.set(key, val);
    }

    /// Record the status of a completed command as `$?`.
    pub fn record_status(&mut self, status: ExitCode) {
        self.last_status = status;
    }

    /// Exported variables as handed to child processes.
    pub fn exported_vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.exported()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new("hsh", Vec::new(), DEFAULT_HISTORY_SIZE)
    }
}
