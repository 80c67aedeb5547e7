use crate::builtin::{Registry, STATUS_BUILTIN_ERROR};
use crate::command::{ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::error::{ShellError, ShellResult};
use crate::expand::Expander;
use crate::external::{
    ExternalCommand, Resolution, STATUS_NOT_EXECUTABLE, STATUS_NOT_FOUND, SpawnError,
    find_command_path,
};
use crate::io_adapters::Sink;
use crate::lexer::{Lexer, Word};
use crate::output::report;
use crate::reader::{BufferedSource, EditorSource, Input, LineReader, LineSource};
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{self, BufReader, IsTerminal, Write};
use std::path::Path;

/// Prompt shown before each command in interactive mode.
pub const PROMPT: &str = "Homemade shell$ ";

/// Status recorded when Ctrl-C discards the line being typed.
pub const STATUS_INTERRUPTED: ExitCode = 130;

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// The interpreter owns the session [`Environment`] and a [`Registry`] of built-ins.
/// Names not found in the registry are resolved against `PATH` and spawned.
///
/// Example
/// ```
/// use homemade_shell::{Environment, Interpreter};
/// let mut sh = Interpreter::new(Environment::default());
/// let code = sh.run("echo", &["hello", "world"]);
/// assert_eq!(code, 0);
/// assert_eq!(sh.env().last_status, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    builtins: Registry,
    lexer: Lexer,
    stdout: Sink,
    stderr: Sink,
}

impl Interpreter {
    /// Create an interpreter with the default built-ins, writing to the process streams.
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            builtins: Registry::default(),
            lexer: Lexer::default(),
            stdout: Sink::Stdout,
            stderr: Sink::Stderr,
        }
    }

    /// Redirect command output and diagnostics.
    pub fn with_sinks(mut self, stdout: Sink, stderr: Sink) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Run a single command invocation by name with arguments and record its status as `$?`.
    pub fn run(&mut self, name: &str, args: &[&str]) -> ExitCode {
        let status = self.dispatch(name, args, Vec::new());
        self.env.record_status(status);
        status
    }

    /// Expand and run the words of one logical line.
    ///
    /// A line made only of `NAME=value` words sets shell variables. A blank line
    /// leaves `$?` untouched.
    pub fn execute(&mut self, words: Vec<Word>) -> ExitCode {
        if words.is_empty() {
            return self.env.last_status;
        }
        let expanded = Expander::new(&self.env, &self.lexer).expand(words);

        let Some((name, args)) = expanded.argv.split_first() else {
            for (name, value) in expanded.assignments {
                self.env.set_var(name, value);
            }
            self.env.record_status(0);
            return 0;
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let status = self.dispatch(name, &args, expanded.assignments);
        self.env.record_status(status);
        status
    }

    /// Tokenize and run one line of text.
    pub fn run_line(&mut self, line: &str) -> ExitCode {
        match self.lexer.split(line) {
            Ok(words) => self.execute(words),
            Err(error) => self.syntax_error(error.into()),
        }
    }

    fn dispatch(&mut self, name: &str, args: &[&str], assignments: Vec<(String, String)>) -> ExitCode {
        if let Some(factory) = self.builtins.get(name) {
            if !assignments.is_empty() {
                tracing::debug!(name, "assignments before a built-in are ignored");
            }
            tracing::debug!(name, "dispatching built-in");
            let cmd = factory.create(args);
            return self.execute_command(name, cmd);
        }

        let search_paths = self.env.get_var("PATH").unwrap_or_default();
        match find_command_path(OsStr::new(&search_paths), Path::new(name)) {
            Resolution::Found(program) => {
                tracing::debug!(name, program = %program.display(), "dispatching external");
                let cmd = ExternalCommand::new(
                    OsString::from(name),
                    program.into_owned(),
                    args.iter().map(OsString::from).collect(),
                )
                .with_assignments(assignments);
                self.execute_command(name, Box::new(cmd))
            }
            Resolution::NotExecutable(_) => {
                self.report(&[name, ": Permission denied"]);
                STATUS_NOT_EXECUTABLE
            }
            Resolution::NotFound => {
                self.report(&[name, ": not found"]);
                STATUS_NOT_FOUND
            }
        }
    }

    fn execute_command(&mut self, name: &str, cmd: Box<dyn ExecutableCommand>) -> ExitCode {
        let stdout = self.stdout.open();
        let stderr = self.stderr.open();
        let result = cmd.execute(stdout, stderr, &mut self.env);
        // buffered built-in output must reach the stream before the next child writes to it
        self.flush_sinks();
        match result {
            Ok(status) => status,
            Err(e) => match e.downcast_ref::<SpawnError>() {
                Some(spawn) => {
                    self.report(&[name, ": ", &spawn.to_string()]);
                    spawn.status()
                }
                None => {
                    tracing::error!(name, error = %e, "command failed");
                    self.report(&[name, ": ", &e.to_string()]);
                    STATUS_BUILTIN_ERROR
                }
            },
        }
    }

    fn flush_sinks(&self) {
        for sink in [&self.stdout, &self.stderr] {
            if let Err(e) = sink.open().flush() {
                tracing::warn!(error = %e, "failed to flush output");
            }
        }
    }

    fn syntax_error(&mut self, error: ShellError) -> ExitCode {
        self.report(&[&error.to_string()]);
        self.env.record_status(STATUS_BUILTIN_ERROR);
        STATUS_BUILTIN_ERROR
    }

    fn report(&self, fragments: &[&str]) {
        let mut stderr = self.stderr.open();
        report(&mut stderr, &self.env, fragments);
    }

    /// Read-eval loop over `reader` until end of input or `exit`.
    ///
    /// Returns the status the session ends with: the `exit` status when requested,
    /// 0 at the end of terminal input, otherwise the last recorded status.
    /// A syntax error stops non-interactive input with status 2.
    pub fn run_source<S: LineSource>(&mut self, reader: &mut LineReader<S>) -> ShellResult<ExitCode> {
        let interactive = reader.is_interactive();
        let prompt = if interactive { PROMPT } else { "" };

        loop {
            let input = match reader.read_logical(prompt) {
                Ok(input) => input,
                Err(ShellError::Interrupted) => {
                    self.env.record_status(STATUS_INTERRUPTED);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match input {
                Input::Eof => break,
                Input::Line { text, words } => {
                    self.env.line_number = reader.start_line();
                    self.remember(&text);
                    self.execute(words);
                }
                Input::Invalid { text, error } => {
                    self.env.line_number = reader.start_line();
                    self.remember(&text);
                    let status = self.syntax_error(error.into());
                    if !interactive {
                        return Ok(status);
                    }
                }
            }

            if let Some(status) = self.env.exit_request {
                tracing::debug!(status, "exit requested");
                return Ok(status);
            }
        }

        Ok(if interactive { 0 } else { self.env.last_status })
    }

    /// Run every line of the file at `path`.
    ///
    /// A file that cannot be opened is reported as `Can't open` and yields 127.
    pub fn run_script(&mut self, path: &Path) -> ShellResult<ExitCode> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot open script");
                self.env.line_number = 0;
                self.report(&["Can't open ", &path.to_string_lossy()]);
                return Ok(STATUS_NOT_FOUND);
            }
        };
        let mut reader = LineReader::new(BufferedSource::new(BufReader::new(file)), self.lexer.clone());
        self.run_source(&mut reader)
    }

    /// Run commands from standard input: with the line editor on a terminal,
    /// otherwise line by line without prompts.
    pub fn run_stdin(&mut self) -> ShellResult<ExitCode> {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            let mut reader = LineReader::new(EditorSource::new()?, self.lexer.clone());
            self.run_source(&mut reader)
        } else {
            let mut reader = LineReader::new(BufferedSource::new(stdin.lock()), self.lexer.clone());
            self.run_source(&mut reader)
        }
    }

    fn remember(&mut self, text: &str) {
        if !text.trim().is_empty() {
            self.env.history.append(text);
        }
    }
}

impl Default for Interpreter {
    /// An interpreter over the current process environment.
    fn default() -> Self {
        Self::new(Environment::default())
    }
}
