use crate::command::{ExecutableCommand, ExitCode, Stdout};
use crate::env::Environment;
use anyhow::Result;
use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use thiserror::Error;

/// Status for a command that could not be found.
pub const STATUS_NOT_FOUND: ExitCode = 127;
/// Status for a command that was found but could not be executed.
pub const STATUS_NOT_EXECUTABLE: ExitCode = 126;

/// Outcome of resolving a command name to a program file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// An executable file.
    Found(Cow<'a, Path>),
    /// A file exists but lacks execute permission (or is a directory).
    NotExecutable(Cow<'a, Path>),
    NotFound,
}

/// Failure to start a program that was already resolved to an executable file.
///
/// Always reported as [`STATUS_NOT_EXECUTABLE`], e.g. for a missing `#!` interpreter.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("Permission denied")]
    PermissionDenied,
    #[error("cannot execute: {0}")]
    Io(io::Error),
}

impl SpawnError {
    pub fn status(&self) -> ExitCode {
        STATUS_NOT_EXECUTABLE
    }
}

impl From<io::Error> for SpawnError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::PermissionDenied => SpawnError::PermissionDenied,
            _ => SpawnError::Io(e),
        }
    }
}

/// Command that is not a builtin.
pub struct ExternalCommand {
    name: OsString,
    program: PathBuf,
    args: Vec<OsString>,
    assignments: Vec<(String, String)>,
}

impl ExternalCommand {
    /// `name` is what the user typed and becomes `argv[0]`; `program` is the resolved file.
    pub fn new(name: OsString, program: PathBuf, args: Vec<OsString>) -> Self {
        Self {
            name,
            program,
            args,
            assignments: Vec::new(),
        }
    }

    /// Extra variables visible to this child only.
    pub fn with_assignments(mut self, assignments: Vec<(String, String)>) -> Self {
        self.assignments = assignments;
        self
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        stdout: Box<dyn Stdout>,
        stderr: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(stdout.stdio())
            .stderr(stderr.stdio())
            .env_clear()
            .envs(env.exported_vars())
            .envs(self.assignments.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&env.current_dir);
        set_arg0(&mut cmd, &self.name);

        let mut child = cmd.spawn().map_err(SpawnError::from)?;
        tracing::debug!(program = %self.program.display(), pid = child.id(), "spawned");
        let exit_status = child.wait()?;
        let status = match exit_status.code() {
            Some(x) => x,
            None => terminated_by_signal(exit_status),
        };
        tracing::debug!(program = %self.program.display(), status, "child finished");
        Ok(status)
    }
}

#[cfg(unix)]
fn set_arg0(cmd: &mut std::process::Command, name: &OsStr) {
    use std::os::unix::process::CommandExt;
    cmd.arg0(name);
}

#[cfg(not(unix))]
fn set_arg0(_cmd: &mut std::process::Command, _name: &OsStr) {}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: checks that exact file.
/// - Relative with multiple components (e.g., `bin/sh`) or `./foo`: checks it relative to the
///   current directory.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first executable match. When only non-executable matches exist the first
///   of them is reported as [`Resolution::NotExecutable`].
/// - Empty path: not found.
///
/// Returns either a borrowed reference to the provided `path` or an owned `PathBuf`
/// when the result is discovered via PATH lookup.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Resolution<'a> {
    if path.is_absolute() {
        return check_path(path);
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        // Empty path -> not found
        (None, None) => Resolution::NotFound,
        (Some(std::path::Component::Normal(x)), None) => find_in_path(search_paths, x),
        // `./foo`, `../foo`, `bin/sh` -> relative to the current dir
        _ => check_path(path),
    }
}

fn find_in_path<'a>(search_paths: &OsStr, cmd: &OsStr) -> Resolution<'a> {
    let mut denied = None;
    for dir in std::env::split_paths(search_paths) {
        let candidate = dir.join(cmd);
        match access(&candidate) {
            Access::Executable => return Resolution::Found(Cow::Owned(candidate)),
            Access::Denied if denied.is_none() => denied = Some(candidate),
            _ => {}
        }
    }
    match denied {
        Some(path) => Resolution::NotExecutable(Cow::Owned(path)),
        None => Resolution::NotFound,
    }
}

enum Access {
    Executable,
    Denied,
    Missing,
}

fn access(path: &Path) -> Access {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && is_executable(&meta) => Access::Executable,
        Ok(_) => Access::Denied,
        Err(_) => Access::Missing,
    }
}

fn check_path(path: &Path) -> Resolution<'_> {
    match access(path) {
        Access::Executable => Resolution::Found(Cow::Borrowed(path)),
        Access::Denied => Resolution::NotExecutable(Cow::Borrowed(path)),
        Access::Missing => Resolution::NotFound,
    }
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    true
}
