use crate::env::Environment;
use anyhow::Result;
use std::io::Write;
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Children killed by signal `N` are reported as `128 + N`.
pub type ExitCode = i32;

/// Abstraction over a writable output stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// A blanket implementation exists for any type that implements `Write` and `Into<Stdio>`
/// (e.g. `Stdout` or `Stderr`).
pub trait Stdout: Write {
    /// Convert this output into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Write + Into<Stdio>> Stdout for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Executes the command, returning its exit status.
    fn execute(
        self: Box<Self>,
        stdout: Box<dyn Stdout>,
        stderr: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Factory that creates a command from its arguments.
///
/// One factory is registered per built-in name.
pub trait CommandFactory {
    /// Create a command instance for the provided arguments.
    fn create(&self, args: &[&str]) -> Box<dyn ExecutableCommand>;

    /// Usage text shown by `help`.
    fn usage(&self) -> String;
}
