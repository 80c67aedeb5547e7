use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Stdout};
use crate::env::Environment;
use crate::output::report;
use crate::vars::is_valid_name;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Status used when a built-in fails or is misused.
pub const STATUS_BUILTIN_ERROR: ExitCode = 2;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Build the command from its arguments. Defaults to plain `argh` parsing.
    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    /// Executes the command using provided output streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    /// An `Err` is reported on `stderr` and becomes [`STATUS_BUILTIN_ERROR`].
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        mut stdout: Box<dyn Stdout>,
        mut stderr: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match BuiltinCommand::execute(*self, &mut stdout, &mut stderr, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                report(&mut stderr, env, &[&e.to_string()]);
                Ok(STATUS_BUILTIN_ERROR)
            }
        }
    }
}

/// Parse treating every argument as positional, so values such as `-` reach the command.
fn parse_positional<T: FromArgs>(name: &str, args: &[&str]) -> Result<T, EarlyExit> {
    if matches!(args, ["--help"]) {
        return T::from_args(&[name], args);
    }
    let mut all = Vec::with_capacity(args.len() + 1);
    all.push("--");
    all.extend_from_slice(args);
    T::from_args(&[name], &all)
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        mut stdout: Box<dyn Stdout>,
        mut stderr: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.is_error {
            report(&mut stderr, env, &[self.output.trim_end()]);
            Ok(STATUS_BUILTIN_ERROR)
        } else {
            stdout.write_all(self.output.as_bytes())?;
            Ok(0)
        }
    }
}

/// Factory allows creating instances of a [`BuiltinCommand`].
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn create(&self, args: &[&str]) -> Box<dyn ExecutableCommand> {
        match T::parse(args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        }
    }

    fn usage(&self) -> String {
        usage_of::<T>(T::name())
    }
}

fn usage_of<T: FromArgs>(name: &str) -> String {
    match T::from_args(&[name], &["--help"]) {
        Ok(_) => String::new(),
        Err(EarlyExit { output, .. }) => output,
    }
}

/// Mapping from built-in name to the factory creating it.
pub struct Registry {
    factories: BTreeMap<&'static str, Box<dyn CommandFactory>>,
}

impl Registry {
    /// A registry without any built-ins.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub(crate) fn register<T: BuiltinCommand + 'static>(&mut self) {
        self.factories
            .insert(T::name(), Box::new(Factory::<T>::default()));
    }

    pub fn get(&self, name: &str) -> Option<&dyn CommandFactory> {
        self.factories.get(name).map(|factory| factory.as_ref())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }
}

impl Default for Registry {
    /// All built-ins: `alias`, `cd`, `echo`, `env`, `exit`, `export`, `help`,
    /// `history`, `pwd`, `setenv`, `unalias`, `unset`, `unsetenv`.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register::<Alias>();
        registry.register::<Cd>();
        registry.register::<Echo>();
        registry.register::<EnvCmd>();
        registry.register::<Exit>();
        registry.register::<Export>();
        registry.register::<HistoryCmd>();
        registry.register::<Pwd>();
        registry.register::<Setenv>();
        registry.register::<Unalias>();
        registry.register::<Unset>();
        registry.register::<Unsetenv>();

        let mut topics: BTreeMap<&'static str, String> = registry
            .names()
            .filter_map(|name| Some((name, registry.get(name)?.usage())))
            .collect();
        topics.insert("help", usage_of::<Help>("help"));
        registry
            .factories
            .insert("help", Box::new(HelpFactory { topics }));
        registry
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME variable;
/// `-` changes to OLDPWD and prints it.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        parse_positional(Self::name(), args)
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let (target, announce) = match self.target.as_deref() {
            Some("-") => match env.get_var("OLDPWD") {
                Some(old) => (PathBuf::from(old), true),
                None => return Err(anyhow::anyhow!("cd: OLDPWD not set")),
            },
            Some(t) if !t.is_empty() => (PathBuf::from(t), false),
            _ => match env.get_var("HOME") {
                Some(home) => (PathBuf::from(home), false),
                None => return Err(anyhow::anyhow!("cd: no target and HOME not set")),
            },
        };

        let new_dir = if target.is_absolute() {
            target.clone()
        } else {
            env.current_dir.join(&target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .ok()
            .filter(|dir| dir.is_dir())
            .with_context(|| format!("cd: can't cd to {}", target.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't cd to {}", target.display()))?;

        let previous = std::mem::replace(&mut env.current_dir, canonical);
        env.vars
            .set_exported("OLDPWD", previous.to_string_lossy().into_owned());
        env.vars
            .set_exported("PWD", env.current_dir.to_string_lossy().into_owned());
        tracing::debug!(dir = %env.current_dir.display(), "changed directory");

        if announce {
            writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell with the given status (default: status of the last command).
pub struct Exit {
    #[argh(positional)]
    /// exit status; only the low 8 bits are used.
    pub status: Option<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        parse_positional(Self::name(), args)
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let status = match self.status {
            None => env.last_status,
            Some(text) => parse_status(&text)
                .with_context(|| format!("exit: Illegal number: {text}"))?,
        };
        env.exit_request = Some(status);
        Ok(status)
    }
}

fn parse_status(text: &str) -> Option<ExitCode> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = text.parse::<u64>().ok()?;
    Some((value & 0xff) as ExitCode)
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    /// Only leading `-n` words are options; everything else is printed verbatim.
    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        if matches!(args, ["--help"]) {
            return Self::from_args(&[Self::name()], args);
        }
        let flags = args.iter().take_while(|arg| **arg == "-n").count();
        Ok(Echo {
            no_newline: flags > 0,
            args: args[flags..].iter().map(|arg| arg.to_string()).collect(),
        })
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the exported variables, one NAME=value per line.
pub struct EnvCmd {}

impl BuiltinCommand for EnvCmd {
    fn name() -> &'static str {
        "env"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        for (name, value) in env.exported_vars() {
            writeln!(stdout, "{name}={value}")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Set a variable and export it to child processes.
pub struct Setenv {
    #[argh(positional)]
    /// variable name.
    pub name: String,
    #[argh(positional)]
    /// new value; empty when omitted.
    pub value: Option<String>,
}

impl BuiltinCommand for Setenv {
    fn name() -> &'static str {
        "setenv"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        parse_positional(Self::name(), args)
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if !is_valid_name(&self.name) {
            anyhow::bail!("setenv: bad variable name: {}", self.name);
        }
        env.vars
            .set_exported(self.name, self.value.unwrap_or_default());
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Remove variables from the environment.
pub struct Unsetenv {
    #[argh(positional, greedy)]
    /// names of the variables to remove.
    pub names: Vec<String>,
}

impl BuiltinCommand for Unsetenv {
    fn name() -> &'static str {
        "unsetenv"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        parse_positional(Self::name(), args)
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        for name in &self.names {
            env.vars.unset(name);
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Mark variables for export to child processes, or list exported variables.
pub struct Export {
    #[argh(positional, greedy)]
    /// variable names, or name=value pairs to set and export.
    pub names: Vec<String>,
}

impl BuiltinCommand for Export {
    fn name() -> &'static str {
        "export"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        parse_positional(Self::name(), args)
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.names.is_empty() {
            for (name, value) in env.exported_vars() {
                writeln!(stdout, "export {name}={}", single_quoted(value))?;
            }
            return Ok(0);
        }

        let mut status = 0;
        for word in self.names {
            let (name, value) = match word.split_once('=') {
                Some((name, value)) => (name.to_string(), Some(value.to_string())),
                None => (word.clone(), None),
            };
            if !is_valid_name(&name) {
                report(stderr, env, &["export: bad variable name: ", &name]);
                status = STATUS_BUILTIN_ERROR;
                continue;
            }
            match value {
                Some(value) => {
                    env.vars.set_exported(name, value);
                }
                None => {
                    env.vars.export(&name);
                }
            }
        }
        Ok(status)
    }
}

#[derive(FromArgs)]
/// Remove shell variables.
pub struct Unset {
    #[argh(positional, greedy)]
    /// names of the variables to remove.
    pub names: Vec<String>,
}

impl BuiltinCommand for Unset {
    fn name() -> &'static str {
        "unset"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        parse_positional(Self::name(), args)
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        for name in &self.names {
            env.vars.unset(name);
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Define or display aliases.
/// Without arguments every alias is printed as name='value'.
pub struct Alias {
    #[argh(positional, greedy)]
    /// name=value to define, or name to display.
    pub definitions: Vec<String>,
}

impl BuiltinCommand for Alias {
    fn name() -> &'static str {
        "alias"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        parse_positional(Self::name(), args)
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.definitions.is_empty() {
            for (name, value) in env.aliases.iter() {
                writeln!(stdout, "{name}={}", single_quoted(value))?;
            }
            return Ok(0);
        }

        let mut status = 0;
        for definition in &self.definitions {
            match definition.split_once('=') {
                Some((name, value)) if !name.is_empty() => {
                    env.aliases.set(name, value);
                }
                _ => match env.aliases.get(definition) {
                    Some(value) => writeln!(stdout, "{definition}={}", single_quoted(value))?,
                    None => {
                        report(stderr, env, &["alias: ", definition, " not found"]);
                        status = 1;
                    }
                },
            }
        }
        Ok(status)
    }
}

#[derive(FromArgs)]
/// Remove aliases.
pub struct Unalias {
    #[argh(switch, short = 'a')]
    /// remove every alias.
    pub all: bool,

    #[argh(positional, greedy)]
    /// names of the aliases to remove.
    pub names: Vec<String>,
}

impl BuiltinCommand for Unalias {
    fn name() -> &'static str {
        "unalias"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.all {
            env.aliases.clear();
            return Ok(0);
        }
        let mut status = 0;
        for name in &self.names {
            if !env.aliases.unset(name) {
                report(stderr, env, &["unalias: ", name, " not found"]);
                status = 1;
            }
        }
        Ok(status)
    }
}

#[derive(FromArgs)]
/// Display the command history of this session.
pub struct HistoryCmd {
    #[argh(switch, short = 'c')]
    /// clear the history instead of printing it.
    pub clear: bool,
}

impl BuiltinCommand for HistoryCmd {
    fn name() -> &'static str {
        "history"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.clear {
            env.history.clear();
            return Ok(0);
        }
        for (index, line) in env.history.iter().enumerate() {
            writeln!(stdout, "{:5}  {}", index + 1, line)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show the list of built-ins, or the usage of the named ones.
pub struct Help {
    #[argh(positional, greedy)]
    /// built-ins to describe.
    pub names: Vec<String>,
}

struct HelpFactory {
    topics: BTreeMap<&'static str, String>,
}

struct HelpCommand {
    names: Vec<String>,
    topics: BTreeMap<&'static str, String>,
}

impl CommandFactory for HelpFactory {
    fn create(&self, args: &[&str]) -> Box<dyn ExecutableCommand> {
        match parse_positional::<Help>("help", args) {
            Ok(help) => Box::new(HelpCommand {
                names: help.names,
                topics: self.topics.clone(),
            }),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        }
    }

    fn usage(&self) -> String {
        self.topics.get("help").cloned().unwrap_or_default()
    }
}

impl ExecutableCommand for HelpCommand {
    fn execute(
        self: Box<Self>,
        mut stdout: Box<dyn Stdout>,
        mut stderr: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.names.is_empty() {
            writeln!(stdout, "Built-in commands (help NAME for details):")?;
            for name in self.topics.keys() {
                writeln!(stdout, "  {name}")?;
            }
            return Ok(0);
        }

        let mut status = 0;
        for name in &self.names {
            match self.topics.get(name.as_str()) {
                Some(usage) => write!(stdout, "{usage}")?,
                None => {
                    report(&mut stderr, env, &["help: no help topics match ", name]);
                    status = 1;
                }
            }
        }
        Ok(status)
    }
}

/// Quote `value` so that the shell reads it back unchanged.
fn single_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
