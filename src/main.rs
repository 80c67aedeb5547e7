use argh::FromArgs;
use homemade_shell::{DEFAULT_HISTORY_SIZE, Environment, Interpreter};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(FromArgs)]
/// Homemade shell: runs commands from a script file, or from standard input
/// when no script is given.
struct Args {
    #[argh(option, default = "DEFAULT_HISTORY_SIZE")]
    /// number of command lines kept in the session history.
    history_size: usize,

    #[argh(positional, greedy)]
    /// script to run, followed by the values of $1, $2, ...
    operands: Vec<String>,
}

fn main() -> ExitCode {
    // Off unless HSH_LOG is set; stderr keeps the command output clean.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_env("HSH_LOG").unwrap_or_else(|_| EnvFilter::new("off")))
        .init();

    let args: Args = argh::from_env();
    let name = std::env::args().next().unwrap_or_else(|| "hsh".to_string());

    let mut operands = args.operands.into_iter();
    let script = operands.next();
    let env = Environment::new(name, operands.collect(), args.history_size);
    let mut sh = Interpreter::new(env);

    let result = match script {
        Some(path) => sh.run_script(Path::new(&path)),
        None => sh.run_stdin(),
    };
    match result {
        Ok(status) => ExitCode::from((status & 0xff) as u8),
        Err(e) => {
            tracing::error!(error = %e, "session aborted");
            eprintln!("{}: {e}", sh.env().name);
            ExitCode::FAILURE
        }
    }
}
