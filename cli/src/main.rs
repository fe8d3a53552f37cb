//! The `chore` binary.
//!
//! Host flags are parsed here; everything after them is the script CLI's
//! argument vector, dispatched through the engine. The script file is
//! discovered by walking ancestor directories, and the process chdirs to
//! it before evaluation so relative paths in the script behave the same
//! from any subdirectory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use chore_engine::{EXIT_USAGE, Engine, Outcome};
use chore_runtime::CacheStore;
use chore_script::{Services, Session};

#[derive(Debug, Parser)]
#[command(name = "chore", version)]
#[command(about = "Run project commands declared in a chore.star file")]
struct Cli {
    /// Path to the script file, discovered upwards from the working
    /// directory.
    #[arg(short = 'f', long, default_value = "chore.star")]
    file: String,

    /// Run as if started from this directory.
    #[arg(short = 'C', long)]
    directory: Option<PathBuf>,

    /// Cache directory (default: $XDG_CACHE_HOME/chore).
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Ignore stored values in the cache.
    #[arg(short = 'n', long)]
    no_cache: bool,

    /// Print debug logs.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Print the command paths and flag names the script declares, one
    /// per line, and exit. Intended for completion tooling.
    #[arg(long)]
    list_commands: bool,

    /// Command path, flags, and arguments for the script's CLI.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    argv: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("chore: {message}");
            ExitCode::from(EXIT_USAGE as u8)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "chore=debug" } else { "chore=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    let start = match &cli.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| format!("current dir: {e}"))?,
    };
    let script_dir = find_script_upwards(&start, &cli.file)
        .ok_or_else(|| format!("no `{}` found in `{}` or any parent", cli.file, start.display()))?;
    std::env::set_current_dir(&script_dir)
        .map_err(|e| format!("chdir to `{}`: {e}", script_dir.display()))?;
    debug!(dir = %script_dir.display(), "running from script directory");

    let cache_dir = cli.cache_dir.clone().unwrap_or_else(CacheStore::default_dir);
    let cache = if cli.no_cache {
        CacheStore::bypassed(cache_dir)
    } else {
        CacheStore::new(cache_dir)
    };
    let services = Arc::new(Services::new(cache, script_dir.clone()));

    let script_path = script_dir.join(&cli.file);
    let (session, registry) = match Session::load(&script_path, Arc::clone(&services)) {
        Ok(loaded) => loaded,
        Err(err) => return Err(err.to_string()),
    };
    let engine = Engine::new(registry);

    if cli.list_commands {
        for entry in engine.tree().completion_entries() {
            if entry.flags.is_empty() {
                println!("{}", entry.path.join(" "));
            } else {
                println!("{}\t--{}", entry.path.join(" "), entry.flags.join(" --"));
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = engine.run(&cli.argv, &session);
    match &outcome {
        Outcome::Success(_) => {}
        Outcome::Help(text) => print!("{text}"),
        Outcome::Usage { error, help } => {
            eprintln!("chore: {error}");
            eprintln!();
            eprint!("{help}");
        }
        Outcome::Failure(error) => {
            eprintln!("chore: {error}");
        }
    }

    // Scripts may leave spawned tasks running; finish them before exiting
    // so their work is not cut off mid-flight.
    services.wait_outstanding();

    Ok(ExitCode::from(outcome.exit_code() as u8))
}

/// Walks `start` and its ancestors looking for a directory containing
/// `file_name`.
fn find_script_upwards(start: &Path, file_name: &str) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(file_name).is_file() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}
