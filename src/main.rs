//! Guided Setup CLI Entry Point
//!
//! # Usage
//!
//! ```bash
//! # Walk through a workflow with steps defined in YAML files
//! guided-setup run setup.workflow 'steps/*.yaml'
//!
//! # Start over, ignoring saved progress
//! guided-setup run setup.workflow 'steps/*.yaml' --fresh
//!
//! # Source a different rc file before every step
//! guided-setup run setup.workflow steps.yaml --rcfile ~/project/rc
//! ```

use std::error::Error;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::{info, warn};
use tokio::sync::mpsc;

use guided_setup::ui::{run_app, App, Transcript};
use guided_setup::workflow::StateStore;
use guided_setup::{load_catalog, load_workflow, Executor, APP_NAME, VERSION};

#[derive(Parser)]
#[command(name = "guided-setup")]
#[command(about = "Interactive step-by-step setup workflow runner")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow interactively
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Workflow file, one step name per line
    workflow: PathBuf,

    /// Step definition files (glob patterns)
    #[arg(required = true)]
    step_files: Vec<String>,

    /// Shell rc file sourced before every step
    #[arg(long, env = "GUIDED_SETUP_RCFILE", default_value = "~/.guided-setup/rc")]
    rcfile: String,

    /// File holding progress between sessions
    #[arg(long, env = "GUIDED_SETUP_STATEFILE", default_value = ".guided-setup-state.json")]
    statefile: PathBuf,

    /// Transcript of all step output shown in the UI
    #[arg(long, env = "GUIDED_SETUP_UILOGFILE", default_value = "ui-log.txt")]
    uilogfile: PathBuf,

    /// Log file (the terminal belongs to the UI)
    #[arg(long, env = "GUIDED_SETUP_LOG_FILE", default_value = "guided-setup.log")]
    log_file: PathBuf,

    /// Enable debug logging
    #[arg(short, long, env = "GUIDED_SETUP_VERBOSE")]
    verbose: bool,

    /// Delete saved progress and start from the first step
    #[arg(long, env = "GUIDED_SETUP_FRESH")]
    fresh: bool,
}

/// Configures logging into `log_file`.
fn setup_logging(verbose: bool, log_file: &Path) -> Result<(), Box<dyn Error>> {
    let level = if verbose { "debug" } else { "info" };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| format!("Could not open log file '{}': {}", log_file.display(), e))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            use std::io::Write;

            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
    Ok(())
}

/// Builds a prepared executor, resuming saved progress unless `fresh`.
fn prepare_executor(args: &RunArgs, store: &StateStore) -> Result<Executor, Box<dyn Error>> {
    info!("Loading workflow: {}", args.workflow.display());
    let workflow = load_workflow(&args.workflow)?;
    let catalog = load_catalog(args.step_files.as_slice())?;
    info!(
        "Workflow loaded: {} steps, {} step definitions",
        workflow.len(),
        catalog.len()
    );

    let mut executor = Executor::new(workflow, catalog);
    executor.set_rc_file(shellexpand::tilde(&args.rcfile).into_owned());
    executor.prepare()?;

    let state = if args.fresh {
        info!("Starting fresh, removing {}", store.path().display());
        store.start_fresh()?
    } else {
        store.load_or_create()?
    };
    if let Err(e) = executor.restore_state(state) {
        warn!("Discarding saved state: {}", e);
        eprintln!("{} {}, starting from the first step", "Warning:".yellow(), e);
    }
    Ok(executor)
}

fn print_session_summary(app: App) {
    let mut outputs: Vec<_> = app.executor().captured_outputs().clone().into_iter().collect();
    outputs.sort();

    println!();
    println!("{}", "Captured outputs:".bold());
    if outputs.is_empty() {
        println!("  (none)");
    }
    for (name, value) in outputs {
        println!("  {} = {}", name.cyan(), value);
    }

    println!();
    print!("{}", app.shutdown().summary());
}

async fn run_workflow(args: RunArgs) -> Result<(), Box<dyn Error>> {
    setup_logging(args.verbose, &args.log_file)?;
    info!("{} v{}", APP_NAME, VERSION);

    let store = StateStore::new(&args.statefile, args.workflow.display().to_string());
    let executor = prepare_executor(&args, &store)?;

    let transcript = Transcript::open(&args.uilogfile)
        .map_err(|e| format!("Could not open '{}': {}", args.uilogfile.display(), e))?;

    let (sender, receiver) = mpsc::unbounded_channel();
    let app = App::new(executor, sender)
        .with_state_store(store)
        .with_transcript(transcript);

    let app = run_app(app, receiver).await?;
    print_session_summary(app);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => run_workflow(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
