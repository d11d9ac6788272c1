//! Modflow CLI Entry Point
//!
//! Reference caller for the execution engine: loads a workflow
//! definition, runs it against the file-backed record store, and prints
//! events as they arrive.
//!
//! # Usage
//!
//! ```bash
//! # Execute a workflow definition
//! modflow pipeline.yaml
//!
//! # Keep run records somewhere else
//! modflow pipeline.yaml --state-dir /data/runs
//!
//! # Stop at the first failed step
//! modflow pipeline.yaml --halt-on-failure
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use log::info;

use modflow::execution::{Engine, FailurePolicy, RunEvent, RunRegistry, StepOutcome};
use modflow::store::{JsonStore, RunStatus, RunStore};
use modflow::workflow::load_definition;
use modflow::{APP_NAME, VERSION};

/// Interval for checking whether the worker has ended while draining events.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    definition_path: String,
    state_dir: Option<PathBuf>,
    halt_on_failure: bool,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Sequential Workflow Execution Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: modflow [OPTIONS] <DEFINITION_FILE>");
    println!();
    println!("Arguments:");
    println!("  <DEFINITION_FILE>   Path to workflow definition YAML file");
    println!();
    println!("Options:");
    println!("  --state-dir PATH    Directory for run records (default: .modflow)");
    println!("  --halt-on-failure   Stop the sequence at the first failed step");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  modflow pipeline.yaml");
    println!("  modflow pipeline.yaml --state-dir /data/runs --halt-on-failure");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--halt-on-failure" => {
                config.halt_on_failure = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--state-dir" => {
                i += 1;
                if i >= args.len() {
                    return Err("--state-dir requires a path argument".to_string());
                }
                config.state_dir = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if !config.definition_path.is_empty() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.definition_path = arg.clone();
            }
        }
        i += 1;
    }

    if config.definition_path.is_empty() {
        return Err("No definition file given".to_string());
    }

    Ok(config)
}

/// Prints one run event to the terminal.
fn print_event(event: &RunEvent) {
    match event {
        RunEvent::Log(text) => println!("{}", text),
        RunEvent::Error(text) => println!("{} {}", "ERROR:".red().bold(), text),
        RunEvent::StepFinished => {}
    }
}

/// Renders a step outcome with color for the final summary.
fn outcome_label(outcome: StepOutcome) -> colored::ColoredString {
    match outcome {
        StepOutcome::Finished => "finished".green(),
        StepOutcome::Failed => "failed".red(),
        StepOutcome::Skipped => "skipped".yellow(),
    }
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);

    // Print banner
    print_banner();

    // Load definition
    let workflow = load_definition(&config.definition_path)?;
    info!(
        "Workflow '{}': {} steps",
        workflow.name,
        workflow.len()
    );

    // Open the record store
    let store: Arc<dyn RunStore> = match &config.state_dir {
        Some(dir) => Arc::new(JsonStore::open(dir)?),
        None => Arc::new(JsonStore::open_default()?),
    };

    let instance_id = store.create_or_reuse_instance(workflow.id)?;
    info!("Workflow instance: {}", instance_id);

    // Create and configure the engine
    let mut engine = Engine::new(Arc::clone(&store));
    if config.halt_on_failure {
        engine.set_failure_policy(FailurePolicy::Halt);
    }

    let events = engine.events().subscribe();
    let mut registry = RunRegistry::new();
    registry.insert(workflow.id, engine.start(workflow.ordered_steps(), instance_id));

    // Mirror events to the terminal until the worker ends
    loop {
        match events.recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(event) => print_event(&event),
            Err(RecvTimeoutError::Timeout) => {
                if !registry.is_running(workflow.id) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    for event in events.try_iter() {
        print_event(&event);
    }

    let handle = registry
        .take(workflow.id)
        .ok_or("run handle disappeared from registry")?;
    let summary = handle.join()?;

    // Marking the overall instance done is the caller's job
    store.finish_instance(instance_id, RunStatus::Finished)?;

    // Print summary
    println!();
    println!("Run summary for '{}':", workflow.name);
    for step in &summary.steps {
        println!("  {:20} {}", step.module_name, outcome_label(step.outcome));
    }
    if summary.cancelled {
        println!();
        println!("Run was stopped before completing all steps.");
    }

    if !summary.all_succeeded() {
        return Err("one or more steps failed".into());
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
