//! Caseflow CLI
//!
//! Runs the Level of Care agent workflow for billing query cases.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use caseflow::generator::{create_generator, CaseContext};
use caseflow::workflow::gate::parse_field_args;
use caseflow::workflow::{
    level_of_care_workflow, CliGate, ExecutionMode, LogListener, Orchestrator, SessionStore,
    StatusReport, WorkflowDefinition,
};
use caseflow::{Config, Error, Result};

/// Workflow definition picked up from the working directory
const LOCAL_WORKFLOW: &str = ".caseflow/workflow.toml";

#[derive(Parser)]
#[command(name = "caseflow")]
#[command(author, version, about = "Agent workflow orchestration for billing queries")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Workflow definition file (TOML or YAML)
    #[arg(short, long, global = true)]
    workflow: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start or resume the workflow for a case
    Start {
        /// Case number, used as the session key
        case: String,

        /// Execution mode for a new session (sequential, concurrent)
        #[arg(long)]
        mode: Option<ExecutionMode>,

        /// Skip per-task minimum durations
        #[arg(long)]
        no_pacing: bool,

        /// Prompt for gate input and keep going until the workflow ends
        #[arg(long, short)]
        interactive: bool,

        #[command(flatten)]
        case_details: CaseArgs,
    },

    /// Submit input for a task waiting at its gate
    Submit {
        /// Case number
        case: String,

        /// Task id
        task: String,

        /// Field value as Label=value (repeatable)
        #[arg(short = 'f', long = "field")]
        fields: Vec<String>,

        /// Skip per-task minimum durations
        #[arg(long)]
        no_pacing: bool,
    },

    /// Show the status of a case
    Status {
        /// Case number
        case: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,

        /// Include task outputs
        #[arg(long)]
        outputs: bool,
    },

    /// Discard progress and start the case over
    Reset {
        /// Case number
        case: String,
    },

    /// List persisted sessions
    Sessions,

    /// Workflow definition commands
    Workflow {
        #[command(subcommand)]
        action: WorkflowCommands,
    },

    /// Initialize .caseflow directory
    Init,

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum WorkflowCommands {
    /// Print the active workflow definition
    Show,

    /// Write the built-in workflow to .caseflow/workflow.toml
    Init {
        /// Force overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Check the workflow definition for errors
    Validate,
}

/// Case details for a new session
#[derive(clap::Args)]
struct CaseArgs {
    /// Query type (e.g. "Level of Care")
    #[arg(long)]
    query_type: Option<String>,

    /// Disputed amount
    #[arg(long, value_parser = parse_amount)]
    amount: Option<f64>,

    /// Medical aid scheme
    #[arg(long)]
    medical_aid: Option<String>,

    /// Hospital
    #[arg(long)]
    hospital: Option<String>,

    /// Patient name
    #[arg(long)]
    patient: Option<String>,
}

impl CaseArgs {
    fn into_case(self, case_number: &str) -> CaseContext {
        CaseContext {
            query_type: self.query_type,
            query_amount: self.amount,
            medical_aid: self.medical_aid,
            hospital: self.hospital,
            patient_name: self.patient,
            ..CaseContext::new(case_number)
        }
    }
}

/// Parse a disputed amount, rejecting `inf` and `NaN`
fn parse_amount(value: &str) -> std::result::Result<f64, String> {
    let amount: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid amount '{}': {}", value, e))?;
    if amount.is_finite() {
        Ok(amount)
    } else {
        Err(format!("amount must be a finite number, got '{}'", value))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        let code = if e.is_configuration() || matches!(e, Error::MissingRequiredFields { .. }) {
            2
        } else {
            1
        };
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let workflow_path = cli.workflow.clone().or_else(|| config.workflow.clone());

    match cli.command {
        Commands::Start {
            case,
            mode,
            no_pacing,
            interactive,
            case_details,
        } => {
            let orchestrator =
                build_orchestrator(&config, workflow_path.as_deref(), mode, no_pacing)?;
            let _log = LogListener::spawn(orchestrator.subscribe());
            install_interrupt_handler(orchestrator.clone(), case.clone())?;

            let mut report = orchestrator
                .start_workflow_with_case(&case, case_details.into_case(&case))
                .await?;

            if interactive {
                report = run_interactive(&orchestrator, &case, report).await?;
            }

            println!("\n{}", report.summary());
            print_next_steps(&report);
        }

        Commands::Submit {
            case,
            task,
            fields,
            no_pacing,
        } => {
            let orchestrator =
                build_orchestrator(&config, workflow_path.as_deref(), None, no_pacing)?;
            let _log = LogListener::spawn(orchestrator.subscribe());
            install_interrupt_handler(orchestrator.clone(), case.clone())?;

            let values = parse_field_args(&fields)?;
            orchestrator.submit(&case, &task, values).await?;

            let report = orchestrator.get_status(&case).await?;
            println!("\n{}", report.summary());
            print_next_steps(&report);
        }

        Commands::Status {
            case,
            json,
            outputs,
        } => {
            let orchestrator = build_orchestrator(&config, workflow_path.as_deref(), None, true)?;
            let report = orchestrator.get_status(&case).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.summary());
                if outputs {
                    print_outputs(&report);
                }
            }
        }

        Commands::Reset { case } => {
            let orchestrator = build_orchestrator(&config, workflow_path.as_deref(), None, true)?;
            orchestrator.reset(&case).await?;
            let report = orchestrator.get_status(&case).await?;
            if let Some(warning) = &report.persistence_warning {
                warn!("Stored session may remain: {}", warning);
            }
            println!("Reset {}", case);
        }

        Commands::Sessions => {
            let store = SessionStore::in_dir(config.store_dir());
            let sessions = store.list()?;
            if sessions.is_empty() {
                println!("No sessions in {}", config.store_dir().display());
            }
            for key in sessions {
                match store.load(&key) {
                    Ok(Some(session)) => {
                        let total = session.task_states.len();
                        let done = session.count(caseflow::TaskStatus::Completed);
                        let state = if session.is_stalled() {
                            "stalled"
                        } else if session.terminal {
                            "completed"
                        } else {
                            "in progress"
                        };
                        println!(
                            "{} | {} | {}/{} | {} | {}",
                            key,
                            session.workflow,
                            done,
                            total,
                            state,
                            session.updated_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                    Ok(None) => {}
                    Err(e) => println!("{} | unreadable: {}", key, e),
                }
            }
        }

        Commands::Workflow { action } => {
            handle_workflow_command(action, workflow_path.as_deref())?;
        }

        Commands::Init => {
            let path = caseflow::config::init()?;
            info!("Initialized .caseflow directory ({})", path.display());
        }

        Commands::Config => {
            let content =
                toml::to_string_pretty(&config).map_err(|e| Error::Config(e.to_string()))?;
            println!("{}", content);
        }
    }

    Ok(())
}

fn handle_workflow_command(action: WorkflowCommands, path: Option<&Path>) -> Result<()> {
    match action {
        WorkflowCommands::Show => {
            let definition = load_workflow(path)?;
            println!("{}", definition.to_toml()?);
        }

        WorkflowCommands::Init { force } => {
            let path = PathBuf::from(LOCAL_WORKFLOW);

            if path.exists() && !force {
                eprintln!("Workflow definition already exists. Use --force to overwrite.");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, level_of_care_workflow().to_toml()?)?;

            info!("Created workflow definition at {}", path.display());
        }

        WorkflowCommands::Validate => {
            let definition = load_workflow(path)?.validated()?;
            let gates = definition
                .tasks()
                .iter()
                .filter(|t| t.requires_human_input)
                .count();
            println!(
                "Workflow {} is valid: {} tasks, {} gates",
                definition.name(),
                definition.len(),
                gates
            );
        }
    }

    Ok(())
}

/// Load the workflow definition: explicit path, local file, or built-in
fn load_workflow(path: Option<&Path>) -> Result<WorkflowDefinition> {
    if let Some(path) = path {
        return WorkflowDefinition::load(path);
    }

    let local = PathBuf::from(LOCAL_WORKFLOW);
    if local.exists() {
        WorkflowDefinition::load(&local)
    } else {
        Ok(level_of_care_workflow())
    }
}

fn build_orchestrator(
    config: &Config,
    workflow: Option<&Path>,
    mode: Option<ExecutionMode>,
    no_pacing: bool,
) -> Result<Orchestrator> {
    let definition = load_workflow(workflow)?;
    let generator = create_generator(&config.generator)?;
    let store = SessionStore::in_dir(config.store_dir());

    let mut options = config.run_options();
    if let Some(mode) = mode {
        options.mode = mode;
    }
    if no_pacing {
        options.pacing = false;
    }

    Orchestrator::new(definition, store, generator, options)
}

/// First Ctrl+C cancels in-flight tasks, second exits
fn install_interrupt_handler(orchestrator: Orchestrator, case: String) -> Result<()> {
    let runtime = tokio::runtime::Handle::current();
    let interrupts = Arc::new(AtomicUsize::new(0));

    ctrlc::set_handler(move || {
        if interrupts.fetch_add(1, Ordering::SeqCst) == 0 {
            eprintln!("\nInterrupted; progress is saved. Press Ctrl+C again to quit.");
            let orchestrator = orchestrator.clone();
            let case = case.clone();
            runtime.spawn(async move { orchestrator.cancel(&case).await });
        } else {
            std::process::exit(130);
        }
    })
    .map_err(|e| Error::Config(format!("Failed to install Ctrl+C handler: {}", e)))
}

/// Prompt for every gate until the workflow ends or input runs out
async fn run_interactive(
    orchestrator: &Orchestrator,
    case: &str,
    mut report: StatusReport,
) -> Result<StatusReport> {
    while !report.terminal {
        let waiting: Vec<String> = report
            .awaiting_input()
            .iter()
            .map(|t| t.id.clone())
            .collect();
        if waiting.is_empty() {
            break;
        }

        for task_id in waiting {
            let spec = orchestrator.definition().task(&task_id)?.clone();
            let values = tokio::task::spawn_blocking(move || CliGate::prompt(&spec))
                .await
                .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))??;

            match orchestrator.submit(case, &task_id, values).await {
                Ok(()) => {}
                Err(Error::MissingRequiredFields { fields }) => {
                    eprintln!("Missing required fields: {}", fields.join(", "));
                    return orchestrator.get_status(case).await;
                }
                Err(e) => return Err(e),
            }
        }

        report = orchestrator.get_status(case).await?;
    }

    Ok(report)
}

fn print_next_steps(report: &StatusReport) {
    for task in report.awaiting_input() {
        println!(
            "\nNext: caseflow submit {} {} -f \"<Label>=<value>\"",
            report.session_key, task.id
        );
    }
}

fn print_outputs(report: &StatusReport) {
    for task in &report.tasks {
        if let Some(output) = &task.state.output {
            println!("\n── {} ──\n{}", task.id, output);
        }
    }
}
