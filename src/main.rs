use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use code_judge::client::JudgeClient;
use code_judge::config::{
    MasterConfig, RuntimeConfig, SandboxConfig, WorkerConfig, WorkerProgram, ADMIN_SECRET_ENV,
};
use code_judge::node::{MasterNode, WorkerNode};
use code_judge::protocol::AdminRequest;
use code_judge::sandbox::Language;
use code_judge::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "code-judge")]
#[command(version)]
#[command(about = "A self-scaling remote code execution service")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the master: admission control, worker pool and admin console
    Master(MasterArgs),

    /// Start a worker that executes delegated jobs
    Worker(WorkerArgs),

    /// Submit a source file and print the result
    Submit {
        #[command(flatten)]
        client: ClientArgs,

        /// Source file to run
        file: PathBuf,

        /// Language tag (python, c, c++, java); inferred from the extension if omitted
        #[arg(long, short = 'l')]
        language: Option<String>,

        /// File name sent to the judge; defaults to the file's own name
        #[arg(long)]
        filename: Option<String>,

        /// Use the legacy line form instead of the delimited form
        #[arg(long)]
        legacy: bool,
    },

    /// Runtime administration of a master
    Admin {
        #[command(flatten)]
        client: ClientArgs,

        /// Shared admin token, required from non-loopback hosts
        #[arg(long, env = ADMIN_SECRET_ENV, hide_env_values = true)]
        token: Option<String>,

        #[command(subcommand)]
        command: AdminCommands,
    },
}

// =============================================================================
// Server Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct MasterArgs {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, default_value = "5000")]
    port: u16,

    /// Directory for per-job working directories
    #[arg(long)]
    temp_root: Option<PathBuf>,

    /// Initial local concurrency ceiling
    #[arg(long)]
    max_tasks: Option<usize>,

    /// Initial worker pool ceiling
    #[arg(long)]
    max_workers: Option<usize>,
}

#[derive(Parser, Debug)]
struct WorkerArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, default_value = "6000")]
    port: u16,

    /// Directory for per-job working directories
    #[arg(long)]
    temp_root: Option<PathBuf>,
}

// =============================================================================
// Client Arguments (shared by submit and admin)
// =============================================================================

#[derive(Parser, Debug)]
struct ClientArgs {
    /// Master address
    #[arg(long, short = 'a', default_value = "127.0.0.1:5000")]
    addr: SocketAddr,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum AdminCommands {
    /// Show running tasks, ceilings and pool size
    Info,
    /// Change the local concurrency ceiling (>= 1)
    SetMaxTasks { value: usize },
    /// Change the worker pool ceiling (>= 0)
    SetMaxWorkers { value: usize },
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct SubmitOutput {
    language: String,
    filename: String,
    elapsed_ms: u128,
    response: String,
}

#[derive(Serialize)]
struct AdminOutput {
    subcommand: String,
    ok: bool,
    response: String,
}

// =============================================================================
// Server Implementation
// =============================================================================

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn run_master(args: MasterArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut config = MasterConfig::new(SocketAddr::new(args.host, args.port));
    config.runtime = RuntimeConfig::from_env();
    if let Some(max_tasks) = args.max_tasks {
        if max_tasks == 0 {
            return Err("--max-tasks must be >= 1".into());
        }
        config.runtime.max_tasks = max_tasks;
    }
    if let Some(max_workers) = args.max_workers {
        config.runtime.max_workers = max_workers;
    }

    let mut program = WorkerProgram::current_exe()?;
    if let Some(temp_root) = &args.temp_root {
        config.sandbox = SandboxConfig::default().with_temp_root(temp_root);
        program = program.arg("--temp-root").arg(temp_root);
    }
    config.pool.program = program;

    let shutdown = install_shutdown_handler()?;
    let node = MasterNode::bind(config).await?;
    node.run(shutdown).await;
    Ok(())
}

async fn run_worker(args: WorkerArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut config = WorkerConfig::new(SocketAddr::new(args.host, args.port));
    if let Some(temp_root) = args.temp_root {
        config.sandbox = SandboxConfig::default().with_temp_root(temp_root);
    }

    let shutdown = install_shutdown_handler()?;
    let node = WorkerNode::bind(config).await?;
    node.run(shutdown).await;
    Ok(())
}

// =============================================================================
// Client Command Handlers
// =============================================================================

async fn handle_submit(
    client_args: &ClientArgs,
    file: PathBuf,
    language: Option<String>,
    filename: Option<String>,
    legacy: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = tokio::fs::read_to_string(&file).await?;
    let filename = filename.unwrap_or_else(|| {
        file.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let language = match language {
        Some(language) => language,
        None => {
            let ext = file
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default();
            Language::parse(&ext)
                .map(|lang| lang.to_string())
                .ok_or_else(|| format!("cannot infer language of {}; pass --language", file.display()))?
        }
    };

    let client = JudgeClient::new(client_args.addr);
    let started = Instant::now();
    let response = if legacy {
        client.submit_legacy(&language.to_uppercase(), &source).await?
    } else {
        client.submit(&language, &filename, &source).await?
    };

    match client_args.output {
        OutputFormat::Json => {
            let output = SubmitOutput {
                language,
                filename,
                elapsed_ms: started.elapsed().as_millis(),
                response,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            print!("{}", response);
        }
    }
    Ok(())
}

async fn handle_admin(
    client_args: &ClientArgs,
    token: Option<String>,
    command: AdminCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = matches!(client_args.output, OutputFormat::Json);
    let (subcommand, argument) = match command {
        AdminCommands::Info => ("GET_INFO", json.then(|| "json".to_string())),
        AdminCommands::SetMaxTasks { value } => ("SET_MAX_TASKS", Some(value.to_string())),
        AdminCommands::SetMaxWorkers { value } => ("SET_MAX_WORKERS", Some(value.to_string())),
    };
    let request = AdminRequest {
        token: token.filter(|t| !t.is_empty()),
        subcommand: subcommand.to_string(),
        argument,
    };

    let response = JudgeClient::new(client_args.addr).admin(&request).await?;
    let ok = !response.starts_with("Error:");

    match client_args.output {
        OutputFormat::Json if subcommand == "GET_INFO" && ok => {
            print!("{}", response);
        }
        OutputFormat::Json => {
            let output = AdminOutput {
                subcommand: subcommand.to_string(),
                ok,
                response: response.trim_end().to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            print!("{}", response);
        }
    }

    if ok {
        Ok(())
    } else {
        Err(response.trim_end().into())
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Master(master_args) => {
            run_master(master_args).await?;
        }
        Commands::Worker(worker_args) => {
            run_worker(worker_args).await?;
        }
        Commands::Submit {
            client,
            file,
            language,
            filename,
            legacy,
        } => {
            handle_submit(&client, file, language, filename, legacy).await?;
        }
        Commands::Admin {
            client,
            token,
            command,
        } => {
            handle_admin(&client, token, command).await?;
        }
    }

    Ok(())
}
