//! qnx: command-line interface for Quantinuum Nexus
//!
//! Log in, browse projects and devices, and follow jobs from the shell.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{auth, devices, jobs, projects, quotas, version};

/// qnx - work with Quantinuum Nexus from the terminal
#[derive(Parser)]
#[command(name = "qnx")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to Nexus (browser device flow by default)
    Login {
        /// Log in with email and password instead of the browser
        #[arg(long)]
        credentials: bool,

        /// Email address for credential login
        #[arg(long, env = "NEXUS_USERNAME")]
        email: Option<String>,
    },

    /// Log out and remove stored tokens
    Logout,

    /// Authentication helpers
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// List projects
    Projects {
        /// Filter by name (substring match on the server)
        #[arg(short, long)]
        name: Option<String>,

        /// Include archived projects
        #[arg(long)]
        archived: bool,

        /// Maximum number of projects to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Work with jobs
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },

    /// List devices available to you
    Devices,

    /// Show quota usage
    Quotas,

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum AuthAction {
    /// Show whether tokens are stored
    Status,
}

#[derive(Subcommand)]
enum JobsAction {
    /// List jobs
    List {
        /// Project name to list jobs from
        #[arg(short, long)]
        project: Option<String>,

        /// Filter by name
        #[arg(short, long)]
        name: Option<String>,

        /// Filter by status (e.g. COMPLETED, running)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by job type (compile, execute)
        #[arg(short = 't', long = "type")]
        job_type: Option<String>,

        /// Maximum number of jobs to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show the current status of a job
    Status {
        /// Job ID (UUID)
        job_id: String,
    },

    /// Wait for a job to reach a status
    Wait {
        /// Job ID (UUID)
        job_id: String,

        /// Status to wait for
        #[arg(short, long, default_value = "COMPLETED")]
        status: String,

        /// Timeout in seconds (0 waits forever)
        #[arg(short, long, default_value = "300")]
        timeout: u64,
    },

    /// Request cancellation of a job
    Cancel {
        /// Job ID (UUID)
        job_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Login { credentials, email } => {
            auth::execute_login(credentials, email.as_deref()).await
        }
        Commands::Logout => auth::execute_logout(),
        Commands::Auth { action } => match action {
            AuthAction::Status => auth::execute_status(),
        },

        Commands::Projects {
            name,
            archived,
            limit,
        } => projects::execute(name.as_deref(), archived, limit).await,

        Commands::Jobs { action } => match action {
            JobsAction::List {
                project,
                name,
                status,
                job_type,
                limit,
            } => {
                jobs::execute_list(
                    project.as_deref(),
                    name.as_deref(),
                    status.as_deref(),
                    job_type.as_deref(),
                    limit,
                )
                .await
            }
            JobsAction::Status { job_id } => jobs::execute_status(&job_id).await,
            JobsAction::Wait {
                job_id,
                status,
                timeout,
            } => jobs::execute_wait(&job_id, &status, timeout).await,
            JobsAction::Cancel { job_id } => jobs::execute_cancel(&job_id).await,
        },

        Commands::Devices => devices::execute().await,
        Commands::Quotas => quotas::execute().await,

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
