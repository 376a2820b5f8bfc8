//! SensAttend CLI - face-matched classroom attendance.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use sensattend_core::{ClientConfig, HttpMatchingService, SubmitMode};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Missing input (no image, incomplete registration form)
  65  Rejected by the matching service
  66  Cannot read the image file
  69  Matching service unreachable or answered unreadably";

#[derive(Parser)]
#[command(name = "sensattend")]
#[command(author, version, about = "Face-matched classroom attendance", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Matching service base URL
    #[arg(long, global = true, env = "SENSATTEND_SERVER_URL", value_name = "URL")]
    server: Option<String>,

    /// Show debug logs on stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Print nothing but errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// When to color the output
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match a classroom image against the roster
    Analyse {
        /// Path to the classroom image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },

    /// Match a classroom image and record the outcome in the history
    Upload {
        /// Path to the classroom image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },

    /// Manage the student roster
    Students {
        #[command(subcommand)]
        command: StudentsCommand,
    },

    /// Show recorded attendance, newest first
    Results {
        /// Render times in the local time zone instead of UTC
        #[arg(long)]
        local_time: bool,
    },
}

#[derive(Subcommand)]
enum StudentsCommand {
    /// List registered students
    List,

    /// Register a student with a reference photo
    Add {
        /// Student name
        #[arg(long, default_value = "")]
        name: String,

        /// Unique roll number
        #[arg(long, default_value = "")]
        roll: String,

        /// Path to the reference photo
        #[arg(value_name = "IMAGE")]
        image: Option<PathBuf>,
    },

    /// Delete a student by roll number
    Delete {
        /// Roll number of the student to delete
        #[arg(value_name = "ROLL")]
        roll: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    fn apply(self) {
        match self {
            ColorChoice::Auto => {}
            ColorChoice::Always => colored::control::set_override(true),
            ColorChoice::Never => colored::control::set_override(false),
        }
    }
}

/// How command results are printed.
#[derive(Clone, Copy)]
pub struct Output {
    pub quiet: bool,
    pub json: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sensattend_core=debug,sensattend=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn connect(server: Option<String>) -> Result<Arc<HttpMatchingService>> {
    let mut config = ClientConfig::from_env().context("Invalid client configuration")?;
    if let Some(server) = server {
        config = config
            .with_server_url(&server)
            .context("Invalid --server URL")?;
    }
    let service = HttpMatchingService::new(config).context("Failed to create service client")?;
    Ok(Arc::new(service))
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output {
        quiet: cli.quiet,
        json: cli.json,
    };

    match cli.command {
        Commands::Analyse { image } => {
            let image = utils::read_image(&image)?;
            commands::submit::execute(connect(cli.server)?, image, SubmitMode::Analyse, output).await
        }
        Commands::Upload { image } => {
            let image = utils::read_image(&image)?;
            commands::submit::execute(connect(cli.server)?, image, SubmitMode::Persist, output).await
        }
        Commands::Students { command } => match command {
            StudentsCommand::List => commands::students::list(connect(cli.server)?, output).await,
            StudentsCommand::Add { name, roll, image } => {
                let image = image.as_deref().map(utils::read_image).transpose()?;
                commands::students::add(connect(cli.server)?, name, roll, image, output).await
            }
            StudentsCommand::Delete { roll, yes } => {
                commands::students::delete(connect(cli.server)?, roll, yes, output).await
            }
        },
        Commands::Results { local_time } => {
            commands::results::execute(connect(cli.server)?, local_time, output).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    cli.color.apply();

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
