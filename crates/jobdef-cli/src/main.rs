//! jobdef CLI tool.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "jobdef")]
#[command(about = "Validate and resolve CI job definitions", long_about = None)]
struct Cli {
    /// Loader settings file (KDL)
    #[arg(long, global = true, env = "JOBDEF_CONFIG")]
    config: Option<PathBuf>,

    /// Directory that playbook paths must exist under
    #[arg(long, global = true, env = "JOBDEF_PLAYBOOK_ROOT")]
    playbook_root: Option<PathBuf>,

    /// Job defined elsewhere that may be used as a parent
    #[arg(long = "external", global = true)]
    external: Vec<String>,

    /// Reject unknown job attributes
    #[arg(long, global = true)]
    strict: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate job documents
    Validate {
        /// Files or directories to load
        #[arg(default_value = ".zuul.yaml")]
        paths: Vec<PathBuf>,
    },
    /// List loaded jobs and their parents
    List {
        /// Files or directories to load
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the resolved descriptor of a job as JSON
    Show {
        /// File or directory to load
        path: PathBuf,
        /// Job name
        job: String,
        /// Expose the process environment as ${env.*}
        #[arg(long)]
        env: bool,
    },
    /// Re-emit loaded jobs in normalized form
    Render {
        /// Files or directories to load
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Yaml,
    Kdl,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let options = commands::Options {
        config: cli.config,
        playbook_root: cli.playbook_root,
        external: cli.external,
        strict: cli.strict,
    };

    match cli.command {
        Commands::Validate { paths } => {
            commands::validate(&options, &paths)?;
        }
        Commands::List { paths } => {
            commands::jobs::list(&options, &paths)?;
        }
        Commands::Show { path, job, env } => {
            commands::jobs::show(&options, &path, &job, env)?;
        }
        Commands::Render { paths, format } => {
            let format = match format {
                OutputFormat::Yaml => jobdef_config::Format::Yaml,
                OutputFormat::Kdl => jobdef_config::Format::Kdl,
            };
            commands::jobs::render(&options, &paths, format)?;
        }
    }

    Ok(())
}
