mod analyzer;
mod backend_executor;
mod cli;
mod config;
mod logging;
mod patch;
mod template;
mod updater;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sdk-patcher")]
#[command(about = "Apply model-generated search/replace patches to SDK source files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory (defaults to current)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Where results are written: "sibling" (<name>_ai.<ext>) or "in-place"
    #[arg(long, global = true)]
    output: Option<patch::OutputMode>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress normal output
    #[arg(long, global = true)]
    quiet: bool,

    /// Emit JSON lines instead of console text
    #[arg(long, global = true)]
    json: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Write logs to the default log directory
    #[arg(long, global = true, conflicts_with = "log_file")]
    log: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply one edit request to one file
    Apply {
        /// File to patch, relative to the project directory
        file: PathBuf,

        /// JSON edit request file, or "-" for stdin
        #[arg(long)]
        patch: PathBuf,

        /// Attempt number for this file, starting at 1
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        attempt: u32,
    },

    /// Diff the generated interface code and write a change plan
    Analyze {
        #[command(flatten)]
        diff: DiffArgs,

        /// Write the plan here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Analyze, then update every file the plan names
    Run {
        #[command(flatten)]
        diff: DiffArgs,

        /// Also save the plan here
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Update every file named in a change plan
    Update {
        /// Change plan JSON
        plan: PathBuf,
    },

    /// Check backend availability and configuration
    Doctor,
}

#[derive(Args)]
struct DiffArgs {
    /// Read the diff from this file instead of running git
    #[arg(long, conflicts_with_all = ["base", "head"])]
    diff: Option<PathBuf>,

    /// Base revision (default from [analysis], else HEAD~1)
    #[arg(long)]
    base: Option<String>,

    /// Head revision (default from [analysis], else HEAD)
    #[arg(long)]
    head: Option<String>,
}

impl DiffArgs {
    fn source(self) -> cli::DiffSource {
        match self.diff {
            Some(path) => cli::DiffSource::File(path),
            None => cli::DiffSource::Git {
                base: self.base,
                head: self.head,
            },
        }
    }
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Apply { .. } => "apply",
            Commands::Update { .. } => "update",
            Commands::Analyze { .. } => "analyze",
            Commands::Run { .. } => "run",
            Commands::Doctor => "doctor",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = match cli.log_file {
        Some(path) => Some(path),
        None if cli.log => Some(logging::default_log_path(cli.command.name())?),
        None => None,
    };
    logging::init_logging(cli.debug, cli.quiet, log_file)?;

    let project_dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let config = config::PatcherConfig::load(Some(&project_dir))?;
    let output = cli.output.unwrap_or(config.defaults.output());

    let handler = cli::create_handler(cli::OutputFormat::from_flags(cli.json, cli.quiet), cli.debug);

    let code = match cli.command {
        Commands::Apply {
            file,
            patch,
            attempt,
        } => cli::apply_file(
            &file,
            &patch,
            attempt,
            &project_dir,
            &config,
            output,
            &*handler,
        )?,
        Commands::Update { plan } => {
            cli::run_update(&plan, &project_dir, &config, output, &*handler).await?
        }
        Commands::Analyze { diff, out } => {
            cli::run_analyze(&diff.source(), out.as_deref(), &project_dir, &config, &*handler)
                .await?
        }
        Commands::Run { diff, out } => {
            cli::run_pipeline(
                &diff.source(),
                out.as_deref(),
                &project_dir,
                &config,
                output,
                &*handler,
            )
            .await?
        }
        Commands::Doctor => cli::doctor(&config, &project_dir, &*handler).await,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_starts_at_one() {
        let parsed = Cli::try_parse_from(["sdk-patcher", "apply", "a.py", "--patch", "p.json"]).unwrap();
        assert!(matches!(parsed.command, Commands::Apply { attempt: 1, .. }));

        let zero = Cli::try_parse_from(["sdk-patcher", "apply", "a.py", "--patch", "p.json", "--attempt", "0"]);
        assert!(zero.is_err());
    }

    #[test]
    fn test_output_mode_is_validated_at_parse_time() {
        let parsed = Cli::try_parse_from(["sdk-patcher", "--output", "in-place", "doctor"]).unwrap();
        assert_eq!(parsed.output, Some(patch::OutputMode::InPlace));

        let typo = Cli::try_parse_from(["sdk-patcher", "--output", "in-palce", "doctor"]);
        assert!(typo.is_err());
    }

    #[test]
    fn test_diff_file_excludes_revisions() {
        let parsed = Cli::try_parse_from(["sdk-patcher", "analyze", "--diff", "d.txt"]).unwrap();
        match parsed.command {
            Commands::Analyze { diff, out } => {
                assert!(out.is_none());
                assert_eq!(diff.source(), cli::DiffSource::File(PathBuf::from("d.txt")));
            }
            _ => panic!("expected analyze"),
        }

        let parsed = Cli::try_parse_from(["sdk-patcher", "run", "--base", "v1.2.0"]).unwrap();
        match parsed.command {
            Commands::Run { diff, .. } => assert_eq!(
                diff.source(),
                cli::DiffSource::Git {
                    base: Some("v1.2.0".into()),
                    head: None,
                }
            ),
            _ => panic!("expected run"),
        }

        let both = Cli::try_parse_from(["sdk-patcher", "analyze", "--diff", "d.txt", "--base", "v1"]);
        assert!(both.is_err());
    }
}
