//! # enb
//!
//! Build orchestrator binary: resolves requested targets to build nodes,
//! drives concurrent builds with an incremental cache, and runs named
//! tasks.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use enb_runtime::{BuildOutcome, MakePlatform};

/// Project build orchestrator.
#[derive(Parser, Debug)]
#[command(name = "enb", about = "Project build orchestrator", version)]
struct Cli {
    /// Project directory.
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Build mode (falls back to `YENV`, then `development`).
    #[arg(long, global = true)]
    mode: Option<String>,

    /// Minimum log level.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build targets; a first argument naming a task runs that task.
    Make {
        /// Targets (or a task name followed by its arguments). Empty
        /// builds every node.
        targets: Vec<String>,

        /// Skip loading the incremental-build cache.
        #[arg(long)]
        no_cache: bool,

        /// Print the build graph after a successful build.
        #[arg(long)]
        graph: bool,
    },
    /// Remove built artifacts for targets. Empty cleans every node.
    Clean {
        /// Targets to clean.
        targets: Vec<String>,
    },
}

/// Initialize the global tracing subscriber with stderr output.
fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();
    let _ = subscriber.try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_subscriber(&cli.log_level);

    let project_dir = std::fs::canonicalize(&cli.dir)
        .with_context(|| format!("cannot resolve project dir {}", cli.dir.display()))?;
    let platform = MakePlatform::init(&project_dir, cli.mode.as_deref())
        .await
        .with_context(|| format!("failed to initialize {}", project_dir.display()))?;

    match cli.command {
        Command::Make {
            targets,
            no_cache,
            graph,
        } => {
            if !no_cache {
                platform.load_cache().await;
            }
            let outcome = platform.build(&targets).await?;
            if let BuildOutcome::Targets(result) = &outcome {
                tracing::info!("built {} target(s)", result.built_targets.len());
            }
            if graph {
                println!("{}", platform.build_graph().render());
            }
            platform.save_cache().await?;
        }
        Command::Clean { targets } => {
            platform.load_cache().await;
            platform.clean_targets(&targets).await?;
            platform.save_cache().await?;
        }
    }

    platform.destruct();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn make_accepts_mode_after_the_subcommand() {
        let cli =
            Cli::try_parse_from(["enb", "make", "bundles/page", "--mode", "production"]).unwrap();
        assert_eq!(cli.mode.as_deref(), Some("production"));
        match cli.command {
            Command::Make { targets, .. } => assert_eq!(targets, vec!["bundles/page"]),
            Command::Clean { .. } => panic!("expected make"),
        }
    }

    #[test]
    fn clean_accepts_mode_after_the_subcommand() {
        let cli = Cli::try_parse_from(["enb", "clean", "--mode", "production"]).unwrap();
        assert_eq!(cli.mode.as_deref(), Some("production"));
        assert!(matches!(cli.command, Command::Clean { .. }));
    }

    #[test]
    fn mode_before_the_subcommand_also_parses() {
        let cli = Cli::try_parse_from(["enb", "--mode", "staging", "make"]).unwrap();
        assert_eq!(cli.mode.as_deref(), Some("staging"));
    }

    #[test]
    fn dir_and_log_level_parse_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "enb",
            "make",
            "--dir",
            "/project",
            "--log-level",
            "debug",
            "--no-cache",
            "--graph",
        ])
        .unwrap();
        assert_eq!(cli.dir, PathBuf::from("/project"));
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Command::Make {
                no_cache, graph, ..
            } => {
                assert!(no_cache);
                assert!(graph);
            }
            Command::Clean { .. } => panic!("expected make"),
        }
    }
}
