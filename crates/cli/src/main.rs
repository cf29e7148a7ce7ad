//! MergeFlow command-line conflict resolution tool.
//!
//! Provides subcommands for inspecting the conflicts of an in-progress
//! merge, rebase or cherry-pick, resolving them interactively, and
//! generating / validating configuration files.

mod resolve;
mod status;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mergeflow_core::config::MergeFlowConfig;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// MergeFlow command-line conflict resolution tool.
#[derive(Parser, Debug)]
#[command(
    name = "mergeflow",
    version,
    about = "Resolve the conflicts of an in-progress merge, rebase or cherry-pick"
)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Defaults to `<config dir>/mergeflow/config.toml`; built-in defaults
    /// are used when that file does not exist.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the in-progress operation and its unmerged files.
    Status {
        /// Path inside the repository.
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,

        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Work through conflicts interactively, then continue or abort.
    Resolve {
        /// Path inside the repository.
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./mergeflow.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"));
            cmd_init(&output)
        }
        Commands::Validate => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"));
            let path = match cli.config {
                Some(path) => path,
                None => default_config_path()
                    .context("no --config given and no user config directory found")?,
            };
            cmd_validate(&path)
        }
        _ => {
            let config = load_config(cli.config.as_deref())?;
            init_logging(
                cli.log_level
                    .as_deref()
                    .unwrap_or(&config.general.log_level),
            );

            match cli.command {
                Commands::Status { repo, json } => status::run_status(&repo, json),
                Commands::Resolve { repo } => resolve::run_resolve(&repo, &config).await,
                _ => unreachable!(),
            }
        }
    }
}

/// Minimal logging for the CLI. `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mergeflow").join("config.toml"))
}

/// Load the config from `explicit`, or from the default location if it
/// exists, or fall back to built-in defaults.
fn load_config(explicit: Option<&Path>) -> Result<MergeFlowConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.exists()),
    };

    match path {
        Some(path) => MergeFlowConfig::load_and_resolve(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => {
            let mut config = MergeFlowConfig::default();
            config
                .resolve_env_vars()
                .context("failed to resolve environment variables")?;
            Ok(config)
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    let body = MergeFlowConfig::default()
        .to_toml()
        .context("failed to render default configuration")?;
    let contents = format!(
        "# MergeFlow Configuration\n\
         # Set launch.editor / launch.shell to override $VISUAL / $SHELL.\n\n{}",
        body
    );
    std::fs::write(output, contents).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Set your editor under [launch] if $VISUAL or $EDITOR is not set");
    println!(
        "  2. Validate with: mergeflow validate --config {}",
        output.display()
    );
    if let Some(default) = default_config_path() {
        println!(
            "  3. Move it to {} to use it without --config",
            default.display()
        );
    }

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        MergeFlowConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    let _ = config.resolve_env_vars();
    println!("  [OK] Environment variable references processed");

    match config.validate() {
        Ok(()) => {
            println!("  [OK] All fields are valid");
        }
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Log level     : {}", config.general.log_level);
    println!("  Git binary    : {}", config.git.binary);
    println!(
        "  Editor        : {}",
        config.launch.editor.as_deref().unwrap_or("NOT SET")
    );
    println!(
        "  Wait on editor: {}",
        if config.launch.wait_for_editor { "yes" } else { "no" }
    );
    println!(
        "  Shell         : {}",
        config.launch.shell.as_deref().unwrap_or("NOT SET")
    );
    println!();
    println!("Configuration is valid.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_status_flags() {
        let cli = Cli::try_parse_from(["mergeflow", "status", "--repo", "/tmp/r", "--json"]).unwrap();
        match cli.command {
            Commands::Status { repo, json } => {
                assert_eq!(repo, PathBuf::from("/tmp/r"));
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["mergeflow", "resolve", "--log-level", "debug", "-c", "x.toml"])
            .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mergeflow.toml");
        cmd_init(&path).unwrap();

        let config = MergeFlowConfig::load_from_file(&path).unwrap();
        config.validate().unwrap();
        assert!(cmd_init(&path).is_err());
    }

    #[test]
    fn test_explicit_config_is_loaded_and_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mergeflow.toml");

        std::fs::write(&path, "[git]\nbinary = \"/usr/local/bin/git\"\n").unwrap();
        let config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(config.git.binary, "/usr/local/bin/git");

        std::fs::write(&path, "[general]\nlog_level = \"loud\"\n").unwrap();
        let err = load_config(Some(path.as_path())).unwrap_err();
        assert!(format!("{:#}", err).contains("general.log_level"));
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(load_config(Some(missing.as_path())).is_err());
    }
}
