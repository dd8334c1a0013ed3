use clap::{Parser, Subcommand};
use daopool::chain::Collaborators;
use daopool::collaborators::{FixedRateRouter, MemoryMetadata};
use std::path::PathBuf;
use std::sync::Arc;

pub mod config;
pub mod init;
pub mod mine;
pub mod status;
pub mod version;

use config::{default_config_path, DaoPoolConfig, LoggingConfig};

#[derive(Parser)]
#[command(name = "daopool")]
#[command(author = "daopool contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for a local DAO pools node", long_about = None)]
pub struct Cli {
    /// Path to config file (default: ~/.local/share/daopool/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config and a genesis snapshot
    Init {
        /// Factory owner address (hex, default derived from "operator")
        #[arg(long)]
        operator: Option<String>,

        /// Path for the chain snapshot (default: adjacent to config)
        #[arg(long)]
        state_path: Option<PathBuf>,

        /// Overwrite an existing snapshot
        #[arg(long)]
        force: bool,
    },

    /// Show block height, pools, crowdsales and proposals
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Advance the block height and persist the snapshot
    Mine {
        /// Number of blocks to mine
        #[arg(long, default_value_t = 1)]
        blocks: u64,
    },

    /// Display version information
    Version,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = cli.config_path();

    match cli.command {
        Commands::Init {
            operator,
            state_path,
            force,
        } => init::execute(&config_path, operator, state_path, force).await,
        Commands::Status { json } => status::execute(&config_path, json).await,
        Commands::Mine { blocks } => mine::execute(&config_path, blocks).await,
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.level.clone());

    match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
                .map_err(|e| format!("Failed to install logger: {}", e))?;
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| format!("Failed to install logger: {}", e))?;
        }
    }

    Ok(())
}

/// Logging settings from the config file, or defaults when it is missing.
pub fn logging_config(cli: &Cli) -> LoggingConfig {
    DaoPoolConfig::load(&cli.config_path())
        .map(|config| config.logging)
        .unwrap_or_default()
}

/// Collaborators for a CLI-hosted node: no exchange rates, no metadata.
pub fn local_collaborators() -> Collaborators {
    Collaborators {
        router: Arc::new(FixedRateRouter::new()),
        metadata: Arc::new(MemoryMetadata::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["daopool", "init"]);
        match cli.command {
            Commands::Init {
                operator,
                state_path,
                force,
            } => {
                assert!(operator.is_none());
                assert!(state_path.is_none());
                assert!(!force);
            }
            _ => panic!("Expected Init command"),
        }
    }

    #[test]
    fn test_cli_parse_init_with_all_options() {
        let cli = Cli::parse_from([
            "daopool",
            "init",
            "--operator",
            "0x00000000000000000000000000000000000000aa",
            "--state-path",
            "/data/state.cbor",
            "--force",
            "--config",
            "/etc/daopool/config.toml",
        ]);
        assert_eq!(
            cli.config_path(),
            PathBuf::from("/etc/daopool/config.toml")
        );
        match cli.command {
            Commands::Init {
                operator,
                state_path,
                force,
            } => {
                assert_eq!(
                    operator,
                    Some("0x00000000000000000000000000000000000000aa".to_string())
                );
                assert_eq!(state_path, Some(PathBuf::from("/data/state.cbor")));
                assert!(force);
            }
            _ => panic!("Expected Init command"),
        }
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["daopool", "status", "--json"]);
        assert!(matches!(cli.command, Commands::Status { json: true }));
    }

    #[test]
    fn test_cli_parse_mine_defaults() {
        let cli = Cli::parse_from(["daopool", "mine"]);
        assert!(matches!(cli.command, Commands::Mine { blocks: 1 }));
        assert_eq!(cli.config_path(), default_config_path());
    }

    #[test]
    fn test_cli_parse_mine() {
        let cli = Cli::parse_from(["daopool", "--config", "/tmp/c.toml", "mine", "--blocks", "20"]);
        assert!(matches!(cli.command, Commands::Mine { blocks: 20 }));
        assert_eq!(cli.config_path(), PathBuf::from("/tmp/c.toml"));
    }

    #[test]
    fn test_cli_parse_version() {
        let cli = Cli::parse_from(["daopool", "version"]);
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_logging_config_falls_back_to_defaults() {
        let cli = Cli::parse_from(["daopool", "--config", "/nonexistent/config.toml", "version"]);
        assert_eq!(logging_config(&cli).level, "info");
    }
}
