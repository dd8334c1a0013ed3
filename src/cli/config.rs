//! daopool configuration file handling
//!
//! Operator settings for a local node: where the chain snapshot lives, who
//! operates the factory, the creation fee, governance defaults for new pools
//! and logging. Configuration files are TOML.

use daopool::governance::GovernanceSettings;
use daopool::types::Address;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Node operator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaoPoolConfig {
    pub node: NodeConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    /// Governance defaults written into the genesis service by `init`;
    /// pools created without their own settings take these
    #[serde(default)]
    pub governance: GovernanceSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Path to the CBOR chain snapshot
    pub state_path: PathBuf,

    /// Factory owner address (hex)
    pub operator: Address,
}

/// Factory configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Pool creation fee in the smallest native unit
    #[serde(default)]
    pub fee: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl DaoPoolConfig {
    pub fn new(state_path: PathBuf, operator: Address) -> Self {
        Self {
            node: NodeConfig {
                state_path,
                operator,
            },
            service: ServiceConfig::default(),
            governance: GovernanceSettings::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: DaoPoolConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        config
            .governance
            .validate()
            .map_err(|e| format!("Invalid [governance] section: {}", e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(state_path: &Path, operator: &Address) -> String {
        format!(
            r#"# daopool node configuration
#
# Governance values below are DEFAULTS for new pools only. Each pool stores
# its own settings, and each proposal fixes its own terms at creation.

[node]
# CBOR snapshot of the whole chain state
state_path = "{state_path}"

# Factory owner: whitelists pool creators and withdraws creation fees
operator = "{operator}"

[service]
# Pool creation fee in the smallest native unit (exact amount required)
fee = 0

[governance]
# Share of the token supply that must vote in favour
quorum_percent = 30

# Share of the threshold base that must vote in favour
threshold_percent = 50

# "total_supply" or "votes_cast"
threshold_base = "total_supply"

# Voting window in blocks
lifespan_blocks = 25

# Blocks to wait after the voting window before execution
execution_delay_blocks = 0

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/daopool/daopool.log"
"#,
            state_path = state_path.display(),
            operator = operator,
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(
        config_path: &Path,
        state_path: &Path,
        operator: &Address,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml(state_path, operator);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("daopool")
}

/// Default config file: ~/.local/share/daopool/config.toml
pub fn default_config_path() -> PathBuf {
    data_dir().join("config.toml")
}

/// Default snapshot path, adjacent to the config
pub fn default_state_path() -> PathBuf {
    data_dir().join("state.cbor")
}

#[cfg(test)]
mod tests {
    use super::*;
    use daopool::governance::ThresholdBase;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let operator = Address::from_label("operator");

        let mut config = DaoPoolConfig::new(PathBuf::from("/data/daopool/state.cbor"), operator);
        config.service.fee = 1_000;
        config.save(&config_path).unwrap();

        let loaded = DaoPoolConfig::load(&config_path).unwrap();
        assert_eq!(loaded.node.operator, operator);
        assert_eq!(loaded.node.state_path, PathBuf::from("/data/daopool/state.cbor"));
        assert_eq!(loaded.service.fee, 1_000);
        assert_eq!(loaded.governance, GovernanceSettings::default());
    }

    #[test]
    fn test_create_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");
        let state_path = temp_dir.path().join("state.cbor");
        let operator = Address::from_label("operator");

        DaoPoolConfig::create_default(&config_path, &state_path, &operator).unwrap();

        let config = DaoPoolConfig::load(&config_path).unwrap();
        assert_eq!(config.node.state_path, state_path);
        assert_eq!(config.node.operator, operator);
        assert_eq!(config.governance.quorum_percent, 30);
        assert_eq!(config.governance.threshold_base, ThresholdBase::TotalSupply);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_config_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let minimal = format!(
            r#"
[node]
state_path = "/tmp/state.cbor"
operator = "{}"
"#,
            Address::from_label("operator")
        );
        fs::write(&config_path, minimal).unwrap();

        let config = DaoPoolConfig::load(&config_path).unwrap();
        assert_eq!(config.service.fee, 0);
        assert_eq!(config.governance.lifespan_blocks, 25);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_invalid_governance_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let contents = format!(
            r#"
[node]
state_path = "/tmp/state.cbor"
operator = "{}"

[governance]
quorum_percent = 130
threshold_percent = 50
lifespan_blocks = 25
"#,
            Address::from_label("operator")
        );
        fs::write(&config_path, contents).unwrap();

        let err = DaoPoolConfig::load(&config_path).unwrap_err();
        assert!(err.to_string().contains("[governance]"));
    }

    #[test]
    fn test_default_paths_share_a_directory() {
        assert_eq!(default_config_path().parent(), default_state_path().parent());
        assert!(default_config_path().ends_with("daopool/config.toml"));
    }
}
