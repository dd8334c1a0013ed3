use super::config::{default_state_path, DaoPoolConfig};
use super::local_collaborators;
use daopool::chain::{Chain, ChainState, EmbeddedNode};
use daopool::types::{Address, Amount};
use std::path::{Path, PathBuf};
use tracing::info;

/// Initialize a local node
///
/// Writes a default config when none exists, then a genesis snapshot owned
/// by the configured operator. An existing snapshot is kept unless `force`.
pub async fn execute(
    config_path: &Path,
    operator: Option<String>,
    state_path: Option<PathBuf>,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !config_path.exists() {
        let operator = match operator {
            Some(hex) => hex.parse::<Address>()?,
            None => Address::from_label("operator"),
        };
        let state_path = state_path.unwrap_or_else(default_state_path);
        DaoPoolConfig::create_default(config_path, &state_path, &operator)?;
        println!("Wrote config: {}", config_path.display());
    } else if operator.is_some() || state_path.is_some() {
        return Err(format!(
            "Config '{}' already exists; edit it instead of passing --operator/--state-path",
            config_path.display()
        )
        .into());
    }

    let config = DaoPoolConfig::load(config_path)?;
    config.governance.validate()?;
    let state_path = &config.node.state_path;

    if state_path.exists() && !force {
        return Err(format!(
            "Snapshot '{}' already exists (use --force to overwrite)",
            state_path.display()
        )
        .into());
    }

    if let Some(parent) = state_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let genesis = ChainState::genesis(config.node.operator, Amount::from(config.service.fee))
        .with_default_governance(config.governance);
    let node = EmbeddedNode::new(Chain::new(genesis, local_collaborators()));
    node.save_snapshot(state_path).await?;

    info!(
        operator = %config.node.operator,
        fee = config.service.fee,
        quorum = config.governance.quorum_percent,
        lifespan = config.governance.lifespan_blocks,
        "genesis written"
    );
    println!("Genesis snapshot: {}", state_path.display());
    println!("Operator: {}", config.node.operator);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_writes_config_and_genesis() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let state_path = temp_dir.path().join("data").join("state.cbor");
        let operator = Address::from_label("alice");

        execute(
            &config_path,
            Some(operator.to_string()),
            Some(state_path.clone()),
            false,
        )
        .await
        .unwrap();

        assert!(config_path.exists());
        let node = EmbeddedNode::load_snapshot(&state_path, local_collaborators())
            .await
            .unwrap();
        assert_eq!(node.block().await, 0);
        assert_eq!(node.query(|chain| chain.service().owner()).await, operator);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let state_path = temp_dir.path().join("state.cbor");

        execute(&config_path, None, Some(state_path), false)
            .await
            .unwrap();
        let err = execute(&config_path, None, None, false).await.unwrap_err();
        assert!(err.to_string().contains("--force"));

        execute(&config_path, None, None, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_init_rejects_invalid_governance() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let state_path = temp_dir.path().join("state.cbor");
        let mut config = DaoPoolConfig::new(state_path.clone(), Address::from_label("operator"));
        config.governance.lifespan_blocks = 0;
        config.save(&config_path).unwrap();

        assert!(execute(&config_path, None, None, false).await.is_err());
        assert!(!state_path.exists());
    }

    #[tokio::test]
    async fn test_init_rejects_bad_operator() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let result = execute(&config_path, Some("0xzz".to_string()), None, false).await;
        assert!(result.is_err());
        assert!(!config_path.exists());
    }
}
