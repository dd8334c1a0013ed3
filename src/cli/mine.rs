use super::config::DaoPoolConfig;
use super::local_collaborators;
use daopool::chain::EmbeddedNode;
use std::path::Path;
use tracing::info;

/// Advance the block height of the local node and persist it
pub async fn execute(config_path: &Path, blocks: u64) -> Result<(), Box<dyn std::error::Error>> {
    if blocks == 0 {
        return Err("--blocks must be at least 1".into());
    }

    let config = DaoPoolConfig::load(config_path)?;
    let node = EmbeddedNode::load_snapshot(&config.node.state_path, local_collaborators()).await?;

    let before = node.block().await;
    let height = node.mine(blocks).await;
    node.save_snapshot(&config.node.state_path).await?;

    info!(from = before, to = height, "mined");
    println!("Block height: {} -> {}", before, height);

    Ok(())
}
