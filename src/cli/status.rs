use super::config::DaoPoolConfig;
use super::local_collaborators;
use daopool::chain::{Chain, EmbeddedNode};
use daopool::crowdsale::TgeState;
use daopool::governance::{GovernanceSettings, Pool, ProposalKind, ProposalState};
use daopool::types::{Address, Amount, BlockHeight};
use serde::Serialize;
use std::path::Path;

/// Node status report.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub block: BlockHeight,
    pub service_owner: Address,
    pub service_address: Address,
    pub fee: Amount,
    /// Settings new pools get when they bring none.
    pub default_governance: GovernanceSettings,
    pub pools: Vec<PoolSummary>,
}

#[derive(Debug, Serialize)]
pub struct PoolSummary {
    pub id: u64,
    pub name: String,
    pub address: Address,
    pub owner: Address,
    pub governance: GovernanceSettings,
    pub treasury: Vec<HoldingSummary>,
    pub generations: Vec<GenerationSummary>,
    pub proposals: Vec<ProposalSummary>,
}

/// Asset balance, keyed by the asset's display form.
#[derive(Debug, Serialize)]
pub struct HoldingSummary {
    pub asset: String,
    pub amount: Amount,
}

#[derive(Debug, Serialize)]
pub struct GenerationSummary {
    pub id: u32,
    pub symbol: String,
    pub token: Address,
    pub tge: Address,
    pub state: TgeState,
    pub total_purchased: Amount,
    pub softcap: Amount,
    pub hardcap: Amount,
    pub end_block: BlockHeight,
    pub total_supply: Amount,
}

#[derive(Debug, Serialize)]
pub struct ProposalSummary {
    pub id: u64,
    pub kind: ProposalKind,
    pub state: ProposalState,
    pub for_votes: Amount,
    pub against_votes: Amount,
    pub end_block: BlockHeight,
    pub description: String,
}

impl StatusReport {
    pub fn from_chain(chain: &Chain) -> Self {
        let block = chain.block();
        let ledger = &chain.state().ledger;
        Self {
            block,
            service_owner: chain.service().owner(),
            service_address: chain.service().address(),
            fee: chain.service().fee(),
            default_governance: chain.service().default_governance(),
            pools: chain
                .pools()
                .iter()
                .map(|pool| PoolSummary::new(pool, ledger, block))
                .collect(),
        }
    }
}

impl PoolSummary {
    fn new(pool: &Pool, ledger: &daopool::ledger::Ledger, block: BlockHeight) -> Self {
        Self {
            id: pool.id().0,
            name: pool.name().to_string(),
            address: pool.address(),
            owner: pool.owner(),
            governance: *pool.settings(),
            treasury: ledger
                .holdings(&pool.address())
                .into_iter()
                .map(|(asset, amount)| HoldingSummary {
                    asset: asset.to_string(),
                    amount,
                })
                .collect(),
            generations: pool
                .generations()
                .iter()
                .filter_map(|generation| {
                    let token = pool.tokens().get(generation.token_slot)?;
                    let terms = generation.engine.terms();
                    Some(GenerationSummary {
                        id: generation.id.0,
                        symbol: token.info().symbol.clone(),
                        token: token.address(),
                        tge: generation.engine.address(),
                        state: generation.tge_state(block),
                        total_purchased: generation.engine.total_purchased(),
                        softcap: terms.softcap,
                        hardcap: terms.hardcap,
                        end_block: generation.engine.end_block(),
                        total_supply: token.total_supply(),
                    })
                })
                .collect(),
            proposals: pool
                .proposals()
                .map(|proposal| ProposalSummary {
                    id: proposal.id.0,
                    kind: proposal.kind(),
                    state: proposal.state(block),
                    for_votes: proposal.for_votes,
                    against_votes: proposal.against_votes,
                    end_block: proposal.end_block,
                    description: proposal.description.clone(),
                })
                .collect(),
        }
    }
}

impl StatusReport {
    /// Human-readable rendering.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Block: {}\n", self.block));
        out.push_str(&format!(
            "Service: owner {} fee {} (account {})\n",
            self.service_owner, self.fee, self.service_address
        ));
        out.push_str(&format!(
            "Default governance: {}\n",
            render_governance(&self.default_governance)
        ));

        if self.pools.is_empty() {
            out.push_str("No pools\n");
            return out;
        }

        for pool in &self.pools {
            out.push_str(&format!(
                "\nPool #{} \"{}\" at {} (owner {})\n",
                pool.id, pool.name, pool.address, pool.owner
            ));
            out.push_str(&format!("  governance: {}\n", render_governance(&pool.governance)));
            for holding in &pool.treasury {
                out.push_str(&format!("  treasury {}: {}\n", holding.asset, holding.amount));
            }
            for generation in &pool.generations {
                out.push_str(&format!(
                    "  generation {} [{}] {:?}: {}/{} sold (softcap {}), ends at block {}\n",
                    generation.id,
                    generation.symbol,
                    generation.state,
                    generation.total_purchased,
                    generation.hardcap,
                    generation.softcap,
                    generation.end_block
                ));
            }
            for proposal in &pool.proposals {
                out.push_str(&format!(
                    "  proposal {} {:?} {:?}: for {} against {}, voting ends at block {}\n",
                    proposal.id,
                    proposal.kind,
                    proposal.state,
                    proposal.for_votes,
                    proposal.against_votes,
                    proposal.end_block
                ));
            }
        }
        out
    }
}

fn render_governance(settings: &GovernanceSettings) -> String {
    format!(
        "quorum {}%, threshold {}% of {:?}, voting {} blocks, delay {} blocks",
        settings.quorum_percent,
        settings.threshold_percent,
        settings.threshold_base,
        settings.lifespan_blocks,
        settings.execution_delay_blocks
    )
}

/// Show the local node's state
pub async fn execute(config_path: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = DaoPoolConfig::load(config_path)?;
    let node = EmbeddedNode::load_snapshot(&config.node.state_path, local_collaborators()).await?;
    let report = node.query(StatusReport::from_chain).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }

    Ok(())
}
