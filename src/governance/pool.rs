//! Pool: treasury owner, token and generation arenas, proposal ledger.
//!
//! Both arenas are append-only. Each generation is one crowdsale engine
//! selling one of the pool's tokens. The pool owner restarting after a failed
//! TGE issues a fresh token; a secondary TGE approved by vote sells more of
//! the current token. The last generation is current, and its token is the
//! one shareholders vote with.

use super::proposal::{BallotTerms, Proposal, ProposalAction, ProposalKind, ProposalState, ThresholdBase, Vote};
use crate::collaborators::PaymentRouter;
use crate::context::TxContext;
use crate::crowdsale::{CrowdsaleEngine, TgeState, TgeTerms};
use crate::error::{PoolError, PoolResult};
use crate::events::{Event, ExecutionOutcome};
use crate::ledger::Ledger;
use crate::token::{GovernanceToken, LockEntry, LockReason, TokenInfo};
use crate::types::{
    checked_add, Address, Amount, Asset, BlockHeight, GenerationId, PoolId, ProposalId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Default voting configuration of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceSettings {
    pub quorum_percent: u8,
    pub threshold_percent: u8,
    #[serde(default)]
    pub threshold_base: ThresholdBase,
    pub lifespan_blocks: u64,
    /// Blocks to wait after the voting window before execution.
    #[serde(default)]
    pub execution_delay_blocks: u64,
}

impl Default for GovernanceSettings {
    fn default() -> Self {
        Self {
            quorum_percent: 30,
            threshold_percent: 50,
            threshold_base: ThresholdBase::TotalSupply,
            lifespan_blocks: 25,
            execution_delay_blocks: 0,
        }
    }
}

impl GovernanceSettings {
    pub fn ballot_terms(&self) -> BallotTerms {
        BallotTerms {
            quorum_percent: self.quorum_percent,
            threshold_percent: self.threshold_percent,
            threshold_base: self.threshold_base,
            lifespan_blocks: self.lifespan_blocks,
        }
    }

    pub fn validate(&self) -> PoolResult<()> {
        self.ballot_terms().validate()
    }
}

/// One crowdsale campaign and the slot of the token it sells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub id: GenerationId,
    pub token_slot: usize,
    pub engine: CrowdsaleEngine,
}

impl Generation {
    pub fn tge_state(&self, block: BlockHeight) -> TgeState {
        self.engine.state(block)
    }
}

/// A DAO-like entity with its own treasury, tokens and proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    id: PoolId,
    address: Address,
    owner: Address,
    name: String,
    jurisdiction: u16,
    entity_type: u16,
    settings: GovernanceSettings,
    tokens: Vec<GovernanceToken>,
    generations: Vec<Generation>,
    proposals: BTreeMap<ProposalId, Proposal>,
    next_proposal_id: u64,
}

impl Pool {
    pub fn new(
        id: PoolId,
        owner: Address,
        name: String,
        jurisdiction: u16,
        entity_type: u16,
        settings: GovernanceSettings,
    ) -> Self {
        Self {
            id,
            address: Address::derive("pool", &[&id.0.to_be_bytes()]),
            owner,
            name,
            jurisdiction,
            entity_type,
            settings,
            tokens: Vec::new(),
            generations: Vec::new(),
            proposals: BTreeMap::new(),
            next_proposal_id: 1,
        }
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Treasury account on the host ledger.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn jurisdiction(&self) -> u16 {
        self.jurisdiction
    }

    pub fn entity_type(&self) -> u16 {
        self.entity_type
    }

    pub fn settings(&self) -> &GovernanceSettings {
        &self.settings
    }

    pub(crate) fn set_settings(&mut self, settings: GovernanceSettings) {
        self.settings = settings;
    }

    pub fn generations(&self) -> &[Generation] {
        &self.generations
    }

    pub fn current(&self) -> PoolResult<&Generation> {
        self.generations
            .last()
            .ok_or_else(|| PoolError::GenerationNotFound(format!("{} has no generation", self.id)))
    }

    pub fn generation(&self, id: GenerationId) -> PoolResult<&Generation> {
        self.generations
            .get(id.0 as usize)
            .ok_or_else(|| PoolError::GenerationNotFound(format!("{}/{}", self.id, id)))
    }

    /// Every token the pool has issued, oldest first.
    pub fn tokens(&self) -> &[GovernanceToken] {
        &self.tokens
    }

    /// Token sold by `generation`.
    pub fn token_of(&self, generation: GenerationId) -> PoolResult<&GovernanceToken> {
        let slot = self.generation(generation)?.token_slot;
        self.tokens
            .get(slot)
            .ok_or_else(|| PoolError::GenerationNotFound(format!("{} has no token {}", self.id, slot)))
    }

    /// Token of the current generation: the pool's voting token.
    pub fn current_token(&self) -> PoolResult<&GovernanceToken> {
        self.token_of(self.current()?.id)
    }

    /// Token and engine of `generation`, borrowed together.
    pub fn parts(&self, generation: GenerationId) -> PoolResult<(&GovernanceToken, &CrowdsaleEngine)> {
        Ok((self.token_of(generation)?, &self.generation(generation)?.engine))
    }

    /// Mutable token and engine of `generation`.
    pub fn parts_mut(
        &mut self,
        generation: GenerationId,
    ) -> PoolResult<(&mut GovernanceToken, &mut CrowdsaleEngine)> {
        let pool = self.id;
        let generation = self
            .generations
            .get_mut(generation.0 as usize)
            .ok_or_else(|| PoolError::GenerationNotFound(format!("{}/{}", pool, generation)))?;
        let token = self.tokens.get_mut(generation.token_slot).ok_or_else(|| {
            PoolError::GenerationNotFound(format!("{} has no token {}", pool, generation.token_slot))
        })?;
        Ok((token, &mut generation.engine))
    }

    pub fn current_parts_mut(&mut self) -> PoolResult<(&mut GovernanceToken, &mut CrowdsaleEngine)> {
        let id = self.current()?.id;
        self.parts_mut(id)
    }

    /// State of the current TGE, `None` before the first generation.
    pub fn current_tge_state(&self, block: BlockHeight) -> Option<TgeState> {
        self.generations.last().map(|g| g.tge_state(block))
    }

    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    pub fn proposal(&self, id: ProposalId) -> PoolResult<&Proposal> {
        self.proposals.get(&id).ok_or(PoolError::ProposalNotFound(id))
    }

    pub fn proposal_state(&self, id: ProposalId, block: BlockHeight) -> PoolResult<ProposalState> {
        Ok(self.proposal(id)?.state(block))
    }

    /// Treasury value in `unit`. Holdings the router cannot price are skipped.
    pub fn tvl(&self, ledger: &Ledger, router: &dyn PaymentRouter, unit: Asset) -> PoolResult<Amount> {
        let mut total: Amount = 0;
        for (asset, amount) in ledger.holdings(&self.address) {
            match router.convert(asset, unit, amount) {
                Ok(value) => total = checked_add(total, value)?,
                Err(PoolError::NoRoute { .. }) => {
                    debug!(pool = %self.id, asset = %asset, "no route, skipped in TVL");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn ensure_no_active_tge(&self, block: BlockHeight) -> PoolResult<()> {
        if self.current_tge_state(block) == Some(TgeState::Active) {
            return Err(PoolError::ActiveTge);
        }
        Ok(())
    }

    fn next_generation(&self) -> PoolResult<(GenerationId, Address)> {
        let index = u32::try_from(self.generations.len()).map_err(|_| PoolError::Overflow)?;
        let engine_address = Address::derive("tge", &[&self.address.0, &index.to_be_bytes()]);
        Ok((GenerationId(index), engine_address))
    }

    /// Start a crowdsale of a fresh token as the current generation.
    ///
    /// Refused while the current TGE is still active. The engine is owned by
    /// the pool owner and starts at the current block.
    pub fn start_generation(
        &mut self,
        ctx: &mut TxContext<'_>,
        token_info: TokenInfo,
        terms: TgeTerms,
    ) -> PoolResult<GenerationId> {
        self.ensure_no_active_tge(ctx.block)?;
        terms.validate(token_info.cap)?;

        let (id, engine_address) = self.next_generation()?;
        let slot = self.tokens.len();
        let slot_bytes = u32::try_from(slot).map_err(|_| PoolError::Overflow)?.to_be_bytes();
        let token_address = Address::derive("token", &[&self.address.0, &slot_bytes]);
        self.tokens.push(GovernanceToken::new(
            token_address,
            token_info,
            id,
            engine_address,
            self.address,
        ));
        self.install_generation(ctx, id, engine_address, slot, terms)
    }

    /// Start a secondary crowdsale of the current token.
    ///
    /// The new campaign may sell at most the supply still unminted under the
    /// token's cap. Lockups and refunds of earlier campaigns are unaffected.
    pub fn start_secondary_generation(
        &mut self,
        ctx: &mut TxContext<'_>,
        terms: TgeTerms,
    ) -> PoolResult<GenerationId> {
        self.ensure_no_active_tge(ctx.block)?;
        let slot = self.current()?.token_slot;
        let token = self.current_token()?;
        terms.validate(token.cap())?;
        let remaining = token.remaining_supply();
        if terms.hardcap > remaining {
            return Err(PoolError::HardcapAboveRemainingSupply {
                hardcap: terms.hardcap,
                remaining,
            });
        }

        let (id, engine_address) = self.next_generation()?;
        let (pool, pool_address) = (self.id, self.address);
        self.tokens
            .get_mut(slot)
            .ok_or_else(|| PoolError::GenerationNotFound(format!("{} has no token {}", pool, slot)))?
            .grant_minter(&pool_address, id, engine_address)?;
        self.install_generation(ctx, id, engine_address, slot, terms)
    }

    fn install_generation(
        &mut self,
        ctx: &mut TxContext<'_>,
        id: GenerationId,
        engine_address: Address,
        token_slot: usize,
        terms: TgeTerms,
    ) -> PoolResult<GenerationId> {
        let token_address = self
            .tokens
            .get(token_slot)
            .map(GovernanceToken::address)
            .ok_or_else(|| PoolError::GenerationNotFound(format!("{} has no token {}", self.id, token_slot)))?;
        let engine = CrowdsaleEngine::new(
            engine_address,
            self.id,
            self.address,
            self.owner,
            id,
            terms,
            ctx.block,
        );
        self.generations.push(Generation {
            id,
            token_slot,
            engine,
        });

        info!(
            pool = %self.id,
            generation = %id,
            token = %token_address,
            tge = %engine_address,
            "TGE created"
        );
        ctx.emit(Event::TgeCreated {
            pool: self.id,
            generation: id,
            tge: engine_address,
            token: token_address,
        });
        Ok(id)
    }

    /// Holder of a non-zero balance of the current token.
    pub fn is_shareholder(&self, addr: &Address) -> bool {
        self.current_token()
            .map(|token| token.balance_of(addr) > 0)
            .unwrap_or(false)
    }

    /// Non-terminal proposal of `kind`, if any.
    pub fn pending_proposal(&self, kind: ProposalKind, block: BlockHeight) -> Option<ProposalId> {
        self.proposals
            .values()
            .find(|p| p.kind() == kind && !p.state(block).is_terminal())
            .map(|p| p.id)
    }

    /// Record a proposal bound to the current generation.
    ///
    /// Callers are expected to have checked eligibility and payload shape.
    pub fn create_proposal(
        &mut self,
        ctx: &mut TxContext<'_>,
        proposer: &Address,
        action: ProposalAction,
        terms: BallotTerms,
        description: String,
    ) -> PoolResult<ProposalId> {
        terms.validate()?;
        let kind = action.kind();
        if let Some(existing) = self.pending_proposal(kind, ctx.block) {
            return Err(PoolError::ProposalAlreadyActive(existing));
        }
        if kind == ProposalKind::CreateTge {
            self.ensure_no_active_tge(ctx.block)?;
        }

        let generation = self.current()?.id;
        let supply_snapshot = self.current_token()?.total_supply();
        let id = ProposalId(self.next_proposal_id);
        let start_block = ctx.block;
        let end_block = start_block.saturating_add(terms.lifespan_blocks);

        self.proposals.insert(
            id,
            Proposal {
                id,
                proposer: *proposer,
                generation,
                action,
                description,
                terms,
                start_block,
                end_block,
                supply_snapshot,
                for_votes: 0,
                against_votes: 0,
                votes: BTreeMap::new(),
                resolution: None,
            },
        );
        self.next_proposal_id += 1;

        info!(pool = %self.id, proposal = %id, kind = ?kind, proposer = %proposer, end_block, "proposal created");
        ctx.emit(Event::ProposalCreated {
            pool: self.id,
            proposal: id,
            kind,
            proposer: *proposer,
            quorum_percent: terms.quorum_percent,
            threshold_percent: terms.threshold_percent,
            start_block,
            end_block,
        });
        Ok(id)
    }

    /// Vote with `amount` unlocked tokens of the current token.
    ///
    /// The tokens stay locked until the proposal's end block. A generation
    /// started while the vote is open does not change the token when it
    /// sells the same one.
    pub fn cast_vote(
        &mut self,
        ctx: &mut TxContext<'_>,
        voter: &Address,
        id: ProposalId,
        amount: Amount,
        support: bool,
    ) -> PoolResult<()> {
        let pool_id = self.id;
        let pool_address = self.address;
        let proposal = self.proposals.get(&id).ok_or(PoolError::ProposalNotFound(id))?;
        if ctx.block >= proposal.end_block {
            return Err(PoolError::VotingFinished);
        }
        if proposal.votes.contains_key(voter) {
            return Err(PoolError::AlreadyVoted(id));
        }
        if amount == 0 {
            return Err(PoolError::InvalidArgument("vote amount is zero".to_string()));
        }
        let end_block = proposal.end_block;
        let for_votes = if support {
            checked_add(proposal.for_votes, amount)?
        } else {
            proposal.for_votes
        };
        let against_votes = if support {
            proposal.against_votes
        } else {
            checked_add(proposal.against_votes, amount)?
        };

        let (token, _) = self.current_parts_mut()?;
        let entry = LockEntry {
            amount,
            unlock_block: end_block,
            tvl_gated: false,
            reason: LockReason::Vote(id),
        };
        token.lock(&pool_address, voter, entry, ctx.block)?;

        let proposal = self.proposals.get_mut(&id).ok_or(PoolError::ProposalNotFound(id))?;
        proposal.for_votes = for_votes;
        proposal.against_votes = against_votes;
        proposal.votes.insert(*voter, Vote { amount, support });

        info!(pool = %pool_id, proposal = %id, voter = %voter, amount, support, "vote cast");
        ctx.emit(Event::VoteCast {
            pool: pool_id,
            voter: *voter,
            proposal: id,
            amount,
            support,
        });
        Ok(())
    }

    /// Resolve a proposal after its voting window and execution delay.
    ///
    /// A passed proposal runs its payload and becomes `Executed`. A transfer
    /// the treasury cannot cover resolves as `PayloadFailed`, which is final.
    /// A `CreateTge` payload while a TGE is active, or with a hardcap above
    /// the token's remaining supply, fails and leaves the proposal pending.
    pub fn execute_ballot(
        &mut self,
        ctx: &mut TxContext<'_>,
        id: ProposalId,
    ) -> PoolResult<ExecutionOutcome> {
        let proposal = self.proposal(id)?;
        let ready_at = proposal
            .end_block
            .saturating_add(self.settings.execution_delay_blocks);
        if ctx.block < ready_at {
            return Err(PoolError::VotingNotFinished);
        }
        if proposal.resolution.is_some() {
            return Err(PoolError::WrongState(format!("{} already resolved", id)));
        }

        let outcome = if !proposal.passes() {
            warn!(
                pool = %self.id,
                proposal = %id,
                for_votes = proposal.for_votes,
                against_votes = proposal.against_votes,
                supply = proposal.supply_snapshot,
                "proposal rejected"
            );
            ExecutionOutcome::Rejected
        } else {
            let action = proposal.action.clone();
            self.run_payload(ctx, id, action)?
        };

        let proposal = self.proposals.get_mut(&id).ok_or(PoolError::ProposalNotFound(id))?;
        proposal.resolution = Some(outcome);

        info!(pool = %self.id, proposal = %id, outcome = ?outcome, "proposal resolved");
        ctx.emit(Event::ProposalExecuted {
            pool: self.id,
            proposal: id,
            outcome,
        });
        Ok(outcome)
    }

    fn run_payload(
        &mut self,
        ctx: &mut TxContext<'_>,
        id: ProposalId,
        action: ProposalAction,
    ) -> PoolResult<ExecutionOutcome> {
        match action {
            ProposalAction::TransferNative { recipient, amount } => {
                self.pay_from_treasury(ctx, id, Asset::Native, &recipient, amount)
            }
            ProposalAction::TransferToken {
                token,
                recipient,
                amount,
            } => self.pay_from_treasury(ctx, id, Asset::Token(token), &recipient, amount),
            ProposalAction::CreateTge { tge } => {
                self.start_secondary_generation(ctx, tge)?;
                Ok(ExecutionOutcome::Executed)
            }
        }
    }

    fn pay_from_treasury(
        &mut self,
        ctx: &mut TxContext<'_>,
        id: ProposalId,
        asset: Asset,
        recipient: &Address,
        amount: Amount,
    ) -> PoolResult<ExecutionOutcome> {
        if let Err(e) = ctx.ledger.ensure_balance(&self.address, &asset, amount) {
            warn!(pool = %self.id, proposal = %id, asset = %asset, error = %e, "payload failed");
            return Ok(ExecutionOutcome::PayloadFailed);
        }
        ctx.ledger.transfer(&self.address, recipient, asset, amount)?;
        info!(pool = %self.id, proposal = %id, asset = %asset, recipient = %recipient, amount, "treasury transfer");
        Ok(ExecutionOutcome::Executed)
    }
}
