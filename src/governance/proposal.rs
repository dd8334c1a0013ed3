//! Proposal records, ballot terms and derived proposal state.

use crate::crowdsale::TgeTerms;
use crate::error::{PoolError, PoolResult};
use crate::events::ExecutionOutcome;
use crate::types::{meets_percent, Address, Amount, BlockHeight, GenerationId, ProposalId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the threshold percentage is measured against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdBase {
    /// Token supply snapshotted when the proposal was created.
    #[default]
    TotalSupply,
    /// Votes cast on the proposal, for and against.
    VotesCast,
}

/// Voting terms fixed on a proposal at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotTerms {
    pub quorum_percent: u8,
    pub threshold_percent: u8,
    pub threshold_base: ThresholdBase,
    pub lifespan_blocks: u64,
}

impl BallotTerms {
    pub fn validate(&self) -> PoolResult<()> {
        if self.quorum_percent > 100 || self.threshold_percent > 100 {
            return Err(PoolError::InvalidArgument(format!(
                "quorum {} / threshold {} must be percentages",
                self.quorum_percent, self.threshold_percent
            )));
        }
        if self.lifespan_blocks == 0 {
            return Err(PoolError::InvalidArgument(
                "proposal lifespan must be at least one block".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply caller overrides on top of these defaults.
    pub fn with_overrides(mut self, overrides: &BallotOverrides) -> Self {
        if let Some(quorum) = overrides.quorum_percent {
            self.quorum_percent = quorum;
        }
        if let Some(threshold) = overrides.threshold_percent {
            self.threshold_percent = threshold;
        }
        if let Some(base) = overrides.threshold_base {
            self.threshold_base = base;
        }
        if let Some(lifespan) = overrides.lifespan_blocks {
            self.lifespan_blocks = lifespan;
        }
        self
    }
}

/// Optional per-proposal replacements for the pool's default terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotOverrides {
    pub quorum_percent: Option<u8>,
    pub threshold_percent: Option<u8>,
    pub threshold_base: Option<ThresholdBase>,
    pub lifespan_blocks: Option<u64>,
}

impl BallotOverrides {
    pub fn lifespan(blocks: u64) -> Self {
        Self {
            lifespan_blocks: Some(blocks),
            ..Self::default()
        }
    }
}

/// Payload executed when a proposal passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalAction {
    TransferNative {
        recipient: Address,
        amount: Amount,
    },
    TransferToken {
        token: Address,
        recipient: Address,
        amount: Amount,
    },
    /// Secondary crowdsale of the pool's current token.
    CreateTge {
        tge: TgeTerms,
    },
}

/// Proposal kind; at most one non-terminal proposal per kind and pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    TransferNative,
    TransferToken,
    CreateTge,
}

impl ProposalAction {
    pub fn kind(&self) -> ProposalKind {
        match self {
            ProposalAction::TransferNative { .. } => ProposalKind::TransferNative,
            ProposalAction::TransferToken { .. } => ProposalKind::TransferToken,
            ProposalAction::CreateTge { .. } => ProposalKind::CreateTge,
        }
    }
}

/// Derived proposal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalState {
    Active,
    Rejected,
    Successful,
    Executed,
}

impl ProposalState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalState::Rejected | ProposalState::Executed)
    }
}

/// A recorded vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub amount: Amount,
    pub support: bool,
}

/// One proposal in a pool's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: Address,
    /// Generation current when the proposal was raised; its supply is snapshotted.
    pub generation: GenerationId,
    pub action: ProposalAction,
    pub description: String,
    pub terms: BallotTerms,
    pub start_block: BlockHeight,
    pub end_block: BlockHeight,
    pub supply_snapshot: Amount,
    pub for_votes: Amount,
    pub against_votes: Amount,
    pub votes: BTreeMap<Address, Vote>,
    /// Stored once `execute_ballot` resolved the proposal.
    pub resolution: Option<ExecutionOutcome>,
}

impl Proposal {
    pub fn kind(&self) -> ProposalKind {
        self.action.kind()
    }

    /// Quorum on the supply snapshot, then threshold on the configured base.
    /// A proposal without any supporting vote never passes.
    pub fn passes(&self) -> bool {
        if self.for_votes == 0 {
            return false;
        }
        let quorum = meets_percent(self.for_votes, self.supply_snapshot, self.terms.quorum_percent);
        let base = match self.terms.threshold_base {
            ThresholdBase::TotalSupply => self.supply_snapshot,
            ThresholdBase::VotesCast => self.for_votes.saturating_add(self.against_votes),
        };
        quorum && meets_percent(self.for_votes, base, self.terms.threshold_percent)
    }

    pub fn state(&self, block: BlockHeight) -> ProposalState {
        match self.resolution {
            Some(ExecutionOutcome::Executed) => ProposalState::Executed,
            Some(_) => ProposalState::Rejected,
            None if block < self.end_block => ProposalState::Active,
            None if self.passes() => ProposalState::Successful,
            None => ProposalState::Rejected,
        }
    }
}
