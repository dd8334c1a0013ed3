//! Pool governance
//!
//! - [`Pool`]: treasury, generation arena and proposal ledger
//! - [`ProposalGateway`]: shareholder and payload checks before recording
//! - Proposals resolve from block height: `Active` until the end block, then
//!   `Successful` or `Rejected`; execution stores the final outcome

pub mod gateway;
pub mod pool;
pub mod proposal;

pub use gateway::ProposalGateway;
pub use pool::{Generation, GovernanceSettings, Pool};
pub use proposal::{
    BallotOverrides, BallotTerms, Proposal, ProposalAction, ProposalKind, ProposalState,
    ThresholdBase, Vote,
};
