//! daopool - DAO pools with crowdsales and token-weighted governance
//!
//! A pool is a legal-entity-backed DAO. Its treasury is funded by token
//! generation events (TGEs) and spent through proposals its token holders
//! vote on.
//!
//! Key principles:
//! - Block height is the only clock; TGE and proposal states are derived
//! - Every operation commits atomically or leaves no trace
//! - Snapshots are CBOR and restore to identical addresses
//!
//! Entry points: [`chain::Chain`] for synchronous use, and
//! [`chain::EmbeddedNode`] for shared async access with event streams.

pub mod chain;
pub mod collaborators;
pub mod context;
pub mod crowdsale;
pub mod error;
pub mod events;
pub mod governance;
pub mod ledger;
pub mod serialization;
pub mod service;
pub mod token;
pub mod types;

pub use chain::{Chain, ChainState, Collaborators, EmbeddedNode};
pub use error::{ErrorKind, PoolError, PoolResult};
pub use events::{Event, ExecutionOutcome};
pub use types::{Address, Amount, Asset, BlockHeight, GenerationId, PoolId, ProposalId};
