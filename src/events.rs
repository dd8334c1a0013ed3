//! Events emitted by successful transactions.
//!
//! A transaction collects its events in an [`EventLog`]; the chain only
//! publishes them after the transaction commits, so a failed call never
//! leaks events.

use crate::governance::proposal::ProposalKind;
use crate::types::{Address, Amount, Asset, GenerationId, PoolId, ProposalId};
use serde::{Deserialize, Serialize};

/// Final outcome of an executed ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Payload ran.
    Executed,
    /// Quorum or threshold not met.
    Rejected,
    /// Ballot passed but the payload could not be paid from the treasury.
    PayloadFailed,
}

/// Observable state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    PoolCreated {
        pool: PoolId,
        pool_address: Address,
        token: Address,
        tge: Address,
    },
    TgeCreated {
        pool: PoolId,
        generation: GenerationId,
        tge: Address,
        token: Address,
    },
    Purchased {
        pool: PoolId,
        generation: GenerationId,
        buyer: Address,
        amount: Amount,
        asset: Asset,
        paid: Amount,
    },
    Redeemed {
        pool: PoolId,
        generation: GenerationId,
        buyer: Address,
        amount: Amount,
    },
    FundsTransferred {
        pool: PoolId,
        generation: GenerationId,
        asset: Asset,
        amount: Amount,
    },
    LockupTvlReached {
        pool: PoolId,
        generation: GenerationId,
    },
    Transfer {
        token: Address,
        from: Address,
        to: Address,
        amount: Amount,
    },
    ProposalCreated {
        pool: PoolId,
        proposal: ProposalId,
        kind: ProposalKind,
        proposer: Address,
        quorum_percent: u8,
        threshold_percent: u8,
        start_block: u64,
        end_block: u64,
    },
    VoteCast {
        pool: PoolId,
        voter: Address,
        proposal: ProposalId,
        amount: Amount,
        support: bool,
    },
    ProposalExecuted {
        pool: PoolId,
        proposal: ProposalId,
        outcome: ExecutionOutcome,
    },
    FeeCollected {
        payer: Address,
        amount: Amount,
    },
}

impl Event {
    /// Pool the event belongs to, if any.
    pub fn pool(&self) -> Option<PoolId> {
        match self {
            Event::PoolCreated { pool, .. }
            | Event::TgeCreated { pool, .. }
            | Event::Purchased { pool, .. }
            | Event::Redeemed { pool, .. }
            | Event::FundsTransferred { pool, .. }
            | Event::LockupTvlReached { pool, .. }
            | Event::ProposalCreated { pool, .. }
            | Event::VoteCast { pool, .. }
            | Event::ProposalExecuted { pool, .. } => Some(*pool),
            Event::Transfer { .. } | Event::FeeCollected { .. } => None,
        }
    }
}

/// Events collected during one transaction.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_pool_routing() {
        let event = Event::VoteCast {
            pool: PoolId(3),
            voter: Address::from_label("v"),
            proposal: ProposalId(1),
            amount: 10,
            support: true,
        };
        assert_eq!(event.pool(), Some(PoolId(3)));

        let fee = Event::FeeCollected {
            payer: Address::from_label("p"),
            amount: 1,
        };
        assert_eq!(fee.pool(), None);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = Event::Redeemed {
            pool: PoolId(0),
            generation: GenerationId(0),
            buyer: Address::from_label("b"),
            amount: 500,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "redeemed");
        assert_eq!(json["amount"], 500);
    }

    #[test]
    fn test_event_log_order() {
        let mut log = EventLog::new();
        log.emit(Event::FeeCollected {
            payer: Address::ZERO,
            amount: 1,
        });
        log.emit(Event::FeeCollected {
            payer: Address::ZERO,
            amount: 2,
        });
        let events = log.into_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Event::FeeCollected { amount: 2, .. }));
    }
}
