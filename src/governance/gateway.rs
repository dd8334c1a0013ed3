//! Proposal gateway: eligibility and payload checks in front of a pool.

use super::pool::Pool;
use super::proposal::{BallotOverrides, ProposalAction};
use crate::context::TxContext;
use crate::crowdsale::TgeTerms;
use crate::error::{PoolError, PoolResult};
use crate::types::{Address, Amount, Asset, ProposalId};
use tracing::debug;

/// Entry point for shareholders raising proposals.
///
/// Only holders of the current token may propose. Ballot terms default to
/// the pool settings; any field of the overrides replaces the default.
pub struct ProposalGateway;

impl ProposalGateway {
    pub fn create_transfer_native_proposal(
        pool: &mut Pool,
        ctx: &mut TxContext<'_>,
        proposer: &Address,
        recipient: Address,
        amount: Amount,
        overrides: BallotOverrides,
        description: String,
    ) -> PoolResult<ProposalId> {
        let action = ProposalAction::TransferNative { recipient, amount };
        Self::submit(pool, ctx, proposer, action, overrides, description)
    }

    pub fn create_transfer_token_proposal(
        pool: &mut Pool,
        ctx: &mut TxContext<'_>,
        proposer: &Address,
        token: Address,
        recipient: Address,
        amount: Amount,
        overrides: BallotOverrides,
        description: String,
    ) -> PoolResult<ProposalId> {
        let action = ProposalAction::TransferToken {
            token,
            recipient,
            amount,
        };
        Self::submit(pool, ctx, proposer, action, overrides, description)
    }

    pub fn create_tge_proposal(
        pool: &mut Pool,
        ctx: &mut TxContext<'_>,
        proposer: &Address,
        tge: TgeTerms,
        overrides: BallotOverrides,
        description: String,
    ) -> PoolResult<ProposalId> {
        let action = ProposalAction::CreateTge { tge };
        Self::submit(pool, ctx, proposer, action, overrides, description)
    }

    fn submit(
        pool: &mut Pool,
        ctx: &mut TxContext<'_>,
        proposer: &Address,
        action: ProposalAction,
        overrides: BallotOverrides,
        description: String,
    ) -> PoolResult<ProposalId> {
        if !pool.is_shareholder(proposer) {
            return Err(PoolError::NotShareholder(*proposer));
        }
        Self::validate_action(pool, ctx, &action)?;
        let terms = pool.settings().ballot_terms().with_overrides(&overrides);
        debug!(pool = %pool.id(), proposer = %proposer, kind = ?action.kind(), "proposal accepted by gateway");
        pool.create_proposal(ctx, proposer, action, terms, description)
    }

    fn validate_action(pool: &Pool, ctx: &TxContext<'_>, action: &ProposalAction) -> PoolResult<()> {
        match action {
            ProposalAction::TransferNative { recipient, amount } => {
                Self::validate_transfer(recipient, *amount)
            }
            ProposalAction::TransferToken {
                token,
                recipient,
                amount,
            } => {
                Self::validate_transfer(recipient, *amount)?;
                let asset = Asset::Token(*token);
                if !ctx.router.is_whitelisted(&asset) {
                    return Err(PoolError::AssetNotWhitelisted(asset));
                }
                Ok(())
            }
            // Remaining supply is only checked at execution.
            ProposalAction::CreateTge { tge } => tge.validate(pool.current_token()?.cap()),
        }
    }

    fn validate_transfer(recipient: &Address, amount: Amount) -> PoolResult<()> {
        if recipient.is_zero() {
            return Err(PoolError::InvalidArgument("recipient is the zero address".to_string()));
        }
        if amount == 0 {
            return Err(PoolError::InvalidArgument("transfer amount is zero".to_string()));
        }
        Ok(())
    }
}
