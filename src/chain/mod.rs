//! Deterministic chain: the single owner of all pool state.
//!
//! Every operation is one transaction and commits only when it succeeds, so
//! a rejected call leaves no trace: no balance change, no lock, no event.
//! Pools are staged copy-on-write, so a transaction clones only the pools it
//! touches; ledger writes are journaled and undone on rejection. Block
//! height is the only clock and advances through [`Chain::mine`].

pub mod node;

pub use node::EmbeddedNode;

use crate::collaborators::{MetadataRegistry, PaymentRouter};
use crate::context::TxContext;
use crate::crowdsale::{Payment, PurchaseReceipt, RedeemReceipt, TgeState, TgeTerms};
use crate::error::{PoolError, PoolResult, Role};
use crate::events::{Event, EventLog, ExecutionOutcome};
use crate::governance::{
    BallotOverrides, GovernanceSettings, Pool, ProposalGateway, ProposalState,
};
use crate::ledger::Ledger;
use crate::service::{PoolCreated, PoolRequest, Service};
use crate::types::{Address, Amount, Asset, BlockHeight, GenerationId, PoolId, ProposalId};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything the chain persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    pub block: BlockHeight,
    pub ledger: Ledger,
    pub service: Service,
    pub pools: Vec<Pool>,
}

impl ChainState {
    pub fn genesis(service_owner: Address, fee: Amount) -> Self {
        Self {
            block: 0,
            ledger: Ledger::new(),
            service: Service::new(service_owner, fee),
            pools: Vec::new(),
        }
    }

    /// Governance settings new pools get when their request carries none.
    pub fn with_default_governance(mut self, settings: GovernanceSettings) -> Self {
        self.service = self.service.with_default_governance(settings);
        self
    }
}

/// Injected external collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub router: Arc<dyn PaymentRouter>,
    pub metadata: Arc<dyn MetadataRegistry>,
}

/// Copy-on-write view of the service and pools inside one transaction.
struct Staged<'s> {
    service: Cow<'s, Service>,
    pools: &'s [Pool],
    touched: BTreeMap<usize, Pool>,
    created: Vec<Pool>,
}

/// What a committed transaction writes back.
struct StagedChanges {
    service: Option<Service>,
    touched: BTreeMap<usize, Pool>,
    created: Vec<Pool>,
}

impl<'s> Staged<'s> {
    fn new(service: &'s Service, pools: &'s [Pool]) -> Self {
        Self {
            service: Cow::Borrowed(service),
            pools,
            touched: BTreeMap::new(),
            created: Vec::new(),
        }
    }

    fn service(&self) -> &Service {
        &self.service
    }

    fn service_mut(&mut self) -> &mut Service {
        self.service.to_mut()
    }

    /// Staged copy of pool `id`, cloned on first access.
    fn pool_mut(&mut self, id: PoolId) -> PoolResult<&mut Pool> {
        let index = usize::try_from(id.0).map_err(|_| PoolError::PoolNotFound(id))?;
        let committed = self.pools;
        if let Some(pool) = committed.get(index) {
            return Ok(self.touched.entry(index).or_insert_with(|| pool.clone()));
        }
        self.created
            .get_mut(index - committed.len())
            .ok_or(PoolError::PoolNotFound(id))
    }

    fn next_pool_id(&self) -> PoolResult<PoolId> {
        let count = self.pools.len() + self.created.len();
        Ok(PoolId(u64::try_from(count).map_err(|_| PoolError::Overflow)?))
    }

    fn push_pool(&mut self, pool: Pool) {
        self.created.push(pool);
    }

    fn into_changes(self) -> StagedChanges {
        StagedChanges {
            service: match self.service {
                Cow::Owned(service) => Some(service),
                Cow::Borrowed(_) => None,
            },
            touched: self.touched,
            created: self.created,
        }
    }
}

/// Transactional state machine over [`ChainState`].
pub struct Chain {
    state: ChainState,
    collaborators: Collaborators,
    /// Events of committed transactions not yet drained.
    journal: Vec<Event>,
}

impl Chain {
    pub fn new(state: ChainState, collaborators: Collaborators) -> Self {
        Self {
            state,
            collaborators,
            journal: Vec::new(),
        }
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn block(&self) -> BlockHeight {
        self.state.block
    }

    /// Take the events committed since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.journal)
    }

    /// Advance the block height.
    pub fn mine(&mut self, blocks: u64) -> BlockHeight {
        self.state.block = self.state.block.saturating_add(blocks);
        debug!(block = self.state.block, "mined");
        self.state.block
    }

    /// Genesis allocation / faucet credit.
    pub fn fund(&mut self, account: &Address, asset: Asset, amount: Amount) -> PoolResult<()> {
        self.state.ledger.credit(account, asset, amount)
    }

    fn transact<T>(
        &mut self,
        op: impl FnOnce(&mut TxContext<'_>, &mut Staged<'_>) -> PoolResult<T>,
    ) -> PoolResult<T> {
        let mut events = EventLog::new();
        let ChainState {
            block,
            ledger,
            service,
            pools,
        } = &mut self.state;

        ledger.begin();
        let mut staged = Staged::new(service, pools);
        let result = {
            let mut ctx = TxContext {
                block: *block,
                ledger: &mut *ledger,
                router: self.collaborators.router.as_ref(),
                events: &mut events,
            };
            op(&mut ctx, &mut staged)
        };

        match result {
            Ok(value) => {
                let changes = staged.into_changes();
                ledger.commit();
                if let Some(updated) = changes.service {
                    *service = updated;
                }
                for (index, pool) in changes.touched {
                    if let Some(slot) = pools.get_mut(index) {
                        *slot = pool;
                    }
                }
                pools.extend(changes.created);
                self.journal.extend(events.into_events());
                Ok(value)
            }
            Err(e) => {
                ledger.rollback();
                debug!(block = *block, error = %e, "transaction rejected");
                Err(e)
            }
        }
    }

    // ---- Service --------------------------------------------------------

    /// Create a pool with its first generation, or start a new generation
    /// with a fresh token for `request.existing` after its current TGE
    /// failed.
    pub fn create_pool(
        &mut self,
        caller: &Address,
        request: PoolRequest,
        fee_paid: Amount,
    ) -> PoolResult<PoolCreated> {
        let caller = *caller;
        let metadata = Arc::clone(&self.collaborators.metadata);
        self.transact(move |ctx, staged| {
            staged.service().collect_fee(ctx, &caller, fee_paid)?;

            match request.existing {
                None => {
                    let settings = request
                        .governance
                        .unwrap_or(staged.service().default_governance());
                    settings.validate()?;
                    if !metadata.record_exists(request.jurisdiction, request.entity_type) {
                        return Err(PoolError::RecordNotFound {
                            jurisdiction: request.jurisdiction,
                            entity_type: request.entity_type,
                        });
                    }
                    let id = staged.next_pool_id()?;
                    let mut pool = Pool::new(
                        id,
                        caller,
                        request.name,
                        request.jurisdiction,
                        request.entity_type,
                        settings,
                    );
                    pool.start_generation(ctx, request.token, request.tge)?;
                    let created = pool_handles(&pool)?;
                    info!(pool = %id, owner = %caller, address = %created.pool_address, "pool created");
                    ctx.emit(Event::PoolCreated {
                        pool: id,
                        pool_address: created.pool_address,
                        token: created.token,
                        tge: created.tge,
                    });
                    staged.push_pool(pool);
                    Ok(created)
                }
                Some(id) => {
                    if let Some(settings) = &request.governance {
                        settings.validate()?;
                    }
                    let pool = staged.pool_mut(id)?;
                    if caller != pool.owner() {
                        return Err(PoolError::Unauthorized {
                            role: Role::PoolOwner,
                            caller,
                        });
                    }
                    match pool.current_tge_state(ctx.block) {
                        Some(TgeState::Active) => return Err(PoolError::ActiveTge),
                        Some(TgeState::Successful) => {
                            return Err(PoolError::WrongState(
                                "current TGE succeeded; new TGEs need a proposal".to_string(),
                            ))
                        }
                        _ => {}
                    }
                    if let Some(settings) = request.governance {
                        pool.set_settings(settings);
                    }
                    pool.start_generation(ctx, request.token, request.tge)?;
                    pool_handles(pool)
                }
            }
        })
    }

    pub fn add_creator(&mut self, caller: &Address, creator: Address) -> PoolResult<()> {
        let caller = *caller;
        self.transact(move |_, staged| staged.service_mut().add_to_whitelist(&caller, creator))
    }

    pub fn remove_creator(&mut self, caller: &Address, creator: Address) -> PoolResult<()> {
        let caller = *caller;
        self.transact(move |_, staged| staged.service_mut().remove_from_whitelist(&caller, creator))
    }

    pub fn set_fee(&mut self, caller: &Address, fee: Amount) -> PoolResult<()> {
        let caller = *caller;
        self.transact(move |_, staged| staged.service_mut().set_fee(&caller, fee))
    }

    pub fn set_default_governance(
        &mut self,
        caller: &Address,
        settings: GovernanceSettings,
    ) -> PoolResult<()> {
        let caller = *caller;
        self.transact(move |_, staged| {
            staged
                .service_mut()
                .set_default_governance(&caller, settings)
        })
    }

    pub fn withdraw_fees(&mut self, caller: &Address, to: &Address) -> PoolResult<Amount> {
        let (caller, to) = (*caller, *to);
        self.transact(move |ctx, staged| staged.service().withdraw_fees(ctx, &caller, &to))
    }

    // ---- Crowdsale ------------------------------------------------------

    /// Buy from the pool's current TGE.
    pub fn purchase(
        &mut self,
        caller: &Address,
        pool: PoolId,
        amount: Amount,
        payment: Payment,
    ) -> PoolResult<PurchaseReceipt> {
        let caller = *caller;
        self.transact(move |ctx, staged| {
            let (token, engine) = staged.pool_mut(pool)?.current_parts_mut()?;
            engine.purchase(ctx, token, &caller, amount, payment)
        })
    }

    /// Refund from a failed TGE of any generation.
    pub fn redeem(
        &mut self,
        caller: &Address,
        pool: PoolId,
        generation: GenerationId,
    ) -> PoolResult<RedeemReceipt> {
        let caller = *caller;
        self.transact(move |ctx, staged| {
            let (token, engine) = staged.pool_mut(pool)?.parts_mut(generation)?;
            engine.redeem(ctx, token, &caller)
        })
    }

    pub fn transfer_funds(
        &mut self,
        caller: &Address,
        pool: PoolId,
        generation: GenerationId,
    ) -> PoolResult<Vec<(Asset, Amount)>> {
        let caller = *caller;
        self.transact(move |ctx, staged| {
            let (_, engine) = staged.pool_mut(pool)?.parts_mut(generation)?;
            engine.transfer_funds(ctx, &caller)
        })
    }

    /// Open the TVL gate of a generation's lockups, priced from the pool's
    /// treasury in that TGE's unit of account.
    pub fn set_lockup_tvl_reached(
        &mut self,
        caller: &Address,
        pool: PoolId,
        generation: GenerationId,
    ) -> PoolResult<()> {
        let caller = *caller;
        self.transact(move |ctx, staged| {
            let pool = staged.pool_mut(pool)?;
            let unit = pool.generation(generation)?.engine.terms().unit_of_account;
            let tvl = pool.tvl(ctx.ledger, ctx.router, unit)?;
            let (token, engine) = pool.parts_mut(generation)?;
            engine.set_lockup_tvl_reached(ctx, token, &caller, tvl)
        })
    }

    pub fn claim(&mut self, caller: &Address, pool: PoolId, generation: GenerationId) -> PoolResult<()> {
        let caller = *caller;
        self.transact(move |ctx, staged| {
            let (token, engine) = staged.pool_mut(pool)?.parts_mut(generation)?;
            engine.claim(token, &caller, ctx.block)
        })
    }

    /// Move unlocked governance tokens between holders.
    pub fn transfer_token(
        &mut self,
        caller: &Address,
        pool: PoolId,
        generation: GenerationId,
        to: &Address,
        amount: Amount,
    ) -> PoolResult<()> {
        let (caller, to) = (*caller, *to);
        self.transact(move |ctx, staged| {
            let (token, _) = staged.pool_mut(pool)?.parts_mut(generation)?;
            token.transfer(&caller, &to, amount, ctx.block)?;
            ctx.emit(Event::Transfer {
                token: token.address(),
                from: caller,
                to,
                amount,
            });
            Ok(())
        })
    }

    // ---- Governance -----------------------------------------------------

    pub fn create_transfer_native_proposal(
        &mut self,
        caller: &Address,
        pool: PoolId,
        recipient: Address,
        amount: Amount,
        overrides: BallotOverrides,
        description: &str,
    ) -> PoolResult<ProposalId> {
        let caller = *caller;
        let description = description.to_string();
        self.transact(move |ctx, staged| {
            ProposalGateway::create_transfer_native_proposal(
                staged.pool_mut(pool)?,
                ctx,
                &caller,
                recipient,
                amount,
                overrides,
                description,
            )
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_transfer_token_proposal(
        &mut self,
        caller: &Address,
        pool: PoolId,
        token: Address,
        recipient: Address,
        amount: Amount,
        overrides: BallotOverrides,
        description: &str,
    ) -> PoolResult<ProposalId> {
        let caller = *caller;
        let description = description.to_string();
        self.transact(move |ctx, staged| {
            ProposalGateway::create_transfer_token_proposal(
                staged.pool_mut(pool)?,
                ctx,
                &caller,
                token,
                recipient,
                amount,
                overrides,
                description,
            )
        })
    }

    /// Propose a secondary crowdsale of the pool's current token.
    pub fn create_tge_proposal(
        &mut self,
        caller: &Address,
        pool: PoolId,
        tge: TgeTerms,
        overrides: BallotOverrides,
        description: &str,
    ) -> PoolResult<ProposalId> {
        let caller = *caller;
        let description = description.to_string();
        self.transact(move |ctx, staged| {
            ProposalGateway::create_tge_proposal(
                staged.pool_mut(pool)?,
                ctx,
                &caller,
                tge,
                overrides,
                description,
            )
        })
    }

    pub fn cast_vote(
        &mut self,
        caller: &Address,
        pool: PoolId,
        proposal: ProposalId,
        amount: Amount,
        support: bool,
    ) -> PoolResult<()> {
        let caller = *caller;
        self.transact(move |ctx, staged| {
            staged
                .pool_mut(pool)?
                .cast_vote(ctx, &caller, proposal, amount, support)
        })
    }

    /// Anyone may trigger execution once the window and delay have passed.
    pub fn execute_ballot(
        &mut self,
        caller: &Address,
        pool: PoolId,
        proposal: ProposalId,
    ) -> PoolResult<ExecutionOutcome> {
        let caller = *caller;
        self.transact(move |ctx, staged| {
            debug!(pool = %pool, proposal = %proposal, caller = %caller, "execute ballot");
            staged.pool_mut(pool)?.execute_ballot(ctx, proposal)
        })
    }

    // ---- Queries --------------------------------------------------------

    pub fn pools(&self) -> &[Pool] {
        &self.state.pools
    }

    pub fn pool(&self, id: PoolId) -> PoolResult<&Pool> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.state.pools.get(index))
            .ok_or(PoolError::PoolNotFound(id))
    }

    pub fn service(&self) -> &Service {
        &self.state.service
    }

    pub fn balance(&self, account: &Address, asset: &Asset) -> Amount {
        self.state.ledger.balance_of(account, asset)
    }

    /// Balance of the token sold by `generation`.
    pub fn token_balance(&self, pool: PoolId, generation: GenerationId, holder: &Address) -> PoolResult<Amount> {
        Ok(self.pool(pool)?.token_of(generation)?.balance_of(holder))
    }

    pub fn locked_balance(&self, pool: PoolId, generation: GenerationId, holder: &Address) -> PoolResult<Amount> {
        let token = self.pool(pool)?.token_of(generation)?;
        Ok(token.locked_balance_of(holder, self.state.block))
    }

    pub fn unlocked_balance(&self, pool: PoolId, generation: GenerationId, holder: &Address) -> PoolResult<Amount> {
        let token = self.pool(pool)?.token_of(generation)?;
        Ok(token.unlocked_balance_of(holder, self.state.block))
    }

    pub fn tge_state(&self, pool: PoolId, generation: GenerationId) -> PoolResult<TgeState> {
        Ok(self.pool(pool)?.generation(generation)?.tge_state(self.state.block))
    }

    pub fn proposal_state(&self, pool: PoolId, proposal: ProposalId) -> PoolResult<ProposalState> {
        self.pool(pool)?.proposal_state(proposal, self.state.block)
    }

    /// Treasury value of a pool in its current TGE's unit of account.
    pub fn pool_tvl(&self, pool: PoolId) -> PoolResult<Amount> {
        let pool = self.pool(pool)?;
        let unit = pool.current()?.engine.terms().unit_of_account;
        pool.tvl(&self.state.ledger, self.collaborators.router.as_ref(), unit)
    }
}

fn pool_handles(pool: &Pool) -> PoolResult<PoolCreated> {
    Ok(PoolCreated {
        pool: pool.id(),
        pool_address: pool.address(),
        token: pool.current_token()?.address(),
        tge: pool.current()?.engine.address(),
    })
}
