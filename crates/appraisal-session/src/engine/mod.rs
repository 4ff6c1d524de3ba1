//! The session engine.
//!
//! Every mutating entry point runs through [`SessionEngine::transact`]:
//!
//! 1. the call queues behind any other mutating call; a call nested inside
//!    another one on the same task fails with [`EngineError::Reentrancy`],
//! 2. the clock and treasury are read and engine state is snapshotted,
//! 3. bookkeeping runs synchronously and queues outgoing effects,
//! 4. effects (payouts, treasury transfers, notifications) are dispatched,
//! 5. on any error the snapshot is restored; otherwise events are published.

mod claim;
mod registry;
mod settlement;
mod voting;

pub use settlement::HarvestOutcome;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::events::SessionEvent;
use crate::guard::ReentrancyGuard;
use crate::scoring::{ScoringModel, StandardScoring};
use crate::types::{AssetId, InstanceId, Session, SessionKey, Vote, VoterStatus};
use crate::{EngineError, Result};
use appraisal_economics::{
    exchange, AccountAddress, AccountBook, Amount, PayoutGateway, TransferReason, Treasury,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Everything the engine owns. Cloned as a whole to roll back a failed call.
#[derive(Debug, Clone, Default)]
pub(crate) struct EngineState {
    pub accounts: AccountBook,
    /// Current attempt per (asset, instance)
    pub nonces: HashMap<(AssetId, InstanceId), u64>,
    pub sessions: HashMap<SessionKey, Session>,
    pub privileged_originator: Option<AccountAddress>,
    /// Base currency held by the engine across all accounts and sessions
    pub custody: Amount,
}

impl EngineState {
    pub fn current_key(&self, asset: AssetId, instance: InstanceId) -> Result<SessionKey> {
        self.nonces
            .get(&(asset, instance))
            .map(|attempt| SessionKey::new(asset, instance, *attempt))
            .ok_or_else(|| EngineError::SessionNotFound(format!("{}/{}", asset, instance)))
    }

    pub fn current_session_mut(
        &mut self,
        asset: AssetId,
        instance: InstanceId,
    ) -> Result<&mut Session> {
        let key = self.current_key(asset, instance)?;
        self.sessions
            .get_mut(&key)
            .ok_or_else(|| EngineError::SessionNotFound(key.to_string()))
    }

    pub fn receive(&mut self, amount: Amount) -> Result<()> {
        self.custody = self
            .custody
            .checked_add(amount)
            .ok_or_else(|| EngineError::overflow("custody"))?;
        Ok(())
    }

    pub fn release(&mut self, amount: Amount) -> Result<()> {
        self.custody = self.custody.checked_sub(amount).ok_or_else(|| {
            EngineError::ArithmeticFault(format!(
                "custody underflow: releasing {} of {}",
                amount, self.custody
            ))
        })?;
        Ok(())
    }
}

/// Side effect queued during bookkeeping and run once bookkeeping is complete.
#[derive(Debug, Clone)]
pub(crate) enum Effect {
    Pay {
        to: AccountAddress,
        amount: Amount,
        reason: TransferReason,
    },
    FundTreasury {
        amount: Amount,
        reason: TransferReason,
    },
    Reward {
        recipient: AccountAddress,
        units: Amount,
    },
    AssetPriced,
    ProfitGenerated(Amount),
}

#[derive(Debug, Default)]
pub(crate) struct Outbox {
    effects: Vec<Effect>,
    events: Vec<SessionEvent>,
}

impl Outbox {
    pub fn effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }
}

/// Inputs read once at the start of a mutating call, under the guard.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallContext {
    pub now: i64,
    pub treasury_balance: Amount,
    pub reward_units_issued: Amount,
}

/// Runs appraisal sessions for any number of (asset, instance) pairs over one
/// shared ledger of participant accounts.
pub struct SessionEngine {
    admin: AccountAddress,
    min_stake: Amount,
    listing_notional: Amount,
    state: RwLock<EngineState>,
    treasury: Arc<dyn Treasury>,
    gateway: Arc<dyn PayoutGateway>,
    scoring: Arc<dyn ScoringModel>,
    clock: Arc<dyn Clock>,
    guard: ReentrancyGuard,
    event_tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl SessionEngine {
    pub fn new(
        config: EngineConfig,
        treasury: Arc<dyn Treasury>,
        gateway: Arc<dyn PayoutGateway>,
    ) -> Result<Self> {
        config.validate()?;
        let state = EngineState {
            privileged_originator: config.privileged_originator_address()?,
            ..EngineState::default()
        };

        info!(
            admin = %config.admin_address()?,
            min_stake = config.min_stake().to_units(),
            treasury = %treasury.address(),
            "✨ Session engine initialized"
        );

        Ok(Self {
            admin: config.admin_address()?,
            min_stake: config.min_stake(),
            listing_notional: config.listing_notional(),
            state: RwLock::new(state),
            treasury,
            gateway,
            scoring: Arc::new(StandardScoring),
            clock: Arc::new(SystemClock),
            guard: ReentrancyGuard::new(),
            event_tx: None,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_scoring(mut self, scoring: Arc<dyn ScoringModel>) -> Self {
        self.scoring = scoring;
        self
    }

    /// Attach a channel that receives every committed [`SessionEvent`].
    pub fn with_event_channel(mut self) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_tx = Some(tx);
        (self, rx)
    }

    pub fn min_stake(&self) -> Amount {
        self.min_stake
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Run one atomic mutating call. See the module docs for the sequence.
    pub(crate) async fn transact<T, F>(&self, operation: &'static str, apply: F) -> Result<T>
    where
        F: FnOnce(&mut EngineState, &mut Outbox, &CallContext) -> Result<T>,
    {
        self.guard
            .run(operation, self.run_serialized(operation, apply))
            .await
    }

    async fn run_serialized<T, F>(&self, operation: &'static str, apply: F) -> Result<T>
    where
        F: FnOnce(&mut EngineState, &mut Outbox, &CallContext) -> Result<T>,
    {
        // Read under the guard so no other call moves the treasury in between
        let ctx = CallContext {
            now: self.clock.now(),
            treasury_balance: self.treasury.balance().await,
            reward_units_issued: self.treasury.reward_units_issued().await,
        };
        let mut outbox = Outbox::default();

        // The write lock is released before effects run so read-only quotes
        // stay available to collaborators; the guard keeps writers out.
        let (value, snapshot) = {
            let mut state = self.state.write().await;
            let snapshot = state.clone();
            match apply(&mut state, &mut outbox, &ctx) {
                Ok(value) => (value, snapshot),
                Err(e) => {
                    *state = snapshot;
                    debug!(operation, error = %e, "Call rejected");
                    return Err(e);
                }
            }
        };

        if let Err(e) = self.dispatch(&outbox.effects).await {
            *self.state.write().await = snapshot;
            warn!(operation, error = %e, "Outgoing effect failed, call rolled back");
            return Err(e);
        }

        self.publish(outbox.events);
        Ok(value)
    }

    async fn dispatch(&self, effects: &[Effect]) -> Result<()> {
        for effect in effects {
            let outcome = match effect {
                Effect::Pay { to, amount, reason } => {
                    if amount.is_zero() {
                        continue;
                    }
                    self.gateway.pay(*to, *amount, *reason).await
                }
                Effect::FundTreasury { amount, reason } => {
                    if amount.is_zero() {
                        continue;
                    }
                    self.treasury.receive(*amount, *reason).await
                }
                Effect::Reward { recipient, units } => {
                    if units.is_zero() {
                        continue;
                    }
                    self.treasury.send_reward(*recipient, *units).await
                }
                Effect::AssetPriced => self.treasury.notify_asset_priced().await,
                Effect::ProfitGenerated(amount) => {
                    self.treasury.notify_profit_generated(*amount).await
                }
            };
            outcome.map_err(|e| EngineError::TransferFailed(format!("{:?}: {:#}", effect, e)))?;
        }
        Ok(())
    }

    fn publish(&self, events: Vec<SessionEvent>) {
        let Some(tx) = &self.event_tx else {
            return;
        };
        for event in events {
            let name = event.name();
            if let Err(e) = tx.send(event) {
                warn!(event = name, error = %e, "Failed to emit session event");
            }
        }
    }

    // ------------------------------------------------------------------
    // Participant accounts
    // ------------------------------------------------------------------

    /// Credit attached funds to the caller's principal.
    pub async fn deposit(&self, caller: AccountAddress, value: Amount) -> Result<Amount> {
        self.transact("deposit", |state, _outbox, _ctx| {
            state.receive(value)?;
            state
                .accounts
                .credit_principal(caller, value)
                .map_err(|e| EngineError::ArithmeticFault(e.to_string()))?;
            Ok(state.accounts.principal(&caller))
        })
        .await
    }

    /// Pay out part of the caller's principal.
    pub async fn withdraw(&self, caller: AccountAddress, amount: Amount) -> Result<()> {
        self.transact("withdraw", |state, outbox, _ctx| {
            let available = state.accounts.principal(&caller);
            if available < amount {
                return Err(EngineError::InsufficientBalance {
                    needed: amount.to_string(),
                    available: available.to_string(),
                });
            }
            state
                .accounts
                .debit_principal(caller, amount)
                .map_err(|e| EngineError::ArithmeticFault(e.to_string()))?;
            state.release(amount)?;
            outbox.effect(Effect::Pay {
                to: caller,
                amount,
                reason: TransferReason::PrincipalWithdrawal,
            });
            Ok(())
        })
        .await
    }

    /// Pay out everything the caller has accrued as profit.
    pub async fn claim_profit(&self, caller: AccountAddress) -> Result<Amount> {
        self.transact("claim_profit", |state, outbox, _ctx| {
            let profit = state.accounts.take_profit(&caller);
            state.release(profit)?;
            outbox.effect(Effect::Pay {
                to: caller,
                amount: profit,
                reason: TransferReason::ProfitWithdrawal,
            });
            info!(caller = %caller, profit = profit.to_units(), "Profit claimed");
            Ok(profit)
        })
        .await
    }

    /// Admin only: set or clear the originator exempt from listing costs.
    pub async fn set_privileged_originator(
        &self,
        caller: AccountAddress,
        originator: Option<AccountAddress>,
    ) -> Result<()> {
        let admin = self.admin;
        self.transact("set_privileged_originator", |state, _outbox, _ctx| {
            if caller != admin {
                return Err(EngineError::AuthorizationViolation(format!(
                    "{} is not the engine admin",
                    caller
                )));
            }
            state.privileged_originator = originator;
            info!(originator = ?originator.map(|a| a.to_string()), "Privileged originator updated");
            Ok(())
        })
        .await
    }

    // ------------------------------------------------------------------
    // Quotes
    // ------------------------------------------------------------------

    /// Listing cost a non-privileged opener pays right now.
    pub async fn listing_cost(&self) -> Amount {
        self.listing_cost_at(self.treasury.reward_units_issued().await)
    }

    pub(crate) fn listing_cost_at(&self, reward_units_issued: Amount) -> Amount {
        exchange::reward_units_to_currency(self.listing_notional, reward_units_issued)
    }

    pub async fn principal_of(&self, participant: &AccountAddress) -> Amount {
        self.state.read().await.accounts.principal(participant)
    }

    pub async fn profit_of(&self, participant: &AccountAddress) -> Amount {
        self.state.read().await.accounts.profit(participant)
    }

    pub async fn custody(&self) -> Amount {
        self.state.read().await.custody
    }

    pub async fn privileged_originator(&self) -> Option<AccountAddress> {
        self.state.read().await.privileged_originator
    }

    pub async fn current_attempt(&self, asset: AssetId, instance: InstanceId) -> Option<u64> {
        self.state.read().await.nonces.get(&(asset, instance)).copied()
    }

    /// Current attempt's session, if one was ever opened.
    pub async fn session(&self, asset: AssetId, instance: InstanceId) -> Option<Session> {
        let state = self.state.read().await;
        let key = state.current_key(asset, instance).ok()?;
        state.sessions.get(&key).cloned()
    }

    /// Consensus value of the current attempt, once it has been set.
    pub async fn final_appraisal(&self, asset: AssetId, instance: InstanceId) -> Option<Amount> {
        self.session(asset, instance)
            .await
            .filter(|session| session.checks.time_final_appraisal_set != 0)
            .map(|session| session.core.final_appraisal)
    }

    pub async fn session_by_key(&self, key: &SessionKey) -> Option<Session> {
        self.state.read().await.sessions.get(key).cloned()
    }

    pub async fn vote(
        &self,
        asset: AssetId,
        instance: InstanceId,
        voter: &AccountAddress,
    ) -> Option<Vote> {
        self.session(asset, instance)
            .await
            .and_then(|session| session.votes.get(voter).cloned())
    }

    pub async fn voter_status(
        &self,
        asset: AssetId,
        instance: InstanceId,
        voter: &AccountAddress,
    ) -> VoterStatus {
        self.session(asset, instance)
            .await
            .map(|session| session.voter_status(voter))
            .unwrap_or_default()
    }
}
