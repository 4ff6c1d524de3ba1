use super::{claim, CallContext, Effect, SessionEngine};
use crate::config::{
    MAX_APPRAISAL_DENOMINATOR, MAX_APPRAISAL_NUMERATOR, MAX_VOTING_WINDOW_SECS,
    STALE_SESSION_WINDOWS,
};
use crate::events::SessionEvent;
use crate::types::{
    AssetId, InstanceId, Session, SessionChecks, SessionCore, SessionKey, SessionProgression,
};
use crate::{EngineError, Result};
use appraisal_economics::{AccountAddress, Amount, TransferReason};
use std::collections::HashMap;
use tracing::{info, warn};

impl SessionEngine {
    /// Open a new appraisal attempt for `(asset, instance)`.
    ///
    /// `value` is the funds attached to the call: the listing cost goes to the
    /// treasury and the remainder seeds the bounty. Commits are accepted for
    /// `voting_window_secs` from now. A previous attempt that is still live
    /// blocks reopening until three windows past its deadline, at which point
    /// it is closed out first and the caller collects its close-out fee.
    pub async fn open_session(
        &self,
        caller: AccountAddress,
        value: Amount,
        asset: AssetId,
        instance: InstanceId,
        appraisal_hint: Amount,
        voting_window_secs: i64,
    ) -> Result<SessionKey> {
        if voting_window_secs <= 0 || voting_window_secs > MAX_VOTING_WINDOW_SECS {
            return Err(EngineError::InvalidParameter(format!(
                "voting window must be within 1..={} seconds, got {}",
                MAX_VOTING_WINDOW_SECS, voting_window_secs
            )));
        }

        self.transact("open_session", |state, outbox, ctx| {
            let now = ctx.now;
            let listing_cost = self.listing_cost_at(ctx.reward_units_issued);
            let fee = if state.privileged_originator == Some(caller) {
                Amount::ZERO
            } else {
                listing_cost
            };
            let bounty = value
                .checked_sub(fee)
                .ok_or_else(|| EngineError::InsufficientBalance {
                    needed: fee.to_string(),
                    available: value.to_string(),
                })?;
            state.receive(value)?;

            let attempt = match state.nonces.get(&(asset, instance)).copied() {
                None => 0,
                Some(previous) => {
                    let previous_key = SessionKey::new(asset, instance, previous);
                    let previous_session = state
                        .sessions
                        .get_mut(&previous_key)
                        .ok_or_else(|| EngineError::SessionNotFound(previous_key.to_string()))?;

                    if previous_session.checks.progression != SessionProgression::Closed {
                        let stale_after = previous_session.core.window_end(STALE_SESSION_WINDOWS);
                        if now <= stale_after {
                            return Err(EngineError::PhaseViolation(format!(
                                "session {} is still live until {}",
                                previous_key, stale_after
                            )));
                        }
                        warn!(
                            session = %previous_key,
                            progression = ?previous_session.checks.progression,
                            "♻️ Closing out stale session before reopening"
                        );
                        claim::close_out(&mut state.custody, previous_session, caller, outbox)?;
                    }
                    previous
                        .checked_add(1)
                        .ok_or_else(|| EngineError::overflow("attempt nonce"))?
                }
            };

            let max_appraisal = appraisal_hint
                .mul_div(MAX_APPRAISAL_NUMERATOR, MAX_APPRAISAL_DENOMINATOR)
                .ok_or_else(|| EngineError::overflow("max appraisal"))?;
            let deadline = now
                .checked_add(voting_window_secs)
                .ok_or_else(|| EngineError::overflow("deadline"))?;

            let key = SessionKey::new(asset, instance, attempt);
            let session = Session {
                key,
                opener: caller,
                core: SessionCore {
                    deadline,
                    voting_window: voting_window_secs,
                    bounty,
                    lowest_stake: Amount::MAX,
                    max_appraisal,
                    total_appraisal_value: 0,
                    total_session_stake: Amount::ZERO,
                    total_profit: Amount::ZERO,
                    total_winner_points: 0,
                    total_votes: 0,
                    unique_voters: 0,
                    final_appraisal: Amount::ZERO,
                },
                checks: SessionChecks::default(),
                votes: HashMap::new(),
            };
            state.sessions.insert(key, session);
            state.nonces.insert((asset, instance), attempt);

            if !fee.is_zero() {
                state.release(fee)?;
                outbox.effect(Effect::FundTreasury {
                    amount: fee,
                    reason: TransferReason::ListingFee,
                });
            }

            info!(
                session = %key,
                opener = %caller,
                bounty = bounty.to_units(),
                listing_fee = fee.to_units(),
                deadline,
                "🖼️ Appraisal session opened"
            );
            outbox.emit(SessionEvent::SessionCreated {
                key,
                opener: caller,
                deadline,
                bounty,
                max_appraisal,
            });
            Ok(key)
        })
        .await
    }

    /// Add attached funds to the current attempt's bounty while commits are open.
    ///
    /// Only the bounty grows here; the session stake pool picks the bounty up
    /// at settlement (or at close-out if the session never settles).
    pub async fn add_to_bounty(
        &self,
        caller: AccountAddress,
        value: Amount,
        asset: AssetId,
        instance: InstanceId,
    ) -> Result<Amount> {
        if value.is_zero() {
            return Err(EngineError::InvalidParameter(
                "bounty contribution must be positive".to_string(),
            ));
        }

        self.transact("add_to_bounty", |state, outbox, &CallContext { now, .. }| {
            state.receive(value)?;
            let session = state.current_session_mut(asset, instance)?;
            if session.checks.progression == SessionProgression::Closed {
                return Err(EngineError::phase("an open session", session.checks.progression));
            }
            if now >= session.core.deadline {
                return Err(EngineError::DeadlineViolation(format!(
                    "bounty closed at {} (now {})",
                    session.core.deadline, now
                )));
            }
            session.core.bounty = session
                .core
                .bounty
                .checked_add(value)
                .ok_or_else(|| EngineError::overflow("bounty"))?;

            let key = session.key;
            let bounty = session.core.bounty;
            info!(
                session = %key,
                contributor = %caller,
                amount = value.to_units(),
                bounty = bounty.to_units(),
                "💎 Bounty increased"
            );
            outbox.emit(SessionEvent::BountyIncreased {
                key,
                contributor: caller,
                amount: value,
                bounty,
            });
            Ok(bounty)
        })
        .await
    }
}
