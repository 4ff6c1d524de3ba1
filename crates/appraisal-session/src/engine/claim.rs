use super::{CallContext, Effect, Outbox, SessionEngine};
use crate::config::{CLOSE_OUT_FEE_PERCENT, SYBIL_DEFENSE_PERCENT};
use crate::events::SessionEvent;
use crate::types::{AssetId, ClaimStatus, InstanceId, Session, SessionProgression, VoterStatus};
use crate::{EngineError, Result};
use appraisal_economics::{AccountAddress, Amount, TransferReason};
use tracing::{debug, info};

/// Whether correct voters carried at least 90% of the revealed weight.
fn sybil_defense_triggered(correct: u64, incorrect: u64) -> bool {
    let total = correct as u128 + incorrect as u128;
    if total == 0 {
        return false;
    }
    correct as u128 * 100 / total >= SYBIL_DEFENSE_PERCENT as u128
}

/// Retire a session: the remaining pool goes 97% to the treasury and 3% to
/// `caller`. Also folds in a bounty that never reached settlement.
pub(super) fn close_out(
    custody: &mut Amount,
    session: &mut Session,
    caller: AccountAddress,
    outbox: &mut Outbox,
) -> Result<()> {
    if session.checks.time_final_appraisal_set == 0 {
        session.core.total_session_stake = session
            .core
            .total_session_stake
            .checked_add(session.core.bounty)
            .ok_or_else(|| EngineError::overflow("session stake"))?;
    }
    let pool = std::mem::take(&mut session.core.total_session_stake);
    let caller_fee = pool
        .mul_div(CLOSE_OUT_FEE_PERCENT, 100)
        .ok_or_else(|| EngineError::overflow("close-out fee"))?;
    let swept = pool.saturating_sub(caller_fee);
    session.checks.progression = SessionProgression::Closed;

    *custody = custody.checked_sub(pool).ok_or_else(|| {
        EngineError::ArithmeticFault(format!("custody cannot cover session pool {}", pool))
    })?;
    outbox.effect(Effect::FundTreasury {
        amount: swept,
        reason: TransferReason::SessionSweep,
    });
    outbox.effect(Effect::Pay {
        to: caller,
        amount: caller_fee,
        reason: TransferReason::CloseOutFee,
    });

    info!(
        session = %session.key,
        closed_by = %caller,
        swept = swept.to_units(),
        caller_fee = caller_fee.to_units(),
        "🔒 Session closed"
    );
    outbox.emit(SessionEvent::SessionClosed {
        key: session.key,
        closed_by: caller,
        swept_to_treasury: swept,
        caller_fee,
    });
    Ok(())
}

impl SessionEngine {
    /// Return the caller's principal and pay out their share of the profit.
    ///
    /// Opens once every revealed vote has been harvested or two windows after
    /// consensus. The last claim, or any claim after that grace period, closes
    /// the session.
    pub async fn claim(
        &self,
        caller: AccountAddress,
        asset: AssetId,
        instance: InstanceId,
    ) -> Result<ClaimStatus> {
        self.transact("claim", |state, outbox, &CallContext { now, .. }| {
            let key = state.current_key(asset, instance)?;
            let session = state
                .sessions
                .get_mut(&key)
                .ok_or_else(|| EngineError::SessionNotFound(key.to_string()))?;
            let progression = session.checks.progression;
            if progression == SessionProgression::Closed {
                return Err(EngineError::phase("an unclosed session", progression));
            }

            let settled_at = session.checks.time_final_appraisal_set;
            let window = session.core.voting_window;
            let grace_end = if settled_at == 0 {
                session.core.window_end(2)
            } else {
                settled_at.saturating_add(window.saturating_mul(2))
            };
            if progression != SessionProgression::HarvestComplete && now <= grace_end {
                return Err(EngineError::DeadlineViolation(format!(
                    "claims open after harvest completes or at {} (now {})",
                    grace_end, now
                )));
            }
            if progression == SessionProgression::ConsensusSet {
                session.checks.progression = SessionProgression::HarvestComplete;
            }

            let sybil_defense =
                sybil_defense_triggered(session.checks.correct, session.checks.incorrect);
            let total_winner_points = session.core.total_winner_points;
            let total_profit = session.core.total_profit;

            let vote = session
                .votes
                .get_mut(&caller)
                .filter(|vote| vote.status == VoterStatus::Harvested)
                .ok_or_else(|| {
                    EngineError::PhaseViolation(format!("{} has no harvested vote", caller))
                })?;
            vote.status = VoterStatus::Claimed;

            let principal_returned = if sybil_defense {
                vote.stake
                    .checked_add(vote.amount_harvested)
                    .ok_or_else(|| EngineError::overflow("returned principal"))?
            } else {
                vote.stake
            };
            let winner_points = std::mem::take(&mut vote.winner_points);
            let profit_share = if winner_points == 0 || total_winner_points == 0 {
                Amount::ZERO
            } else {
                total_profit
                    .mul_div(winner_points, total_winner_points)
                    .ok_or_else(|| EngineError::overflow("profit share"))?
            };

            session.core.total_profit = total_profit.checked_sub(profit_share).ok_or_else(|| {
                EngineError::ArithmeticFault("profit share exceeds session profit".to_string())
            })?;
            session.core.total_winner_points = total_winner_points.saturating_sub(winner_points);
            // The sybil refund can exceed what is left in the pool
            session.core.total_session_stake = session
                .core
                .total_session_stake
                .saturating_sub(principal_returned.saturating_add(profit_share));
            session.checks.calls += 1;

            info!(
                session = %key,
                voter = %caller,
                principal = principal_returned.to_units(),
                profit = profit_share.to_units(),
                sybil_defense,
                "💰 Vote claimed"
            );

            let status = if session.checks.calls >= session.core.unique_voters || now > grace_end
            {
                close_out(&mut state.custody, session, caller, outbox)?;
                ClaimStatus::SessionFinished
            } else {
                debug!(
                    session = %key,
                    claimed = session.checks.calls,
                    participants = session.core.unique_voters,
                    "Claims pending"
                );
                ClaimStatus::ClaimsPending
            };

            state
                .accounts
                .credit_principal(caller, principal_returned)
                .map_err(|e| EngineError::ArithmeticFault(e.to_string()))?;
            state
                .accounts
                .credit_profit(caller, profit_share)
                .map_err(|e| EngineError::ArithmeticFault(e.to_string()))?;

            outbox.emit(SessionEvent::VoteClaimed {
                key,
                voter: caller,
                principal_returned,
                profit_share,
                status,
            });
            Ok(status)
        })
        .await
    }

    /// Close a settled session once harvesting finished or two windows after
    /// consensus. The caller collects the close-out fee.
    pub async fn end_session(
        &self,
        caller: AccountAddress,
        asset: AssetId,
        instance: InstanceId,
    ) -> Result<()> {
        self.transact("end_session", |state, outbox, &CallContext { now, .. }| {
            let key = state.current_key(asset, instance)?;
            let session = state
                .sessions
                .get_mut(&key)
                .ok_or_else(|| EngineError::SessionNotFound(key.to_string()))?;
            let progression = session.checks.progression;
            if progression == SessionProgression::Closed {
                return Err(EngineError::phase("an unclosed session", progression));
            }
            let settled_at = session.checks.time_final_appraisal_set;
            if settled_at == 0 {
                return Err(EngineError::phase("a settled session", progression));
            }
            let grace_end =
                settled_at.saturating_add(session.core.voting_window.saturating_mul(2));
            if progression != SessionProgression::HarvestComplete && now <= grace_end {
                return Err(EngineError::DeadlineViolation(format!(
                    "session can be ended after harvest completes or at {} (now {})",
                    grace_end, now
                )));
            }
            close_out(&mut state.custody, session, caller, outbox)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sybil_defense_threshold() {
        assert!(sybil_defense_triggered(9, 1));
        assert!(sybil_defense_triggered(90, 10));
        assert!(!sybil_defense_triggered(89, 11));
        assert!(!sybil_defense_triggered(0, 5));
        assert!(!sybil_defense_triggered(0, 0));
        assert!(sybil_defense_triggered(u64::MAX, 0));
    }
}
