use super::{CallContext, Effect, SessionEngine};
use crate::events::SessionEvent;
use crate::types::{AssetId, InstanceId, SessionProgression, VoterStatus};
use crate::weighting::weighted_average;
use crate::{EngineError, Result};
use appraisal_economics::{exchange, AccountAddress, Amount, TransferReason};
use serde::{Deserialize, Serialize};
use tracing::info;

/// What harvesting one vote produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestOutcome {
    pub base: u8,
    pub weight: u64,
    pub winner_points: u64,
    pub amount_harvested: Amount,
    pub commission: Amount,
}

impl SessionEngine {
    /// Freeze the stake-weighted average of revealed appraisals.
    ///
    /// Allowed once the reveal phase is complete or one window past the
    /// deadline. The bounty joins the profit pool and the session stake here.
    pub async fn set_final_appraisal(
        &self,
        caller: AccountAddress,
        asset: AssetId,
        instance: InstanceId,
    ) -> Result<Amount> {
        self.transact("set_final_appraisal", |state, outbox, &CallContext { now, .. }| {
            let session = state.current_session_mut(asset, instance)?;
            let key = session.key;
            if session.checks.progression >= SessionProgression::ConsensusSet {
                return Err(EngineError::phase(
                    "consensus not yet set",
                    session.checks.progression,
                ));
            }
            if session.checks.progression != SessionProgression::RevealComplete
                && now <= session.core.window_end(1)
            {
                return Err(EngineError::DeadlineViolation(format!(
                    "reveals still open until {} (now {})",
                    session.core.window_end(1),
                    now
                )));
            }

            if session.checks.calls != 0 {
                session.core.unique_voters = session.checks.calls;
                session.checks.calls = 0;
            }

            let core = &mut session.core;
            core.final_appraisal = weighted_average(core.total_appraisal_value, core.total_votes)?;
            core.total_profit = core
                .total_profit
                .checked_add(core.bounty)
                .ok_or_else(|| EngineError::overflow("session profit"))?;
            core.total_session_stake = core
                .total_session_stake
                .checked_add(core.bounty)
                .ok_or_else(|| EngineError::overflow("session stake"))?;

            session.checks.time_final_appraisal_set = now;
            session.checks.progression = SessionProgression::ConsensusSet;

            let final_appraisal = session.core.final_appraisal;
            let participants = session.core.unique_voters;
            let total_stake = session.core.total_session_stake;
            info!(
                session = %key,
                caller = %caller,
                final_appraisal = final_appraisal.to_units(),
                participants,
                total_stake = total_stake.to_units(),
                "⚖️ Final appraisal set"
            );
            outbox.effect(Effect::AssetPriced);
            outbox.emit(SessionEvent::FinalAppraisalSet {
                key,
                final_appraisal,
                participants,
                total_stake,
            });
            Ok(final_appraisal)
        })
        .await
    }

    /// Score the caller's revealed vote against the final appraisal.
    ///
    /// Correct voters earn winner points (`base * weight`). Incorrect voters
    /// lose part of their stake: a commission goes to the treasury, the rest
    /// joins the session profit, and the voter is compensated in reward units
    /// priced at the current exchange rate.
    pub async fn harvest(
        &self,
        caller: AccountAddress,
        asset: AssetId,
        instance: InstanceId,
    ) -> Result<HarvestOutcome> {
        let scoring = self.scoring.clone();

        self.transact("harvest", |state, outbox, ctx| {
            let CallContext {
                treasury_balance,
                reward_units_issued,
                ..
            } = *ctx;
            let session = state.current_session_mut(asset, instance)?;
            let key = session.key;
            if session.checks.progression != SessionProgression::ConsensusSet {
                return Err(EngineError::phase("ConsensusSet", session.checks.progression));
            }

            let final_appraisal = session.core.final_appraisal;
            let vote = session
                .votes
                .get_mut(&caller)
                .filter(|vote| vote.status == VoterStatus::Revealed)
                .ok_or_else(|| {
                    EngineError::PhaseViolation(format!("{} has no revealed vote", caller))
                })?;
            vote.status = VoterStatus::Harvested;

            let base = scoring.score_base(final_appraisal, vote.revealed_appraisal);
            vote.base = base;
            let weight = vote.weight;
            let mut outcome = HarvestOutcome {
                base,
                weight,
                winner_points: 0,
                amount_harvested: Amount::ZERO,
                commission: Amount::ZERO,
            };

            if base > 0 {
                let winner_points = (base as u64)
                    .checked_mul(weight)
                    .ok_or_else(|| EngineError::overflow("winner points"))?;
                vote.winner_points = winner_points;
                outcome.winner_points = winner_points;
                session.core.total_winner_points = session
                    .core
                    .total_winner_points
                    .checked_add(winner_points)
                    .ok_or_else(|| EngineError::overflow("total winner points"))?;
                session.checks.correct = session
                    .checks
                    .correct
                    .checked_add(weight)
                    .ok_or_else(|| EngineError::overflow("correct weight"))?;
            } else {
                let harvested =
                    scoring.harvest_loss(vote.stake, vote.revealed_appraisal, final_appraisal);
                vote.stake = vote
                    .stake
                    .checked_sub(harvested)
                    .ok_or_else(|| EngineError::ArithmeticFault("harvest exceeds stake".to_string()))?;
                vote.amount_harvested = harvested;
                outcome.amount_harvested = harvested;
                session.checks.incorrect = session
                    .checks
                    .incorrect
                    .checked_add(weight)
                    .ok_or_else(|| EngineError::overflow("incorrect weight"))?;

                if !harvested.is_zero() {
                    let commission = harvested.apply_bps(scoring.commission_rate(treasury_balance));
                    let retained = harvested.saturating_sub(commission);
                    outcome.commission = commission;

                    session.core.total_profit = session
                        .core
                        .total_profit
                        .checked_add(retained)
                        .ok_or_else(|| EngineError::overflow("session profit"))?;
                    session.core.total_session_stake = session
                        .core
                        .total_session_stake
                        .checked_sub(commission)
                        .ok_or_else(|| {
                            EngineError::ArithmeticFault(
                                "commission exceeds session stake".to_string(),
                            )
                        })?;

                    outbox.effect(Effect::FundTreasury {
                        amount: commission,
                        reason: TransferReason::HarvestCommission,
                    });
                    outbox.effect(Effect::ProfitGenerated(retained));
                    outbox.effect(Effect::Reward {
                        recipient: caller,
                        units: exchange::currency_to_reward_units(harvested, reward_units_issued),
                    });
                }
            }

            session.checks.calls += 1;
            if session.checks.calls == session.core.unique_voters {
                session.checks.calls = 0;
                session.checks.progression = SessionProgression::HarvestComplete;
                info!(session = %key, "Harvest phase complete");
            }

            info!(
                session = %key,
                voter = %caller,
                base,
                winner_points = outcome.winner_points,
                harvested = outcome.amount_harvested.to_units(),
                commission = outcome.commission.to_units(),
                "🌾 Vote harvested"
            );
            outbox.emit(SessionEvent::VoteHarvested {
                key,
                voter: caller,
                base,
                winner_points: outcome.winner_points,
                amount_harvested: outcome.amount_harvested,
            });

            let commission = outcome.commission;
            state.release(commission)?;
            Ok(outcome)
        })
        .await
    }
}
