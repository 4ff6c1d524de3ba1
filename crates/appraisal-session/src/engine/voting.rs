use super::{CallContext, SessionEngine};
use crate::commitment::Commitment;
use crate::events::SessionEvent;
use crate::types::{AssetId, InstanceId, SessionProgression, Vote, VoterStatus};
use crate::weighting::{accumulate, voting_weight};
use crate::{EngineError, Result};
use appraisal_economics::{AccountAddress, Amount};
use tracing::{debug, info};

impl SessionEngine {
    /// Lock `stake` from the caller's principal behind a sealed appraisal.
    pub async fn commit(
        &self,
        caller: AccountAddress,
        asset: AssetId,
        instance: InstanceId,
        stake: Amount,
        commitment: Commitment,
    ) -> Result<()> {
        let min_stake = self.min_stake;

        self.transact("commit", |state, outbox, &CallContext { now, .. }| {
            if stake < min_stake {
                return Err(EngineError::InvalidParameter(format!(
                    "stake {} below minimum {}",
                    stake, min_stake
                )));
            }
            let available = state.accounts.principal(&caller);
            if available < stake {
                return Err(EngineError::InsufficientBalance {
                    needed: stake.to_string(),
                    available: available.to_string(),
                });
            }

            let key = state.current_key(asset, instance)?;
            let session = state
                .sessions
                .get_mut(&key)
                .ok_or_else(|| EngineError::SessionNotFound(key.to_string()))?;
            if now >= session.core.deadline {
                return Err(EngineError::DeadlineViolation(format!(
                    "commits closed at {} (now {})",
                    session.core.deadline, now
                )));
            }
            if session.checks.progression != SessionProgression::Created {
                return Err(EngineError::phase("Created", session.checks.progression));
            }
            let status = session.voter_status(&caller);
            if status != VoterStatus::NotParticipated {
                return Err(EngineError::phase("NotParticipated", status));
            }

            let core = &mut session.core;
            core.lowest_stake = core.lowest_stake.min(stake);
            core.unique_voters = core
                .unique_voters
                .checked_add(1)
                .ok_or_else(|| EngineError::overflow("unique voters"))?;
            core.total_session_stake = core
                .total_session_stake
                .checked_add(stake)
                .ok_or_else(|| EngineError::overflow("session stake"))?;
            session.votes.insert(caller, Vote::new(commitment, stake));

            state
                .accounts
                .debit_principal(caller, stake)
                .map_err(|e| EngineError::ArithmeticFault(e.to_string()))?;

            info!(
                session = %key,
                voter = %caller,
                stake = stake.to_units(),
                "🗳️ Vote committed"
            );
            outbox.emit(SessionEvent::VoteCommitted {
                key,
                voter: caller,
                stake,
            });
            Ok(())
        })
        .await
    }

    /// Replace the caller's sealed appraisal. Stake is unchanged.
    pub async fn update_commit(
        &self,
        caller: AccountAddress,
        asset: AssetId,
        instance: InstanceId,
        commitment: Commitment,
    ) -> Result<()> {
        self.transact("update_commit", |state, outbox, &CallContext { now, .. }| {
            let session = state.current_session_mut(asset, instance)?;
            if now >= session.core.deadline {
                return Err(EngineError::DeadlineViolation(format!(
                    "commits closed at {} (now {})",
                    session.core.deadline, now
                )));
            }
            let key = session.key;
            let vote = session
                .votes
                .get_mut(&caller)
                .filter(|vote| vote.status == VoterStatus::Committed)
                .ok_or_else(|| {
                    EngineError::PhaseViolation(format!("{} has no open commitment", caller))
                })?;
            vote.commitment = commitment;

            debug!(session = %key, voter = %caller, "Commitment replaced");
            outbox.emit(SessionEvent::CommitUpdated { key, voter: caller });
            Ok(())
        })
        .await
    }

    /// Open the caller's commitment once commits have closed.
    ///
    /// The reveal phase ends when every committed voter has revealed or one
    /// voting window past the deadline, whichever comes first.
    pub async fn reveal(
        &self,
        caller: AccountAddress,
        asset: AssetId,
        instance: InstanceId,
        appraisal: Amount,
        secret: &[u8],
    ) -> Result<u64> {
        self.transact("reveal", |state, outbox, &CallContext { now, .. }| {
            let session = state.current_session_mut(asset, instance)?;
            let key = session.key;
            if session.checks.progression >= SessionProgression::RevealComplete {
                return Err(EngineError::phase(
                    "an open reveal phase",
                    session.checks.progression,
                ));
            }
            if now < session.core.deadline {
                return Err(EngineError::DeadlineViolation(format!(
                    "reveals open at {} (now {})",
                    session.core.deadline, now
                )));
            }

            let lowest_stake = session.core.lowest_stake;
            let max_appraisal = session.core.max_appraisal;
            let vote = session
                .votes
                .get_mut(&caller)
                .filter(|vote| vote.status == VoterStatus::Committed)
                .ok_or_else(|| {
                    EngineError::PhaseViolation(format!("{} has no commitment to reveal", caller))
                })?;
            if !vote.commitment.opens_to(appraisal, &caller, secret) {
                return Err(EngineError::ConcealmentMismatch);
            }
            if appraisal > max_appraisal {
                return Err(EngineError::InvalidParameter(format!(
                    "appraisal {} above session maximum {}",
                    appraisal, max_appraisal
                )));
            }

            let weight = voting_weight(vote.stake, lowest_stake);
            vote.revealed_appraisal = appraisal;
            vote.weight = weight;
            vote.status = VoterStatus::Revealed;

            if session.checks.progression == SessionProgression::Created {
                session.checks.progression = SessionProgression::RevealStarted;
            }
            accumulate(&mut session.core, weight, appraisal)?;
            session.checks.calls += 1;

            info!(
                session = %key,
                voter = %caller,
                appraisal = appraisal.to_units(),
                weight,
                "🔓 Vote revealed"
            );
            outbox.emit(SessionEvent::VoteRevealed {
                key,
                voter: caller,
                appraisal,
                weight,
            });

            if session.checks.calls == session.core.unique_voters
                || now > session.core.window_end(1)
            {
                session.core.unique_voters = session.checks.calls;
                session.checks.calls = 0;
                session.checks.progression = SessionProgression::RevealComplete;
                info!(
                    session = %key,
                    revealed = session.core.unique_voters,
                    "Reveal phase complete"
                );
                outbox.emit(SessionEvent::RevealClosed {
                    key,
                    revealed_voters: session.core.unique_voters,
                });
            }
            Ok(weight)
        })
        .await
    }
}
