use crate::types::{ClaimStatus, SessionKey};
use appraisal_economics::{AccountAddress, Amount};
use serde::{Deserialize, Serialize};

/// Notifications emitted after a mutating call commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    SessionCreated {
        key: SessionKey,
        opener: AccountAddress,
        deadline: i64,
        bounty: Amount,
        max_appraisal: Amount,
    },
    BountyIncreased {
        key: SessionKey,
        contributor: AccountAddress,
        amount: Amount,
        bounty: Amount,
    },
    VoteCommitted {
        key: SessionKey,
        voter: AccountAddress,
        stake: Amount,
    },
    CommitUpdated {
        key: SessionKey,
        voter: AccountAddress,
    },
    VoteRevealed {
        key: SessionKey,
        voter: AccountAddress,
        appraisal: Amount,
        weight: u64,
    },
    RevealClosed {
        key: SessionKey,
        revealed_voters: u64,
    },
    FinalAppraisalSet {
        key: SessionKey,
        final_appraisal: Amount,
        participants: u64,
        total_stake: Amount,
    },
    VoteHarvested {
        key: SessionKey,
        voter: AccountAddress,
        base: u8,
        winner_points: u64,
        amount_harvested: Amount,
    },
    VoteClaimed {
        key: SessionKey,
        voter: AccountAddress,
        principal_returned: Amount,
        profit_share: Amount,
        status: ClaimStatus,
    },
    SessionClosed {
        key: SessionKey,
        closed_by: AccountAddress,
        swept_to_treasury: Amount,
        caller_fee: Amount,
    },
}

impl SessionEvent {
    pub fn key(&self) -> &SessionKey {
        match self {
            Self::SessionCreated { key, .. }
            | Self::BountyIncreased { key, .. }
            | Self::VoteCommitted { key, .. }
            | Self::CommitUpdated { key, .. }
            | Self::VoteRevealed { key, .. }
            | Self::RevealClosed { key, .. }
            | Self::FinalAppraisalSet { key, .. }
            | Self::VoteHarvested { key, .. }
            | Self::VoteClaimed { key, .. }
            | Self::SessionClosed { key, .. } => key,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session_created",
            Self::BountyIncreased { .. } => "bounty_increased",
            Self::VoteCommitted { .. } => "vote_committed",
            Self::CommitUpdated { .. } => "commit_updated",
            Self::VoteRevealed { .. } => "vote_revealed",
            Self::RevealClosed { .. } => "reveal_closed",
            Self::FinalAppraisalSet { .. } => "final_appraisal_set",
            Self::VoteHarvested { .. } => "vote_harvested",
            Self::VoteClaimed { .. } => "vote_claimed",
            Self::SessionClosed { .. } => "session_closed",
        }
    }
}
