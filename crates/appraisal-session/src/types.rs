use crate::commitment::Commitment;
use appraisal_economics::{AccountAddress, Amount};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifies the collection or contract an appraised item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId([u8; 32]);

impl AssetId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_label(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// The specific item within an asset, e.g. a token id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// (asset, instance, attempt). Each reopening of an asset/instance gets a new attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub asset: AssetId,
    pub instance: InstanceId,
    pub attempt: u64,
}

impl SessionKey {
    pub fn new(asset: AssetId, instance: InstanceId, attempt: u64) -> Self {
        Self {
            asset,
            instance,
            attempt,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.asset, self.instance, self.attempt)
    }
}

/// Session-level progression flag. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionProgression {
    /// Accepting commits until the deadline
    Created = 0,
    /// At least one reveal has landed
    RevealStarted = 1,
    /// Every voter revealed, or the reveal window ran out
    RevealComplete = 2,
    /// Final appraisal frozen
    ConsensusSet = 3,
    /// Every revealed voter harvested
    HarvestComplete = 4,
    Closed = 5,
}

impl SessionProgression {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Per-voter progression. Each action moves exactly one step forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VoterStatus {
    #[default]
    NotParticipated = 0,
    Committed = 1,
    Revealed = 2,
    Harvested = 3,
    Claimed = 4,
}

impl VoterStatus {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Option<Self> {
        use VoterStatus::*;
        match self {
            NotParticipated => Some(Committed),
            Committed => Some(Revealed),
            Revealed => Some(Harvested),
            Harvested => Some(Claimed),
            Claimed => None,
        }
    }

    pub fn can_transition_to(&self, next: &Self) -> bool {
        self.next().as_ref() == Some(next)
    }
}

/// Aggregates for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCore {
    /// Commits close at this unix timestamp; reveals open
    pub deadline: i64,
    pub voting_window: i64,
    pub bounty: Amount,
    /// Weighting denominator; only shrinks while commits are open
    pub lowest_stake: Amount,
    pub max_appraisal: Amount,
    /// Sum of weight * revealed appraisal
    pub total_appraisal_value: u128,
    pub total_session_stake: Amount,
    pub total_profit: Amount,
    pub total_winner_points: u64,
    pub total_votes: u64,
    pub unique_voters: u64,
    pub final_appraisal: Amount,
}

impl SessionCore {
    /// `deadline + windows * voting_window`
    pub fn window_end(&self, windows: i64) -> i64 {
        self.deadline
            .saturating_add(windows.saturating_mul(self.voting_window))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionChecks {
    pub progression: SessionProgression,
    /// Reused per phase to detect that every participant acted
    pub calls: u64,
    pub correct: u64,
    pub incorrect: u64,
    /// Zero until consensus is set
    pub time_final_appraisal_set: i64,
}

impl Default for SessionChecks {
    fn default() -> Self {
        Self {
            progression: SessionProgression::Created,
            calls: 0,
            correct: 0,
            incorrect: 0,
            time_final_appraisal_set: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub commitment: Commitment,
    pub revealed_appraisal: Amount,
    /// Reduced by `amount_harvested` once harvested
    pub stake: Amount,
    pub weight: u64,
    pub base: u8,
    pub winner_points: u64,
    pub amount_harvested: Amount,
    pub status: VoterStatus,
}

impl Vote {
    pub fn new(commitment: Commitment, stake: Amount) -> Self {
        Self {
            commitment,
            revealed_appraisal: Amount::ZERO,
            stake,
            weight: 0,
            base: 0,
            winner_points: 0,
            amount_harvested: Amount::ZERO,
            status: VoterStatus::Committed,
        }
    }
}

/// Full record set for one session key. Never removed; `Closed` marks end of life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    pub opener: AccountAddress,
    pub core: SessionCore,
    pub checks: SessionChecks,
    pub votes: HashMap<AccountAddress, Vote>,
}

impl Session {
    pub fn voter_status(&self, voter: &AccountAddress) -> VoterStatus {
        self.votes
            .get(voter)
            .map(|vote| vote.status)
            .unwrap_or_default()
    }
}

/// Outcome code of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    /// This claim closed the session
    SessionFinished,
    /// Other voters still have to claim
    ClaimsPending,
}

impl ClaimStatus {
    pub fn code(&self) -> u8 {
        match self {
            Self::SessionFinished => 0,
            Self::ClaimsPending => 1,
        }
    }
}
