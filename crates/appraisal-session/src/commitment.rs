use appraisal_economics::{AccountAddress, Amount};
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain separation tag for appraisal commitments
pub const DST_APPRAISAL_COMMITMENT: &[u8] = b"APPRAISAL-COMMIT-v1";

/// One-way binding of (appraisal, voter, secret), stored at commit time and
/// checked against the opened values at reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment([u8; 32]);

impl Commitment {
    pub fn compute(appraisal: Amount, voter: &AccountAddress, secret: &[u8]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(DST_APPRAISAL_COMMITMENT);
        hasher.update(&appraisal.to_base_units().to_le_bytes());
        hasher.update(voter.as_bytes());
        hasher.update(&(secret.len() as u64).to_le_bytes());
        hasher.update(secret);
        Self(*hasher.finalize().as_bytes())
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Constant-time comparison against the opened values.
    pub fn opens_to(&self, appraisal: Amount, voter: &AccountAddress, secret: &[u8]) -> bool {
        blake3::Hash::from(self.0) == blake3::Hash::from(Self::compute(appraisal, voter, secret).0)
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}
