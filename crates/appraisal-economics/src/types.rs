use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DECIMALS: u32 = 9;
pub const BASE_UNIT: u64 = 1_000_000_000; // 10^9

/// Basis-point denominator shared by every rate in the protocol.
pub const BPS_DENOMINATOR: u64 = 10_000;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u64::MAX);

    /// Rounded to the nearest base unit; negative input saturates to zero.
    pub fn from_units(units: f64) -> Self {
        Self((units * BASE_UNIT as f64).round() as u64)
    }

    pub fn from_whole_units(units: u64) -> Self {
        Self(units.saturating_mul(BASE_UNIT))
    }

    pub const fn from_base_units(base: u64) -> Self {
        Self(base)
    }

    pub fn to_units(&self) -> f64 {
        self.0 as f64 / BASE_UNIT as f64
    }

    pub fn to_base_units(&self) -> u64 {
        self.0
    }

    pub fn whole_units(&self) -> u64 {
        self.0 / BASE_UNIT
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// `self * numerator / denominator`, widened to u128 and truncated.
    /// `None` on a zero denominator or when the result does not fit.
    pub fn mul_div(&self, numerator: u64, denominator: u64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let wide = self.0 as u128 * numerator as u128 / denominator as u128;
        u64::try_from(wide).ok().map(Self)
    }

    pub fn apply_bps(&self, bps: u32) -> Self {
        // bps <= 10_000 keeps the quotient within u64
        Self((self.0 as u128 * bps.min(BPS_DENOMINATOR as u32) as u128 / BPS_DENOMINATOR as u128) as u64)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}", self.to_units())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountAddress([u8; 32]);

impl AccountAddress {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive a stable address from a human label (simulation identities, fixtures).
    pub fn from_label(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    pub fn from_hex(address: &str) -> Result<Self> {
        let trimmed = address.strip_prefix("0x").unwrap_or(address);
        let bytes = hex::decode(trimmed)?;
        if bytes.len() != 32 {
            bail!(
                "Invalid address length: expected 32 bytes, got {}",
                bytes.len()
            );
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn treasury() -> Self {
        Self([0xFF; 32])
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0[..8]))
    }
}

/// Why funds moved, carried on every outgoing transfer for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferReason {
    ListingFee,
    HarvestCommission,
    SessionSweep,
    CloseOutFee,
    PrincipalWithdrawal,
    ProfitWithdrawal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferEvent {
    pub to: AccountAddress,
    pub amount: Amount,
    pub timestamp: i64,
    pub reason: TransferReason,
}
