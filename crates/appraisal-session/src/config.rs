use crate::{EngineError, Result};
use appraisal_economics::{AccountAddress, Amount, BASE_UNIT};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::info;

// Fixed protocol constants. These are part of the protocol, not deployment knobs.

/// Longest voting window a session may be opened with (one day).
pub const MAX_VOTING_WINDOW_SECS: i64 = 24 * 3600;
/// `max_appraisal = hint * 6942 / 10000`
pub const MAX_APPRAISAL_NUMERATOR: u64 = 6942;
pub const MAX_APPRAISAL_DENOMINATOR: u64 = 10_000;
/// Share of correct weight at which incorrect voters get their harvest back.
pub const SYBIL_DEFENSE_PERCENT: u64 = 90;
/// Close-out fee to whoever triggers it, in percent of the remaining pool.
pub const CLOSE_OUT_FEE_PERCENT: u64 = 3;
/// Windows past the deadline after which a live session may be replaced.
pub const STALE_SESSION_WINDOWS: i64 = 3;

fn default_min_stake() -> u64 {
    5_000_000 // 0.005 units
}

fn default_listing_notional() -> u64 {
    25 * BASE_UNIT
}

fn default_admin() -> String {
    AccountAddress::treasury().to_hex()
}

/// Deployment configuration of a session engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Account allowed to change engine configuration at runtime
    #[serde(default = "default_admin")]
    pub admin: String,
    /// Originator (e.g. an auction house) exempt from the listing cost
    #[serde(default)]
    pub privileged_originator: Option<String>,
    /// Smallest stake a commit accepts, in base units
    #[serde(default = "default_min_stake")]
    pub min_stake: u64,
    /// Listing cost in reward base units, priced at the live exchange rate
    #[serde(default = "default_listing_notional")]
    pub listing_notional: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin: default_admin(),
            privileged_originator: None,
            min_stake: default_min_stake(),
            listing_notional: default_listing_notional(),
        }
    }
}

impl EngineConfig {
    pub fn with_admin(mut self, admin: AccountAddress) -> Self {
        self.admin = admin.to_hex();
        self
    }

    pub fn with_privileged_originator(mut self, originator: AccountAddress) -> Self {
        self.privileged_originator = Some(originator.to_hex());
        self
    }

    pub fn with_min_stake(mut self, min_stake: Amount) -> Self {
        self.min_stake = min_stake.to_base_units();
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Engine configuration loaded");
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Environment overrides: `APPRAISAL_ADMIN`, `APPRAISAL_PRIVILEGED_ORIGINATOR`,
    /// `APPRAISAL_MIN_STAKE`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(admin) = env::var("APPRAISAL_ADMIN") {
            if !admin.is_empty() {
                self.admin = admin;
            }
        }
        if let Ok(originator) = env::var("APPRAISAL_PRIVILEGED_ORIGINATOR") {
            self.privileged_originator = if originator.is_empty() {
                None
            } else {
                Some(originator)
            };
        }
        if let Ok(min_stake) = env::var("APPRAISAL_MIN_STAKE") {
            if let Ok(value) = min_stake.parse() {
                self.min_stake = value;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.admin_address()?;
        self.privileged_originator_address()?;
        if self.min_stake == 0 {
            return Err(EngineError::Config("min_stake must be positive".to_string()));
        }
        Ok(())
    }

    pub fn admin_address(&self) -> Result<AccountAddress> {
        AccountAddress::from_hex(&self.admin)
            .map_err(|e| EngineError::Config(format!("admin: {}", e)))
    }

    pub fn privileged_originator_address(&self) -> Result<Option<AccountAddress>> {
        self.privileged_originator
            .as_deref()
            .map(|hex| {
                AccountAddress::from_hex(hex)
                    .map_err(|e| EngineError::Config(format!("privileged_originator: {}", e)))
            })
            .transpose()
    }

    pub fn min_stake(&self) -> Amount {
        Amount::from_base_units(self.min_stake)
    }

    pub fn listing_notional(&self) -> Amount {
        Amount::from_base_units(self.listing_notional)
    }
}
