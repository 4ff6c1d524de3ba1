use crate::exchange;
use crate::types::{AccountAddress, Amount, TransferReason};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Custodian of protocol revenue and issuer of the reward token.
///
/// The session engine forwards listing fees, harvest commissions and
/// close-out sweeps here, mints reward units to compensated voters and keeps
/// the treasury informed of priced assets and generated profit.
#[async_trait]
pub trait Treasury: Send + Sync {
    fn address(&self) -> AccountAddress;

    /// Currency held by the treasury.
    async fn balance(&self) -> Amount;

    /// Accept a direct transfer of base currency.
    async fn receive(&self, amount: Amount, reason: TransferReason) -> Result<()>;

    /// Mint `amount` reward base units to `recipient`.
    async fn send_reward(&self, recipient: AccountAddress, amount: Amount) -> Result<()>;

    async fn reward_units_issued(&self) -> Amount;

    async fn notify_asset_priced(&self) -> Result<()>;

    async fn notify_profit_generated(&self, amount: Amount) -> Result<()>;

    /// Price of one whole reward unit in base currency right now.
    async fn unit_price(&self) -> Amount {
        exchange::unit_price(self.reward_units_issued().await)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreasuryStats {
    pub balance: Amount,
    pub reward_units_issued: Amount,
    pub assets_priced: u64,
    pub profit_generated: Amount,
    pub received_by_reason: HashMap<String, Amount>,
}

/// In-process treasury used by the node and the test suites.
pub struct TreasuryVault {
    address: AccountAddress,
    stats: Arc<RwLock<TreasuryStats>>,
    reward_balances: Arc<RwLock<HashMap<AccountAddress, Amount>>>,
    paused: Arc<RwLock<bool>>,
}

impl Default for TreasuryVault {
    fn default() -> Self {
        Self::new(AccountAddress::treasury())
    }
}

impl TreasuryVault {
    pub fn new(address: AccountAddress) -> Self {
        Self {
            address,
            stats: Arc::new(RwLock::new(TreasuryStats::default())),
            reward_balances: Arc::new(RwLock::new(HashMap::new())),
            paused: Arc::new(RwLock::new(false)),
        }
    }

    /// Seed the vault with an opening balance.
    pub fn with_balance(self, balance: Amount) -> Self {
        if let Ok(mut stats) = self.stats.try_write() {
            stats.balance = balance;
        }
        self
    }

    pub async fn stats(&self) -> TreasuryStats {
        self.stats.read().await.clone()
    }

    pub async fn reward_balance(&self, holder: &AccountAddress) -> Amount {
        self.reward_balances
            .read()
            .await
            .get(holder)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Refuse every incoming transfer and mint until resumed.
    pub async fn emergency_pause(&self) {
        *self.paused.write().await = true;
        warn!(treasury = %self.address, "EMERGENCY: Treasury paused");
    }

    pub async fn resume(&self) {
        *self.paused.write().await = false;
        info!(treasury = %self.address, "Treasury resumed");
    }

    async fn ensure_active(&self) -> Result<()> {
        if *self.paused.read().await {
            bail!("Treasury is paused");
        }
        Ok(())
    }
}

#[async_trait]
impl Treasury for TreasuryVault {
    fn address(&self) -> AccountAddress {
        self.address
    }

    async fn balance(&self) -> Amount {
        self.stats.read().await.balance
    }

    async fn receive(&self, amount: Amount, reason: TransferReason) -> Result<()> {
        self.ensure_active().await?;
        let mut stats = self.stats.write().await;
        let before = stats.balance;
        stats.balance = before
            .checked_add(amount)
            .ok_or_else(|| anyhow!("Treasury balance overflow"))?;
        let bucket = stats
            .received_by_reason
            .entry(format!("{:?}", reason))
            .or_insert(Amount::ZERO);
        *bucket = bucket.saturating_add(amount);

        info!(
            treasury = %self.address,
            amount = amount.to_units(),
            reason = ?reason,
            balance_before = before.to_units(),
            balance_after = stats.balance.to_units(),
            "🏦 Treasury received funds"
        );
        Ok(())
    }

    async fn send_reward(&self, recipient: AccountAddress, amount: Amount) -> Result<()> {
        self.ensure_active().await?;
        if amount.is_zero() {
            return Ok(());
        }
        {
            let mut stats = self.stats.write().await;
            stats.reward_units_issued = stats
                .reward_units_issued
                .checked_add(amount)
                .ok_or_else(|| anyhow!("Reward issuance overflow"))?;
        }
        let mut balances = self.reward_balances.write().await;
        let entry = balances.entry(recipient).or_insert(Amount::ZERO);
        *entry = entry.saturating_add(amount);

        info!(
            recipient = %recipient,
            reward_units = amount.to_units(),
            "🎁 Reward units issued"
        );
        Ok(())
    }

    async fn reward_units_issued(&self) -> Amount {
        self.stats.read().await.reward_units_issued
    }

    async fn notify_asset_priced(&self) -> Result<()> {
        let mut stats = self.stats.write().await;
        stats.assets_priced += 1;
        info!(assets_priced = stats.assets_priced, "📊 Asset priced");
        Ok(())
    }

    async fn notify_profit_generated(&self, amount: Amount) -> Result<()> {
        let mut stats = self.stats.write().await;
        stats.profit_generated = stats.profit_generated.saturating_add(amount);
        info!(
            amount = amount.to_units(),
            profit_generated = stats.profit_generated.to_units(),
            "📈 Profit generated"
        );
        Ok(())
    }
}
