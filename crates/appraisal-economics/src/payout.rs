use crate::types::{AccountAddress, Amount, TransferEvent, TransferReason};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Outgoing transfers of base currency to participant addresses.
///
/// Implementations may call back into whoever triggered the payout; callers
/// must finish their own bookkeeping before paying out.
#[async_trait]
pub trait PayoutGateway: Send + Sync {
    async fn pay(&self, to: AccountAddress, amount: Amount, reason: TransferReason)
        -> Result<()>;
}

/// Gateway that credits an in-memory external balance per recipient and keeps
/// the transfer history.
#[derive(Default)]
pub struct LedgerGateway {
    balances: Arc<RwLock<HashMap<AccountAddress, Amount>>>,
    history: Arc<RwLock<Vec<TransferEvent>>>,
    rejecting: Arc<RwLock<HashSet<AccountAddress>>>,
}

impl LedgerGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn balance_of(&self, address: &AccountAddress) -> Amount {
        self.balances
            .read()
            .await
            .get(address)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    pub async fn history(&self) -> Vec<TransferEvent> {
        self.history.read().await.clone()
    }

    pub async fn total_paid(&self) -> Amount {
        self.history
            .read()
            .await
            .iter()
            .fold(Amount::ZERO, |acc, event| acc.saturating_add(event.amount))
    }

    /// Make every transfer to `address` fail, as a recipient that refuses funds would.
    pub async fn reject_payments_to(&self, address: AccountAddress) {
        self.rejecting.write().await.insert(address);
    }
}

#[async_trait]
impl PayoutGateway for LedgerGateway {
    async fn pay(
        &self,
        to: AccountAddress,
        amount: Amount,
        reason: TransferReason,
    ) -> Result<()> {
        if self.rejecting.read().await.contains(&to) {
            debug!(to = %to, amount = amount.to_units(), "Recipient rejected payment");
            bail!("Recipient {} rejected payment of {}", to, amount);
        }

        {
            let mut balances = self.balances.write().await;
            let entry = balances.entry(to).or_insert(Amount::ZERO);
            *entry = entry.saturating_add(amount);
        }
        self.history.write().await.push(TransferEvent {
            to,
            amount,
            timestamp: Utc::now().timestamp(),
            reason,
        });

        info!(
            to = %to,
            amount = amount.to_units(),
            reason = ?reason,
            "💸 Payout sent"
        );
        Ok(())
    }
}
