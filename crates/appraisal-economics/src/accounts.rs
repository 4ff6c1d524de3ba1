use crate::types::{AccountAddress, Amount};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub principal: Amount,
    pub profit: Amount,
}

/// Per-participant principal and accrued-profit balances, persisted across sessions.
///
/// Principal is what a participant deposited or got back from a session and
/// may stake again; profit accrues from session rewards and is only ever paid out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountBook {
    accounts: HashMap<AccountAddress, AccountInfo>,
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, address: &AccountAddress) -> AccountInfo {
        self.accounts.get(address).copied().unwrap_or_default()
    }

    pub fn principal(&self, address: &AccountAddress) -> Amount {
        self.account(address).principal
    }

    pub fn profit(&self, address: &AccountAddress) -> Amount {
        self.account(address).profit
    }

    pub fn credit_principal(&mut self, address: AccountAddress, amount: Amount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let entry = self.accounts.entry(address).or_default();
        let before = entry.principal;
        entry.principal = before
            .checked_add(amount)
            .ok_or_else(|| anyhow!("Principal overflow for {}", address))?;

        info!(
            address = %address,
            amount = amount.to_units(),
            principal_before = before.to_units(),
            principal_after = entry.principal.to_units(),
            "💰 Principal credited"
        );
        Ok(())
    }

    pub fn debit_principal(&mut self, address: AccountAddress, amount: Amount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let current = self.principal(&address);
        let remaining = current.checked_sub(amount).ok_or_else(|| {
            anyhow!(
                "Insufficient principal for {}: has {}, needs {}",
                address,
                current,
                amount
            )
        })?;
        self.accounts.entry(address).or_default().principal = remaining;

        info!(
            address = %address,
            amount = amount.to_units(),
            principal_before = current.to_units(),
            principal_after = remaining.to_units(),
            "💸 Principal debited"
        );
        Ok(())
    }

    pub fn credit_profit(&mut self, address: AccountAddress, amount: Amount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let entry = self.accounts.entry(address).or_default();
        entry.profit = entry
            .profit
            .checked_add(amount)
            .ok_or_else(|| anyhow!("Profit overflow for {}", address))?;

        debug!(
            address = %address,
            amount = amount.to_units(),
            profit_after = entry.profit.to_units(),
            "Profit accrued"
        );
        Ok(())
    }

    /// Zero the accrued profit and return what was there.
    pub fn take_profit(&mut self, address: &AccountAddress) -> Amount {
        match self.accounts.get_mut(address) {
            Some(info) => std::mem::take(&mut info.profit),
            None => Amount::ZERO,
        }
    }

    pub fn total_principal(&self) -> Amount {
        self.accounts
            .values()
            .fold(Amount::ZERO, |acc, info| acc.saturating_add(info.principal))
    }

    pub fn total_profit(&self) -> Amount {
        self.accounts
            .values()
            .fold(Amount::ZERO, |acc, info| acc.saturating_add(info.profit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_credit_and_debit() {
        let mut book = AccountBook::new();
        let alice = AccountAddress::from_bytes([1; 32]);

        book.credit_principal(alice, Amount::from_whole_units(10)).unwrap();
        book.debit_principal(alice, Amount::from_whole_units(4)).unwrap();
        assert_eq!(book.principal(&alice), Amount::from_whole_units(6));

        let err = book
            .debit_principal(alice, Amount::from_whole_units(7))
            .unwrap_err();
        assert!(err.to_string().contains("Insufficient principal"));
        assert_eq!(book.principal(&alice), Amount::from_whole_units(6));
    }

    #[test]
    fn test_take_profit_zeroes_balance() {
        let mut book = AccountBook::new();
        let bob = AccountAddress::from_bytes([2; 32]);

        book.credit_profit(bob, Amount::from_base_units(500)).unwrap();
        book.credit_profit(bob, Amount::from_base_units(250)).unwrap();
        assert_eq!(book.take_profit(&bob), Amount::from_base_units(750));
        assert_eq!(book.profit(&bob), Amount::ZERO);
        assert_eq!(book.take_profit(&bob), Amount::ZERO);
    }

    #[test]
    fn test_totals() {
        let mut book = AccountBook::new();
        book.credit_principal(AccountAddress::from_bytes([1; 32]), Amount::from_base_units(3))
            .unwrap();
        book.credit_principal(AccountAddress::from_bytes([2; 32]), Amount::from_base_units(4))
            .unwrap();
        book.credit_profit(AccountAddress::from_bytes([2; 32]), Amount::from_base_units(5))
            .unwrap();
        assert_eq!(book.total_principal(), Amount::from_base_units(7));
        assert_eq!(book.total_profit(), Amount::from_base_units(5));
    }
}
