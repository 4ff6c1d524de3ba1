use appraisal_economics::{
    exchange, AccountAddress, AccountBook, Amount, LedgerGateway, PayoutGateway, TransferReason,
    Treasury, TreasuryVault,
};

#[tokio::test]
async fn test_treasury_reward_issuance_moves_price() {
    let vault = TreasuryVault::default();
    let voter = AccountAddress::from_label("voter");

    println!("\n=== Reward issuance ===");
    assert_eq!(vault.unit_price().await, Amount::from_base_units(exchange::BASE_PRICE));

    // 2 units of currency buy 1000 whole reward units at the opening price
    let units = exchange::currency_to_reward_units(
        Amount::from_whole_units(2),
        vault.reward_units_issued().await,
    );
    assert_eq!(units, Amount::from_whole_units(1_000));
    vault.send_reward(voter, units).await.unwrap();

    assert_eq!(vault.reward_balance(&voter).await, units);
    assert_eq!(
        vault.unit_price().await,
        Amount::from_base_units(exchange::BASE_PRICE + 1_000)
    );
    println!("✓ Price moved to {}", vault.unit_price().await);

    // the same listing notional now costs more
    let notional = Amount::from_whole_units(25);
    let before = exchange::reward_units_to_currency(notional, Amount::ZERO);
    let after = exchange::reward_units_to_currency(notional, vault.reward_units_issued().await);
    assert!(after > before);
}

#[tokio::test]
async fn test_treasury_tracks_receipts_by_reason() {
    let vault = TreasuryVault::default().with_balance(Amount::from_whole_units(10));

    vault
        .receive(Amount::from_whole_units(1), TransferReason::ListingFee)
        .await
        .unwrap();
    vault
        .receive(Amount::from_whole_units(2), TransferReason::SessionSweep)
        .await
        .unwrap();
    vault
        .receive(Amount::from_whole_units(3), TransferReason::SessionSweep)
        .await
        .unwrap();
    vault.notify_asset_priced().await.unwrap();
    vault
        .notify_profit_generated(Amount::from_units(0.5))
        .await
        .unwrap();

    let stats = vault.stats().await;
    assert_eq!(stats.balance, Amount::from_whole_units(16));
    assert_eq!(
        stats.received_by_reason.get("SessionSweep"),
        Some(&Amount::from_whole_units(5))
    );
    assert_eq!(stats.assets_priced, 1);
    assert_eq!(stats.profit_generated, Amount::from_units(0.5));

    vault.emergency_pause().await;
    assert!(vault
        .receive(Amount::from_whole_units(1), TransferReason::HarvestCommission)
        .await
        .is_err());
    assert!(vault
        .send_reward(AccountAddress::from_label("x"), Amount::from_whole_units(1))
        .await
        .is_err());
    vault.resume().await;
    assert_eq!(vault.balance().await, Amount::from_whole_units(16));
}

#[tokio::test]
async fn test_ledger_gateway_history_and_rejection() {
    let gateway = LedgerGateway::new();
    let (alice, bob) = (
        AccountAddress::from_label("alice"),
        AccountAddress::from_label("bob"),
    );

    gateway
        .pay(alice, Amount::from_whole_units(3), TransferReason::PrincipalWithdrawal)
        .await
        .unwrap();
    gateway
        .pay(alice, Amount::from_whole_units(1), TransferReason::CloseOutFee)
        .await
        .unwrap();
    gateway.reject_payments_to(bob).await;
    assert!(gateway
        .pay(bob, Amount::from_whole_units(1), TransferReason::ProfitWithdrawal)
        .await
        .is_err());

    assert_eq!(gateway.balance_of(&alice).await, Amount::from_whole_units(4));
    assert_eq!(gateway.balance_of(&bob).await, Amount::ZERO);
    assert_eq!(gateway.total_paid().await, Amount::from_whole_units(4));
    assert_eq!(gateway.history().await.len(), 2);
}

#[test]
fn test_account_book_conservation() {
    let mut book = AccountBook::new();
    let accounts: Vec<AccountAddress> = (0..10u8)
        .map(|i| AccountAddress::from_bytes([i; 32]))
        .collect();

    for (i, account) in accounts.iter().enumerate() {
        book.credit_principal(*account, Amount::from_whole_units(i as u64 + 1))
            .unwrap();
    }
    // 1 + 2 + ... + 10
    assert_eq!(book.total_principal(), Amount::from_whole_units(55));

    // moving principal into a stake and back keeps the total
    book.debit_principal(accounts[9], Amount::from_whole_units(4))
        .unwrap();
    assert!(book
        .debit_principal(accounts[0], Amount::from_whole_units(2))
        .is_err());
    book.credit_principal(accounts[9], Amount::from_whole_units(4))
        .unwrap();
    assert_eq!(book.total_principal(), Amount::from_whole_units(55));

    book.credit_profit(accounts[3], Amount::from_units(0.25)).unwrap();
    assert_eq!(book.total_profit(), Amount::from_units(0.25));
    assert_eq!(book.take_profit(&accounts[3]), Amount::from_units(0.25));
    assert_eq!(book.total_profit(), Amount::ZERO);
}
