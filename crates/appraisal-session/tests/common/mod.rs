#![allow(dead_code)]

use appraisal_economics::{AccountAddress, Amount, LedgerGateway, PayoutGateway, TreasuryVault};
use appraisal_session::{
    AssetId, Commitment, EngineConfig, InstanceId, ManualClock, SessionEngine, SessionEvent,
    SessionKey,
};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const START: i64 = 1_700_000_000;
pub const WINDOW: i64 = 3_600;
pub const DEADLINE: i64 = START + WINDOW;
pub const ITEM: InstanceId = InstanceId(7);
/// 25 reward units at the opening price of 0.002 per unit
pub const LISTING_COST: Amount = Amount::from_base_units(50_000_000);

pub fn units(n: u64) -> Amount {
    Amount::from_whole_units(n)
}

pub fn addr(label: &str) -> AccountAddress {
    AccountAddress::from_label(label)
}

pub fn asset() -> AssetId {
    AssetId::from_label("genesis-collection")
}

pub fn admin() -> AccountAddress {
    addr("admin")
}

pub fn secret_for(voter: &AccountAddress) -> Vec<u8> {
    format!("salt-{}", voter.to_hex()).into_bytes()
}

pub struct Harness {
    pub engine: Arc<SessionEngine>,
    pub clock: ManualClock,
    pub treasury: Arc<TreasuryVault>,
    pub gateway: Arc<LedgerGateway>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default().with_admin(admin()))
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let gateway = Arc::new(LedgerGateway::new());
        let (harness, _) = Self::with_gateway(config, gateway.clone());
        Harness { gateway, ..harness }
    }

    /// Build with a custom gateway. The returned harness' own `gateway` is unused.
    pub fn with_gateway(
        config: EngineConfig,
        gateway: Arc<dyn PayoutGateway>,
    ) -> (Self, Arc<SessionEngine>) {
        let clock = ManualClock::new(START);
        let treasury = Arc::new(TreasuryVault::default());
        let (engine, events) = SessionEngine::new(config, treasury.clone(), gateway)
            .unwrap()
            .with_clock(Arc::new(clock.clone()))
            .with_event_channel();
        let engine = Arc::new(engine);
        let harness = Harness {
            engine: engine.clone(),
            clock,
            treasury,
            gateway: Arc::new(LedgerGateway::new()),
            events,
        };
        (harness, engine)
    }

    /// Open the next attempt on `ITEM` with `bounty` on top of the listing cost.
    pub async fn open(&self, opener: AccountAddress, bounty: Amount) -> SessionKey {
        let value = bounty.checked_add(LISTING_COST).unwrap();
        self.engine
            .open_session(opener, value, asset(), ITEM, units(2_000), WINDOW)
            .await
            .unwrap()
    }

    /// Deposit `stake` for `voter` and commit it behind `appraisal`.
    pub async fn commit(&self, voter: AccountAddress, stake: Amount, appraisal: Amount) {
        self.engine.deposit(voter, stake).await.unwrap();
        let commitment = Commitment::compute(appraisal, &voter, &secret_for(&voter));
        self.engine
            .commit(voter, asset(), ITEM, stake, commitment)
            .await
            .unwrap();
    }

    pub async fn reveal(
        &self,
        voter: AccountAddress,
        appraisal: Amount,
    ) -> appraisal_session::Result<u64> {
        self.engine
            .reveal(voter, asset(), ITEM, appraisal, &secret_for(&voter))
            .await
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
