//! Drive a complete session from a TOML scenario against in-process
//! collaborators and a manual clock.

use anyhow::{bail, Context, Result};
use appraisal_economics::{AccountAddress, Amount, LedgerGateway, Treasury, TreasuryVault};
use appraisal_session::{
    AssetId, Commitment, EngineConfig, InstanceId, ManualClock, SessionEngine, SessionProgression,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Label hashed into the asset id
    pub asset: String,
    #[serde(default)]
    pub instance: u64,
    pub opener: String,
    /// Bounty on top of the listing cost, in whole-unit decimals
    #[serde(default)]
    pub bounty: f64,
    pub appraisal_hint: f64,
    #[serde(default = "default_window")]
    pub voting_window_secs: i64,
    #[serde(default = "default_start")]
    pub start_time: i64,
    pub voters: Vec<ScenarioVoter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioVoter {
    pub name: String,
    pub stake: f64,
    pub appraisal: f64,
    /// Voters that stay silent after committing
    #[serde(default = "default_true")]
    pub reveal: bool,
}

fn default_window() -> i64 {
    3_600
}

fn default_start() -> i64 {
    1_700_000_000
}

fn default_true() -> bool {
    true
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(content).context("parsing scenario")?;
        if scenario.voters.is_empty() {
            bail!("scenario needs at least one voter");
        }
        Ok(scenario)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterReport {
    pub name: String,
    pub weight: u64,
    pub base: u8,
    pub harvested: f64,
    pub principal: f64,
    pub profit: f64,
    pub reward_units: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub session: String,
    pub final_appraisal: f64,
    pub participants: u64,
    pub voters: Vec<VoterReport>,
    pub treasury_balance: f64,
    pub paid_out: f64,
    pub events: usize,
}

fn secret_for(name: &str) -> Vec<u8> {
    format!("simulated-secret:{}", name).into_bytes()
}

pub async fn run_scenario(config: EngineConfig, scenario: &Scenario) -> Result<SimulationReport> {
    let clock = ManualClock::new(scenario.start_time);
    let treasury = Arc::new(TreasuryVault::default());
    let gateway = Arc::new(LedgerGateway::new());
    let (engine, mut events) = SessionEngine::new(config, treasury.clone(), gateway.clone())?
        .with_clock(Arc::new(clock.clone()))
        .with_event_channel();

    let asset = AssetId::from_label(&scenario.asset);
    let instance = InstanceId(scenario.instance);
    let opener = AccountAddress::from_label(&scenario.opener);
    let voters: Vec<(AccountAddress, &ScenarioVoter)> = scenario
        .voters
        .iter()
        .map(|v| (AccountAddress::from_label(&v.name), v))
        .collect();

    let listing_cost = engine.listing_cost().await;
    let value = Amount::from_units(scenario.bounty).saturating_add(listing_cost);
    let key = engine
        .open_session(
            opener,
            value,
            asset,
            instance,
            Amount::from_units(scenario.appraisal_hint),
            scenario.voting_window_secs,
        )
        .await?;

    for (address, voter) in &voters {
        let stake = Amount::from_units(voter.stake);
        let appraisal = Amount::from_units(voter.appraisal);
        engine.deposit(*address, stake).await?;
        let commitment = Commitment::compute(appraisal, address, &secret_for(&voter.name));
        engine.commit(*address, asset, instance, stake, commitment).await?;
    }

    clock.advance(scenario.voting_window_secs);
    for (address, voter) in voters.iter().filter(|(_, v)| v.reveal) {
        let appraisal = Amount::from_units(voter.appraisal);
        engine
            .reveal(*address, asset, instance, appraisal, &secret_for(&voter.name))
            .await
            .with_context(|| format!("reveal by {}", voter.name))?;
    }

    let progression = engine
        .session(asset, instance)
        .await
        .map(|s| s.checks.progression);
    if progression != Some(SessionProgression::RevealComplete) {
        // Silent voters hold the reveal phase open until the window passes
        clock.advance(scenario.voting_window_secs + 1);
    }
    let final_appraisal = engine.set_final_appraisal(opener, asset, instance).await?;

    let mut outcomes = Vec::new();
    for (address, voter) in voters.iter().filter(|(_, v)| v.reveal) {
        outcomes.push((*address, voter, engine.harvest(*address, asset, instance).await?));
    }

    let participants = engine
        .session(asset, instance)
        .await
        .map(|s| s.core.unique_voters)
        .unwrap_or_default();

    let mut reports = Vec::new();
    for (address, voter, outcome) in outcomes {
        let principal_before = engine.principal_of(&address).await;
        let status = engine.claim(address, asset, instance).await?;
        let principal = engine.principal_of(&address).await.saturating_sub(principal_before);
        let profit = engine.claim_profit(address).await?;
        info!(voter = %voter.name, code = status.code(), "Claim processed");

        reports.push(VoterReport {
            name: voter.name.clone(),
            weight: outcome.weight,
            base: outcome.base,
            harvested: outcome.amount_harvested.to_units(),
            principal: principal.to_units(),
            profit: profit.to_units(),
            reward_units: treasury.reward_balance(&address).await.to_units(),
        });
    }

    let closed = engine
        .session(asset, instance)
        .await
        .map(|s| s.checks.progression == SessionProgression::Closed)
        .unwrap_or(false);
    if !closed {
        warn!(session = %key, "Session still open after claims, ending it");
        engine.end_session(opener, asset, instance).await?;
    }

    let mut event_count = 0;
    while events.try_recv().is_ok() {
        event_count += 1;
    }

    Ok(SimulationReport {
        session: key.to_string(),
        final_appraisal: final_appraisal.to_units(),
        participants,
        voters: reports,
        treasury_balance: treasury.balance().await.to_units(),
        paid_out: gateway.total_paid().await.to_units(),
        events: event_count,
    })
}
