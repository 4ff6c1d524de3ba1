use appraisal_economics::AccountAddress;
use appraisal_node::{run_scenario, NodeConfig, Scenario};
use appraisal_session::EngineConfig;
use std::path::PathBuf;
use tempfile::TempDir;

fn gallery_scenario() -> Scenario {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios/gallery.toml");
    Scenario::from_file(&path).unwrap()
}

#[test]
fn test_config_file_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("appraisal-config.toml");

    let mut config = NodeConfig::default();
    config.engine = EngineConfig::default()
        .with_admin(AccountAddress::from_label("ops"))
        .with_privileged_originator(AccountAddress::from_label("auction-house"));
    config.logging.format = "json".to_string();
    config.logging.file_output = Some(dir.path().join("node.log"));
    config
        .logging
        .module_filters
        .insert("appraisal_session::engine".to_string(), "debug".to_string());

    config.save_to_file(&path).unwrap();
    let loaded = NodeConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_partial_config_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("partial.toml");
    std::fs::write(&path, "[engine]\nmin_stake = 1000\n").unwrap();

    let loaded = NodeConfig::from_file(&path).unwrap();
    assert_eq!(loaded.engine.min_stake, 1000);
    assert_eq!(loaded.logging.level, "info");
    assert_eq!(loaded.logging.format, "pretty");
}

#[test]
fn test_missing_config_file_is_error() {
    let dir = TempDir::new().unwrap();
    assert!(NodeConfig::from_file(&dir.path().join("absent.toml")).is_err());
}

#[tokio::test]
async fn test_gallery_scenario_runs_to_close() {
    let report = run_scenario(EngineConfig::default(), &gallery_scenario())
        .await
        .unwrap();

    println!("{}", serde_json::to_string_pretty(&report).unwrap());
    assert_eq!(report.final_appraisal, 1_000.0);
    assert_eq!(report.participants, 6);
    assert_eq!(report.voters.len(), 6);

    let dave = report.voters.iter().find(|v| v.name == "dave").unwrap();
    assert_eq!(dave.base, 0);
    assert!((dave.harvested - 0.05).abs() < 1e-9);
    assert!((dave.principal - 0.95).abs() < 1e-9);
    assert_eq!(dave.profit, 0.0);
    assert!(dave.reward_units > 0.0);

    let bob = report.voters.iter().find(|v| v.name == "bob").unwrap();
    assert_eq!(bob.weight, 2);
    assert_eq!(bob.base, 6);
    assert!(bob.profit > 0.0);

    let profit: f64 = report.voters.iter().map(|v| v.profit).sum();
    assert!((profit - 10.098).abs() < 1e-6);
    // listing cost plus two harvest commissions
    assert!((report.treasury_balance - 0.052).abs() < 1e-9);
    assert!(report.events > 20);
}

#[tokio::test]
async fn test_silent_voter_scenario() {
    let mut scenario = gallery_scenario();
    scenario.voters[5].reveal = false;

    let report = run_scenario(EngineConfig::default(), &scenario).await.unwrap();
    assert_eq!(report.participants, 5);
    assert_eq!(report.voters.len(), 5);
    assert!(report.voters.iter().all(|v| v.name != "erin"));
}

#[test]
fn test_scenario_requires_voters() {
    let result = Scenario::from_toml_str(
        "asset = \"a\"\nopener = \"o\"\nappraisal_hint = 10.0\nvoters = []\n",
    );
    assert!(result.is_err());
}
