pub mod config;
pub mod logging;
pub mod simulate;

pub use config::{LoggingConfig, NodeConfig};
pub use simulate::{run_scenario, Scenario, SimulationReport};
