use crate::config::LoggingConfig;
use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

pub fn display_boot_banner(version: &str) {
    println!("\n╔══════════════════════════════════════════════╗");
    println!("║           APPRAISAL SESSION ENGINE           ║");
    println!("║      commit · reveal · settle · harvest      ║");
    println!("║{:^46}║", format!("v{}", version));
    println!("╚══════════════════════════════════════════════╝\n");
}

/// `-v` raises the configured level to debug, `-vv` to trace.
fn effective_level(configured: &str, verbose: u8) -> &str {
    match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    }
}

/// `RUST_LOG` wins over the configured level; module filters apply either way.
fn session_filter(
    config: &LoggingConfig,
    level: &str,
    rust_log: Option<String>,
) -> anyhow::Result<EnvFilter> {
    let base = rust_log.unwrap_or_else(|| format!("appraisal={}", level));
    config
        .module_filters
        .iter()
        .try_fold(EnvFilter::new(base), |filter, (target, target_level)| {
            let directive = format!("{}={}", target, target_level)
                .parse::<Directive>()
                .with_context(|| format!("invalid log filter for {}", target))?;
            Ok::<_, anyhow::Error>(filter.add_directive(directive))
        })
}

fn open_log_file(config: &LoggingConfig) -> anyhow::Result<Option<Mutex<File>>> {
    let Some(path) = &config.file_output else {
        return Ok(None);
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    Ok(Some(Mutex::new(file)))
}

pub fn init_logging(config: &LoggingConfig, cli_verbose: u8) -> anyhow::Result<()> {
    let level = effective_level(&config.level, cli_verbose);
    let filter = session_filter(config, level, std::env::var("RUST_LOG").ok())?;
    let log_file = open_log_file(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.format.as_str() {
        "json" => {
            let file_layer = log_file.map(|f| fmt::layer().json().with_ansi(false).with_writer(f));
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(file_layer)
                .try_init()?;
        }
        "compact" => {
            let file_layer =
                log_file.map(|f| fmt::layer().compact().with_ansi(false).with_writer(f));
            registry
                .with(fmt::layer().compact().with_target(false))
                .with(file_layer)
                .try_init()?;
        }
        _ => {
            // Source locations only at debug and below
            let verbose = matches!(level, "debug" | "trace");
            let file_layer = log_file.map(|f| fmt::layer().with_ansi(false).with_writer(f));
            registry
                .with(
                    fmt::layer()
                        .with_target(verbose)
                        .with_file(verbose)
                        .with_line_number(verbose),
                )
                .with(file_layer)
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_overrides_level() {
        assert_eq!(effective_level("warn", 0), "warn");
        assert_eq!(effective_level("warn", 1), "debug");
        assert_eq!(effective_level("warn", 4), "trace");
    }

    #[test]
    fn test_filter_accepts_module_directives() {
        let mut config = LoggingConfig::default();
        config
            .module_filters
            .insert("appraisal_session::engine".to_string(), "trace".to_string());
        let filter = session_filter(&config, "info", None).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("appraisal=info"));
        assert!(rendered.contains("appraisal_session::engine=trace"));
    }

    #[test]
    fn test_rust_log_replaces_default_directive() {
        let config = LoggingConfig::default();
        let filter = session_filter(&config, "info", Some("warn".to_string())).unwrap();
        assert!(!filter.to_string().contains("appraisal=info"));
    }

    #[test]
    fn test_bad_module_filter_is_rejected() {
        let mut config = LoggingConfig::default();
        config
            .module_filters
            .insert("appraisal".to_string(), "loud".to_string());
        assert!(session_filter(&config, "info", None).is_err());
    }
}
