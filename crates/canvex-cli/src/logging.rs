//! Tracing subscriber setup from the `logging` config section.

use std::io;

use canvex_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over the config; `--verbose` raises the base level.
fn build_filter(logging: &LoggingConfig, verbose: bool) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let level = if verbose {
        "debug"
    } else {
        logging.level.as_deref().unwrap_or("info")
    };
    let mut directives = vec![level.to_string()];
    directives.extend(logging.filters.iter().cloned());

    Ok(EnvFilter::try_new(directives.join(","))?)
}

pub fn init(logging: Option<&LoggingConfig>, verbose: bool) -> anyhow::Result<()> {
    let default = LoggingConfig::default();
    let logging = logging.unwrap_or(&default);
    let filter = build_filter(logging, verbose)?;
    let to_stdout = logging.output == "stdout";

    match (logging.format.as_str(), to_stdout) {
        ("json", true) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stdout)
            .init(),
        ("json", false) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init(),
        (_, true) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stdout)
            .init(),
        (_, false) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_appended_to_level() {
        let logging = LoggingConfig {
            level: Some("warn".into()),
            filters: vec!["canvex_canvas=trace".into()],
            ..LoggingConfig::default()
        };
        // RUST_LOG may be set in CI; only check when it is not
        if std::env::var("RUST_LOG").is_err() {
            let filter = build_filter(&logging, false).unwrap();
            assert!(filter.to_string().contains("canvex_canvas=trace"));
        }
    }

    #[test]
    fn test_bad_directive_rejected() {
        let logging = LoggingConfig {
            filters: vec!["canvex_canvas=loud".into()],
            ..LoggingConfig::default()
        };
        if std::env::var("RUST_LOG").is_err() {
            assert!(build_filter(&logging, false).is_err());
        }
    }
}
