//! Tracing subscriber setup.

use crate::config::TracingConfig;
use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber configured by `config`.
///
/// `RUST_LOG` takes precedence over `config.filter` when set.
///
/// # Errors
///
/// Returns an error if the filter does not parse or a global subscriber is
/// already installed.
pub fn init_tracing(config: &TracingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let config = TracingConfig::new().with_filter("contextvars=trace");
        let _ = init_tracing(&config);

        let err = init_tracing(&config.with_json(true)).unwrap_err();
        assert!(err.to_string().contains("tracing subscriber"));
    }
}
