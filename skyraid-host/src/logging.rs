//! Tracing subscriber setup for hosts that do not bring their own.

use anyhow::Context;
use skyraid_core::config::SkyraidConfig;
use tracing_subscriber::EnvFilter;

/// Install a global subscriber from the `[general]` section.
///
/// # Errors
/// See [`init`].
pub fn init_from(config: &SkyraidConfig) -> anyhow::Result<()> {
    init(&config.general.log_level, config.general.log_json)
}

/// Install a global subscriber. `RUST_LOG` wins over `level` when set.
///
/// # Errors
/// Fails if `level` is not a valid filter or a subscriber is already set.
pub fn init(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(level)?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed
        .map_err(|e| anyhow::anyhow!(e))
        .context("tracing subscriber already installed")
}

fn level_filter(level: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_an_error() {
        // Either this call or another test installed the subscriber first.
        let _ = init("info", false);
        assert!(init("debug", false).is_err());
        assert!(init_from(&SkyraidConfig::default()).is_err());
    }

    #[test]
    fn configured_level_is_a_valid_filter() {
        let config = SkyraidConfig::default();
        assert!(!config.general.log_json);
        assert!(level_filter(&config.general.log_level).is_ok());
        assert!(level_filter("skyraid_host=debug,warn").is_ok());
    }
}
