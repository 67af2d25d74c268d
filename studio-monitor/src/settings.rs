//! Configuration loading: file, then `STUDIO_*` environment overrides.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use studio_ipc::StudioConfig;
use tracing::debug;

/// Load the configuration, falling back to defaults when no file is given.
pub fn load(path: Option<&Path>) -> Result<StudioConfig> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            parse(&text).with_context(|| format!("Invalid config file {}", path.display()))?
        }
        None => StudioConfig::default(),
    };
    apply_env(config, |key| std::env::var(key).ok())
}

pub fn parse(text: &str) -> Result<StudioConfig> {
    Ok(toml::from_str(text)?)
}

/// Override fields from environment variables looked up through `var`.
pub fn apply_env(
    mut config: StudioConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<StudioConfig> {
    if let Some(host) = var("STUDIO_API_HOST") {
        config.api_host = host;
    }
    if let Some(origin) = var("STUDIO_ORIGIN") {
        config.origin = origin;
    }
    if let Some(domain) = var("STUDIO_METERS_DOMAIN") {
        config.meters_domain = domain;
    }
    if let Some(interval) = var("STUDIO_POLL_INTERVAL_MS") {
        config.poll_interval_ms = interval
            .parse()
            .with_context(|| format!("STUDIO_POLL_INTERVAL_MS is not a number: {interval}"))?;
    }
    debug!(api_host = %config.api_host, "Configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_environment_overrides_file() {
        let config = parse("api_host = \"staging.test\"\npoll_interval_ms = 5000\n").unwrap();
        let env = HashMap::from([
            ("STUDIO_API_HOST", "local.test:8443"),
            ("STUDIO_POLL_INTERVAL_MS", "1000"),
        ]);

        let config = apply_env(config, |key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.api_host, "local.test:8443");
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.ready_status, "Ready");
    }

    #[test]
    fn test_bad_interval_is_rejected() {
        let result = apply_env(StudioConfig::default(), |key| {
            (key == "STUDIO_POLL_INTERVAL_MS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        assert!(parse("poll_interval_ms = \"fast\"\n").is_err());
    }
}
