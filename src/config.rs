//! Server configuration loaded from the environment.
//!
//! Supported variables:
//! - `VT_API_KEY`: VirusTotal API key
//! - `VT_BASE_URL`: override for the VirusTotal API root
//! - `IMSAFE_BIND`: listen address (default `0.0.0.0:3001`)
//! - `IMSAFE_POLL_INTERVAL_SECS`: delay between polls
//! - `IMSAFE_POLL_MAX_ATTEMPTS`: fetch cap per session

use crate::backends::VirusTotalConfig;
use crate::core::ScanError;
use crate::manager::{PollConfig, ScanManagerConfig};

use std::time::Duration;

/// Default listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:3001";

/// Configuration for the `imsafe-server` binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server listens on.
    pub bind: String,

    /// VirusTotal client configuration.
    pub virustotal: VirusTotalConfig,

    /// Scan manager configuration.
    pub manager: ScanManagerConfig,
}

impl ServerConfig {
    /// Loads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ScanError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScanError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = match lookup("VT_API_KEY").filter(|k| !k.trim().is_empty()) {
            Some(key) => key,
            None => {
                tracing::warn!("VT_API_KEY is not set; provider requests will be rejected");
                String::new()
            }
        };

        let mut virustotal = VirusTotalConfig::new(api_key);
        if let Some(url) = lookup("VT_BASE_URL") {
            tracing::debug!("Override VirusTotal base URL from env: {}", url);
            virustotal = virustotal.with_base_url(url);
        }

        let bind = lookup("IMSAFE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());

        let mut poll = PollConfig::default();
        if let Some(val) = lookup("IMSAFE_POLL_INTERVAL_SECS") {
            let secs: u64 = parse_var("IMSAFE_POLL_INTERVAL_SECS", &val)?;
            if secs == 0 {
                return Err(ScanError::configuration(
                    "IMSAFE_POLL_INTERVAL_SECS must be at least 1",
                ));
            }
            poll = poll.with_interval(Duration::from_secs(secs));
            tracing::debug!("Override poll interval from env: {}s", secs);
        }
        if let Some(val) = lookup("IMSAFE_POLL_MAX_ATTEMPTS") {
            let attempts: u32 = parse_var("IMSAFE_POLL_MAX_ATTEMPTS", &val)?;
            poll = poll.with_max_attempts(attempts);
            tracing::debug!("Override poll max attempts from env: {}", attempts);
        }

        Ok(Self {
            bind,
            virustotal,
            manager: ScanManagerConfig::default().with_poll(poll),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ScanError> {
    value.trim().parse().map_err(|_| {
        ScanError::configuration(format!("{} has an invalid value: {:?}", name, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ScanError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind, DEFAULT_BIND);
        assert!(config.virustotal.is_anonymous());
        assert_eq!(config.manager.poll.interval, Duration::from_secs(5));
        assert_eq!(config.manager.poll.max_attempts, Some(120));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("VT_API_KEY", "fake-key"),
            ("VT_BASE_URL", "http://127.0.0.1:9999/api/v3/"),
            ("IMSAFE_BIND", "127.0.0.1:8080"),
            ("IMSAFE_POLL_INTERVAL_SECS", "2"),
            ("IMSAFE_POLL_MAX_ATTEMPTS", "10"),
        ])
        .unwrap();

        assert_eq!(config.bind, "127.0.0.1:8080");
        assert!(!config.virustotal.is_anonymous());
        assert_eq!(config.virustotal.base_url, "http://127.0.0.1:9999/api/v3");
        assert_eq!(config.manager.poll.interval, Duration::from_secs(2));
        assert_eq!(config.manager.poll.max_attempts, Some(10));
    }

    #[test]
    fn test_invalid_numbers() {
        let err = load(&[("IMSAFE_POLL_INTERVAL_SECS", "soon")]).unwrap_err();
        assert!(matches!(err, ScanError::Configuration { .. }));

        let err = load(&[("IMSAFE_POLL_INTERVAL_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ScanError::Configuration { .. }));

        let err = load(&[("IMSAFE_POLL_MAX_ATTEMPTS", "-1")]).unwrap_err();
        assert!(matches!(err, ScanError::Configuration { .. }));
    }

    #[test]
    fn test_blank_key_is_anonymous() {
        let config = load(&[("VT_API_KEY", "   ")]).unwrap();
        assert!(config.virustotal.is_anonymous());
    }
}
