//! Client configuration.

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`RemoteConfig::invoke_url`].
pub const ENV_INVOKE_URL: &str = "OJREMOTE_INVOKE_URL";
/// Environment variable overriding [`RemoteConfig::notify_url`].
pub const ENV_NOTIFY_URL: &str = "OJREMOTE_NOTIFY_URL";
/// Environment variable overriding [`RemoteConfig::timeout_secs`].
pub const ENV_TIMEOUT_SECS: &str = "OJREMOTE_TIMEOUT_SECS";

/// Where the server lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// HTTP endpoint receiving invocation requests.
    #[serde(default = "default_invoke_url")]
    pub invoke_url: String,
    /// WebSocket endpoint carrying notifications.
    #[serde(default = "default_notify_url")]
    pub notify_url: String,
    /// Per-request HTTP timeout. None leaves requests unbounded.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_invoke_url() -> String {
    "http://localhost:8080/invoke".to_string()
}

fn default_notify_url() -> String {
    "ws://localhost:8080/notify".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            invoke_url: default_invoke_url(),
            notify_url: default_notify_url(),
            timeout_secs: None,
        }
    }
}

impl RemoteConfig {
    /// Defaults overlaid with the `OJREMOTE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_INVOKE_URL) {
            config.invoke_url = url;
        }
        if let Some(url) = lookup(ENV_NOTIFY_URL) {
            config.notify_url = url;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            match secs.trim().parse::<u64>() {
                Ok(secs) => config.timeout_secs = Some(secs),
                Err(_) => log::warn!("Ignoring {}={:?}: not a number", ENV_TIMEOUT_SECS, secs),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RemoteConfig::default();
        assert_eq!(config.invoke_url, "http://localhost:8080/invoke");
        assert_eq!(config.notify_url, "ws://localhost:8080/notify");
        assert!(config.timeout_secs.is_none());
    }

    #[test]
    fn test_from_json_partial() {
        let config = RemoteConfig::from_json(r#"{"invoke_url": "http://jobs:9000/invoke"}"#).unwrap();
        assert_eq!(config.invoke_url, "http://jobs:9000/invoke");
        assert_eq!(config.notify_url, "ws://localhost:8080/notify");
    }

    #[test]
    fn test_lookup_overlay() {
        let vars: HashMap<&str, &str> = [
            (ENV_NOTIFY_URL, "ws://jobs:9000/notify"),
            (ENV_TIMEOUT_SECS, "15"),
        ]
        .into_iter()
        .collect();

        let config = RemoteConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.invoke_url, "http://localhost:8080/invoke");
        assert_eq!(config.notify_url, "ws://jobs:9000/notify");
        assert_eq!(config.timeout_secs, Some(15));
    }

    #[test]
    fn test_lookup_bad_timeout_ignored() {
        let config = RemoteConfig::from_lookup(|key| {
            (key == ENV_TIMEOUT_SECS).then(|| "soon".to_string())
        });
        assert!(config.timeout_secs.is_none());
    }
}
