use std::{env, time::Duration};

/// Client configuration, sourced from the environment with sensible
/// defaults for a local aria2 daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// RPC endpoint. `ws(s)://` selects the WebSocket transport,
    /// `http(s)://` the HTTP one.
    pub url: String,
    /// Shared RPC secret (`--rpc-secret` on the daemon side).
    pub secret: Option<String>,
    /// Default per-request timeout in milliseconds.
    pub default_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:6800/jsonrpc".to_string(),
            secret: None,
            default_timeout_ms: 5000,
        }
    }
}

impl ClientConfig {
    pub const ENV_URL: &'static str = "ARIA2_RPC_URL";
    pub const ENV_SECRET: &'static str = "ARIA2_RPC_SECRET";
    pub const ENV_TIMEOUT: &'static str = "ARIA2_RPC_TIMEOUT_MS";

    /// Construct from real process environment variables.
    pub fn from_env() -> Self {
        Self::from_reader(|k| env::var(k).ok())
    }

    /// Construct from an arbitrary key/value source (for tests).
    pub fn from_map<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        use std::collections::HashMap;
        let map: HashMap<String, String> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_reader(|k| map.get(k).cloned())
    }

    fn from_reader<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = get(Self::ENV_URL) {
            cfg.url = normalize_url(&url);
        }

        if let Some(secret_raw) = get(Self::ENV_SECRET) {
            let s = secret_raw.trim();
            cfg.secret = if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            };
        }

        if let Some(timeout_raw) = get(Self::ENV_TIMEOUT) {
            if let Ok(ms) = timeout_raw.trim().parse::<u64>() {
                cfg.default_timeout_ms = ms;
            }
        }

        cfg
    }

    /// Default request timeout as `std::time::Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Whether the endpoint selects the WebSocket transport.
    pub fn is_websocket(&self) -> bool {
        self.url.starts_with("ws://") || self.url.starts_with("wss://")
    }
}

fn normalize_url(s: &str) -> String {
    let t = s.trim();
    if t.starts_with("ws://")
        || t.starts_with("wss://")
        || t.starts_with("http://")
        || t.starts_with("https://")
    {
        t.to_string()
    } else {
        // Bare host:port gets the daemon's conventional path.
        format!("ws://{}/jsonrpc", t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let cfg = ClientConfig::from_map(std::iter::empty::<(String, String)>());
        assert_eq!(cfg.url, "ws://127.0.0.1:6800/jsonrpc");
        assert_eq!(cfg.secret, None);
        assert_eq!(cfg.default_timeout_ms, 5000);
        assert_eq!(cfg.timeout(), Duration::from_millis(5000));
        assert!(cfg.is_websocket());
    }

    #[test]
    fn overrides_work_and_url_is_normalized() {
        let cfg = ClientConfig::from_map([
            (ClientConfig::ENV_URL, "127.0.0.1:6801"),
            (ClientConfig::ENV_SECRET, "abc"),
            (ClientConfig::ENV_TIMEOUT, "250"),
        ]);
        assert_eq!(cfg.url, "ws://127.0.0.1:6801/jsonrpc");
        assert_eq!(cfg.secret.as_deref(), Some("abc"));
        assert_eq!(cfg.default_timeout_ms, 250);
    }

    #[test]
    fn http_url_selects_http_transport() {
        let cfg = ClientConfig::from_map([(
            ClientConfig::ENV_URL,
            "https://example.org/jsonrpc",
        )]);
        assert_eq!(cfg.url, "https://example.org/jsonrpc");
        assert!(!cfg.is_websocket());
    }

    #[test]
    fn empty_secret_is_none_and_bad_timeout_is_ignored() {
        let cfg = ClientConfig::from_map([
            (ClientConfig::ENV_SECRET, "   "),
            (ClientConfig::ENV_TIMEOUT, "NaN"),
        ]);
        assert_eq!(cfg.secret, None);
        assert_eq!(cfg.default_timeout_ms, 5000);
    }
}
