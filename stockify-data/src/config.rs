//! Configuration for the gateway, poller and session.
//!
//! Each config has sensible defaults, a builder, and a `from_env` constructor reading
//! `STOCKIFY_*` environment variables.

use crate::{chain::DEFAULT_STRIKE_DEPTH, error::DataError};
use smol_str::SmolStr;
use std::{str::FromStr, time::Duration};
use tracing::warn;
use url::Url;

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";

/// Default fixed polling rate for live snapshots.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10_000);

/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default underlying symbol.
pub const DEFAULT_SYMBOL: &str = "NIFTY";

/// Read and parse an environment variable, warning and falling back on malformed values.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring malformed environment variable");
            default
        }),
        Err(_) => default,
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Backend base URL; the `/api/..` endpoints are joined onto it.
    pub base_url: Url,
    /// Per request timeout
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration with a custom base URL.
    pub fn new(base_url: &str) -> Result<Self, DataError> {
        Ok(Self {
            base_url: normalise_base_url(Url::parse(base_url)?),
            ..Default::default()
        })
    }

    /// Build from `STOCKIFY_API_URL` and `STOCKIFY_HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, DataError> {
        let config = match std::env::var("STOCKIFY_API_URL") {
            Ok(url) => Self::new(&url)?,
            Err(_) => Self::default(),
        };

        let timeout_secs = env_or(
            "STOCKIFY_HTTP_TIMEOUT_SECS",
            config.request_timeout.as_secs(),
        );

        Ok(config.with_request_timeout(Duration::from_secs(timeout_secs)))
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolve an endpoint path (eg/ `"api/live-data"`) against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, DataError> {
        self.base_url.join(path).map_err(DataError::from)
    }
}

/// Ensure the base URL ends in `/` so [`Url::join`] appends rather than replaces.
fn normalise_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Live poller configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Fixed rate between fetch starts
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollerConfig {
    /// Build from `STOCKIFY_POLL_INTERVAL_MS`.
    pub fn from_env() -> Self {
        let millis = env_or("STOCKIFY_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL.as_millis() as u64);
        Self::default().with_interval(Duration::from_millis(millis.max(1)))
    }

    /// Set polling interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Initial session state applied on mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub symbol: SmolStr,
    pub polling_enabled: bool,
    pub highlighting: bool,
    pub reversed: bool,
    /// Strikes shown on each side of spot; `None` renders the full ladder.
    pub strike_depth: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            symbol: SmolStr::new_static(DEFAULT_SYMBOL),
            polling_enabled: true,
            highlighting: true,
            reversed: false,
            strike_depth: Some(DEFAULT_STRIKE_DEPTH),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration for a custom symbol.
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Build from `STOCKIFY_SYMBOL` and `STOCKIFY_STRIKE_DEPTH` (`0` shows the full ladder).
    pub fn from_env() -> Self {
        let symbol = std::env::var("STOCKIFY_SYMBOL")
            .ok()
            .filter(|symbol| !symbol.trim().is_empty())
            .map(|symbol| SmolStr::new(symbol.trim()))
            .unwrap_or_else(|| SmolStr::new_static(DEFAULT_SYMBOL));

        let depth = env_or("STOCKIFY_STRIKE_DEPTH", DEFAULT_STRIKE_DEPTH);

        Self::new(symbol).with_strike_depth((depth > 0).then_some(depth))
    }

    /// Set polling enabled on mount
    pub fn with_polling_enabled(mut self, enabled: bool) -> Self {
        self.polling_enabled = enabled;
        self
    }

    /// Set hot cell highlighting on mount
    pub fn with_highlighting(mut self, enabled: bool) -> Self {
        self.highlighting = enabled;
        self
    }

    /// Set reversed row order on mount
    pub fn with_reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    /// Set strike depth
    pub fn with_strike_depth(mut self, depth: Option<usize>) -> Self {
        self.strike_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_config_endpoint() {
        struct TestCase {
            base_url: &'static str,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: root base url
                base_url: "http://localhost:8000",
                expected: "http://localhost:8000/api/live-data",
            },
            TestCase {
                // TC1: base url with a path prefix and no trailing slash
                base_url: "https://stockify.example.com/backend",
                expected: "https://stockify.example.com/backend/api/live-data",
            },
            TestCase {
                // TC2: base url with a path prefix and trailing slash
                base_url: "https://stockify.example.com/backend/",
                expected: "https://stockify.example.com/backend/api/live-data",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let config = GatewayConfig::new(test.base_url).unwrap();
            let actual = config.endpoint("api/live-data").unwrap();
            assert_eq!(actual.as_str(), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_gateway_config_invalid_url() {
        assert!(matches!(
            GatewayConfig::new("not a url"),
            Err(DataError::Config(_))
        ));
    }

    #[test]
    fn test_default_configs() {
        let gateway = GatewayConfig::default();
        assert_eq!(gateway.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(gateway.request_timeout, Duration::from_secs(10));

        let poller = PollerConfig::default();
        assert_eq!(poller.interval, Duration::from_millis(10_000));

        let session = SessionConfig::default();
        assert_eq!(session.symbol, "NIFTY");
        assert!(session.polling_enabled);
        assert!(session.highlighting);
        assert!(!session.reversed);
        assert_eq!(session.strike_depth, Some(DEFAULT_STRIKE_DEPTH));
    }

    #[test]
    fn test_config_builders() {
        let poller = PollerConfig::default().with_interval(Duration::from_secs(2));
        assert_eq!(poller.interval, Duration::from_secs(2));

        let session = SessionConfig::new("BANKNIFTY")
            .with_polling_enabled(false)
            .with_highlighting(false)
            .with_reversed(true)
            .with_strike_depth(None);
        assert_eq!(session.symbol, "BANKNIFTY");
        assert!(!session.polling_enabled);
        assert!(!session.highlighting);
        assert!(session.reversed);
        assert_eq!(session.strike_depth, None);
    }
}
