use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use reqwest::Url;

use crate::camera::Viewport;
use crate::highlight::HighlightAnimator;

const ENV_PREFIX: &str = "STOWAGE_SCENE_";

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub backend: BackendConfig,
    pub viewer: ViewerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(&env_string)
    }

    /// Creates a configuration from an arbitrary variable source.
    ///
    /// `lookup` receives the full variable name and returns its trimmed,
    /// non-empty value.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            api: ApiConfig::from_lookup(lookup),
            backend: BackendConfig::from_lookup(lookup),
            viewer: ViewerConfig::from_lookup(lookup),
        }
    }
}

fn var(name: &str) -> String {
    format!("{ENV_PREFIX}{name}")
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let host_var = var("API_HOST");
        let host_value = lookup(&host_var).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                tracing::warn!(
                    "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                    host_var,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string())
            }
        };

        let port_var = var("API_PORT");
        let port = match lookup(&port_var) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    tracing::warn!(
                        "⚠️ {} must not be 0. Using {}.",
                        port_var,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    tracing::warn!(
                        "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                        port_var,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Configuration for the storage backend that delivers container snapshots.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    base_url: Url,
    timeout: Duration,
}

impl BackendConfig {
    const DEFAULT_BASE_URL: &'static str = "http://127.0.0.1:5000";
    const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self { base_url, timeout }
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let url_var = var("BACKEND_URL");
        let base_url = lookup(&url_var)
            .and_then(|raw| match parse_base_url(&raw) {
                Ok(url) => Some(url),
                Err(reason) => {
                    tracing::warn!(
                        "⚠️ {} contains invalid value '{}': {}. Using {}.",
                        url_var,
                        raw,
                        reason,
                        Self::DEFAULT_BASE_URL
                    );
                    None
                }
            })
            .unwrap_or_else(Self::default_base_url);

        let timeout_secs = parse_f64_with_warning(
            &var("BACKEND_TIMEOUT_SECS"),
            lookup(&var("BACKEND_TIMEOUT_SECS")),
            Self::DEFAULT_TIMEOUT_SECS,
            |value| value > 0.0 && value <= 300.0,
            "must be between 0 and 300",
            "Warning: Adjusted backend timeout may hide slow container lookups",
        );

        Self {
            base_url,
            timeout: Duration::from_secs_f64(timeout_secs),
        }
    }

    fn default_base_url() -> Url {
        Url::parse(Self::DEFAULT_BASE_URL).expect("Default backend URL must be valid")
    }

    /// Base URL of the backend (without the `/api/...` path).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Request timeout for a single container fetch.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(
            Self::default_base_url(),
            Duration::from_secs_f64(Self::DEFAULT_TIMEOUT_SECS),
        )
    }
}

fn parse_base_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|err| err.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{other}'")),
    }
    if url.cannot_be_a_base() {
        return Err("URL cannot be used as a base".to_string());
    }
    Ok(url)
}

/// Configuration of the visualization session itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewerConfig {
    /// Frames per second of the per-session frame loop.
    pub frame_rate: f64,
    /// Angular speed of the highlight pulse in rad/s.
    pub pulse_rate: f64,
    /// Entry count above which picking uses a BVH instead of a linear scan.
    pub bvh_threshold: usize,
    pub hover_enabled: bool,
    /// Output size used until the host reports a resize.
    pub viewport: Viewport,
}

impl ViewerConfig {
    pub const DEFAULT_FRAME_RATE: f64 = 60.0;
    pub const DEFAULT_BVH_THRESHOLD: usize = 64;
    pub const DEFAULT_VIEWPORT: Viewport = Viewport::new(800.0, 600.0);

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let frame_rate = parse_f64_with_warning(
            &var("FRAME_RATE"),
            lookup(&var("FRAME_RATE")),
            Self::DEFAULT_FRAME_RATE,
            |value| (1.0..=240.0).contains(&value),
            "must be between 1 and 240",
            "Warning: Adjusted frame rate changes hover and pulse responsiveness",
        );

        let pulse_rate = parse_f64_with_warning(
            &var("PULSE_RATE"),
            lookup(&var("PULSE_RATE")),
            HighlightAnimator::DEFAULT_RATE,
            |value| value > 0.0 && value.is_finite(),
            "must be greater than 0",
            "Warning: Adjusted pulse rate changes the highlight animation",
        );

        let bvh_var = var("BVH_THRESHOLD");
        let bvh_threshold = match lookup(&bvh_var) {
            Some(raw) => match raw.parse::<usize>() {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(
                        "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                        bvh_var,
                        raw,
                        err,
                        Self::DEFAULT_BVH_THRESHOLD
                    );
                    Self::DEFAULT_BVH_THRESHOLD
                }
            },
            None => Self::DEFAULT_BVH_THRESHOLD,
        };

        let width = parse_f64_with_warning(
            &var("VIEWPORT_WIDTH"),
            lookup(&var("VIEWPORT_WIDTH")),
            Self::DEFAULT_VIEWPORT.width,
            |value| value >= 1.0 && value.is_finite(),
            "must be at least 1",
            "Warning: Adjusted initial viewport width",
        );
        let height = parse_f64_with_warning(
            &var("VIEWPORT_HEIGHT"),
            lookup(&var("VIEWPORT_HEIGHT")),
            Self::DEFAULT_VIEWPORT.height,
            |value| value >= 1.0 && value.is_finite(),
            "must be at least 1",
            "Warning: Adjusted initial viewport height",
        );

        let hover_var = var("HOVER_ENABLED");
        let hover_enabled = lookup(&hover_var)
            .and_then(|raw| parse_bool(&raw, &hover_var))
            .unwrap_or(true);

        Self {
            frame_rate,
            pulse_rate,
            bvh_threshold,
            hover_enabled,
            viewport: Viewport::new(width, height),
        }
    }

    /// Interval between two frame callbacks.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate)
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            frame_rate: Self::DEFAULT_FRAME_RATE,
            pulse_rate: HighlightAnimator::DEFAULT_RATE,
            bvh_threshold: Self::DEFAULT_BVH_THRESHOLD,
            hover_enabled: true,
            viewport: Self::DEFAULT_VIEWPORT,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!(
                "⚠️ Access to {} failed: {}. Using default value.",
                name,
                err
            );
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            tracing::warn!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name,
                other
            );
            None
        }
    }
}

fn parse_f64_with_warning(
    var_name: &str,
    raw: Option<String>,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match raw {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => {
                if !validator(value) {
                    tracing::warn!(
                        "⚠️ {} contains invalid value '{}': {}. Using {}.",
                        var_name,
                        raw,
                        invalid_hint,
                        default
                    );
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        tracing::info!("⚠️ {} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                tracing::warn!(
                    "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name,
                    raw,
                    err,
                    default
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), v.to_string()))
            .collect();
        AppConfig::from_lookup(&move |name: &str| vars.get(name).cloned())
    }

    #[test]
    fn test_parse_bool_true_values() {
        assert_eq!(parse_bool("1", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("true", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("y", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("on", "TEST_VAR"), Some(true));

        // Test case insensitivity
        assert_eq!(parse_bool("TRUE", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("Yes", "TEST_VAR"), Some(true));

        // Test with whitespace
        assert_eq!(parse_bool(" true ", "TEST_VAR"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_values() {
        assert_eq!(parse_bool("0", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("false", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("no", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("n", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("OFF", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("  0  ", "TEST_VAR"), Some(false));
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn defaults_without_variables() {
        let config = config_from(&[]);
        assert_eq!(config.api.port(), 8080);
        assert!(config.api.uses_default_host());
        assert!(config.api.binds_to_all_interfaces());
        assert_eq!(config.backend.base_url().as_str(), "http://127.0.0.1:5000/");
        assert_eq!(config.backend.timeout(), Duration::from_secs(10));
        assert_eq!(config.viewer, ViewerConfig::default());
    }

    #[test]
    fn valid_overrides_are_applied() {
        let config = config_from(&[
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9090"),
            ("BACKEND_URL", "https://stowage.example:8443/base/"),
            ("BACKEND_TIMEOUT_SECS", "2.5"),
            ("FRAME_RATE", "30"),
            ("PULSE_RATE", "2"),
            ("BVH_THRESHOLD", "0"),
            ("VIEWPORT_WIDTH", "1920"),
            ("VIEWPORT_HEIGHT", "1080"),
            ("HOVER_ENABLED", "off"),
        ]);

        assert_eq!(config.api.socket_addr().to_string(), "127.0.0.1:9090");
        assert_eq!(config.backend.base_url().host_str(), Some("stowage.example"));
        assert_eq!(config.backend.timeout(), Duration::from_millis(2500));
        assert_eq!(config.viewer.frame_rate, 30.0);
        assert_eq!(config.viewer.pulse_rate, 2.0);
        assert_eq!(config.viewer.bvh_threshold, 0);
        assert_eq!(config.viewer.viewport, Viewport::new(1920.0, 1080.0));
        assert!(!config.viewer.hover_enabled);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("API_HOST", "not-an-ip"),
            ("API_PORT", "0"),
            ("BACKEND_URL", "ftp://example.com"),
            ("BACKEND_TIMEOUT_SECS", "-1"),
            ("FRAME_RATE", "fast"),
            ("PULSE_RATE", "0"),
            ("BVH_THRESHOLD", "-3"),
            ("VIEWPORT_WIDTH", "0"),
            ("HOVER_ENABLED", "maybe"),
        ]);

        assert!(config.api.uses_default_host());
        assert_eq!(config.api.port(), 8080);
        assert_eq!(config.backend.base_url().as_str(), "http://127.0.0.1:5000/");
        assert_eq!(config.backend.timeout(), Duration::from_secs(10));
        assert_eq!(config.viewer, ViewerConfig::default());
    }

    #[test]
    fn frame_interval_matches_rate() {
        let viewer = ViewerConfig {
            frame_rate: 50.0,
            ..ViewerConfig::default()
        };
        assert_eq!(viewer.frame_interval(), Duration::from_millis(20));
    }
}
