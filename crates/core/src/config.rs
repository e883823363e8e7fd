use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine configuration. Serializable so a host application can load it from
/// TOML/JSON/env without this crate owning a parser — loading is the host's
/// job.
///
/// The permanent filter and custom stream adapter are *not* fields here:
/// they're trait objects, supplied directly to `Engine::builder()` in
/// `ssevent-engine` rather than carried through a serializable config value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Free-form version tag, surfaced in logs and diagnostics only.
    pub version: String,
    /// Enables verbose tracing output.
    pub debug: bool,
    /// Optional file to mirror debug logs to (interpreted by the host's
    /// logging setup, not by this crate).
    pub log_file_name: Option<String>,
    /// Free-form tag included in debug log lines.
    pub debug_tag: Option<String>,
    /// How long the main cache can go unchanged before the connection is
    /// considered idle (not yet exceptional).
    pub idle_timeout_secs: f64,
    /// How long the main cache can go unchanged before the connection is
    /// considered exceptional.
    pub exception_timeout_secs: f64,
    /// Delay applied between paced pops, for element types in
    /// `ele_types_in_interval`.
    pub sse_buffer_extract_interval_ms: u64,
    /// Element types admitted to interval pacing. Empty means "never pace".
    pub ele_types_in_interval: HashSet<String>,
    /// Request-path substrings for which idle detection is skipped entirely.
    pub un_check_connect_state_paths: Vec<String>,
}

impl EngineConfig {
    /// How long the cache can go unchanged before the connection is idle.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.idle_timeout_secs.max(0.0))
    }

    /// How long the cache can go unchanged before the connection is exceptional.
    #[must_use]
    pub fn exception_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.exception_timeout_secs.max(0.0))
    }

    /// The pacing delay as a `Duration`.
    #[must_use]
    pub fn sse_buffer_extract_interval(&self) -> Duration {
        Duration::from_millis(self.sse_buffer_extract_interval_ms)
    }

    /// Whether idle-state detection should be skipped for a request at `path`.
    #[must_use]
    pub fn skips_connect_state_check(&self, path: &str) -> bool {
        self.un_check_connect_state_paths
            .iter()
            .any(|substr| path.contains(substr.as_str()))
    }

    /// Start building a config from defaults.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            debug: false,
            log_file_name: None,
            debug_tag: None,
            idle_timeout_secs: 30.0,
            exception_timeout_secs: 60.0,
            sse_buffer_extract_interval_ms: 50,
            ele_types_in_interval: HashSet::new(),
            un_check_connect_state_paths: Vec::new(),
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfigInner,
}

#[derive(Debug)]
struct EngineConfigInner(EngineConfig);

impl Default for EngineConfigInner {
    fn default() -> Self {
        Self(EngineConfig::default())
    }
}

impl EngineConfigBuilder {
    /// Set the version tag.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.0.version = version.into();
        self
    }

    /// Enable debug tracing.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.0.debug = debug;
        self
    }

    /// Set the idle timeout, in (possibly fractional) seconds.
    #[must_use]
    pub fn idle_timeout_secs(mut self, secs: f64) -> Self {
        self.config.0.idle_timeout_secs = secs;
        self
    }

    /// Set the exception timeout, in seconds.
    #[must_use]
    pub fn exception_timeout_secs(mut self, secs: f64) -> Self {
        self.config.0.exception_timeout_secs = secs;
        self
    }

    /// Set the pacing interval, in milliseconds.
    #[must_use]
    pub fn sse_buffer_extract_interval_ms(mut self, ms: u64) -> Self {
        self.config.0.sse_buffer_extract_interval_ms = ms;
        self
    }

    /// Add an element type admitted to interval pacing.
    #[must_use]
    pub fn with_ele_type_in_interval(mut self, element_type: impl Into<String>) -> Self {
        self.config.0.ele_types_in_interval.insert(element_type.into());
        self
    }

    /// Add a request-path substring that skips idle detection.
    #[must_use]
    pub fn with_un_checked_path(mut self, substr: impl Into<String>) -> Self {
        self.config.0.un_check_connect_state_paths.push(substr.into());
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        self.config.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.idle_timeout(), Duration::from_secs_f64(30.0));
        assert_eq!(config.exception_timeout(), Duration::from_secs(60));
        assert_eq!(config.sse_buffer_extract_interval(), Duration::from_millis(50));
        assert!(config.ele_types_in_interval.is_empty());
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = EngineConfig::builder()
            .debug(true)
            .idle_timeout_secs(5.0)
            .sse_buffer_extract_interval_ms(10)
            .with_ele_type_in_interval("text")
            .with_un_checked_path("/v1/health")
            .build();

        assert!(config.debug);
        assert_eq!(config.idle_timeout_secs, 5.0);
        assert_eq!(config.sse_buffer_extract_interval_ms, 10);
        assert!(config.ele_types_in_interval.contains("text"));
        assert!(config.skips_connect_state_check("/v1/health/check"));
        assert!(!config.skips_connect_state_check("/v1/stream"));
    }

    #[test]
    fn serde_roundtrip() {
        let config = EngineConfig::builder().with_ele_type_in_interval("text").build();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ele_types_in_interval, config.ele_types_in_interval);
    }
}
