//! Setup-vs-transparent mode decision.
//!
//! With setup mode on and no gateway config file yet, every plain HTTP
//! request is captured by the setup UI, whatever its path. This first-run
//! capture is intended; health checks hitting the proxy before the gateway
//! is configured get the setup page too.

use std::path::{Path, PathBuf};

use crate::config::{SetupConfig, SETUP_PREFIX};
use crate::routing::matcher::{ExactPathMatcher, Matcher, PathPrefixMatcher};

/// Where a plain HTTP request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Bare `/__setup`: redirect to `/__setup/`.
    RedirectToSetupRoot,
    /// Served locally by the setup router.
    Setup,
    /// Forwarded to the gateway.
    Proxy,
}

/// Where an upgrade request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeDecision {
    /// Close the connection; setup mode has no upgrade support.
    Reject,
    /// Hand to the upgrade proxy.
    Proxy,
}

#[derive(Debug, Clone)]
pub struct ModeSelector {
    enabled: bool,
    config_path: PathBuf,
    namespace: PathPrefixMatcher,
    namespace_dir: PathPrefixMatcher,
    namespace_root: ExactPathMatcher,
}

impl ModeSelector {
    pub fn new(enabled: bool, config_path: impl Into<PathBuf>) -> Self {
        Self {
            enabled,
            config_path: config_path.into(),
            namespace: PathPrefixMatcher::new(SETUP_PREFIX),
            namespace_dir: PathPrefixMatcher::new(format!("{SETUP_PREFIX}/")),
            namespace_root: ExactPathMatcher::new(SETUP_PREFIX),
        }
    }

    pub fn from_config(config: &SetupConfig) -> Self {
        Self::new(config.enabled, &config.config_path)
    }

    pub fn setup_enabled(&self) -> bool {
        self.enabled
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Checked on every call; the file appears once the wizard finishes.
    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }

    /// True when the request must be served by the setup UI/API.
    pub fn is_setup_request(&self, path: &str) -> bool {
        if !self.enabled {
            return false;
        }
        self.namespace.matches(path) || !self.config_exists()
    }

    pub fn decide(&self, path: &str) -> Decision {
        if self.enabled && self.namespace_root.matches(path) {
            Decision::RedirectToSetupRoot
        } else if self.is_setup_request(path) {
            Decision::Setup
        } else {
            Decision::Proxy
        }
    }

    /// First-run capture does not apply to upgrades; only the namespace is
    /// closed to them.
    pub fn decide_upgrade(&self, path: &str) -> UpgradeDecision {
        if self.enabled && self.namespace_dir.matches(path) {
            UpgradeDecision::Reject
        } else {
            UpgradeDecision::Proxy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const PATHS: [&str; 6] = ["/", "/health", "/__setup", "/__setup/", "/__setup/api/env", "/ws"];

    #[test]
    fn test_disabled_always_proxies() {
        let dir = tempfile::tempdir().unwrap();
        // No config file: capture would apply if setup mode were on.
        let selector = ModeSelector::new(false, dir.path().join("missing.json"));
        for path in PATHS {
            assert!(!selector.is_setup_request(path), "{path}");
            assert_eq!(selector.decide(path), Decision::Proxy, "{path}");
            assert_eq!(selector.decide_upgrade(path), UpgradeDecision::Proxy, "{path}");
        }
    }

    #[test]
    fn test_first_run_captures_everything() {
        let dir = tempfile::tempdir().unwrap();
        let selector = ModeSelector::new(true, dir.path().join("clawdbot.json"));
        for path in PATHS {
            assert!(selector.is_setup_request(path), "{path}");
        }
        assert_eq!(selector.decide("/anything"), Decision::Setup);
        assert_eq!(selector.decide("/__setup"), Decision::RedirectToSetupRoot);
    }

    #[test]
    fn test_configured_only_namespace_is_setup() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("clawdbot.json");
        fs::write(&config, "{}").unwrap();
        let selector = ModeSelector::new(true, &config);

        assert!(selector.config_exists());
        assert_eq!(selector.decide("/"), Decision::Proxy);
        assert_eq!(selector.decide("/api/chat"), Decision::Proxy);
        assert_eq!(selector.decide("/__setup/"), Decision::Setup);
        assert_eq!(selector.decide("/__setup/api/env"), Decision::Setup);
        assert_eq!(selector.decide("/__setup"), Decision::RedirectToSetupRoot);
    }

    #[test]
    fn test_config_file_appearing_ends_capture() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("clawdbot.json");
        let selector = ModeSelector::new(true, &config);
        assert_eq!(selector.decide("/"), Decision::Setup);
        fs::write(&config, "{}").unwrap();
        assert_eq!(selector.decide("/"), Decision::Proxy);
    }

    #[test]
    fn test_upgrades_in_namespace_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let selector = ModeSelector::new(true, dir.path().join("missing.json"));
        assert_eq!(selector.decide_upgrade("/__setup/ws"), UpgradeDecision::Reject);
        assert_eq!(selector.decide_upgrade("/__setup/"), UpgradeDecision::Reject);
        // Not captured even though the config file is missing.
        assert_eq!(selector.decide_upgrade("/"), UpgradeDecision::Proxy);
        assert_eq!(selector.decide_upgrade("/__setup"), UpgradeDecision::Proxy);
    }
}
