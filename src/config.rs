//! Configuration module for sitewatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "sitewatch.db")
    pub db_path: String,
    /// Namespace tag stamped on every metric sample.
    pub namespace: String,
    /// Seconds between crawler cycles.
    pub check_interval_secs: u64,
    /// Seconds between alert evaluation passes.
    pub alert_interval_secs: u64,
    /// URLs used to seed an empty registry at startup.
    pub seed_urls: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "sitewatch.db".to_string(),
            namespace: "url-monitor".to_string(),
            check_interval_secs: 300,
            alert_interval_secs: 60,
            seed_urls: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SITEWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `SITEWATCH_DB_PATH`: Database file path (default: "sitewatch.db")
    /// - `SITEWATCH_NAMESPACE`: Metric namespace (default: "url-monitor")
    /// - `SITEWATCH_CHECK_INTERVAL_SECS`: Crawler cadence (default: 300)
    /// - `SITEWATCH_ALERT_INTERVAL_SECS`: Alert evaluation cadence (default: 60)
    /// - `SITEWATCH_SEED_URLS`: Comma-separated URLs seeded into an empty registry
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("SITEWATCH_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(db_path) = env::var("SITEWATCH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(namespace) = env::var("SITEWATCH_NAMESPACE") {
            cfg.namespace = namespace;
        }

        if let Ok(s) = env::var("SITEWATCH_CHECK_INTERVAL_SECS") {
            if let Ok(secs) = s.parse() {
                cfg.check_interval_secs = secs;
            }
        }

        if let Ok(s) = env::var("SITEWATCH_ALERT_INTERVAL_SECS") {
            if let Ok(secs) = s.parse() {
                cfg.alert_interval_secs = secs;
            }
        }

        if let Ok(s) = env::var("SITEWATCH_SEED_URLS") {
            cfg.seed_urls = s
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "sitewatch.db");
        assert_eq!(cfg.namespace, "url-monitor");
        assert_eq!(cfg.check_interval_secs, 300);
        assert_eq!(cfg.alert_interval_secs, 60);
        assert!(cfg.seed_urls.is_empty());
    }
}
