//! warpd.toml configuration.
//!
//! ```toml
//! [scheduler]
//! data_dir = "/var/lib/warpgrid"
//! framework_name = "warpgrid-scheduler"
//!
//! [leading]
//! registration_delay_limit = "1m"
//! leading_time_limit = "1d"
//!
//! [http]
//! port = 8443
//! ```
//!
//! Every section and key is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use warpgrid_lifecycle::LeadingOptions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub scheduler: SchedulerConfig,
    pub leading: LeadingConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Directory holding the scheduler store.
    pub data_dir: PathBuf,
    /// Name registered with the resource manager.
    pub framework_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/warpgrid"),
            framework_name: "warpgrid-scheduler".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadingConfig {
    pub registration_delay_limit: String,
    pub leading_time_limit: String,
}

impl Default for LeadingConfig {
    fn default() -> Self {
        Self {
            registration_delay_limit: "1m".to_string(),
            leading_time_limit: "1d".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { port: 8443 }
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: DaemonConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Validated lifecycle time limits.
    pub fn leading_options(&self) -> anyhow::Result<LeadingOptions> {
        let options = LeadingOptions::parse(
            &self.leading.registration_delay_limit,
            &self.leading.leading_time_limit,
        )?;
        Ok(options)
    }

    pub fn store_path(&self) -> PathBuf {
        self.scheduler.data_dir.join("scheduler.redb")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = DaemonConfig::from_toml("").unwrap();
        assert_eq!(config.http.port, 8443);
        assert_eq!(config.scheduler.framework_name, "warpgrid-scheduler");
        assert_eq!(config.leading_options().unwrap(), LeadingOptions::default());
    }

    #[test]
    fn parse_full_config() {
        let config = DaemonConfig::from_toml(
            r#"
            [scheduler]
            data_dir = "/tmp/warpgrid"
            framework_name = "test-framework"

            [leading]
            registration_delay_limit = "30s"
            leading_time_limit = "2h"

            [http]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.store_path(), PathBuf::from("/tmp/warpgrid/scheduler.redb"));
        assert_eq!(config.scheduler.framework_name, "test-framework");
        assert_eq!(config.http.port, 9000);

        let options = config.leading_options().unwrap();
        assert_eq!(options.registration_delay_limit, Duration::from_secs(30));
        assert_eq!(options.leading_time_limit, Duration::from_secs(2 * 60 * 60));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = DaemonConfig::from_toml("[leading]\nleading_time_limit = \"5m\"\n").unwrap();
        let options = config.leading_options().unwrap();
        assert_eq!(options.registration_delay_limit, Duration::from_secs(60));
        assert_eq!(options.leading_time_limit, Duration::from_secs(300));
    }

    #[test]
    fn negative_limit_is_rejected() {
        let config = DaemonConfig::from_toml("[leading]\nregistration_delay_limit = \"-5s\"\n").unwrap();
        assert!(config.leading_options().is_err());
    }

    #[test]
    fn unknown_port_type_is_an_error() {
        assert!(DaemonConfig::from_toml("[http]\nport = \"eighty\"\n").is_err());
    }
}
