//! Runtime settings of the helper itself (not the application configuration)
use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::boot::RecoveryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Preferences namespace holding the boot bookkeeping
    pub namespace: String,
    /// Path of the configuration record on the device filesystem
    pub config_path: String,
    pub reconfigure_after: u32,
    pub factory_reset_after: u32,
    /// Run the boot-loop check at startup
    pub boot_recovery: bool,
    pub log_level: String,
    /// NTP server used once connected, empty to skip time sync
    pub ntp_server: String,
    /// Standard time zone offset east of UTC; EU summer time adds an hour
    pub utc_offset_minutes: i32,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        let policy = RecoveryPolicy::default();
        Self {
            namespace: "iotbase".to_string(),
            config_path: "/config.json".to_string(),
            reconfigure_after: policy.reconfigure_after,
            factory_reset_after: policy.factory_reset_after,
            boot_recovery: true,
            log_level: "debug".to_string(),
            ntp_server: "europe.pool.ntp.org".to_string(),
            utc_offset_minutes: 60,
        }
    }
}

impl RuntimeSettings {
    /// Parse settings; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json).context("Invalid settings JSON")?;
        if settings.namespace.is_empty() || settings.namespace.len() > 15 {
            anyhow::bail!(
                "Namespace '{}' must be 1 to 15 characters long",
                settings.namespace
            );
        }
        Ok(settings)
    }

    pub fn recovery_policy(&self) -> RecoveryPolicy {
        RecoveryPolicy {
            reconfigure_after: self.reconfigure_after,
            factory_reset_after: self.factory_reset_after,
        }
    }

    pub fn level_filter(&self) -> LevelFilter {
        crate::logging::parse_level(&self.log_level).unwrap_or_else(|| {
            log::warn!("Unknown log level '{}', using debug", self.log_level);
            LevelFilter::Debug
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RuntimeSettings::default();
        assert_eq!(settings.namespace, "iotbase");
        assert_eq!(settings.config_path, "/config.json");
        assert_eq!(settings.recovery_policy(), RecoveryPolicy::default());
        assert!(settings.boot_recovery);
        assert_eq!(settings.ntp_server, "europe.pool.ntp.org");
        assert_eq!(settings.utc_offset_minutes, 60);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = RuntimeSettings::from_json(r#"{"reconfigure_after": 5, "log_level": "warn"}"#).unwrap();
        assert_eq!(settings.reconfigure_after, 5);
        assert_eq!(settings.factory_reset_after, 2);
        assert_eq!(settings.level_filter(), LevelFilter::Warn);
        assert_eq!(settings.namespace, "iotbase");
    }

    #[test]
    fn test_rejects_long_namespace() {
        assert!(RuntimeSettings::from_json(r#"{"namespace": "a-namespace-too-long"}"#).is_err());
        assert!(RuntimeSettings::from_json("nope").is_err());
    }

    #[test]
    fn test_unknown_level_falls_back() {
        let settings = RuntimeSettings {
            log_level: "loud".into(),
            ..Default::default()
        };
        assert_eq!(settings.level_filter(), LevelFilter::Debug);
    }
}
