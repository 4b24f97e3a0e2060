//! Boot-loop recovery
//!
//! Counts consecutive boots caused by a power cycle or the reset button. A device
//! that keeps getting power cycled is assumed to be stuck in a bad configuration:
//! first the provisioning portal is forced open again, and a device that was never
//! provisioned gets its configuration filesystem wiped.

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::settings::RuntimeSettings;
use crate::system::reset::{ResetCategory, ResetCause};
use crate::system::storage::{ConfigFile, Preferences};

pub const PREF_WIFI_CONFIGURED: &str = "WifiConfigured";
pub const PREF_RESTART_WITH_CONFIG_PORTAL: &str = "RestartPortal";
pub const PREF_BOOT_COUNTER: &str = "bootcounter";

/// Persisted boot bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootState {
    pub boot_counter: u32,
    pub wifi_configured: bool,
    pub restart_with_config_portal: bool,
}

/// Outcome of the boot check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootAction {
    /// Proceed with normal startup
    Continue,
    /// Provisioned flag cleared, reboot into the provisioning portal
    ForceReconfig,
    /// Configuration storage wiped, reboot
    FactoryReset,
}

impl BootAction {
    pub fn requires_restart(&self) -> bool {
        !matches!(self, BootAction::Continue)
    }
}

/// Escalation thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Counter value above which the provisioning portal is forced
    pub reconfigure_after: u32,
    /// Counter value above which an unprovisioned device is wiped
    pub factory_reset_after: u32,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            reconfigure_after: 3,
            factory_reset_after: 2,
        }
    }
}

/// What the check decided and the values that must be persisted for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: BootAction,
    pub boot_counter: u32,
    pub wifi_configured: bool,
}

impl RecoveryPolicy {
    pub fn decide(&self, category: ResetCategory, boot_counter: u32, wifi_configured: bool) -> Decision {
        if category != ResetCategory::PowerCycle {
            return Decision {
                action: BootAction::Continue,
                boot_counter: 0,
                wifi_configured,
            };
        }

        let counter = boot_counter.saturating_add(1);
        if counter > self.reconfigure_after {
            Decision {
                action: BootAction::ForceReconfig,
                boot_counter: 0,
                wifi_configured: false,
            }
        } else if counter > self.factory_reset_after && !wifi_configured {
            Decision {
                action: BootAction::FactoryReset,
                boot_counter: 0,
                wifi_configured,
            }
        } else {
            Decision {
                action: BootAction::Continue,
                boot_counter: counter,
                wifi_configured,
            }
        }
    }
}

/// Boot state machine over the preferences namespace
pub struct BootRecovery<'a> {
    prefs: &'a dyn Preferences,
    files: &'a dyn ConfigFile,
    namespace: &'a str,
    policy: RecoveryPolicy,
}

impl<'a> BootRecovery<'a> {
    pub fn new(prefs: &'a dyn Preferences, files: &'a dyn ConfigFile, namespace: &'a str) -> Self {
        Self {
            prefs,
            files,
            namespace,
            policy: RecoveryPolicy::default(),
        }
    }

    pub fn from_settings(
        prefs: &'a dyn Preferences,
        files: &'a dyn ConfigFile,
        settings: &'a RuntimeSettings,
    ) -> Self {
        Self::new(prefs, files, &settings.namespace).with_policy(settings.recovery_policy())
    }

    pub fn with_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the check for this boot. Storage problems skip the check.
    ///
    /// Everything the returned action depends on has been committed when this
    /// returns, so a restart may follow immediately.
    pub fn check(&self, cause: ResetCause) -> BootAction {
        match self.try_check(cause) {
            Ok(action) => action,
            Err(e) => {
                warn!("Boot recovery check skipped: {:?}", e);
                BootAction::Continue
            }
        }
    }

    fn try_check(&self, cause: ResetCause) -> Result<BootAction> {
        let mut ns = self
            .prefs
            .open(self.namespace, false)
            .with_context(|| format!("Failed to open preferences '{}'", self.namespace))?;

        debug!("Reset reason: {}", cause);

        let counter = ns.get_u32(PREF_BOOT_COUNTER)?.unwrap_or(0);
        let provisioned = ns.get_bool(PREF_WIFI_CONFIGURED)?.unwrap_or(false);
        let decision = self.policy.decide(cause.category(), counter, provisioned);

        match decision.action {
            BootAction::ForceReconfig => {
                warn!("Configuration forcibly reset after {} unsuccessful boots", counter.saturating_add(1));
                ns.set_bool(PREF_WIFI_CONFIGURED, false)?;
                ns.set_u32(PREF_BOOT_COUNTER, 0)?;
                info!("Resetting the WiFi configuration");
            }
            BootAction::FactoryReset => {
                warn!("Factory reset was forced, device never provisioned");
                self.files
                    .format()
                    .context("Failed to wipe configuration storage")?;
                ns.set_u32(PREF_BOOT_COUNTER, 0)?;
            }
            BootAction::Continue => {
                if cause.category() == ResetCategory::PowerCycle {
                    debug!("Unsuccessful boots: {}", decision.boot_counter);
                }
                ns.set_u32(PREF_BOOT_COUNTER, decision.boot_counter)?;
            }
        }

        Ok(decision.action)
    }

    pub fn read_state(&self) -> Result<BootState> {
        let ns = self.prefs.open(self.namespace, true)?;
        Ok(BootState {
            boot_counter: ns.get_u32(PREF_BOOT_COUNTER)?.unwrap_or(0),
            wifi_configured: ns.get_bool(PREF_WIFI_CONFIGURED)?.unwrap_or(false),
            restart_with_config_portal: ns
                .get_bool(PREF_RESTART_WITH_CONFIG_PORTAL)?
                .unwrap_or(false),
        })
    }

    /// Record that provisioning finished with a working connection
    pub fn mark_provisioned(&self) -> Result<()> {
        let mut ns = self.prefs.open(self.namespace, false)?;
        ns.set_bool(PREF_WIFI_CONFIGURED, true)
    }

    /// Ask the next boot to open the provisioning portal
    pub fn request_config_portal(&self) -> Result<()> {
        let mut ns = self.prefs.open(self.namespace, false)?;
        ns.set_bool(PREF_RESTART_WITH_CONFIG_PORTAL, true)
    }

    /// Read and clear the portal request
    pub fn take_config_portal_request(&self) -> Result<bool> {
        let mut ns = self.prefs.open(self.namespace, false)?;
        let requested = ns.get_bool(PREF_RESTART_WITH_CONFIG_PORTAL)?.unwrap_or(false);
        if requested {
            ns.set_bool(PREF_RESTART_WITH_CONFIG_PORTAL, false)?;
        }
        Ok(requested)
    }
}
