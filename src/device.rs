//! Device lifecycle: boot recovery, configuration, provisioning and the
//! periodic link sampler wired together over a [`Platform`].

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::boot::{BootAction, BootRecovery, BootState};
use crate::clock;
use crate::config::{ConfigManager, ConfigSink, ConfigSource, ParameterSet};
use crate::json_path;
use crate::network::LinkQualitySampler;
use crate::platform::Platform;
use crate::provisioning::{PortalMode, Provisioner};
use crate::settings::RuntimeSettings;

/// How `begin` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// Boot recovery escalated and the platform was told to restart
    Restarting(BootAction),
    Ready {
        connected: bool,
        /// A stored configuration record was applied
        config_loaded: bool,
        /// Submitted portal values were written back
        config_saved: bool,
    },
}

pub struct IotBase<P, A> {
    platform: P,
    settings: RuntimeSettings,
    app: A,
    params: ParameterSet,
    sampler: LinkQualitySampler,
}

impl<P: Platform, A: ConfigSink + ConfigSource> IotBase<P, A> {
    pub fn new(platform: P, settings: RuntimeSettings, app: A) -> Self {
        Self {
            platform,
            settings,
            app,
            params: ParameterSet::new(),
            sampler: LinkQualitySampler::new(),
        }
    }

    /// Register a portal parameter; call before [`IotBase::begin`]
    pub fn add_parameter(&mut self, id: &str, label: &str, default_value: &str, max_length: usize) -> Result<()> {
        self.params.add_parameter(id, label, default_value, max_length)
    }

    /// Bring the device up
    ///
    /// Order: boot recovery, stored configuration, portal fields seeded from
    /// the application when a record was loaded, provisioning, harvest of the
    /// portal values, save, and time sync once connected. Storage and time
    /// sync failures are logged and skipped. Only a failing provisioner is
    /// returned as an error.
    pub fn begin(&mut self, provisioner: &mut dyn Provisioner) -> Result<BeginOutcome> {
        info!("iot-base {}", crate::version::full_version());

        let recovery = BootRecovery::from_settings(
            self.platform.preferences(),
            self.platform.config_file(),
            &self.settings,
        );

        if self.settings.boot_recovery {
            let action = recovery.check(self.platform.reset_cause());
            if action.requires_restart() {
                info!("Boot recovery: {:?}, restarting", action);
                self.platform.restart();
                return Ok(BeginOutcome::Restarting(action));
            }
        } else {
            debug!("Boot recovery disabled");
        }

        let mut manager = ConfigManager::new(self.platform.config_file(), &mut self.app);
        let config_loaded = manager.load();
        if config_loaded {
            // Untouched portal fields then carry the stored values through
            manager.seed_parameters(&mut self.params);
        }

        let mode = match recovery.take_config_portal_request() {
            Ok(true) => {
                info!("Restart into config portal was requested");
                PortalMode::ConfigPortal
            }
            Ok(false) => PortalMode::AutoConnect,
            Err(e) => {
                warn!("Could not read portal request: {:?}", e);
                PortalMode::AutoConnect
            }
        };

        let outcome = provisioner
            .provision(mode, &mut self.params)
            .context("Provisioning failed")?;
        let connected = outcome.connected();

        manager.apply_provisioning(&mut self.params);
        let config_saved = manager.save(outcome).unwrap_or_else(|e| {
            warn!("Failed to save configuration: {:?}", e);
            false
        });

        if connected {
            if let Err(e) = recovery.mark_provisioned() {
                warn!("Failed to record provisioning: {:?}", e);
            }
            if !self.settings.ntp_server.is_empty() {
                if let Err(e) = self.platform.start_time_sync(&self.settings.ntp_server) {
                    warn!("Failed to start time sync: {:?}", e);
                }
            }
        } else {
            warn!("No network connection after provisioning");
        }

        Ok(BeginOutcome::Ready {
            connected,
            config_loaded,
            config_saved,
        })
    }

    /// Call from the main loop; samples the link quality
    pub fn tick(&mut self) -> Option<u8> {
        self.sampler.tick(self.platform.link())
    }

    /// Average link quality over the last 10 samples, 0..=100
    pub fn wifi_quality(&self) -> u8 {
        self.sampler.average()
    }

    pub fn is_wifi_connected(&self) -> bool {
        self.platform.link().is_connected()
    }

    /// Reboot and open the provisioning portal on the next boot
    pub fn restart_with_config_portal(&self) -> Result<()> {
        let recovery = BootRecovery::from_settings(
            self.platform.preferences(),
            self.platform.config_file(),
            &self.settings,
        );
        recovery
            .request_config_portal()
            .context("Failed to store portal request")?;
        self.platform.restart();
        Ok(())
    }

    /// Whether EU summer time is in effect, `None` until the clock is set
    pub fn is_summer_time(&self) -> Option<bool> {
        self.platform.utc_now().map(clock::is_summer_time)
    }

    /// Local Unix time for the configured zone, `None` until the clock is set
    pub fn local_time(&self) -> Option<i64> {
        let utc = self.platform.utc_now()?;
        Some(clock::local_time(utc, self.settings.utc_offset_minutes))
    }

    /// Write the current application state to the configuration record
    pub fn save_config(&mut self) -> Result<()> {
        ConfigManager::new(self.platform.config_file(), &mut self.app).write()
    }

    /// Extract a number from a JSON document, [`json_path::NOT_FOUND`] on failure
    pub fn parse_json(&self, json: &str, path: &str) -> f32 {
        json_path::resolve(json, path)
    }

    pub fn boot_state(&self) -> Result<BootState> {
        BootRecovery::from_settings(
            self.platform.preferences(),
            self.platform.config_file(),
            &self.settings,
        )
        .read_state()
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    pub fn into_parts(self) -> (P, A) {
        (self.platform, self.app)
    }
}
