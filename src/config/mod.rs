//! Application configuration persistence
//!
//! The configuration is one JSON object stored as a single file. Its shape is
//! owned by the application: [`ConfigSink`] reads every field it needs (falling
//! back to defaults), [`ConfigSource`] writes every field that should survive a
//! reboot. Values typed into the provisioning portal go through the same sink as
//! values loaded from flash.

pub mod parameters;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde_json::Value;

use crate::provisioning::ProvisioningOutcome;
use crate::system::storage::ConfigFile;

pub use parameters::{ConfigParameter, ParameterBinding, ParameterSet};

pub type ConfigObject = serde_json::Map<String, Value>;

/// Applies configuration values to the application
pub trait ConfigSink {
    fn load_config(&mut self, json: &ConfigObject);
}

/// Serializes the application's current configuration
pub trait ConfigSource {
    fn save_config(&self, json: &mut ConfigObject);
}

impl<T: ConfigSink + ?Sized> ConfigSink for &mut T {
    fn load_config(&mut self, json: &ConfigObject) {
        (**self).load_config(json)
    }
}

impl<T: ConfigSource + ?Sized> ConfigSource for &mut T {
    fn save_config(&self, json: &mut ConfigObject) {
        (**self).save_config(json)
    }
}

pub struct ConfigManager<'a, A> {
    file: &'a dyn ConfigFile,
    app: A,
}

impl<'a, A: ConfigSink + ConfigSource> ConfigManager<'a, A> {
    pub fn new(file: &'a dyn ConfigFile, app: A) -> Self {
        Self { file, app }
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    pub fn into_app(self) -> A {
        self.app
    }

    /// Feed the stored configuration to the application
    ///
    /// Returns `false` when nothing was applied; the application then keeps its
    /// compiled-in defaults.
    pub fn load(&mut self) -> bool {
        let data = match self.file.read() {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!("No configuration record stored");
                return false;
            }
            Err(e) => {
                warn!("Configuration storage unavailable: {:?}", e);
                return false;
            }
        };

        match serde_json::from_slice::<Value>(&data) {
            Ok(Value::Object(json)) => {
                debug!("parsed json: {}", Value::Object(json.clone()));
                self.app.load_config(&json);
                info!("Configuration loaded ({} fields)", json.len());
                true
            }
            Ok(other) => {
                warn!("failed to load json config: expected an object, got {}", other);
                false
            }
            Err(e) => {
                warn!("failed to load json config: {}", e);
                false
            }
        }
    }

    /// Start the portal fields from what the application currently holds, so
    /// fields the user leaves alone carry the loaded values forward
    pub fn seed_parameters(&self, params: &mut ParameterSet) {
        let mut json = ConfigObject::new();
        self.app.save_config(&mut json);
        params.seed(&json);
    }

    /// Apply the values entered during provisioning
    pub fn apply_provisioning(&mut self, params: &mut ParameterSet) {
        let json = params.harvest();
        debug!("creating json from GUI: {}", Value::Object(json.clone()));
        self.app.load_config(&json);
    }

    /// Persist the configuration if the portal reported submitted values
    ///
    /// Returns whether a record was written.
    pub fn save(&mut self, outcome: ProvisioningOutcome) -> Result<bool> {
        if !outcome.config_submitted() {
            debug!("Nothing submitted, configuration not saved");
            return Ok(false);
        }
        self.write()?;
        Ok(true)
    }

    /// Serialize the application state and overwrite the stored record
    pub fn write(&self) -> Result<()> {
        debug!("saving config");
        let mut json = ConfigObject::new();
        self.app.save_config(&mut json);

        let data = serde_json::to_vec(&Value::Object(json))?;
        self.file
            .write(&data)
            .context("failed to open config file for writing")?;
        info!("Configuration saved ({} bytes)", data.len());
        Ok(())
    }
}
