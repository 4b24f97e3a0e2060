// Scenario tests across boots of a simulated device

mod config_flow_tests;

use serde_json::Value;

use crate::config::{ConfigObject, ConfigSink, ConfigSource};
use crate::platform::SimulatedPlatform;
use crate::settings::RuntimeSettings;
use crate::system::storage::{MemoryConfigFile, MemoryPreferences};
use crate::system::ResetCause;
use crate::IotBase;

#[derive(Debug, Default)]
pub(crate) struct TestApp {
    pub ssid: String,
    pub token: String,
    pub loads: u32,
}

impl ConfigSink for TestApp {
    fn load_config(&mut self, json: &ConfigObject) {
        self.ssid = json
            .get("ssid")
            .and_then(Value::as_str)
            .unwrap_or("x")
            .to_string();
        self.token = json
            .get("token")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        self.loads += 1;
    }
}

impl ConfigSource for TestApp {
    fn save_config(&self, json: &mut ConfigObject) {
        json.insert("ssid".to_string(), Value::from(self.ssid.as_str()));
        json.insert("token".to_string(), Value::from(self.token.as_str()));
    }
}

/// Storage that outlives a single boot
#[derive(Default)]
pub(crate) struct Flash {
    pub prefs: MemoryPreferences,
    pub files: MemoryConfigFile,
}

impl Flash {
    pub fn boot(&self, cause: ResetCause) -> IotBase<SimulatedPlatform, TestApp> {
        self.boot_with(cause, RuntimeSettings::default())
    }

    pub fn boot_with(&self, cause: ResetCause, settings: RuntimeSettings) -> IotBase<SimulatedPlatform, TestApp> {
        let platform = SimulatedPlatform::with_storage(self.prefs.clone(), self.files.clone());
        platform.set_reset_cause(cause);
        let mut device = IotBase::new(platform, settings, TestApp::default());
        device.add_parameter("ssid", "SSID", "x", 32).unwrap();
        device.add_parameter("token", "API token", "", 16).unwrap();
        device
    }
}
