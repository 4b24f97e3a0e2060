use anyhow::Result;
use serde_json::Value;

use iot_base::config::{ConfigObject, ConfigSink, ConfigSource};
use iot_base::platform::Platform;
use iot_base::IotBase;

/// Settings of the demo application, edited through the portal
#[derive(Debug)]
struct AppConfig {
    server: String,
    token: String,
    interval_s: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: "mqtt.local".to_string(),
            token: String::new(),
            interval_s: 60,
        }
    }
}

impl ConfigSink for AppConfig {
    fn load_config(&mut self, json: &ConfigObject) {
        let defaults = AppConfig::default();
        self.server = json
            .get("server")
            .and_then(Value::as_str)
            .unwrap_or(&defaults.server)
            .to_string();
        self.token = json
            .get("token")
            .and_then(Value::as_str)
            .unwrap_or(&defaults.token)
            .to_string();
        // Portal values arrive as strings, stored ones as numbers
        self.interval_s = json
            .get("interval")
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.trim().parse().ok()))
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(defaults.interval_s);
    }
}

impl ConfigSource for AppConfig {
    fn save_config(&self, json: &mut ConfigObject) {
        json.insert("server".to_string(), Value::from(self.server.as_str()));
        json.insert("token".to_string(), Value::from(self.token.as_str()));
        json.insert("interval".to_string(), Value::from(self.interval_s));
    }
}

fn register_parameters<P: Platform>(device: &mut IotBase<P, AppConfig>) -> Result<()> {
    device.add_parameter("server", "MQTT server", "mqtt.local", 40)?;
    device.add_parameter("token", "API token", "", 32)?;
    device.add_parameter("interval", "Report interval (s)", "60", 6)?;
    Ok(())
}

#[cfg(target_os = "espidf")]
fn main() -> Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> Result<()> {
    host::run()
}

#[cfg(target_os = "espidf")]
mod firmware {
    use anyhow::{anyhow, Result};
    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
    use esp_idf_sys as _; // Binstart
    use log::info;

    use super::{register_parameters, AppConfig};
    use iot_base::network::wifi::StationProvisioner;
    use iot_base::platform::EspPlatform;
    use iot_base::settings::RuntimeSettings;
    use iot_base::{logging, BeginOutcome, IotBase};

    // Generate ESP-IDF app descriptor
    #[allow(unexpected_cfgs)]
    mod app_desc {
        esp_idf_sys::esp_app_desc!();
    }

    const TICK_MS: u32 = 1000;

    pub fn run() -> Result<()> {
        esp_idf_svc::sys::link_patches();

        let settings = RuntimeSettings::default();
        logging::init_logger(settings.level_filter())
            .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;
        info!("Boot reason: {}", iot_base::system::reset::get_reset_reason());

        let peripherals = Peripherals::take()?;
        let sys_loop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;

        let platform = EspPlatform::new(nvs.clone(), &settings)?;
        let mut provisioner = StationProvisioner::new(peripherals.modem, sys_loop, nvs)?;

        let mut device = IotBase::new(platform, settings, AppConfig::default());
        register_parameters(&mut device)?;

        if let BeginOutcome::Restarting(action) = device.begin(&mut provisioner)? {
            return Err(anyhow!("Restart after {:?} did not happen", action));
        }
        info!("Running with {:?}", device.app());

        let mut ticks: u32 = 0;
        loop {
            device.tick();
            ticks = ticks.wrapping_add(1);
            if ticks % 10 == 0 {
                info!(
                    "WiFi quality: {}% (connected: {}, local time: {:?}, summer time: {:?})",
                    device.wifi_quality(),
                    device.is_wifi_connected(),
                    device.local_time(),
                    device.is_summer_time()
                );
            }
            FreeRtos::delay_ms(TICK_MS);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use anyhow::{anyhow, bail, Context, Result};
    use clap::{Parser, Subcommand};
    use log::info;
    use std::fs;
    use std::path::PathBuf;

    use super::{register_parameters, AppConfig};
    use iot_base::json_path::{self, NOT_FOUND};
    use iot_base::network::SimulatedLink;
    use iot_base::platform::HostPlatform;
    use iot_base::provisioning::ScriptedProvisioner;
    use iot_base::settings::RuntimeSettings;
    use iot_base::system::ResetCause;
    use iot_base::{logging, BeginOutcome, IotBase};

    #[derive(Parser)]
    #[command(name = "iot-base")]
    #[command(about = "Simulate IoT base boots on the development machine", long_about = None)]
    struct Cli {
        #[command(subcommand)]
        command: Option<Commands>,

        /// Directory holding the simulated preferences and filesystem
        #[arg(short, long, default_value = ".iot-base")]
        state: PathBuf,

        /// Runtime settings JSON file
        #[arg(long)]
        settings: Option<PathBuf>,

        /// ROM reset reason of this boot (1 power on, 12 software, 16 reset button)
        #[arg(short, long, default_value_t = 1)]
        reset_code: u32,

        /// Signal strength of the simulated access point
        #[arg(long, default_value_t = -60, allow_hyphen_values = true)]
        rssi: i32,

        /// Simulate a device that never gets a connection
        #[arg(long)]
        offline: bool,

        /// Portal submission, repeatable
        #[arg(long = "set", value_name = "ID=VALUE")]
        submissions: Vec<String>,

        /// Log level for this run, overrides the settings file
        #[arg(long)]
        log_level: Option<String>,

        /// Main loop iterations after boot
        #[arg(long, default_value_t = 10)]
        ticks: u32,
    }

    #[derive(Subcommand)]
    enum Commands {
        /// Print the number at a path in a JSON file
        Resolve { file: PathBuf, path: String },
        /// Open the config portal on the next boot
        Portal,
        /// Print the stored boot bookkeeping
        State,
    }

    fn load_settings(path: Option<&PathBuf>) -> Result<RuntimeSettings> {
        match path {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                RuntimeSettings::from_json(&json)
            }
            None => Ok(RuntimeSettings::default()),
        }
    }

    pub fn run() -> Result<()> {
        let cli = Cli::parse();
        let settings = load_settings(cli.settings.as_ref())?;
        logging::init_logger(settings.level_filter())
            .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;
        if let Some(level) = &cli.log_level {
            if !logging::set_max_level_from_str(level) {
                bail!("Unknown log level '{}'", level);
            }
        }
        info!("Log level: {}", logging::current_max_level());

        if let Some(Commands::Resolve { file, path }) = &cli.command {
            let json = fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let value = json_path::resolve(&json, path);
            if value == NOT_FOUND {
                bail!("No number at '{}'", path);
            }
            println!("{}", value);
            return Ok(());
        }

        let cause = ResetCause::from_raw(cli.reset_code);
        info!("Boot reason: {}", cause);

        let link = SimulatedLink::new(!cli.offline, cli.rssi);
        let platform = HostPlatform::new(&cli.state, &settings.config_path, cause, link)?;
        let mut device = IotBase::new(platform, settings, AppConfig::default());
        register_parameters(&mut device)?;

        match cli.command {
            Some(Commands::Portal) => return device.restart_with_config_portal(),
            Some(Commands::State) => {
                println!("{:?}", device.boot_state()?);
                return Ok(());
            }
            _ => {}
        }

        let mut provisioner = if cli.offline {
            ScriptedProvisioner::offline()
        } else {
            ScriptedProvisioner::connecting()
        };
        for submission in &cli.submissions {
            let (id, value) = submission
                .split_once('=')
                .ok_or_else(|| anyhow!("Expected ID=VALUE, got '{}'", submission))?;
            provisioner = provisioner.with_value(id, value);
        }

        match device.begin(&mut provisioner)? {
            BeginOutcome::Restarting(action) => {
                println!("{:?}", action);
                return Ok(());
            }
            outcome => info!("{:?}", outcome),
        }
        info!("Running with {:?}", device.app());

        for _ in 0..cli.ticks {
            device.tick();
        }
        println!(
            "quality={} connected={} summer_time={:?} record={}",
            device.wifi_quality(),
            device.is_wifi_connected(),
            device.is_summer_time(),
            device.platform().record_path().display()
        );
        Ok(())
    }
}
