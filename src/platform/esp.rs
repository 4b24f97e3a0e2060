use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::{EspSntp, SntpConf, SyncStatus};
use std::cell::RefCell;
use std::time::{SystemTime, UNIX_EPOCH};

use super::Platform;
use crate::network::wifi::StationLink;
use crate::network::LinkStatus;
use crate::settings::RuntimeSettings;
use crate::system::reset::{read_raw_reset_reason, ResetCause};
use crate::system::storage::{ConfigFile, NvsPreferences, Preferences, SpiffsConfigFile};

const FS_BASE_PATH: &str = "/spiffs";
const FS_PARTITION: &str = "spiffs";

pub struct EspPlatform {
    prefs: NvsPreferences,
    files: SpiffsConfigFile,
    link: StationLink,
    sntp: RefCell<Option<EspSntp<'static>>>,
}

impl EspPlatform {
    pub fn new(nvs: EspDefaultNvsPartition, settings: &RuntimeSettings) -> Result<Self> {
        Ok(Self {
            prefs: NvsPreferences::new(nvs),
            files: SpiffsConfigFile::mount(FS_BASE_PATH, FS_PARTITION, &settings.config_path)?,
            link: StationLink,
            sntp: RefCell::new(None),
        })
    }
}

impl Platform for EspPlatform {
    fn preferences(&self) -> &dyn Preferences {
        &self.prefs
    }

    fn config_file(&self) -> &dyn ConfigFile {
        &self.files
    }

    fn link(&self) -> &dyn LinkStatus {
        &self.link
    }

    fn reset_cause(&self) -> ResetCause {
        ResetCause::from_raw(read_raw_reset_reason())
    }

    fn restart(&self) {
        log::info!("Restarting...");
        log::logger().flush();
        FreeRtos::delay_ms(100);
        unsafe {
            esp_idf_sys::esp_restart();
        }
    }

    fn start_time_sync(&self, server: &str) -> Result<()> {
        let mut sntp = self.sntp.borrow_mut();
        if sntp.is_some() {
            return Ok(());
        }
        let mut conf = SntpConf::default();
        conf.servers[0] = server;
        *sntp = Some(EspSntp::new(&conf)?);
        log::info!("NTP: started with {}", server);
        Ok(())
    }

    fn utc_now(&self) -> Option<i64> {
        let synced = self
            .sntp
            .borrow()
            .as_ref()
            .is_some_and(|sntp| sntp.get_sync_status() == SyncStatus::Completed);
        if !synced {
            return None;
        }
        let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
        i64::try_from(elapsed.as_secs()).ok()
    }
}
