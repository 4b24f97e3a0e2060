//! Device services the runtime needs: storage, link state, reset cause, restart

#[cfg(target_os = "espidf")]
mod esp;
mod host;

#[cfg(target_os = "espidf")]
pub use esp::EspPlatform;
pub use host::HostPlatform;

use anyhow::Result;
use std::cell::{Cell, RefCell};

use crate::network::{LinkStatus, SimulatedLink};
use crate::system::reset::ResetCause;
use crate::system::storage::{ConfigFile, MemoryConfigFile, MemoryPreferences, Preferences};

pub trait Platform {
    fn preferences(&self) -> &dyn Preferences;
    fn config_file(&self) -> &dyn ConfigFile;
    fn link(&self) -> &dyn LinkStatus;
    /// Why the chip came out of its last reset
    fn reset_cause(&self) -> ResetCause;
    /// Reboot the device. Returns only where a reboot cannot happen.
    fn restart(&self);
    /// Keep the wall clock synced with an NTP server
    fn start_time_sync(&self, server: &str) -> Result<()>;
    /// Unix seconds in UTC, `None` while the clock is not set
    fn utc_now(&self) -> Option<i64>;
}

/// Everything in memory; restarts are counted instead of performed
#[derive(Debug)]
pub struct SimulatedPlatform {
    prefs: MemoryPreferences,
    files: MemoryConfigFile,
    link: SimulatedLink,
    reset_code: Cell<u32>,
    restarts: Cell<u32>,
    time_server: RefCell<Option<String>>,
    utc: Cell<i64>,
}

impl SimulatedPlatform {
    /// Fresh device that just powered on
    pub fn new() -> Self {
        Self::with_storage(MemoryPreferences::new(), MemoryConfigFile::new())
    }

    /// Share storage with an earlier instance to simulate a reboot
    pub fn with_storage(prefs: MemoryPreferences, files: MemoryConfigFile) -> Self {
        Self {
            prefs,
            files,
            link: SimulatedLink::new(false, -100),
            reset_code: Cell::new(ResetCause::PowerOn.code()),
            restarts: Cell::new(0),
            time_server: RefCell::new(None),
            utc: Cell::new(0),
        }
    }

    pub fn set_reset_cause(&self, cause: ResetCause) {
        self.reset_code.set(cause.code());
    }

    pub fn restart_count(&self) -> u32 {
        self.restarts.get()
    }

    /// Server handed to the last `start_time_sync`
    pub fn time_server(&self) -> Option<String> {
        self.time_server.borrow().clone()
    }

    /// Time the clock reports once syncing has started
    pub fn set_utc(&self, utc: i64) {
        self.utc.set(utc);
    }

    pub fn memory_preferences(&self) -> &MemoryPreferences {
        &self.prefs
    }

    pub fn memory_config_file(&self) -> &MemoryConfigFile {
        &self.files
    }

    pub fn simulated_link(&self) -> &SimulatedLink {
        &self.link
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for SimulatedPlatform {
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
        ResetCause::from_raw(self.reset_code.get())
    }

    fn restart(&self) {
        log::info!("Simulated restart");
        self.restarts.set(self.restarts.get() + 1);
        // The next boot sees a software reset
        self.reset_code.set(ResetCause::SoftwareCpu.code());
    }

    fn start_time_sync(&self, server: &str) -> Result<()> {
        *self.time_server.borrow_mut() = Some(server.to_string());
        Ok(())
    }

    fn utc_now(&self) -> Option<i64> {
        self.time_server.borrow().as_ref().map(|_| self.utc.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_turns_into_software_reset() {
        let platform = SimulatedPlatform::new();
        assert_eq!(platform.reset_cause(), ResetCause::PowerOn);
        platform.restart();
        assert_eq!(platform.restart_count(), 1);
        assert_eq!(platform.reset_cause(), ResetCause::SoftwareCpu);
    }

    #[test]
    fn test_clock_unset_until_sync_starts() {
        let platform = SimulatedPlatform::new();
        platform.set_utc(1_719_835_200);
        assert_eq!(platform.utc_now(), None);
        platform.start_time_sync("pool.ntp.org").unwrap();
        assert_eq!(platform.utc_now(), Some(1_719_835_200));
        assert_eq!(platform.time_server().as_deref(), Some("pool.ntp.org"));
    }

    #[test]
    fn test_storage_survives_simulated_reboot() {
        let first = SimulatedPlatform::new();
        first.config_file().write(b"{}").unwrap();
        let second = SimulatedPlatform::with_storage(
            first.memory_preferences().clone(),
            first.memory_config_file().clone(),
        );
        assert_eq!(second.config_file().read().unwrap(), Some(b"{}".to_vec()));
    }
}
