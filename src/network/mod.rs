pub mod quality;
#[cfg(target_os = "espidf")]
pub mod wifi;

use std::cell::Cell;

pub use quality::LinkQualitySampler;

/// State of the station link as reported by the network stack
pub trait LinkStatus {
    fn is_connected(&self) -> bool;
    /// Signal strength of the current access point, `None` when unknown
    fn rssi_dbm(&self) -> Option<i32>;
}

/// Link whose state is set by hand (host runs, tests)
#[derive(Debug, Default)]
pub struct SimulatedLink {
    connected: Cell<bool>,
    rssi_dbm: Cell<i32>,
}

impl SimulatedLink {
    pub fn new(connected: bool, rssi_dbm: i32) -> Self {
        Self {
            connected: Cell::new(connected),
            rssi_dbm: Cell::new(rssi_dbm),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.set(connected);
    }

    pub fn set_rssi_dbm(&self, rssi_dbm: i32) {
        self.rssi_dbm.set(rssi_dbm);
    }
}

impl LinkStatus for SimulatedLink {
    fn is_connected(&self) -> bool {
        self.connected.get()
    }

    fn rssi_dbm(&self) -> Option<i32> {
        self.connected.get().then(|| self.rssi_dbm.get())
    }
}
