use anyhow::Result;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    nvs::EspDefaultNvsPartition,
    wifi::{BlockingWifi, Configuration, EspWifi},
};
use std::rc::Rc;

use super::LinkStatus;
use crate::config::ParameterSet;
use crate::provisioning::{FormField, PortalMode, ProvisioningOutcome, Provisioner};

/// Station interface state read straight from the WiFi driver
#[derive(Debug, Default, Clone, Copy)]
pub struct StationLink;

impl LinkStatus for StationLink {
    fn is_connected(&self) -> bool {
        self.rssi_dbm().is_some()
    }

    fn rssi_dbm(&self) -> Option<i32> {
        unsafe {
            let mut ap_info: esp_idf_sys::wifi_ap_record_t = core::mem::zeroed();
            if esp_idf_sys::esp_wifi_sta_get_ap_info(&mut ap_info) == esp_idf_sys::ESP_OK {
                Some(ap_info.rssi as i32)
            } else {
                None
            }
        }
    }
}

/// Connects with the credentials the WiFi driver keeps in NVS
///
/// There is no captive portal on this target. Every parameter is bound to a
/// field holding its default, so nothing is reported as submitted.
pub struct StationProvisioner {
    wifi: BlockingWifi<EspWifi<'static>>,
    fields: Vec<Rc<FormField>>,
}

impl StationProvisioner {
    pub fn new(modem: Modem, sys_loop: EspSystemEventLoop, nvs: EspDefaultNvsPartition) -> Result<Self> {
        let esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs))?;
        let wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;
        log::info!("WiFi driver initialized");
        Ok(Self {
            wifi,
            fields: Vec::new(),
        })
    }

    fn connect(&mut self) -> Result<bool> {
        let ssid = match self.wifi.get_configuration()? {
            Configuration::Client(client) => client.ssid.to_string(),
            Configuration::Mixed(client, _) => client.ssid.to_string(),
            _ => String::new(),
        };
        if ssid.is_empty() {
            log::warn!("No stored WiFi credentials");
            return Ok(false);
        }

        log::info!("Connecting to {}...", ssid);
        self.wifi.start()?;
        if let Err(e) = self.wifi.connect() {
            log::warn!("Failed to connect to {}: {:?}", ssid, e);
            return Ok(false);
        }

        log::info!("Waiting for DHCP...");
        self.wifi.wait_netif_up()?;
        log::info!("WiFi connected!");

        // Power save causes disconnects under traffic
        unsafe {
            use esp_idf_sys::*;
            let result = esp_wifi_set_ps(wifi_ps_type_t_WIFI_PS_NONE);
            if result != ESP_OK {
                log::warn!("Failed to set WiFi power save mode: {:?}", result);
            }
        }
        Ok(true)
    }
}

impl Provisioner for StationProvisioner {
    fn provision(&mut self, mode: PortalMode, params: &mut ParameterSet) -> Result<ProvisioningOutcome> {
        if mode == PortalMode::ConfigPortal {
            log::warn!("Config portal requested, connecting with stored credentials instead");
        }

        self.fields.clear();
        for param in params.iter_mut() {
            let field = FormField::new(param.initial_value(), param.max_length());
            param.attach_binding(field.clone());
            self.fields.push(field);
        }

        let connected = self.connect()?;
        Ok(ProvisioningOutcome::new(connected, false))
    }
}
