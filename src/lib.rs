//! Runtime helper for WiFi-provisioned IoT devices
//!
//! Boot-loop recovery, JSON configuration persistence, a JSON path resolver
//! for sensor payloads, NTP time with EU summer time and a rolling WiFi
//! quality sampler.

pub mod boot;
pub mod clock;
pub mod config;
pub mod device;
pub mod json_path;
pub mod logging;
pub mod network;
pub mod platform;
pub mod provisioning;
pub mod ring_buffer;
pub mod settings;
pub mod system;
pub mod version;

pub use device::{BeginOutcome, IotBase};

#[cfg(test)]
mod tests;
