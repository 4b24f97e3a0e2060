use super::LinkStatus;
use crate::ring_buffer::RingBuffer;

pub const QUALITY_SAMPLES: usize = 10;

/// Map RSSI (-50 dBm good, -100 dBm bad) to 0..=100
pub fn quality_from_rssi(rssi_dbm: i32) -> u8 {
    rssi_dbm.saturating_add(100).saturating_mul(2).clamp(0, 100) as u8
}

/// Rolling WiFi quality over the last 10 ticks with a connected link
#[derive(Default)]
pub struct LinkQualitySampler {
    samples: RingBuffer<u8, QUALITY_SAMPLES>,
}

impl LinkQualitySampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample the link; returns the recorded quality when connected
    pub fn tick(&mut self, link: &dyn LinkStatus) -> Option<u8> {
        if !link.is_connected() {
            return None;
        }
        let rssi = link.rssi_dbm()?;
        let quality = self.record(rssi);
        log::trace!("Wifi rssi={}, quality={}", rssi, quality);
        Some(quality)
    }

    pub fn record(&mut self, rssi_dbm: i32) -> u8 {
        let quality = quality_from_rssi(rssi_dbm);
        self.samples.push(quality);
        quality
    }

    /// Sum of all slots divided by 10
    ///
    /// Unwritten slots count as 0, so the value reads low until 10 samples exist.
    pub fn average(&self) -> u8 {
        let sum: u16 = self.samples.slots().iter().map(|&q| u16::from(q)).sum();
        (sum / QUALITY_SAMPLES as u16) as u8
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::SimulatedLink;

    #[test]
    fn test_quality_mapping() {
        assert_eq!(quality_from_rssi(-100), 0);
        assert_eq!(quality_from_rssi(-120), 0);
        assert_eq!(quality_from_rssi(-75), 50);
        assert_eq!(quality_from_rssi(-50), 100);
        assert_eq!(quality_from_rssi(-20), 100);
        assert_eq!(quality_from_rssi(i32::MIN), 0);
        assert_eq!(quality_from_rssi(i32::MAX), 100);
    }

    #[test]
    fn test_average_undercounts_until_full() {
        let link = SimulatedLink::new(true, -70);
        let mut sampler = LinkQualitySampler::new();
        for _ in 0..3 {
            assert_eq!(sampler.tick(&link), Some(60));
        }
        assert_eq!(sampler.average(), (3 * 60) / 10);
        assert_eq!(sampler.sample_count(), 3);
    }

    #[test]
    fn test_disconnected_ticks_are_skipped() {
        let link = SimulatedLink::new(false, -60);
        let mut sampler = LinkQualitySampler::new();
        assert_eq!(sampler.tick(&link), None);
        assert_eq!(sampler.sample_count(), 0);
        assert_eq!(sampler.average(), 0);
    }

    #[test]
    fn test_window_wraps() {
        let link = SimulatedLink::new(true, -100);
        let mut sampler = LinkQualitySampler::new();
        for _ in 0..10 {
            sampler.tick(&link);
        }
        link.set_rssi_dbm(-50);
        for _ in 0..5 {
            sampler.tick(&link);
        }
        assert_eq!(sampler.average(), 50);
        for _ in 0..5 {
            sampler.tick(&link);
        }
        assert_eq!(sampler.average(), 100);
    }
}
