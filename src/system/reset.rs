//! Reset cause classification for the boot-recovery check
//!
//! Codes follow the ESP32 ROM reset reason table (`rtc_get_reset_reason`).
use core::fmt;

/// Hardware reported reason for the most recent boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    /// Vbat power on reset
    PowerOn,
    /// Software reset of the digital core
    Software,
    /// Legacy watchdog reset of the digital core
    LegacyWatchdog,
    /// Deep sleep wake-up
    DeepSleep,
    /// Reset by the SLC module
    Sdio,
    /// Timer group 0 watchdog, digital core
    TimerGroup0Watchdog,
    /// Timer group 1 watchdog, digital core
    TimerGroup1Watchdog,
    /// RTC watchdog, digital core
    RtcWatchdog,
    Intrusion,
    /// Timer group watchdog, CPU
    TimerGroupCpuWatchdog,
    /// Software reset of the CPU
    SoftwareCpu,
    /// RTC watchdog, CPU
    RtcCpuWatchdog,
    /// APP CPU reset by PRO CPU
    ExternalCpu,
    /// Supply voltage not stable
    BrownOut,
    /// RTC watchdog reset of digital core and RTC module (reset button)
    Rtc,
    Unknown(u32),
}

/// What a reset cause means for the boot counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCategory {
    /// Power cycle or reset button: counts as a possibly failed boot
    PowerCycle,
    /// Anything else, including unrecognised codes
    Software,
}

impl ResetCause {
    pub fn from_raw(code: u32) -> Self {
        match code {
            1 => Self::PowerOn,
            3 => Self::Software,
            4 => Self::LegacyWatchdog,
            5 => Self::DeepSleep,
            6 => Self::Sdio,
            7 => Self::TimerGroup0Watchdog,
            8 => Self::TimerGroup1Watchdog,
            9 => Self::RtcWatchdog,
            10 => Self::Intrusion,
            11 => Self::TimerGroupCpuWatchdog,
            12 => Self::SoftwareCpu,
            13 => Self::RtcCpuWatchdog,
            14 => Self::ExternalCpu,
            15 => Self::BrownOut,
            16 => Self::Rtc,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::PowerOn => 1,
            Self::Software => 3,
            Self::LegacyWatchdog => 4,
            Self::DeepSleep => 5,
            Self::Sdio => 6,
            Self::TimerGroup0Watchdog => 7,
            Self::TimerGroup1Watchdog => 8,
            Self::RtcWatchdog => 9,
            Self::Intrusion => 10,
            Self::TimerGroupCpuWatchdog => 11,
            Self::SoftwareCpu => 12,
            Self::RtcCpuWatchdog => 13,
            Self::ExternalCpu => 14,
            Self::BrownOut => 15,
            Self::Rtc => 16,
            Self::Unknown(code) => *code,
        }
    }

    pub fn category(&self) -> ResetCategory {
        match self {
            Self::PowerOn | Self::Rtc => ResetCategory::PowerCycle,
            _ => ResetCategory::Software,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::PowerOn => "POWERON_RESET",
            Self::Software => "SW_RESET",
            Self::LegacyWatchdog => "OWDT_RESET",
            Self::DeepSleep => "DEEPSLEEP_RESET",
            Self::Sdio => "SDIO_RESET",
            Self::TimerGroup0Watchdog => "TG0WDT_SYS_RESET",
            Self::TimerGroup1Watchdog => "TG1WDT_SYS_RESET",
            Self::RtcWatchdog => "RTCWDT_SYS_RESET",
            Self::Intrusion => "INTRUSION_RESET",
            Self::TimerGroupCpuWatchdog => "TGWDT_CPU_RESET",
            Self::SoftwareCpu => "SW_CPU_RESET",
            Self::RtcCpuWatchdog => "RTCWDT_CPU_RESET",
            Self::ExternalCpu => "EXT_CPU_RESET",
            Self::BrownOut => "RTCWDT_BROWN_OUT_RESET",
            Self::Rtc => "RTCWDT_RTC_RESET",
            Self::Unknown(_) => "NO_MEAN",
        }
    }
}

impl fmt::Display for ResetCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Read the ROM reset reason of the PRO CPU
#[cfg(target_os = "espidf")]
pub fn read_raw_reset_reason() -> u32 {
    unsafe { esp_idf_sys::esp_rom_get_reset_reason(0) as u32 }
}

/// Get the last reset reason as reported by the IDF (coarser than the ROM code)
#[cfg(target_os = "espidf")]
pub fn get_reset_reason() -> &'static str {
    let reason = unsafe { esp_idf_sys::esp_reset_reason() };

    match reason {
        esp_idf_sys::esp_reset_reason_t_ESP_RST_UNKNOWN => "Unknown",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_POWERON => "Power-on",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_EXT => "External pin",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_SW => "Software reset",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_PANIC => "Panic",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_INT_WDT => "Interrupt watchdog",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_TASK_WDT => "Task watchdog",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_WDT => "Other watchdog",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_DEEPSLEEP => "Deep sleep",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_BROWNOUT => "Brownout",
        esp_idf_sys::esp_reset_reason_t_ESP_RST_SDIO => "SDIO",
        _ => "Unknown reason code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_cycle_codes() {
        assert_eq!(ResetCause::from_raw(1).category(), ResetCategory::PowerCycle);
        assert_eq!(ResetCause::from_raw(16).category(), ResetCategory::PowerCycle);
    }

    #[test]
    fn test_everything_else_is_software() {
        for code in (0..=64).filter(|c| *c != 1 && *c != 16) {
            assert_eq!(
                ResetCause::from_raw(code).category(),
                ResetCategory::Software,
                "code {}",
                code
            );
        }
    }

    #[test]
    fn test_code_survives_classification() {
        for code in 0..=32 {
            assert_eq!(ResetCause::from_raw(code).code(), code);
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(ResetCause::PowerOn.to_string(), "POWERON_RESET (1)");
        assert_eq!(ResetCause::BrownOut.to_string(), "RTCWDT_BROWN_OUT_RESET (15)");
        assert_eq!(ResetCause::from_raw(2).to_string(), "NO_MEAN (2)");
    }
}
