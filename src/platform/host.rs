use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::Platform;
use crate::network::{LinkStatus, SimulatedLink};
use crate::system::reset::ResetCause;
use crate::system::storage::{ConfigFile, FilePreferences, FsConfigFile, Preferences};

/// Device state kept in a directory on the development machine
///
/// `<state>/nvs.json` holds the preferences, `<state>/fs/` stands in for the
/// config filesystem.
pub struct HostPlatform {
    prefs: FilePreferences,
    files: FsConfigFile,
    link: SimulatedLink,
    reset_cause: ResetCause,
}

impl HostPlatform {
    /// Open the state directory, creating the filesystem root on first use
    pub fn new(state_dir: &Path, config_path: &str, reset_cause: ResetCause, link: SimulatedLink) -> Result<Self> {
        let fs_root = state_dir.join("fs");
        fs::create_dir_all(&fs_root)
            .with_context(|| format!("Failed to create {}", fs_root.display()))?;
        Ok(Self {
            prefs: FilePreferences::new(state_dir.join("nvs.json")),
            files: FsConfigFile::new(fs_root, config_path),
            link,
            reset_cause,
        })
    }

    pub fn record_path(&self) -> PathBuf {
        self.files.path().to_path_buf()
    }
}

impl Platform for HostPlatform {
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
        self.reset_cause
    }

    fn restart(&self) {
        log::warn!("Restart requested; run again to continue the boot sequence");
    }

    fn start_time_sync(&self, server: &str) -> Result<()> {
        log::info!("Using the host clock instead of {}", server);
        Ok(())
    }

    fn utc_now(&self) -> Option<i64> {
        let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
        i64::try_from(elapsed.as_secs()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lives_under_fs_root() {
        let dir = tempfile::tempdir().unwrap();
        let platform = HostPlatform::new(
            dir.path(),
            "/config.json",
            ResetCause::PowerOn,
            SimulatedLink::default(),
        )
        .unwrap();
        assert_eq!(platform.record_path(), dir.path().join("fs").join("config.json"));

        assert_eq!(platform.config_file().read().unwrap(), None);
        platform.config_file().write(b"{\"a\":1}").unwrap();
        assert!(platform.record_path().exists());
        assert!(platform.utc_now().unwrap() > 1_700_000_000);
    }
}
