use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Key/value namespace store (NVS on device)
///
/// A namespace is opened for one discrete operation and closed again when the
/// returned handle is dropped. Writes are committed before the setter returns.
pub trait Preferences {
    fn open(&self, namespace: &str, read_only: bool) -> Result<Box<dyn PreferenceNamespace + '_>>;
}

/// An open namespace handle
pub trait PreferenceNamespace {
    fn get_bool(&self, key: &str) -> Result<Option<bool>>;
    fn set_bool(&mut self, key: &str, value: bool) -> Result<()>;
    fn get_u32(&self, key: &str) -> Result<Option<u32>>;
    fn set_u32(&mut self, key: &str, value: u32) -> Result<()>;
}

/// The single JSON configuration record kept on the device filesystem
pub trait ConfigFile {
    /// Full record contents, `None` when no record exists
    fn read(&self) -> Result<Option<Vec<u8>>>;
    /// Overwrite the record
    fn write(&self, data: &[u8]) -> Result<()>;
    /// Wipe the whole filesystem the record lives on
    fn format(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StoredValue {
    Bool(bool),
    U32(u32),
}

/// In-memory preferences, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    namespaces: Arc<Mutex<HashMap<String, HashMap<String, StoredValue>>>>,
    unavailable: Arc<Mutex<bool>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `open` fail, like an unformatted NVS partition
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut flag) = self.unavailable.lock() {
            *flag = unavailable;
        }
    }

    pub fn get_bool(&self, namespace: &str, key: &str) -> Option<bool> {
        match self.value(namespace, key)? {
            StoredValue::Bool(v) => Some(v),
            StoredValue::U32(_) => None,
        }
    }

    pub fn get_u32(&self, namespace: &str, key: &str) -> Option<u32> {
        match self.value(namespace, key)? {
            StoredValue::U32(v) => Some(v),
            StoredValue::Bool(_) => None,
        }
    }

    fn value(&self, namespace: &str, key: &str) -> Option<StoredValue> {
        let namespaces = self.namespaces.lock().ok()?;
        namespaces.get(namespace)?.get(key).copied()
    }
}

impl Preferences for MemoryPreferences {
    fn open(&self, namespace: &str, read_only: bool) -> Result<Box<dyn PreferenceNamespace + '_>> {
        let unavailable = *self
            .unavailable
            .lock()
            .map_err(|e| anyhow!("Preferences lock poisoned: {}", e))?;
        if unavailable {
            return Err(anyhow!("Preferences namespace '{}' unavailable", namespace));
        }
        Ok(Box::new(MemoryNamespace {
            store: self,
            namespace: namespace.to_string(),
            read_only,
        }))
    }
}

struct MemoryNamespace<'a> {
    store: &'a MemoryPreferences,
    namespace: String,
    read_only: bool,
}

impl MemoryNamespace<'_> {
    fn get(&self, key: &str) -> Result<Option<StoredValue>> {
        let namespaces = self
            .store
            .namespaces
            .lock()
            .map_err(|e| anyhow!("Preferences lock poisoned: {}", e))?;
        Ok(namespaces
            .get(&self.namespace)
            .and_then(|ns| ns.get(key))
            .copied())
    }

    fn put(&mut self, key: &str, value: StoredValue) -> Result<()> {
        if self.read_only {
            return Err(anyhow!(
                "Namespace '{}' opened read-only, cannot write '{}'",
                self.namespace,
                key
            ));
        }
        let mut namespaces = self
            .store
            .namespaces
            .lock()
            .map_err(|e| anyhow!("Preferences lock poisoned: {}", e))?;
        namespaces
            .entry(self.namespace.clone())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }
}

impl PreferenceNamespace for MemoryNamespace<'_> {
    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key)? {
            Some(StoredValue::Bool(v)) => Ok(Some(v)),
            Some(StoredValue::U32(_)) => Err(anyhow!("Key '{}' is not a bool", key)),
            None => Ok(None),
        }
    }

    fn set_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.put(key, StoredValue::Bool(value))
    }

    fn get_u32(&self, key: &str) -> Result<Option<u32>> {
        match self.get(key)? {
            Some(StoredValue::U32(v)) => Ok(Some(v)),
            Some(StoredValue::Bool(_)) => Err(anyhow!("Key '{}' is not a u32", key)),
            None => Ok(None),
        }
    }

    fn set_u32(&mut self, key: &str, value: u32) -> Result<()> {
        self.put(key, StoredValue::U32(value))
    }
}

/// In-memory configuration record, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigFile {
    contents: Arc<Mutex<Option<Vec<u8>>>>,
    formats: Arc<Mutex<u32>>,
    unavailable: Arc<Mutex<bool>>,
}

impl MemoryConfigFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(data: &[u8]) -> Self {
        let file = Self::default();
        if let Ok(mut contents) = file.contents.lock() {
            *contents = Some(data.to_vec());
        }
        file
    }

    /// Simulate a filesystem that fails to mount
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut flag) = self.unavailable.lock() {
            *flag = unavailable;
        }
    }

    pub fn contents(&self) -> Option<Vec<u8>> {
        self.contents.lock().ok()?.clone()
    }

    /// How many times the filesystem has been wiped
    pub fn format_count(&self) -> u32 {
        self.formats.lock().map(|n| *n).unwrap_or(0)
    }

    fn check_mounted(&self) -> Result<()> {
        let unavailable = *self
            .unavailable
            .lock()
            .map_err(|e| anyhow!("Config file lock poisoned: {}", e))?;
        if unavailable {
            return Err(anyhow!("Filesystem not mounted"));
        }
        Ok(())
    }
}

impl ConfigFile for MemoryConfigFile {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        self.check_mounted()?;
        let contents = self
            .contents
            .lock()
            .map_err(|e| anyhow!("Config file lock poisoned: {}", e))?;
        Ok(contents.clone())
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        self.check_mounted()?;
        let mut contents = self
            .contents
            .lock()
            .map_err(|e| anyhow!("Config file lock poisoned: {}", e))?;
        *contents = Some(data.to_vec());
        Ok(())
    }

    fn format(&self) -> Result<()> {
        self.check_mounted()?;
        *self
            .contents
            .lock()
            .map_err(|e| anyhow!("Config file lock poisoned: {}", e))? = None;
        *self
            .formats
            .lock()
            .map_err(|e| anyhow!("Config file lock poisoned: {}", e))? += 1;
        Ok(())
    }
}

/// Preferences kept in one JSON file, rewritten on every write
///
/// Used by the host build to keep boot bookkeeping across runs.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
}

type NamespaceMap = HashMap<String, serde_json::Map<String, serde_json::Value>>;

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<NamespaceMap> {
        if !self.path.exists() {
            return Ok(NamespaceMap::new());
        }
        let data = fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("Corrupt preferences file {}", self.path.display()))
    }

    fn store(&self, namespaces: &NamespaceMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(namespaces)?)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

impl Preferences for FilePreferences {
    fn open(&self, namespace: &str, read_only: bool) -> Result<Box<dyn PreferenceNamespace + '_>> {
        let entries = self.load()?.remove(namespace).unwrap_or_default();
        Ok(Box::new(FileNamespace {
            store: self,
            namespace: namespace.to_string(),
            entries,
            read_only,
        }))
    }
}

struct FileNamespace<'a> {
    store: &'a FilePreferences,
    namespace: String,
    entries: serde_json::Map<String, serde_json::Value>,
    read_only: bool,
}

impl FileNamespace<'_> {
    fn put(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        if self.read_only {
            return Err(anyhow!("Namespace '{}' opened read-only", self.namespace));
        }
        self.entries.insert(key.to_string(), value);
        let mut namespaces = self.store.load()?;
        namespaces.insert(self.namespace.clone(), self.entries.clone());
        self.store.store(&namespaces)
    }
}

impl PreferenceNamespace for FileNamespace<'_> {
    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_bool()
                .map(Some)
                .ok_or_else(|| anyhow!("Key '{}' is not a bool", key)),
        }
    }

    fn set_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.put(key, serde_json::Value::Bool(value))
    }

    fn get_u32(&self, key: &str) -> Result<Option<u32>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| anyhow!("Key '{}' is not a u32", key)),
        }
    }

    fn set_u32(&mut self, key: &str, value: u32) -> Result<()> {
        self.put(key, serde_json::Value::from(value))
    }
}

/// Configuration record on a std filesystem (SPIFFS through the VFS on device)
#[derive(Debug, Clone)]
pub struct FsConfigFile {
    root: PathBuf,
    record: PathBuf,
}

impl FsConfigFile {
    /// `record_path` is relative to `root`, a leading `/` is allowed
    pub fn new(root: impl Into<PathBuf>, record_path: &str) -> Self {
        let root = root.into();
        let record = root.join(record_path.trim_start_matches('/'));
        Self { root, record }
    }

    pub fn path(&self) -> &Path {
        &self.record
    }
}

impl ConfigFile for FsConfigFile {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        if !self.root.is_dir() {
            return Err(anyhow!("Filesystem root {} not mounted", self.root.display()));
        }
        if !self.record.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.record)
            .with_context(|| format!("Failed to read {}", self.record.display()))?;
        Ok(Some(data))
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.record.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.record, data)
            .with_context(|| format!("Failed to open {} for writing", self.record.display()))?;
        Ok(())
    }

    fn format(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        log::warn!("Formatted filesystem at {}", self.root.display());
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
pub use self::esp::{NvsPreferences, SpiffsConfigFile};

#[cfg(target_os = "espidf")]
mod esp {
    use super::{ConfigFile, FsConfigFile, PreferenceNamespace, Preferences};
    use anyhow::{anyhow, Result};
    use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
    use std::ffi::CString;

    /// Preferences backed by the default NVS partition
    pub struct NvsPreferences {
        partition: EspDefaultNvsPartition,
    }

    impl NvsPreferences {
        pub fn new(partition: EspDefaultNvsPartition) -> Self {
            Self { partition }
        }
    }

    impl Preferences for NvsPreferences {
        fn open(&self, namespace: &str, read_only: bool) -> Result<Box<dyn PreferenceNamespace + '_>> {
            let nvs = EspNvs::new(self.partition.clone(), namespace, !read_only)?;
            Ok(Box::new(NvsNamespace { nvs }))
        }
    }

    struct NvsNamespace {
        nvs: EspNvs<NvsDefault>,
    }

    // NVS has no bool type, flags are stored as u8
    impl PreferenceNamespace for NvsNamespace {
        fn get_bool(&self, key: &str) -> Result<Option<bool>> {
            Ok(self.nvs.get_u8(key)?.map(|v| v != 0))
        }

        fn set_bool(&mut self, key: &str, value: bool) -> Result<()> {
            self.nvs.set_u8(key, value as u8)?;
            Ok(())
        }

        fn get_u32(&self, key: &str) -> Result<Option<u32>> {
            Ok(self.nvs.get_u32(key)?)
        }

        fn set_u32(&mut self, key: &str, value: u32) -> Result<()> {
            self.nvs.set_u32(key, value)?;
            Ok(())
        }
    }

    /// Configuration record on a SPIFFS partition mounted through the VFS
    pub struct SpiffsConfigFile {
        inner: FsConfigFile,
        partition_label: CString,
        mounted: bool,
    }

    impl SpiffsConfigFile {
        /// Mount the partition, formatting it when the mount fails
        pub fn mount(base_path: &str, partition_label: &str, record_path: &str) -> Result<Self> {
            let c_base = CString::new(base_path)?;
            let c_label = CString::new(partition_label)?;
            let conf = esp_idf_sys::esp_vfs_spiffs_conf_t {
                base_path: c_base.as_ptr(),
                partition_label: c_label.as_ptr(),
                max_files: 5,
                format_if_mount_failed: true,
            };

            log::debug!("mounting FS...");
            let result = unsafe { esp_idf_sys::esp_vfs_spiffs_register(&conf) };
            let mounted = result == esp_idf_sys::ESP_OK;
            if mounted {
                log::debug!("mounted file system at {}", base_path);
            } else {
                log::error!("failed to mount FS: {:?}", result);
            }

            // The VFS keeps the base path pointer
            std::mem::forget(c_base);

            Ok(Self {
                inner: FsConfigFile::new(base_path, record_path),
                partition_label: c_label,
                mounted,
            })
        }

        fn check_mounted(&self) -> Result<()> {
            if self.mounted {
                Ok(())
            } else {
                Err(anyhow!("SPIFFS not mounted"))
            }
        }
    }

    impl ConfigFile for SpiffsConfigFile {
        fn read(&self) -> Result<Option<Vec<u8>>> {
            self.check_mounted()?;
            self.inner.read()
        }

        fn write(&self, data: &[u8]) -> Result<()> {
            self.check_mounted()?;
            self.inner.write(data)
        }

        fn format(&self) -> Result<()> {
            let result = unsafe { esp_idf_sys::esp_spiffs_format(self.partition_label.as_ptr()) };
            if result != esp_idf_sys::ESP_OK {
                return Err(anyhow!("SPIFFS format failed: {:?}", result));
            }
            Ok(())
        }
    }
}
