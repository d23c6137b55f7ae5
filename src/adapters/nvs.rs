//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the PetFeeder system.
//!
//! - Config validation: all fields are range-checked before persistence.
//! - Namespace isolation: each subsystem uses its own namespace.
//! - Atomic writes: ESP-IDF NVS commits are atomic per nvs_commit().
//!
//! Keys are limited to 15 bytes by NVS; longer keys are truncated on
//! device, so every key used here stays under that limit.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::FeederConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "feeder";
const CONFIG_KEY: &str = "syscfg";
const SCHEDULE_KEY: &str = "foodConfig";

/// Upper bound on any stored blob.  A full 1440-slot schedule document
/// is about 17 KB.
const MAX_BLOB_SIZE: usize = 24 * 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated copy of a namespace or key, truncated to 15 bytes.
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns_buf = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// Read a whole blob of unknown size.
    fn read_blob(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow()
                .get(&Self::composite_key(namespace, key))
                .cloned()
                .ok_or(StorageError::NotFound)
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let mut size: usize = 0;
                // First call: get size
                let ret = unsafe {
                    nvs_get_blob(handle, key_buf.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                if size == 0 || size > MAX_BLOB_SIZE {
                    return Err(ESP_ERR_NVS_INVALID_LENGTH);
                }
                let mut buf = vec![0u8; size];
                let ret = unsafe {
                    nvs_get_blob(handle, key_buf.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(buf)
            });
            match result {
                Ok(buf) => Ok(buf),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(e) => {
                    warn!("NvsAdapter: read {}::{} failed ({})", namespace, key, e);
                    Err(StorageError::IoError)
                }
            }
        }
    }

    /// Write through `&self`; NVS handles are opened per call.
    fn write_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(handle, key_buf.as_ptr() as *const _, data.as_ptr() as *const _, data.len())
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                warn!("NvsAdapter: write {}::{} failed ({})", namespace, key, e);
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }
}

fn storage_to_config(e: StorageError) -> ConfigError {
    match e {
        StorageError::NotFound => ConfigError::NotFound,
        StorageError::Full => ConfigError::StorageFull,
        StorageError::IoError => ConfigError::IoError,
    }
}

pub fn validate_config(cfg: &FeederConfig) -> Result<(), ConfigError> {
    if !(1_000..=600_000).contains(&cfg.tag_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "tag_timeout_ms must be 1000–600000",
        ));
    }
    if cfg.registered_tags[0] == cfg.registered_tags[1] {
        return Err(ConfigError::ValidationFailed(
            "registered_tags must be distinct",
        ));
    }
    if !(-14 * 3600..=14 * 3600).contains(&cfg.utc_offset_secs) {
        return Err(ConfigError::ValidationFailed(
            "utc_offset_secs must be within ±14h",
        ));
    }
    if !(10..=1000).contains(&cfg.tick_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "tick_interval_ms must be 10–1000",
        ));
    }
    if !(5_000..=60_000).contains(&cfg.watchdog_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "watchdog_timeout_ms must be 5000–60000",
        ));
    }
    if cfg.tick_interval_ms * 10 >= cfg.watchdog_timeout_ms {
        return Err(ConfigError::ValidationFailed(
            "watchdog_timeout_ms must exceed 10 ticks",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<FeederConfig, ConfigError> {
        match self.read_blob(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(bytes) => {
                let cfg: FeederConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(FeederConfig::default())
            }
            Err(e) => {
                warn!("NvsAdapter: config read error ({}), using defaults", e);
                Ok(FeederConfig::default())
            }
        }
    }

    fn save(&self, config: &FeederConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blob(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)
            .map_err(storage_to_config)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }

    fn load_schedule_json(&self) -> Result<Option<String>, ConfigError> {
        match self.read_blob(CONFIG_NAMESPACE, SCHEDULE_KEY) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| ConfigError::Corrupted),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(storage_to_config(e)),
        }
    }

    fn save_schedule_json(&self, json: &str) -> Result<(), ConfigError> {
        self.write_blob(CONFIG_NAMESPACE, SCHEDULE_KEY, json.as_bytes())
            .map_err(storage_to_config)?;
        info!("NvsAdapter: schedule saved ({} bytes)", json.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self.read_blob(namespace, key)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.write_blob(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .remove(&Self::composite_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, key_buf.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => Ok(()),
                // Namespace never created: nothing to delete.
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(()),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow()
                .contains_key(&Self::composite_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let ret = unsafe {
                    nvs_find_key(handle, key_buf.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK)
            });
            result.unwrap_or(false)
        }
    }
}
