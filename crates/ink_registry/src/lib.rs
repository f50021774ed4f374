//! The device registry: a durable map of everything the server knows about
//! each client device, persisted as a single JSON document after every
//! mutation.
//!
//! Devices are created on first contact. Persistence failures are logged and
//! tolerated: the in-memory state keeps going and the next successful write
//! catches up.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::PathBuf;

use jiff::Timestamp;
use parking_lot::Mutex;

// ----------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

// ----------------------------------------------------------------------------

/// Everything the server remembers about one device.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct DeviceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<Timestamp>,

    #[serde(default)]
    pub api_calls: u64,

    #[serde(default)]
    pub sleep_disabled: bool,

    /// The display mode the device last asked for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// `"socket"` when the device last spoke the TCP protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_log: Option<String>,

    /// Opaque metrics blob as posted by the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,

    /// When the server expects the device to check in next. Lets operators
    /// spot overdue devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_refresh: Option<Timestamp>,
}

// ----------------------------------------------------------------------------

/// The registry itself. All mutations are serialized through one mutex and
/// persisted (write-temp-then-rename) before the lock is released.
pub struct DeviceRegistry {
    path: PathBuf,
    devices: Mutex<BTreeMap<String, DeviceRecord>>,
}

impl DeviceRegistry {
    /// Open the registry at `path`. A missing or unreadable file starts
    /// empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let devices = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(devices) => devices,
                Err(err) => {
                    ink_log::error!(
                        "failed to parse device registry {}: {err}; starting empty",
                        path.display()
                    );
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                ink_log::error!(
                    "failed to read device registry {}: {err}; starting empty",
                    path.display()
                );
                BTreeMap::new()
            }
        };

        if !devices.is_empty() {
            ink_log::info!("loaded {} devices from {}", devices.len(), path.display());
        }

        Self {
            path,
            devices: Mutex::new(devices),
        }
    }

    /// Record a device-identified request: creates the record on first
    /// contact, bumps `last_seen`/`api_calls`, applies `update`, persists.
    pub fn touch(&self, device: &str, now: Timestamp, update: impl FnOnce(&mut DeviceRecord)) {
        let mut devices = self.devices.lock();

        let record = devices.entry(device.to_owned()).or_default();
        if record.first_seen.is_none() {
            record.first_seen = Some(now);
        }
        record.last_seen = Some(now);
        record.api_calls += 1;
        update(record);

        self.persist(&devices);
    }

    pub fn get(&self, device: &str) -> Option<DeviceRecord> {
        self.devices.lock().get(device).cloned()
    }

    pub fn sleep_disabled(&self, device: &str) -> bool {
        self.devices
            .lock()
            .get(device)
            .is_some_and(|record| record.sleep_disabled)
    }

    /// Flip sleep suppression for an existing device. Unknown devices are a
    /// no-op.
    pub fn set_sleep_disabled(&self, device: &str, disabled: bool) {
        let mut devices = self.devices.lock();
        if let Some(record) = devices.get_mut(device) {
            record.sleep_disabled = disabled;
            self.persist(&devices);
        }
    }

    /// Store the server's prediction of the device's next contact. Does not
    /// count as an API call.
    pub fn set_next_refresh(&self, device: &str, at: Timestamp) {
        let mut devices = self.devices.lock();
        if let Some(record) = devices.get_mut(device) {
            record.next_refresh = Some(at);
            self.persist(&devices);
        }
    }

    /// A point-in-time copy of every record, for the dashboard.
    pub fn snapshot(&self) -> BTreeMap<String, DeviceRecord> {
        self.devices.lock().clone()
    }

    fn persist(&self, devices: &BTreeMap<String, DeviceRecord>) {
        if let Err(err) = self.write_atomically(devices) {
            ink_log::error!(
                "failed to persist device registry {}: {err}",
                self.path.display()
            );
        }
    }

    fn write_atomically(
        &self,
        devices: &BTreeMap<String, DeviceRecord>,
    ) -> Result<(), RegistryError> {
        let json = serde_json::to_vec_pretty(devices)?;

        let dir = self.path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.persist(&self.path).map_err(|err| err.error)?;

        Ok(())
    }
}

// ----------------------------------------------------------------------------
