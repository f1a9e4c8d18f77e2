//! Persisted device settings.
//!
//! Settings live in a JSON file with a single `general` mapping of setting
//! name to `{ value, reset_required, description }`. The file is loaded once
//! at startup; a missing or unreadable file degrades to documented defaults,
//! and any recognized key missing from the file is backfilled and the file
//! rewritten in place. A complete file is never rewritten, so a second load
//! is byte-for-byte stable.

use crate::error::AppResult;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default on-device location of the settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "config/hub_settings.json";

/// Sentinel address meaning "use DHCP".
pub const UNSET_ADDRESS: &str = "0.0.0.0";

const WIFI_ENABLED: &str = "wifi_enabled";
const STATIC_IP_ADDRESS: &str = "static_ip_address";
const STATIC_GATEWAY: &str = "static_gateway";
const STATIC_NETMASK: &str = "static_netmask";

/// A stored setting value. The schema only uses booleans and strings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
}

/// One named setting: its value plus operator-facing metadata.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SettingEntry {
    pub value: SettingValue,
    pub reset_required: bool,
    pub description: String,
}

impl SettingEntry {
    fn bool_default(value: bool, description: &str) -> Self {
        Self {
            value: SettingValue::Bool(value),
            reset_required: true,
            description: description.to_string(),
        }
    }

    fn text_default(value: &str, description: &str) -> Self {
        Self {
            value: SettingValue::Text(value.to_string()),
            reset_required: true,
            description: description.to_string(),
        }
    }
}

/// On-disk shape of the settings file.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsFile {
    #[serde(default)]
    pub general: BTreeMap<String, SettingEntry>,
}

/// Static IPv4 parameters extracted from the settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticIpv4 {
    pub address: String,
    pub netmask: String,
    pub gateway: String,
}

/// Loaded settings plus the path they came from.
#[derive(Clone, Debug)]
pub struct Settings {
    file: SettingsFile,
    path: PathBuf,
    rewrote: bool,
}

impl Settings {
    /// Load settings from `path`, substituting defaults for anything missing.
    ///
    /// A missing or unreadable file is not fatal: defaults are used and the
    /// file is (re)written so the operator can see every recognized key. A
    /// file that already carries all recognized keys is left untouched.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = match std::fs::read_to_string(&path) {
            // A present-but-corrupt file is fatal; silently replacing an
            // operator's edits with defaults would mask the mistake.
            Ok(raw) => serde_json::from_str::<SettingsFile>(&raw)?,
            Err(err) => {
                warn!(
                    "Settings file {} not readable ({}), using default network configuration",
                    path.display(),
                    err
                );
                SettingsFile::default()
            }
        };

        let backfilled = backfill_defaults(&mut file);
        if backfilled {
            info!("Settings file {} missing keys, rewriting", path.display());
            if let Err(err) = write_settings(&path, &file) {
                warn!("Cannot rewrite settings file {}: {}", path.display(), err);
            }
        }

        Ok(Self {
            file,
            path,
            rewrote: backfilled,
        })
    }

    /// In-memory settings with all defaults (no file access).
    pub fn defaults() -> Self {
        let mut file = SettingsFile::default();
        backfill_defaults(&mut file);
        Self {
            file,
            path: PathBuf::from(DEFAULT_SETTINGS_PATH),
            rewrote: false,
        }
    }

    /// Whether this load backfilled keys and rewrote the file.
    pub fn was_rewritten(&self) -> bool {
        self.rewrote
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this device uses its wifi interface as the preferred link.
    pub fn wifi_enabled(&self) -> bool {
        match self.file.general.get(WIFI_ENABLED).map(|e| &e.value) {
            Some(SettingValue::Bool(enabled)) => *enabled,
            _ => false,
        }
    }

    /// Static IPv4 configuration, or `None` when the device should use DHCP.
    pub fn static_ipv4(&self) -> Option<StaticIpv4> {
        let address = self.text_value(STATIC_IP_ADDRESS)?;
        if address == UNSET_ADDRESS {
            return None;
        }
        Some(StaticIpv4 {
            address,
            netmask: self
                .text_value(STATIC_NETMASK)
                .unwrap_or_else(|| UNSET_ADDRESS.to_string()),
            gateway: self
                .text_value(STATIC_GATEWAY)
                .unwrap_or_else(|| UNSET_ADDRESS.to_string()),
        })
    }

    fn text_value(&self, key: &str) -> Option<String> {
        match self.file.general.get(key).map(|e| &e.value) {
            Some(SettingValue::Text(text)) => Some(text.clone()),
            _ => None,
        }
    }
}

/// Add defaults for every recognized key not already present.
/// Returns true when anything was added.
fn backfill_defaults(file: &mut SettingsFile) -> bool {
    let mut changed = false;
    let defaults = [
        (
            WIFI_ENABLED,
            SettingEntry::bool_default(false, "Enabled if wifi version of the hub"),
        ),
        (
            STATIC_IP_ADDRESS,
            SettingEntry::text_default(UNSET_ADDRESS, "Static IP address for the hub"),
        ),
        (
            STATIC_GATEWAY,
            SettingEntry::text_default(UNSET_ADDRESS, "Gateway for static IP for the hub"),
        ),
        (
            STATIC_NETMASK,
            SettingEntry::text_default(UNSET_ADDRESS, "Netmask for static IP for the hub"),
        ),
    ];
    for (key, entry) in defaults {
        if !file.general.contains_key(key) {
            file.general.insert(key.to_string(), entry);
            changed = true;
        }
    }
    changed
}

fn write_settings(path: &Path, file: &SettingsFile) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut rendered = serde_json::to_string_pretty(file).map_err(std::io::Error::other)?;
    rendered.push('\n');
    std::fs::write(path, rendered)
}
