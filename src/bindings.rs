//! Serial-number to binding-name resolution.
//!
//! Two tables are kept side by side: the explicit table, owned by the
//! application, and the role table, rebuilt from the runtime's tracker role
//! settings. Both are published through `ArcSwap`, so `resolve` is a pair of
//! atomic loads and never waits on a reload.

use crate::{Result, TrackerError};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Device-path prefix in front of the serial number in the trackers section.
pub const TRACKER_PATH_PREFIX: &str = "/devices/htc/vive_tracker";

/// File name of the runtime's settings document.
pub const SETTINGS_FILE_NAME: &str = "steamvr.vrsettings";

/// Default wait between the settings-changed signal and the reload.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Serial number → binding name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingTable(BTreeMap<String, String>);

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, serial: &str) -> Option<&str> {
        self.0.get(serial).map(String::as_str)
    }

    pub fn insert(&mut self, serial: impl Into<String>, binding: impl Into<String>) -> Option<String> {
        self.0.insert(serial.into(), binding.into())
    }

    pub fn remove(&mut self, serial: &str) -> Option<String> {
        self.0.remove(serial)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse a flat `{"serial": "binding"}` object.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TrackerError::MalformedBindings(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BindingTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Where role-derived bindings come from.
pub trait RoleSource: Send + Sync {
    /// Read the full role table.
    fn load(&self) -> Result<BindingTable>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// Roles read from the runtime's settings document.
#[derive(Debug, Default)]
pub struct SettingsFileSource {
    explicit_path: Option<PathBuf>,
    runtime_path: Option<PathBuf>,
    /// Path resolved by the last `load`.
    resolved: Mutex<Option<PathBuf>>,
}

impl SettingsFileSource {
    /// `explicit_path` wins when set; otherwise the path registry and then
    /// the runtime install directory are consulted on every load.
    pub fn new(explicit_path: Option<PathBuf>, runtime_path: Option<PathBuf>) -> Self {
        Self {
            explicit_path,
            runtime_path,
            resolved: Mutex::new(None),
        }
    }

    pub fn settings_path(&self) -> Option<PathBuf> {
        if let Some(p) = &self.explicit_path {
            return Some(p.clone());
        }
        discover_settings_path(vrpath_registry_path().as_deref(), self.runtime_path.as_deref())
    }
}

impl RoleSource for SettingsFileSource {
    fn load(&self) -> Result<BindingTable> {
        let found = self.settings_path();
        *lock(&self.resolved) = found.clone();
        let Some(path) = found else {
            log::warn!("Could not locate {}, no tracker roles loaded", SETTINGS_FILE_NAME);
            return Ok(BindingTable::new());
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("Could not find runtime settings file {}", path.display());
                return Ok(BindingTable::new());
            }
            Err(e) => return Err(e.into()),
        };
        parse_role_settings(&text)
    }

    fn describe(&self) -> String {
        match lock(&self.resolved).as_ref() {
            Some(p) => p.display().to_string(),
            None => format!("<{} not found>", SETTINGS_FILE_NAME),
        }
    }
}

/// In-memory role table, replaced wholesale with [`set`](Self::set).
#[derive(Default)]
pub struct StaticRoleSource {
    table: ArcSwap<BindingTable>,
}

impl StaticRoleSource {
    pub fn new(table: BindingTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    pub fn set(&self, table: BindingTable) {
        self.table.store(Arc::new(table));
    }
}

impl RoleSource for StaticRoleSource {
    fn load(&self) -> Result<BindingTable> {
        Ok(BindingTable::clone(&self.table.load()))
    }

    fn describe(&self) -> String {
        "static role table".to_string()
    }
}

/// Extract the trackers section of a settings document, with the device-path
/// prefix stripped from each key. A document without the section yields an
/// empty table.
pub fn parse_role_settings(json: &str) -> Result<BindingTable> {
    let doc: serde_json::Value =
        serde_json::from_str(json).map_err(|e| TrackerError::RoleConfig(e.to_string()))?;
    let doc = doc
        .as_object()
        .ok_or_else(|| TrackerError::RoleConfig("settings document is not an object".to_string()))?;
    let Some(trackers) = doc.get("trackers") else {
        return Ok(BindingTable::new());
    };
    let trackers: BTreeMap<String, String> = serde_json::from_value(trackers.clone())
        .map_err(|e| TrackerError::RoleConfig(format!("trackers section: {}", e)))?;

    Ok(trackers
        .into_iter()
        .map(|(key, role)| match key.strip_prefix(TRACKER_PATH_PREFIX) {
            Some(serial) => (serial.to_string(), role),
            None => (key, role),
        })
        .collect())
}

#[derive(Deserialize)]
struct VrPathRegistry {
    #[serde(default)]
    config: Vec<String>,
}

/// First entry of the `"config"` list in the runtime path registry.
pub fn config_dir_from_vrpath(json: &str) -> Result<Option<PathBuf>> {
    let registry: VrPathRegistry = serde_json::from_str(json)?;
    Ok(registry.config.into_iter().next().map(PathBuf::from))
}

/// `<local data dir>/openvr/openvrpaths.vrpath`
pub fn vrpath_registry_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("openvr").join("openvrpaths.vrpath"))
}

/// Locate the settings document: the config directory named by the path
/// registry, else `<runtime>/../../../config`.
pub fn discover_settings_path(registry: Option<&Path>, runtime_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(registry) = registry {
        match fs::read_to_string(registry) {
            Ok(text) => match config_dir_from_vrpath(&text) {
                Ok(Some(dir)) => return Some(dir.join(SETTINGS_FILE_NAME)),
                Ok(None) => log::debug!("{} lists no config directory", registry.display()),
                Err(e) => log::warn!("Could not parse {}: {}", registry.display(), e),
            },
            Err(_) => log::warn!("Could not find {}", registry.display()),
        }
    }
    runtime_path.map(|rt| rt.join("../../../config").join(SETTINGS_FILE_NAME))
}

/// Deadline for a pending role reload.
#[derive(Debug, Clone)]
pub struct ReloadTimer {
    settle: Duration,
    deadline: Option<Instant>,
}

impl ReloadTimer {
    pub fn new(settle: Duration) -> Self {
        Self { settle, deadline: None }
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// Arm for `now + settle`. Arming again while armed keeps the original
    /// deadline. Returns true if this call armed the timer.
    pub fn arm(&mut self, now: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + self.settle);
        true
    }

    /// Disarm. Returns true if a reload was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True exactly once, on the first call at or after the deadline.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Binding names found for one serial number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedBindings {
    pub explicit: Option<String>,
    pub role: Option<String>,
}

impl ResolvedBindings {
    pub fn is_empty(&self) -> bool {
        self.explicit.is_none() && self.role.is_none()
    }

    /// Explicit name first, then the role name. Equal names are both kept.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.explicit.as_deref().into_iter().chain(self.role.as_deref())
    }
}

pub struct BindingResolver {
    explicit: ArcSwap<BindingTable>,
    role: ArcSwap<BindingTable>,
    role_source: Mutex<Arc<dyn RoleSource>>,
    timer: Mutex<ReloadTimer>,
}

impl BindingResolver {
    pub fn new(role_source: Arc<dyn RoleSource>, settle: Duration) -> Self {
        Self {
            explicit: ArcSwap::from_pointee(BindingTable::new()),
            role: ArcSwap::from_pointee(BindingTable::new()),
            role_source: Mutex::new(role_source),
            timer: Mutex::new(ReloadTimer::new(settle)),
        }
    }

    pub fn resolve(&self, serial: &str) -> ResolvedBindings {
        ResolvedBindings {
            explicit: self.explicit.load().get(serial).map(str::to_string),
            role: self.role.load().get(serial).map(str::to_string),
        }
    }

    pub fn explicit_bindings(&self) -> Arc<BindingTable> {
        self.explicit.load_full()
    }

    pub fn role_bindings(&self) -> Arc<BindingTable> {
        self.role.load_full()
    }

    pub fn set_bindings(&self, table: BindingTable) {
        self.explicit.store(Arc::new(table));
    }

    /// Replace the explicit table from JSON. On error the current table is
    /// left as it was.
    pub fn load_bindings_json(&self, json: &str) -> Result<()> {
        match BindingTable::from_json(json) {
            Ok(table) => {
                log::debug!("Loaded {} explicit bindings", table.len());
                self.set_bindings(table);
                Ok(())
            }
            Err(e) => {
                log::warn!("Rejected binding data: {}", e);
                Err(e)
            }
        }
    }

    pub fn bindings_json(&self) -> Result<String> {
        self.explicit.load().to_json()
    }

    pub fn set_role_source(&self, source: Arc<dyn RoleSource>) {
        *lock(&self.role_source) = source;
    }

    /// Re-read the role source and swap the role table in one step. On
    /// error the current table is kept.
    pub fn reload_role_bindings(&self) -> Result<()> {
        let source = Arc::clone(&lock(&self.role_source));
        match source.load() {
            Ok(table) => {
                log::info!("Loaded {} tracker roles from {}", table.len(), source.describe());
                self.role.store(Arc::new(table));
                Ok(())
            }
            Err(e) => {
                log::warn!("Keeping previous tracker roles, {} unreadable: {}", source.describe(), e);
                Err(e)
            }
        }
    }

    /// Ask for a reload once the settle delay has passed since `now`.
    pub fn schedule_role_reload(&self, now: Instant) {
        let mut timer = lock(&self.timer);
        if timer.arm(now) {
            log::info!("Tracker roles changed, reloading in {:?}", timer.settle());
        }
    }

    /// Run a scheduled reload if its deadline has passed. `Ok(true)` means
    /// the role table was swapped.
    pub fn poll_reload(&self, now: Instant) -> Result<bool> {
        if !lock(&self.timer).fire_if_due(now) {
            return Ok(false);
        }
        self.reload_role_bindings().map(|()| true)
    }

    pub fn cancel_reload(&self) -> bool {
        lock(&self.timer).cancel()
    }

    pub fn reload_pending(&self) -> bool {
        lock(&self.timer).is_armed()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
