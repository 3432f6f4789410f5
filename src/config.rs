use crate::bindings::DEFAULT_SETTLE_DELAY;
use crate::predict::PredictionStrategy;
use crate::runtime::DEFAULT_INIT_TIMEOUT;
use crate::types::TrackingOrigin;
use std::path::PathBuf;
use std::time::Duration;

/// Where polling and sampling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// Inside [`Tracker::tick`](crate::Tracker::tick), on the caller's thread.
    #[default]
    RenderSynchronous,
    /// On a dedicated poller thread; `tick` only drains its output.
    Decoupled,
}

impl Schedule {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sync" | "render" => Some(Self::RenderSynchronous),
            "decoupled" | "thread" => Some(Self::Decoupled),
            _ => None,
        }
    }
}

/// Tracker settings. `Default` matches a standing-origin, unpredicted,
/// render-synchronous setup with role bindings enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub origin: TrackingOrigin,
    pub prediction: PredictionStrategy,
    /// Fixed display latency added on top of the time to the next refresh.
    pub predict_seconds: f64,
    pub use_role_bindings: bool,
    pub reload_settle: Duration,
    pub schedule: Schedule,
    pub init_timeout: Duration,
    /// Role settings document; discovered from the runtime when `None`.
    pub settings_path: Option<PathBuf>,
    /// Pause between decoupled poll cycles. Zero yields instead of sleeping.
    pub poll_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            origin: TrackingOrigin::Standing,
            prediction: PredictionStrategy::None,
            predict_seconds: 0.0,
            use_role_bindings: true,
            reload_settle: DEFAULT_SETTLE_DELAY,
            schedule: Schedule::RenderSynchronous,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            settings_path: None,
            poll_interval: Duration::ZERO,
        }
    }
}

impl TrackerConfig {
    /// Defaults overridden by `VRTRACK_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    /// name. Unparseable values are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let env = EnvReader { lookup: &lookup };

        if let Some(origin) = env.parsed("VRTRACK_ORIGIN", TrackingOrigin::from_name) {
            config.origin = origin;
        }
        if let Some(p) = env.parsed("VRTRACK_PREDICTION", PredictionStrategy::from_name) {
            config.prediction = p;
        }
        if let Some(s) = env.parsed("VRTRACK_PREDICT_SECONDS", |v| v.parse::<f64>().ok().filter(|s| s.is_finite())) {
            config.predict_seconds = s;
        }
        config.use_role_bindings = env.bool("VRTRACK_USE_ROLE_BINDINGS", config.use_role_bindings);
        if let Some(ms) = env.parsed("VRTRACK_RELOAD_SETTLE_MS", |v| v.parse::<u64>().ok()) {
            config.reload_settle = Duration::from_millis(ms);
        }
        if let Some(s) = env.parsed("VRTRACK_SCHEDULE", Schedule::from_name) {
            config.schedule = s;
        }
        if let Some(ms) = env.parsed("VRTRACK_INIT_TIMEOUT_MS", |v| v.parse::<u64>().ok()) {
            config.init_timeout = Duration::from_millis(ms);
        }
        if let Some(us) = env.parsed("VRTRACK_POLL_INTERVAL_US", |v| v.parse::<u64>().ok()) {
            config.poll_interval = Duration::from_micros(us);
        }
        if let Some(path) = env.raw("VRTRACK_SETTINGS_PATH") {
            config.settings_path = Some(PathBuf::from(path));
        }
        config
    }
}

struct EnvReader<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<'_, F> {
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let value = self.raw(name)?;
        let parsed = parse(&value.to_ascii_lowercase());
        if parsed.is_none() {
            log::warn!("Ignoring {}={:?}: unrecognized value", name, value);
        }
        parsed
    }

    fn bool(&self, name: &str, default: bool) -> bool {
        self.parsed(name, |v| match v {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
    }
}
