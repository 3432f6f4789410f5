//! Boundary to the external real-time tracking runtime.
//!
//! [`TrackingRuntime`] is the only seam through which the pipeline touches
//! the runtime. [`RuntimeSession`] wraps it with the init/inert lifecycle:
//! until initialization succeeds every call short-circuits to "nothing
//! there" instead of failing.

use crate::types::{ControllerRole, RawPose, TrackingOrigin};
use crate::{Result, TrackerError};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Default bound on waiting for the runtime to become ready.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Returned by [`RuntimeSession::string_property`] when a query fails.
pub const UNKNOWN_PROPERTY: &str = "<unknown>";

/// Application type passed to the runtime's init call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppKind {
    /// Full scene application; starts the runtime if it is not running.
    Scene = 0,
    /// Tracking-only client that never claims the display.
    Background = 1,
}

/// String properties queried per device slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProperty {
    SerialNumber = 0,
    ModelNumber = 1,
    ManufacturerName = 2,
}

/// Raw runtime event classes the pump understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    TrackedDeviceActivated,
    TrackedDeviceDeactivated,
    TrackedDeviceRoleChanged,
    ButtonPress,
    ButtonUnpress,
    Quit,
    /// The runtime rewrote the trackers section of its settings document.
    TrackersSectionSettingChanged,
    Other(u32),
}

/// One entry of the runtime's event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawEventKind,
    pub device_index: u32,
    /// Button id for press/unpress events, 0 otherwise.
    pub button: u32,
}

impl RawEvent {
    pub fn new(kind: RawEventKind, device_index: u32) -> Self {
        Self {
            kind,
            device_index,
            button: 0,
        }
    }

    pub fn button(kind: RawEventKind, device_index: u32, button: u32) -> Self {
        Self {
            kind,
            device_index,
            button,
        }
    }
}

/// Calls the pipeline makes into the tracking runtime.
///
/// Implementations must not block: `get_poses` and `poll_next_event` are
/// called from the hot polling loop.
pub trait TrackingRuntime: Send {
    /// Whether the runtime is installed on this machine at all.
    fn is_installed(&self) -> bool;

    /// Whether the runtime is up with a display present.
    fn is_ready(&self) -> bool;

    fn init(&mut self, kind: AppKind) -> std::result::Result<(), String>;

    fn shutdown(&mut self);

    /// Install directory of the runtime, used to locate its settings.
    fn runtime_path(&self) -> Option<PathBuf> {
        None
    }

    /// Fill `out` (one entry per slot) with poses `seconds_ahead` from now.
    fn get_poses(&mut self, origin: TrackingOrigin, seconds_ahead: f32, out: &mut [RawPose]);

    fn poll_next_event(&mut self) -> Option<RawEvent>;

    fn string_property(&self, index: u32, prop: DeviceProperty) -> Option<String>;

    fn device_index_for_role(&self, role: ControllerRole) -> Option<u32>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Inert,
    Ready,
}

/// A tracking runtime plus its initialization state.
pub struct RuntimeSession {
    runtime: Box<dyn TrackingRuntime>,
    state: SessionState,
    init_timeout: Duration,
}

impl RuntimeSession {
    pub fn new(runtime: Box<dyn TrackingRuntime>, init_timeout: Duration) -> Self {
        Self {
            runtime,
            state: SessionState::Inert,
            init_timeout,
        }
    }

    /// Connect to the runtime.
    ///
    /// If the runtime is installed but not running, a scene-type session is
    /// opened to start it, the call spin-waits up to the init timeout for it
    /// to become ready, and the bootstrap session is closed again before the
    /// real background-client init. Any failure leaves the session inert.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state == SessionState::Ready {
            return Ok(());
        }

        if !self.runtime.is_installed() {
            log::error!("Tracking runtime not installed");
            return Err(TrackerError::RuntimeNotInstalled);
        }

        if !self.runtime.is_ready() {
            log::info!("Tracking runtime not ready, starting it");
            if let Err(e) = self.runtime.init(AppKind::Scene) {
                log::warn!("Bootstrap init failed: {}", e);
            }
            let runtime = &self.runtime;
            let ready = spin_until(self.init_timeout, || runtime.is_ready());
            self.runtime.shutdown();
            if !ready {
                log::error!(
                    "Tracking runtime did not become ready within {:?}",
                    self.init_timeout
                );
                return Err(TrackerError::InitTimeout(self.init_timeout));
            }
        }

        if let Err(e) = self.runtime.init(AppKind::Background) {
            log::error!("Could not initialize tracking: {}", e);
            return Err(TrackerError::InitFailed(e));
        }

        self.state = SessionState::Ready;
        log::info!("Initialized tracking runtime");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// The runtime, or `None` while the session is inert.
    pub fn runtime_mut(&mut self) -> Option<&mut dyn TrackingRuntime> {
        match self.state {
            SessionState::Ready => Some(self.runtime.as_mut()),
            SessionState::Inert => None,
        }
    }

    pub fn runtime(&self) -> Option<&dyn TrackingRuntime> {
        match self.state {
            SessionState::Ready => Some(self.runtime.as_ref()),
            SessionState::Inert => None,
        }
    }

    pub fn runtime_path(&self) -> Option<PathBuf> {
        self.runtime.runtime_path()
    }

    /// String property of a slot, or [`UNKNOWN_PROPERTY`] on failure.
    pub fn string_property(&self, index: u32, prop: DeviceProperty) -> String {
        self.runtime()
            .and_then(|rt| rt.string_property(index, prop))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_PROPERTY.to_string())
    }

    /// Release the runtime and return to the inert state.
    pub fn shutdown(&mut self) {
        if self.state == SessionState::Ready {
            self.runtime.shutdown();
            self.state = SessionState::Inert;
            log::info!("Tracking runtime shut down");
        }
    }
}

impl Drop for RuntimeSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Busy-wait until `cond` holds or `timeout` elapses. Spins briefly, then
/// yields the thread between probes.
fn spin_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    let mut spins: u32 = 0;
    loop {
        if cond() {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        if spins < 64 {
            spins += 1;
            std::hint::spin_loop();
        } else {
            std::thread::yield_now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRuntime;

    #[test]
    fn test_not_installed_stays_inert() {
        let mock = MockRuntime::new();
        mock.set_installed(false);
        let mut session = RuntimeSession::new(Box::new(mock.clone()), DEFAULT_INIT_TIMEOUT);

        let err = session.initialize().unwrap_err();
        assert!(matches!(err, TrackerError::RuntimeNotInstalled));
        assert!(!session.is_ready());
        assert!(session.runtime_mut().is_none());
        assert_eq!(mock.init_calls(), 0);
    }

    #[test]
    fn test_init_timeout_when_never_ready() {
        let mock = MockRuntime::new();
        mock.set_ready(false);
        let mut session =
            RuntimeSession::new(Box::new(mock.clone()), Duration::from_millis(30));

        let start = Instant::now();
        let err = session.initialize().unwrap_err();
        assert!(matches!(err, TrackerError::InitTimeout(_)));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(!session.is_ready());
        // Bootstrap session was opened and closed again.
        assert_eq!(mock.init_calls(), 1);
        assert_eq!(mock.shutdown_calls(), 1);
    }

    #[test]
    fn test_bootstrap_then_background_init() {
        let mock = MockRuntime::new();
        mock.set_ready(false);
        mock.become_ready_after(5);
        let mut session = RuntimeSession::new(Box::new(mock.clone()), DEFAULT_INIT_TIMEOUT);

        session.initialize().unwrap();
        assert!(session.is_ready());
        assert_eq!(mock.init_calls(), 2);
        assert_eq!(mock.last_app_kind(), Some(AppKind::Background));
    }

    #[test]
    fn test_init_failure_is_reported() {
        let mock = MockRuntime::new();
        mock.fail_init("VRInitError_Init_HmdNotFound");
        let mut session = RuntimeSession::new(Box::new(mock), DEFAULT_INIT_TIMEOUT);

        match session.initialize() {
            Err(TrackerError::InitFailed(msg)) => assert!(msg.contains("HmdNotFound")),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!session.is_ready());
    }

    #[test]
    fn test_reinitialize_after_failure() {
        let mock = MockRuntime::new();
        mock.set_installed(false);
        let mut session = RuntimeSession::new(Box::new(mock.clone()), DEFAULT_INIT_TIMEOUT);
        assert!(session.initialize().is_err());

        mock.set_installed(true);
        session.initialize().unwrap();
        assert!(session.is_ready());
    }

    #[test]
    fn test_string_property_sentinel() {
        let mock = MockRuntime::new();
        mock.connect_device(3, "LHR-ABC123");
        let mut session = RuntimeSession::new(Box::new(mock), DEFAULT_INIT_TIMEOUT);

        // Inert session never reaches the runtime.
        assert_eq!(session.string_property(3, DeviceProperty::SerialNumber), UNKNOWN_PROPERTY);

        session.initialize().unwrap();
        assert_eq!(session.string_property(3, DeviceProperty::SerialNumber), "LHR-ABC123");
        assert_eq!(session.string_property(9, DeviceProperty::SerialNumber), UNKNOWN_PROPERTY);
    }

    #[test]
    fn test_shutdown_returns_to_inert() {
        let mock = MockRuntime::new();
        let mut session = RuntimeSession::new(Box::new(mock.clone()), DEFAULT_INIT_TIMEOUT);
        session.initialize().unwrap();
        session.shutdown();
        assert!(!session.is_ready());
        assert_eq!(mock.shutdown_calls(), 1);
        drop(session);
        assert_eq!(mock.shutdown_calls(), 1);
    }
}
