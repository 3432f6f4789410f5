//! C FFI layer for vrtrack.
//!
//! The host supplies the tracking runtime as a table of C callbacks and gets
//! back an opaque render-synchronous tracker. The generated C header is
//! written to `include/vrtrack.h` by cbindgen.

use crate::bus::{Notification, Subscription};
use crate::config::{Schedule, TrackerConfig};
use crate::dispatcher::Tracker;
use crate::error::LastError;
use crate::math::Quaternion;
use crate::predict::{predict, PredictionStrategy};
use crate::runtime::{AppKind, DeviceProperty, RawEvent, RawEventKind, TrackingRuntime};
use crate::types::{ControllerRole, NotificationKinds, Pose, RawPose, TrackingOrigin};
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

pub const VT_EVENT_DEVICE_ACTIVATED: u32 = 100;
pub const VT_EVENT_DEVICE_DEACTIVATED: u32 = 101;
pub const VT_EVENT_DEVICE_ROLE_CHANGED: u32 = 108;
pub const VT_EVENT_BUTTON_PRESS: u32 = 200;
pub const VT_EVENT_BUTTON_UNPRESS: u32 = 201;
pub const VT_EVENT_QUIT: u32 = 700;
pub const VT_EVENT_TRACKERS_SECTION_CHANGED: u32 = 866;

/// Raw pose as the host runtime reports it.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct VtRawPose {
    /// Row-major 3x4 device-to-tracking transform.
    pub device_to_absolute: [f32; 12],
    pub velocity: [f32; 3],
    pub angular_velocity: [f32; 3],
    pub pose_is_valid: bool,
    pub device_is_connected: bool,
}

impl VtRawPose {
    const DISCONNECTED: VtRawPose = VtRawPose {
        device_to_absolute: [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        velocity: [0.0; 3],
        angular_velocity: [0.0; 3],
        pose_is_valid: false,
        device_is_connected: false,
    };

    fn to_raw(self) -> RawPose {
        let m = self.device_to_absolute;
        RawPose {
            device_to_absolute: [
                [m[0], m[1], m[2], m[3]],
                [m[4], m[5], m[6], m[7]],
                [m[8], m[9], m[10], m[11]],
            ],
            velocity: self.velocity,
            angular_velocity: self.angular_velocity,
            pose_is_valid: self.pose_is_valid,
            device_is_connected: self.device_is_connected,
        }
    }
}

/// One runtime event. `kind` is one of the `VT_EVENT_*` codes.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct VtRawEvent {
    pub kind: u32,
    pub device_index: u32,
    pub button: u32,
}

/// Host-provided runtime. Every callback receives `user_data` first. Missing
/// callbacks behave as "nothing there".
#[repr(C)]
pub struct VtRuntimeCallbacks {
    pub user_data: *mut c_void,
    pub is_installed: Option<extern "C" fn(*mut c_void) -> bool>,
    pub is_ready: Option<extern "C" fn(*mut c_void) -> bool>,
    /// `app_kind`: 0 = scene, 1 = background. Returns 0 on success.
    pub init: Option<extern "C" fn(*mut c_void, c_int) -> c_int>,
    pub shutdown: Option<extern "C" fn(*mut c_void)>,
    /// Fill `count` poses. `origin`: 0 = seated, 1 = standing, 2 = raw.
    pub get_poses: Option<extern "C" fn(*mut c_void, c_int, f32, *mut VtRawPose, u32)>,
    /// Write the next event into the out pointer; false when the queue is empty.
    pub poll_next_event: Option<extern "C" fn(*mut c_void, *mut VtRawEvent) -> bool>,
    /// Write a NUL-terminated property into `buf` (capacity `len`). Returns
    /// the string length, or a negative value on failure.
    /// `prop`: 0 = serial number, 1 = model number, 2 = manufacturer.
    pub get_string_property: Option<extern "C" fn(*mut c_void, u32, c_int, *mut c_char, u32) -> c_int>,
    /// `role`: 0 = left hand, 1 = right hand. Returns a slot index or -1.
    pub device_index_for_role: Option<extern "C" fn(*mut c_void, c_int) -> c_int>,
}

struct CallbackRuntime {
    cb: VtRuntimeCallbacks,
    scratch: Vec<VtRawPose>,
}

// The tracker built over the callbacks is render-synchronous, so the
// callbacks are only ever invoked from the thread driving the tracker.
unsafe impl Send for CallbackRuntime {}

impl TrackingRuntime for CallbackRuntime {
    fn is_installed(&self) -> bool {
        self.cb.is_installed.map_or(true, |f| f(self.cb.user_data))
    }

    fn is_ready(&self) -> bool {
        self.cb.is_ready.map_or(true, |f| f(self.cb.user_data))
    }

    fn init(&mut self, kind: AppKind) -> std::result::Result<(), String> {
        match self.cb.init.map_or(0, |f| f(self.cb.user_data, kind as c_int)) {
            0 => Ok(()),
            code => Err(format!("init returned {}", code)),
        }
    }

    fn shutdown(&mut self) {
        if let Some(f) = self.cb.shutdown {
            f(self.cb.user_data);
        }
    }

    fn get_poses(&mut self, origin: TrackingOrigin, seconds_ahead: f32, out: &mut [RawPose]) {
        let Some(f) = self.cb.get_poses else {
            return;
        };
        self.scratch.clear();
        self.scratch.resize(out.len(), VtRawPose::DISCONNECTED);
        f(
            self.cb.user_data,
            origin as c_int,
            seconds_ahead,
            self.scratch.as_mut_ptr(),
            self.scratch.len() as u32,
        );
        for (slot, raw) in out.iter_mut().zip(self.scratch.iter()) {
            *slot = raw.to_raw();
        }
    }

    fn poll_next_event(&mut self) -> Option<RawEvent> {
        let f = self.cb.poll_next_event?;
        let mut event = VtRawEvent::default();
        if !f(self.cb.user_data, &mut event) {
            return None;
        }
        let kind = match event.kind {
            VT_EVENT_DEVICE_ACTIVATED => RawEventKind::TrackedDeviceActivated,
            VT_EVENT_DEVICE_DEACTIVATED => RawEventKind::TrackedDeviceDeactivated,
            VT_EVENT_DEVICE_ROLE_CHANGED => RawEventKind::TrackedDeviceRoleChanged,
            VT_EVENT_BUTTON_PRESS => RawEventKind::ButtonPress,
            VT_EVENT_BUTTON_UNPRESS => RawEventKind::ButtonUnpress,
            VT_EVENT_QUIT => RawEventKind::Quit,
            VT_EVENT_TRACKERS_SECTION_CHANGED => RawEventKind::TrackersSectionSettingChanged,
            other => RawEventKind::Other(other),
        };
        Some(RawEvent::button(kind, event.device_index, event.button))
    }

    fn string_property(&self, index: u32, prop: DeviceProperty) -> Option<String> {
        let f = self.cb.get_string_property?;
        let mut buf = [0 as c_char; 256];
        let n = f(self.cb.user_data, index, prop as c_int, buf.as_mut_ptr(), buf.len() as u32);
        if n < 0 {
            return None;
        }
        Some(c_char_to_string(&buf))
    }

    fn device_index_for_role(&self, role: ControllerRole) -> Option<u32> {
        let f = self.cb.device_index_for_role?;
        u32::try_from(f(self.cb.user_data, role as c_int)).ok()
    }
}

/// Tracker settings in C layout.
#[repr(C)]
pub struct VtConfig {
    /// 0 = seated, 1 = standing, 2 = raw.
    pub origin: c_int,
    /// 0 = none, 1 = native, 2 = linear, 3 = compare.
    pub prediction: c_int,
    pub predict_seconds: f64,
    pub use_role_bindings: bool,
    pub reload_settle_ms: u32,
    pub init_timeout_ms: u32,
    /// Role settings file, or NULL to discover it.
    pub settings_path: *const c_char,
}

impl VtConfig {
    unsafe fn to_config(&self) -> TrackerConfig {
        let defaults = TrackerConfig::default();
        TrackerConfig {
            origin: match self.origin {
                0 => TrackingOrigin::Seated,
                2 => TrackingOrigin::RawAndUncalibrated,
                _ => TrackingOrigin::Standing,
            },
            prediction: match self.prediction {
                1 => PredictionStrategy::Native,
                2 => PredictionStrategy::Linear,
                3 => PredictionStrategy::Compare,
                _ => PredictionStrategy::None,
            },
            predict_seconds: if self.predict_seconds.is_finite() { self.predict_seconds } else { 0.0 },
            use_role_bindings: self.use_role_bindings,
            reload_settle: Duration::from_millis(self.reload_settle_ms as u64),
            init_timeout: Duration::from_millis(self.init_timeout_ms as u64),
            settings_path: if self.settings_path.is_null() {
                None
            } else {
                Some(PathBuf::from(CStr::from_ptr(self.settings_path).to_string_lossy().into_owned()))
            },
            schedule: Schedule::RenderSynchronous,
            ..defaults
        }
    }
}

/// Pose in C layout, runtime (right-handed) convention.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct VtPose {
    pub position: [f64; 3],
    /// Quaternion [x, y, z, w].
    pub orientation: [f64; 4],
    pub velocity: [f64; 3],
    pub angular_velocity: [f64; 3],
    pub valid: bool,
    pub connected: bool,
}

impl From<&Pose> for VtPose {
    fn from(p: &Pose) -> Self {
        let q = p.orientation;
        VtPose {
            position: p.position,
            orientation: [q.x, q.y, q.z, q.w],
            velocity: p.velocity,
            angular_velocity: p.angular_velocity,
            valid: p.valid,
            connected: p.connected,
        }
    }
}

impl From<&VtPose> for Pose {
    fn from(p: &VtPose) -> Self {
        let [x, y, z, w] = p.orientation;
        Pose {
            position: p.position,
            orientation: Quaternion::new(x, y, z, w),
            velocity: p.velocity,
            angular_velocity: p.angular_velocity,
            valid: p.valid && p.connected,
            connected: p.connected,
        }
    }
}

/// A pose delivered under a binding name.
#[repr(C)]
pub struct VtBoundPose {
    /// NUL-terminated binding name, truncated to 63 bytes.
    pub binding: [c_char; 64],
    pub device_index: u32,
    pub pose: VtPose,
}

/// Opaque tracker handle for C consumers.
pub struct VtTracker {
    tracker: Tracker,
    bound: Subscription,
}

fn str_to_fixed<const N: usize>(s: &str) -> [c_char; N] {
    let mut buf = [0 as c_char; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N - 1);
    for (i, &b) in bytes[..len].iter().enumerate() {
        buf[i] = b as c_char;
    }
    buf
}

fn c_char_to_string(buf: &[c_char]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    let bytes: Vec<u8> = buf[..end].iter().map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).to_string()
}

/// Create a render-synchronous tracker over the host's runtime callbacks.
/// `config` may be NULL to use defaults with `VRTRACK_*` overrides.
/// Returns NULL if `callbacks` is NULL.
///
/// # Safety
/// `callbacks` must point to a valid `VtRuntimeCallbacks`; its `user_data`
/// must stay valid until `vt_tracker_destroy`. `config` must be valid or NULL.
#[no_mangle]
pub unsafe extern "C" fn vt_tracker_create(
    callbacks: *const VtRuntimeCallbacks,
    config: *const VtConfig,
) -> *mut VtTracker {
    if callbacks.is_null() {
        LAST_ERROR.set_message("callbacks is NULL");
        return std::ptr::null_mut();
    }
    let cb = std::ptr::read(callbacks);
    let config = if config.is_null() {
        TrackerConfig {
            schedule: Schedule::RenderSynchronous,
            ..TrackerConfig::from_env()
        }
    } else {
        (*config).to_config()
    };
    let runtime = CallbackRuntime {
        cb,
        scratch: Vec::new(),
    };
    let tracker = Tracker::new(Box::new(runtime), config);
    let bound = tracker.subscribe(NotificationKinds::BOUND_POSE);
    LAST_ERROR.clear();
    Box::into_raw(Box::new(VtTracker { tracker, bound }))
}

/// Connect to the runtime and load tracker roles. Returns 0 on success,
/// -1 on error (check `vt_last_error()`); the tracker stays usable but inert.
///
/// # Safety
/// `tracker` must be a pointer returned by `vt_tracker_create`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn vt_tracker_initialize(tracker: *mut VtTracker) -> c_int {
    if tracker.is_null() {
        return -1;
    }
    match (*tracker).tracker.initialize() {
        Ok(()) => 0,
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Destroy a tracker and release the runtime.
///
/// # Safety
/// `tracker` must be a pointer returned by `vt_tracker_create`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn vt_tracker_destroy(tracker: *mut VtTracker) {
    if !tracker.is_null() {
        drop(Box::from_raw(tracker));
    }
}

/// Run one tick and copy up to `max` of its bound poses into `out`.
/// Returns the number written, or -1 once the runtime has asked to quit.
///
/// # Safety
/// `tracker` must be valid or NULL; `out` must point to at least `max`
/// elements, or be NULL.
#[no_mangle]
pub unsafe extern "C" fn vt_tracker_tick(tracker: *mut VtTracker, out: *mut VtBoundPose, max: c_int) -> c_int {
    if tracker.is_null() {
        return -1;
    }
    let t = &mut *tracker;
    let report = t.tracker.tick();

    let mut written = 0usize;
    let capacity = if out.is_null() { 0 } else { max.max(0) as usize };
    for notification in t.bound.drain() {
        if let Notification::BoundPose { binding, pose, index } = notification {
            if written < capacity {
                out.add(written).write(VtBoundPose {
                    binding: str_to_fixed(&binding),
                    device_index: index,
                    pose: VtPose::from(&pose),
                });
                written += 1;
            }
        }
    }
    if report.quit {
        return -1;
    }
    written as c_int
}

/// Latest pose of slot `index`. Returns 0 on success, -1 if out of range.
///
/// # Safety
/// `tracker` and `out` must be valid pointers, or NULL.
#[no_mangle]
pub unsafe extern "C" fn vt_tracker_pose(tracker: *const VtTracker, index: u32, out: *mut VtPose) -> c_int {
    if tracker.is_null() || out.is_null() {
        return -1;
    }
    let frame = (*tracker).tracker.latest_frame();
    match frame.pose(index) {
        Some(pose) => {
            out.write(VtPose::from(pose));
            0
        }
        None => -1,
    }
}

/// Replace the explicit binding table from a JSON object of
/// serial → binding name. Returns false and keeps the current table if
/// the JSON is malformed.
///
/// # Safety
/// `tracker` must be valid or NULL; `json` must be a NUL-terminated string or NULL.
#[no_mangle]
pub unsafe extern "C" fn vt_tracker_set_bindings_json(tracker: *mut VtTracker, json: *const c_char) -> bool {
    if tracker.is_null() || json.is_null() {
        return false;
    }
    let json = match CStr::from_ptr(json).to_str() {
        Ok(s) => s,
        Err(_) => {
            LAST_ERROR.set_message("binding JSON is not valid UTF-8");
            return false;
        }
    };
    match (*tracker).tracker.bindings().load_bindings_json(json) {
        Ok(()) => true,
        Err(e) => {
            LAST_ERROR.set(&e);
            false
        }
    }
}

/// Explicit binding table as JSON. Free with `vt_string_free`.
///
/// # Safety
/// `tracker` must be valid or NULL.
#[no_mangle]
pub unsafe extern "C" fn vt_tracker_bindings_json(tracker: *const VtTracker) -> *mut c_char {
    if tracker.is_null() {
        return std::ptr::null_mut();
    }
    let json = match (*tracker).tracker.bindings().bindings_json() {
        Ok(json) => json,
        Err(e) => {
            LAST_ERROR.set(&e);
            return std::ptr::null_mut();
        }
    };
    match CString::new(json) {
        Ok(s) => s.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Free a string returned by this library.
///
/// # Safety
/// `s` must come from `vt_tracker_bindings_json`, or be NULL.
#[no_mangle]
pub unsafe extern "C" fn vt_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Reload tracker roles after the configured settle delay.
///
/// # Safety
/// `tracker` must be valid or NULL.
#[no_mangle]
pub unsafe extern "C" fn vt_tracker_trigger_role_reload(tracker: *mut VtTracker) {
    if !tracker.is_null() {
        (*tracker).tracker.trigger_role_reload(Instant::now());
    }
}

/// Seconds on the tracker's display clock.
///
/// # Safety
/// `tracker` must be valid or NULL.
#[no_mangle]
pub unsafe extern "C" fn vt_tracker_clock_seconds(tracker: *const VtTracker) -> f64 {
    if tracker.is_null() {
        return 0.0;
    }
    (*tracker).tracker.frame_clock().now_s()
}

/// Report a display refresh at `timestamp_s` on the tracker's clock, or now
/// if `timestamp_s` is negative.
///
/// # Safety
/// `tracker` must be valid or NULL.
#[no_mangle]
pub unsafe extern "C" fn vt_display_refresh(tracker: *const VtTracker, timestamp_s: f64) {
    if tracker.is_null() {
        return;
    }
    let clock = (*tracker).tracker.frame_clock();
    if timestamp_s >= 0.0 {
        clock.on_display_refresh(timestamp_s);
    } else {
        clock.on_display_refresh_now();
    }
}

/// Extrapolate `pose` by `delta` seconds. Returns 0 on success.
///
/// # Safety
/// `pose` and `out` must be valid pointers, or NULL.
#[no_mangle]
pub unsafe extern "C" fn vt_predict_pose(pose: *const VtPose, delta: f64, out: *mut VtPose) -> c_int {
    if pose.is_null() || out.is_null() {
        return -1;
    }
    let predicted = predict(&Pose::from(&*pose), delta);
    out.write(VtPose::from(&predicted));
    0
}

/// Convert a pose to the left-handed (Z-negated) convention.
#[no_mangle]
pub extern "C" fn vt_pose_to_left_handed(pose: VtPose) -> VtPose {
    VtPose::from(&Pose::from(&pose).to_left_handed())
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next vrtrack API call.
#[no_mangle]
pub extern "C" fn vt_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct FakeHost {
        events: VecDeque<VtRawEvent>,
        shutdowns: u32,
    }

    extern "C" fn host_get_poses(_ud: *mut c_void, _origin: c_int, _ahead: f32, out: *mut VtRawPose, count: u32) {
        let poses = unsafe { std::slice::from_raw_parts_mut(out, count as usize) };
        let mut p = VtRawPose::DISCONNECTED;
        p.device_to_absolute[7] = 1.25;
        p.pose_is_valid = true;
        p.device_is_connected = true;
        poses[3] = p;
    }

    extern "C" fn host_poll(ud: *mut c_void, out: *mut VtRawEvent) -> bool {
        let host = unsafe { &mut *(ud as *mut FakeHost) };
        match host.events.pop_front() {
            Some(e) => {
                unsafe { out.write(e) };
                true
            }
            None => false,
        }
    }

    extern "C" fn host_prop(_ud: *mut c_void, index: u32, prop: c_int, buf: *mut c_char, len: u32) -> c_int {
        if index != 3 || prop != 0 {
            return -1;
        }
        let serial = b"LHR-ABC123\0";
        assert!(serial.len() <= len as usize);
        for (i, &b) in serial.iter().enumerate() {
            unsafe { *buf.add(i) = b as c_char };
        }
        (serial.len() - 1) as c_int
    }

    extern "C" fn host_shutdown(ud: *mut c_void) {
        let host = unsafe { &mut *(ud as *mut FakeHost) };
        host.shutdowns += 1;
    }

    fn callbacks(host: &mut FakeHost) -> VtRuntimeCallbacks {
        VtRuntimeCallbacks {
            user_data: host as *mut FakeHost as *mut c_void,
            is_installed: None,
            is_ready: None,
            init: None,
            shutdown: Some(host_shutdown),
            get_poses: Some(host_get_poses),
            poll_next_event: Some(host_poll),
            get_string_property: Some(host_prop),
            device_index_for_role: None,
        }
    }

    fn config() -> VtConfig {
        VtConfig {
            origin: 1,
            prediction: 0,
            predict_seconds: 0.0,
            use_role_bindings: false,
            reload_settle_ms: 1000,
            init_timeout_ms: 1000,
            settings_path: std::ptr::null(),
        }
    }

    #[test]
    fn test_tick_through_c_abi() {
        let mut host = FakeHost {
            events: VecDeque::from([VtRawEvent {
                kind: VT_EVENT_DEVICE_ACTIVATED,
                device_index: 3,
                button: 0,
            }]),
            shutdowns: 0,
        };
        let cb = callbacks(&mut host);
        let cfg = config();

        unsafe {
            let t = vt_tracker_create(&cb, &cfg);
            assert!(!t.is_null());
            assert_eq!(vt_tracker_initialize(t), 0);

            let json = CString::new(r#"{"LHR-ABC123": "tracker.waist"}"#).unwrap();
            assert!(vt_tracker_set_bindings_json(t, json.as_ptr()));
            let bad = CString::new("{oops").unwrap();
            assert!(!vt_tracker_set_bindings_json(t, bad.as_ptr()));
            assert!(!vt_last_error().is_null());

            let mut out: Vec<VtBoundPose> = Vec::with_capacity(4);
            let n = vt_tracker_tick(t, out.as_mut_ptr(), 4);
            assert_eq!(n, 1);
            out.set_len(n as usize);
            assert_eq!(c_char_to_string(&out[0].binding), "tracker.waist");
            assert_eq!(out[0].device_index, 3);
            assert!((out[0].pose.position[1] - 1.25).abs() < 1e-6);

            let mut pose = VtPose::from(&Pose::INVALID);
            assert_eq!(vt_tracker_pose(t, 3, &mut pose), 0);
            assert!(pose.valid && pose.connected);
            assert_eq!(vt_tracker_pose(t, 64, &mut pose), -1);

            let s = vt_tracker_bindings_json(t);
            assert_eq!(CStr::from_ptr(s).to_str().unwrap(), r#"{"LHR-ABC123":"tracker.waist"}"#);
            vt_string_free(s);

            vt_tracker_destroy(t);
        }
        assert_eq!(host.shutdowns, 1);
    }

    #[test]
    fn test_quit_reported_as_negative() {
        let mut host = FakeHost {
            events: VecDeque::from([VtRawEvent {
                kind: VT_EVENT_QUIT,
                device_index: 0,
                button: 0,
            }]),
            shutdowns: 0,
        };
        let cb = callbacks(&mut host);
        let cfg = config();
        unsafe {
            let t = vt_tracker_create(&cb, &cfg);
            assert_eq!(vt_tracker_initialize(t), 0);
            assert_eq!(vt_tracker_tick(t, std::ptr::null_mut(), 0), -1);
            vt_tracker_destroy(t);
        }
    }

    #[test]
    fn test_predict_pose_abi() {
        let pose = VtPose {
            position: [0.0, 1.0, 0.0],
            orientation: [0.0, 0.0, 0.0, 1.0],
            velocity: [0.0, 0.0, -2.0],
            angular_velocity: [0.0; 3],
            valid: true,
            connected: true,
        };
        let mut out = pose;
        assert_eq!(unsafe { vt_predict_pose(&pose, 0.25, &mut out) }, 0);
        assert!((out.position[2] + 0.5).abs() < 1e-12);

        let lh = vt_pose_to_left_handed(out);
        assert!((lh.position[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_null_handles_are_safe() {
        unsafe {
            assert!(vt_tracker_create(std::ptr::null(), std::ptr::null()).is_null());
            assert_eq!(vt_tracker_tick(std::ptr::null_mut(), std::ptr::null_mut(), 0), -1);
            assert!(vt_tracker_bindings_json(std::ptr::null()).is_null());
            vt_tracker_destroy(std::ptr::null_mut());
            vt_string_free(std::ptr::null_mut());
        }
    }

    #[test]
    fn test_long_binding_names_truncate() {
        let fixed: [c_char; 64] = str_to_fixed(&"x".repeat(100));
        assert_eq!(c_char_to_string(&fixed).len(), 63);
        assert_eq!(fixed[63], 0);
    }
}
