//! In-memory tracking runtime for tests, demos and host-less smoke runs.
//!
//! `MockRuntime` is a cheap handle: clones share one scripted state, so a
//! test can keep a clone and keep scripting devices while the pipeline owns
//! the other one (possibly on the poller thread).

use crate::math::{self, Quaternion};
use crate::runtime::{AppKind, DeviceProperty, RawEvent, RawEventKind, TrackingRuntime};
use crate::types::{ControllerRole, ControllerRoles, RawPose, TrackingOrigin, MAX_DEVICE_COUNT};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct MockState {
    installed: bool,
    ready: bool,
    ready_after_probes: Option<u32>,
    init_error: Option<String>,
    init_calls: u32,
    shutdown_calls: u32,
    last_app_kind: Option<AppKind>,
    poses: Vec<RawPose>,
    properties: HashMap<(u32, DeviceProperty), String>,
    property_queries: u32,
    events: VecDeque<RawEvent>,
    roles: ControllerRoles,
    runtime_path: Option<PathBuf>,
    pose_requests: u64,
    last_seconds_ahead: Option<f32>,
    last_origin: Option<TrackingOrigin>,
}

#[derive(Clone)]
pub struct MockRuntime {
    state: Arc<Mutex<MockState>>,
}

impl MockRuntime {
    /// An installed, ready runtime with every slot disconnected.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                installed: true,
                ready: true,
                ready_after_probes: None,
                init_error: None,
                init_calls: 0,
                shutdown_calls: 0,
                last_app_kind: None,
                poses: vec![RawPose::DISCONNECTED; MAX_DEVICE_COUNT],
                properties: HashMap::new(),
                property_queries: 0,
                events: VecDeque::new(),
                roles: ControllerRoles::default(),
                runtime_path: None,
                pose_requests: 0,
                last_seconds_ahead: None,
                last_origin: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_installed(&self, installed: bool) {
        self.state().installed = installed;
    }

    pub fn set_ready(&self, ready: bool) {
        let mut s = self.state();
        s.ready = ready;
        s.ready_after_probes = None;
    }

    /// Report not-ready for the next `probes` readiness checks, then ready.
    pub fn become_ready_after(&self, probes: u32) {
        let mut s = self.state();
        s.ready = false;
        s.ready_after_probes = Some(probes);
    }

    pub fn fail_init(&self, message: &str) {
        self.state().init_error = Some(message.to_string());
    }

    pub fn set_runtime_path(&self, path: impl Into<PathBuf>) {
        self.state().runtime_path = Some(path.into());
    }

    /// Plug a device into `index`: connected, tracking at the origin, with
    /// the given serial number, and queue an activation event.
    pub fn connect_device(&self, index: u32, serial: &str) {
        let mut s = self.state();
        if let Some(pose) = s.poses.get_mut(index as usize) {
            *pose = RawPose {
                pose_is_valid: true,
                device_is_connected: true,
                ..RawPose::DISCONNECTED
            };
        }
        s.properties
            .insert((index, DeviceProperty::SerialNumber), serial.to_string());
        s.events
            .push_back(RawEvent::new(RawEventKind::TrackedDeviceActivated, index));
    }

    /// Unplug the device at `index` and queue a deactivation event.
    pub fn disconnect_device(&self, index: u32) {
        let mut s = self.state();
        if let Some(pose) = s.poses.get_mut(index as usize) {
            *pose = RawPose::DISCONNECTED;
        }
        s.properties.retain(|(i, _), _| *i != index);
        s.events
            .push_back(RawEvent::new(RawEventKind::TrackedDeviceDeactivated, index));
    }

    pub fn set_property(&self, index: u32, prop: DeviceProperty, value: &str) {
        self.state().properties.insert((index, prop), value.to_string());
    }

    pub fn set_pose(&self, index: u32, position: [f64; 3], orientation: Quaternion) {
        if let Some(pose) = self.state().poses.get_mut(index as usize) {
            pose.device_to_absolute = math::matrix_from_pose(position, orientation);
        }
    }

    pub fn set_velocity(&self, index: u32, velocity: [f32; 3], angular_velocity: [f32; 3]) {
        if let Some(pose) = self.state().poses.get_mut(index as usize) {
            pose.velocity = velocity;
            pose.angular_velocity = angular_velocity;
        }
    }

    /// Toggle tracking loss without disconnecting.
    pub fn set_tracking(&self, index: u32, valid: bool) {
        if let Some(pose) = self.state().poses.get_mut(index as usize) {
            pose.pose_is_valid = valid;
        }
    }

    pub fn set_raw_pose(&self, index: u32, raw: RawPose) {
        if let Some(pose) = self.state().poses.get_mut(index as usize) {
            *pose = raw;
        }
    }

    pub fn set_role_index(&self, role: ControllerRole, index: Option<u32>) {
        let mut s = self.state();
        match role {
            ControllerRole::LeftHand => s.roles.left_hand = index,
            ControllerRole::RightHand => s.roles.right_hand = index,
        }
    }

    pub fn push_event(&self, event: RawEvent) {
        self.state().events.push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.state().events.len()
    }

    pub fn init_calls(&self) -> u32 {
        self.state().init_calls
    }

    pub fn shutdown_calls(&self) -> u32 {
        self.state().shutdown_calls
    }

    pub fn last_app_kind(&self) -> Option<AppKind> {
        self.state().last_app_kind
    }

    pub fn pose_requests(&self) -> u64 {
        self.state().pose_requests
    }

    pub fn last_seconds_ahead(&self) -> Option<f32> {
        self.state().last_seconds_ahead
    }

    pub fn last_origin(&self) -> Option<TrackingOrigin> {
        self.state().last_origin
    }

    pub fn property_queries(&self) -> u32 {
        self.state().property_queries
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingRuntime for MockRuntime {
    fn is_installed(&self) -> bool {
        self.state().installed
    }

    fn is_ready(&self) -> bool {
        let mut s = self.state();
        if let Some(remaining) = s.ready_after_probes {
            if remaining == 0 {
                s.ready = true;
                s.ready_after_probes = None;
            } else {
                s.ready_after_probes = Some(remaining - 1);
            }
        }
        s.ready
    }

    fn init(&mut self, kind: AppKind) -> std::result::Result<(), String> {
        let mut s = self.state();
        s.init_calls += 1;
        s.last_app_kind = Some(kind);
        match &s.init_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn shutdown(&mut self) {
        self.state().shutdown_calls += 1;
    }

    fn runtime_path(&self) -> Option<PathBuf> {
        self.state().runtime_path.clone()
    }

    /// Native prediction here is position-only: translation advanced by
    /// the linear velocity, orientation left as sampled.
    fn get_poses(&mut self, origin: TrackingOrigin, seconds_ahead: f32, out: &mut [RawPose]) {
        let mut s = self.state();
        s.pose_requests += 1;
        s.last_seconds_ahead = Some(seconds_ahead);
        s.last_origin = Some(origin);
        for (slot, raw) in out.iter_mut().zip(s.poses.iter()) {
            let mut pose = *raw;
            if seconds_ahead > 0.0 {
                for axis in 0..3 {
                    pose.device_to_absolute[axis][3] += pose.velocity[axis] * seconds_ahead;
                }
            }
            *slot = pose;
        }
    }

    fn poll_next_event(&mut self) -> Option<RawEvent> {
        self.state().events.pop_front()
    }

    fn string_property(&self, index: u32, prop: DeviceProperty) -> Option<String> {
        let mut s = self.state();
        s.property_queries += 1;
        s.properties.get(&(index, prop)).cloned()
    }

    fn device_index_for_role(&self, role: ControllerRole) -> Option<u32> {
        self.state().roles.index_for(role)
    }
}
