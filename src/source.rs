//! The runtime-facing half of a tick: events in, one [`TrackingFrame`] out.
//!
//! [`TrackingSource`] is the only owner of the runtime session. It runs
//! either inline on the caller's thread or inside the poller, and publishes
//! everything downstream code needs (poses, serial numbers, controller-role
//! slots) in the frame so nothing else has to call into the runtime.

use crate::config::TrackerConfig;
use crate::device::DeviceTable;
use crate::predict::{PoseDivergence, PosePredictor, PredictionStrategy};
use crate::pump::{DeviceEventPump, PumpOutput};
use crate::runtime::{DeviceProperty, RuntimeSession, TrackingRuntime};
use crate::sampler::PoseSampler;
use crate::timing::FrameClock;
use crate::types::{invalid_pose_array, ControllerRoles, Pose, PoseArray, TrackingOrigin, MAX_DEVICE_COUNT};
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// One sampled pose array plus the device identity that goes with it.
#[derive(Debug, Clone)]
pub struct TrackingFrame {
    /// Increments once per sample; 0 for a frame never sampled.
    pub sequence: u64,
    pub poses: Box<PoseArray>,
    /// Serial number per slot, `None` while unknown or disconnected.
    pub serials: Vec<Option<Arc<str>>>,
    pub controller_roles: ControllerRoles,
    /// Lookahead the poses were predicted with, seconds.
    pub prediction_delta: f64,
}

impl TrackingFrame {
    pub fn empty() -> Self {
        Self {
            sequence: 0,
            poses: invalid_pose_array(),
            serials: vec![None; MAX_DEVICE_COUNT],
            controller_roles: ControllerRoles::default(),
            prediction_delta: 0.0,
        }
    }

    pub fn pose(&self, index: u32) -> Option<&Pose> {
        self.poses.get(index as usize)
    }

    pub fn serial(&self, index: u32) -> Option<&str> {
        self.serials.get(index as usize)?.as_deref()
    }

    /// Slot index of the device with `serial`, if it is in this frame.
    pub fn index_of_serial(&self, serial: &str) -> Option<u32> {
        self.serials
            .iter()
            .position(|s| s.as_deref() == Some(serial))
            .map(|i| i as u32)
    }

    /// Connected, validly tracked slots with a known serial number.
    pub fn tracked(&self) -> impl Iterator<Item = (u32, &Pose, &str)> + '_ {
        self.poses
            .iter()
            .zip(self.serials.iter())
            .enumerate()
            .filter_map(|(i, (pose, serial))| {
                let serial = serial.as_deref()?;
                pose.is_tracked().then_some((i as u32, pose, serial))
            })
    }
}

impl Default for TrackingFrame {
    fn default() -> Self {
        Self::empty()
    }
}

pub struct TrackingSource {
    session: RuntimeSession,
    pump: DeviceEventPump,
    sampler: PoseSampler,
    predictor: PosePredictor,
    devices: DeviceTable,
    origin: TrackingOrigin,
    sequence: u64,
}

impl TrackingSource {
    pub fn new(runtime: Box<dyn TrackingRuntime>, config: &TrackerConfig) -> Self {
        Self {
            session: RuntimeSession::new(runtime, config.init_timeout),
            pump: DeviceEventPump::new(),
            sampler: PoseSampler::new(),
            predictor: PosePredictor::new(config.prediction),
            devices: DeviceTable::new(),
            origin: config.origin,
            sequence: 0,
        }
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.session.initialize()?;
        self.devices.refresh_controller_roles(&self.session);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub fn runtime_path(&self) -> Option<PathBuf> {
        self.session.runtime_path()
    }

    pub fn devices(&self) -> &DeviceTable {
        &self.devices
    }

    pub fn string_property(&self, index: u32, prop: DeviceProperty) -> String {
        self.session.string_property(index, prop)
    }

    /// Drain runtime events and fold them into the device table. A quit
    /// request shuts the session down; later polls and samples are inert.
    pub fn poll_events(&mut self) -> PumpOutput {
        let out = self.pump.poll(&mut self.session);
        let mut roles_dirty = false;
        for event in &out.events {
            roles_dirty |= self.devices.apply(event);
        }
        if out.quit {
            self.session.shutdown();
            self.devices.reset();
        } else if roles_dirty {
            self.devices.refresh_controller_roles(&self.session);
        }
        out
    }

    /// Sample poses `delta` seconds ahead into `frame`.
    pub fn sample_into(&mut self, delta: f64, frame: &mut TrackingFrame) {
        self.predictor.sample_into(
            &mut self.sampler,
            &mut self.session,
            self.origin,
            delta,
            &mut frame.poses,
        );
        self.devices.sync_connections(&frame.poses);
        self.devices.refresh_serials(&self.session);

        self.sequence += 1;
        frame.sequence = self.sequence;
        frame.prediction_delta = delta;
        frame.controller_roles = self.devices.controller_roles();
        frame.serials.resize(MAX_DEVICE_COUNT, None);
        for (slot, device) in frame.serials.iter_mut().zip(self.devices.iter()) {
            if slot.as_ref() != device.serial() {
                *slot = device.serial().cloned();
            }
        }
    }

    pub fn sample(&mut self, delta: f64) -> TrackingFrame {
        let mut frame = TrackingFrame::empty();
        self.sample_into(delta, &mut frame);
        frame
    }

    /// Lookahead for the next sample: zero when prediction is off, else the
    /// time to the next display refresh plus `extra_s`.
    pub fn lookahead(&self, clock: &FrameClock, extra_s: f64) -> f64 {
        match self.predictor.strategy() {
            PredictionStrategy::None => 0.0,
            _ => clock.snapshot().prediction_delta(clock.now_s(), extra_s),
        }
    }

    /// Compare-mode divergences from the last sample.
    pub fn divergences(&self) -> &[PoseDivergence] {
        self.predictor.divergences()
    }
}
