//! One tracker tick: lifecycle, role reload, poses, bound poses.
//!
//! [`Tracker`] owns the bus and the binding resolver, and drives the
//! tracking source either inline (render-synchronous) or through a
//! [`Poller`] (decoupled). Either way `tick` publishes in the same order:
//!
//! 1. one notification per lifecycle event, stopping at a quit request
//! 2. `TrackerRolesChanged` if a scheduled role reload was applied
//! 3. `NewPoses` with the full frame
//! 4. `BoundPose` per tracked device and matching binding, explicit
//!    table first, then the role table

use crate::bindings::{BindingResolver, RoleSource, SettingsFileSource};
use crate::bus::{EventBus, Notification, Subscription};
use crate::config::{Schedule, TrackerConfig};
use crate::poller::{Poller, SourceEvent};
use crate::predict::PoseDivergence;
use crate::runtime::{DeviceProperty, TrackingRuntime, UNKNOWN_PROPERTY};
use crate::source::{TrackingFrame, TrackingSource};
use crate::timing::FrameClock;
use crate::types::{LifecycleEvent, NotificationKinds};
use crate::{Result, TrackerError};
use std::sync::Arc;
use std::time::Instant;

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub lifecycle_events: usize,
    pub roles_reloaded: bool,
    pub bound_poses: usize,
    /// The runtime asked to quit; the tracker is now inert.
    pub quit: bool,
    /// Sequence number of the published frame, if one was published.
    pub frame_sequence: Option<u64>,
}

enum Driver {
    Inline(TrackingSource),
    Background(Poller),
    Stopped,
}

pub struct Tracker {
    config: TrackerConfig,
    driver: Driver,
    bus: EventBus,
    bindings: Arc<BindingResolver>,
    clock: Arc<FrameClock>,
    latest: Arc<TrackingFrame>,
    custom_role_source: bool,
    quit: bool,
}

impl Tracker {
    /// Tracker reading roles from the runtime's settings document.
    pub fn new(runtime: Box<dyn TrackingRuntime>, config: TrackerConfig) -> Self {
        let source = Arc::new(SettingsFileSource::new(config.settings_path.clone(), None));
        let mut tracker = Self::with_role_source(runtime, config, source);
        tracker.custom_role_source = false;
        tracker
    }

    pub fn with_role_source(
        runtime: Box<dyn TrackingRuntime>,
        config: TrackerConfig,
        role_source: Arc<dyn RoleSource>,
    ) -> Self {
        let source = TrackingSource::new(runtime, &config);
        Self {
            bindings: Arc::new(BindingResolver::new(role_source, config.reload_settle)),
            driver: Driver::Inline(source),
            bus: EventBus::new(),
            clock: Arc::new(FrameClock::new()),
            latest: Arc::new(TrackingFrame::empty()),
            custom_role_source: true,
            quit: false,
            config,
        }
    }

    /// Connect to the runtime, load tracker roles and, for the decoupled
    /// schedule, start the poller. On failure the tracker stays inert:
    /// ticks publish all-invalid frames and no events. Calling again
    /// retries.
    pub fn initialize(&mut self) -> Result<()> {
        // A poller that ended on a runtime quit hands its source back so
        // the session can be brought up again.
        if matches!(&self.driver, Driver::Background(poller) if self.quit || !poller.is_running()) {
            if let Driver::Background(poller) = std::mem::replace(&mut self.driver, Driver::Stopped) {
                match poller.stop() {
                    Some(source) => self.driver = Driver::Inline(source),
                    None => return Err(TrackerError::Stopped),
                }
            }
        }
        let Driver::Inline(source) = &mut self.driver else {
            return Ok(());
        };
        if !source.is_ready() {
            source.initialize()?;
        }

        if !self.custom_role_source {
            self.bindings.set_role_source(Arc::new(SettingsFileSource::new(
                self.config.settings_path.clone(),
                source.runtime_path(),
            )));
        }
        if self.config.use_role_bindings && self.bindings.reload_role_bindings().is_ok() {
            self.bus.publish(Notification::TrackerRolesChanged);
        }
        self.quit = false;

        if self.config.schedule == Schedule::Decoupled {
            if let Driver::Inline(source) = std::mem::replace(&mut self.driver, Driver::Stopped) {
                self.driver = Driver::Background(Poller::start(source, self.clock.clone(), &self.config)?);
            }
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        match &self.driver {
            Driver::Inline(source) => source.is_ready(),
            Driver::Background(poller) => poller.is_running(),
            Driver::Stopped => false,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn subscribe(&self, kinds: NotificationKinds) -> Subscription {
        self.bus.subscribe(kinds)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bindings(&self) -> &Arc<BindingResolver> {
        &self.bindings
    }

    /// Clock to feed from the display-refresh callback.
    pub fn frame_clock(&self) -> Arc<FrameClock> {
        self.clock.clone()
    }

    /// Schedule a role reload as if the runtime had signalled a change.
    pub fn trigger_role_reload(&self, now: Instant) {
        self.bindings.schedule_role_reload(now);
    }

    /// Frame published by the last tick.
    pub fn latest_frame(&self) -> Arc<TrackingFrame> {
        self.latest.clone()
    }

    /// Poller cycle rate; `None` for the render-synchronous schedule.
    pub fn samples_per_second(&self) -> Option<f64> {
        match &self.driver {
            Driver::Background(poller) => Some(poller.samples_per_second()),
            _ => None,
        }
    }

    /// Compare-mode divergences from the last render-synchronous sample.
    /// Always empty under the decoupled schedule.
    pub fn divergences(&self) -> Vec<PoseDivergence> {
        match &self.driver {
            Driver::Inline(source) => source.divergences().to_vec(),
            _ => Vec::new(),
        }
    }

    /// String property of a slot. Only answered by the render-synchronous
    /// schedule, where the runtime lives on this thread.
    pub fn string_property(&self, index: u32, prop: DeviceProperty) -> String {
        match &self.driver {
            Driver::Inline(source) => source.string_property(index, prop),
            _ => UNKNOWN_PROPERTY.to_string(),
        }
    }

    pub fn tick(&mut self) -> TickReport {
        self.tick_at(Instant::now())
    }

    /// Run one tick with `now` as the reload-timer clock.
    pub fn tick_at(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        if self.quit {
            report.quit = true;
            return report;
        }

        let (events, settings_changed) = self.collect_events();
        for event in events {
            report.lifecycle_events += 1;
            self.bus.publish(Notification::from(event));
            if event == LifecycleEvent::RuntimeQuitRequested {
                log::info!("Runtime quit, tracker going inert");
                self.quit = true;
                report.quit = true;
                return report;
            }
        }

        if settings_changed && self.config.use_role_bindings {
            self.bindings.schedule_role_reload(now);
        }
        match self.bindings.poll_reload(now) {
            Ok(true) => {
                report.roles_reloaded = true;
                self.bus.publish(Notification::TrackerRolesChanged);
            }
            Ok(false) => {}
            Err(e) => log::warn!("Tracker role reload failed: {}", e),
        }

        let frame = match &mut self.driver {
            Driver::Inline(source) => {
                let delta = source.lookahead(&self.clock, self.config.predict_seconds);
                source.sample_into(delta, Arc::make_mut(&mut self.latest));
                self.latest.clone()
            }
            Driver::Background(poller) => poller.latest_frame(),
            Driver::Stopped => return report,
        };
        self.latest = frame.clone();
        report.frame_sequence = Some(frame.sequence);
        self.bus.publish(Notification::NewPoses(frame.clone()));

        for (index, pose, serial) in frame.tracked() {
            let resolved = self.bindings.resolve(serial);
            let role = resolved.role.filter(|_| self.config.use_role_bindings);
            for binding in resolved.explicit.into_iter().chain(role) {
                self.bus.publish(Notification::BoundPose {
                    binding,
                    pose: *pose,
                    index,
                });
                report.bound_poses += 1;
            }
        }
        report
    }

    fn collect_events(&mut self) -> (Vec<LifecycleEvent>, bool) {
        match &mut self.driver {
            Driver::Inline(source) => {
                let out = source.poll_events();
                (out.events, out.tracker_settings_changed)
            }
            Driver::Background(poller) => {
                let mut events = Vec::new();
                let mut settings_changed = false;
                for event in poller.drain_events() {
                    match event {
                        SourceEvent::Lifecycle(e) => events.push(e),
                        SourceEvent::TrackerSettingsChanged => settings_changed = true,
                    }
                }
                (events, settings_changed)
            }
            Driver::Stopped => (Vec::new(), false),
        }
    }

    /// Stop polling and release the runtime.
    pub fn shutdown(&mut self) {
        match std::mem::replace(&mut self.driver, Driver::Stopped) {
            Driver::Background(poller) => drop(poller.stop()),
            Driver::Inline(source) => drop(source),
            Driver::Stopped => {}
        }
        self.bindings.cancel_reload();
    }
}
