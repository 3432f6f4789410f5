use crate::runtime::{RawEvent, RawEventKind, RuntimeSession};
use crate::types::{ButtonId, LifecycleEvent, MAX_DEVICE_COUNT};

/// Result of draining the runtime's event queue once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpOutput {
    /// Typed lifecycle events, in queue order. Ends with
    /// `RuntimeQuitRequested` if the runtime asked to quit.
    pub events: Vec<LifecycleEvent>,
    pub quit: bool,
    /// The runtime rewrote the trackers section of its settings.
    pub tracker_settings_changed: bool,
}

impl PumpOutput {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && !self.tracker_settings_changed
    }
}

/// Translates raw runtime events into [`LifecycleEvent`]s.
#[derive(Debug, Default)]
pub struct DeviceEventPump {
    drained_total: u64,
}

impl DeviceEventPump {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the runtime's queue to exhaustion. Events queued behind a quit
    /// request are consumed and discarded. An inert session yields nothing.
    pub fn poll(&mut self, session: &mut RuntimeSession) -> PumpOutput {
        let mut out = PumpOutput::default();
        let Some(runtime) = session.runtime_mut() else {
            return out;
        };

        while let Some(raw) = runtime.poll_next_event() {
            self.drained_total += 1;
            if out.quit {
                continue;
            }
            match raw.kind {
                RawEventKind::Quit => {
                    log::info!("Tracking runtime requested quit");
                    out.quit = true;
                    out.events.push(LifecycleEvent::RuntimeQuitRequested);
                }
                RawEventKind::TrackersSectionSettingChanged => {
                    out.tracker_settings_changed = true;
                }
                _ => {
                    if let Some(event) = translate(&raw) {
                        out.events.push(event);
                    }
                }
            }
        }
        out
    }

    /// Raw events consumed since creation, including discarded ones.
    pub fn drained_total(&self) -> u64 {
        self.drained_total
    }
}

fn translate(raw: &RawEvent) -> Option<LifecycleEvent> {
    let index = raw.device_index;
    if index as usize >= MAX_DEVICE_COUNT {
        log::trace!("Skipping {:?} for out-of-range device {}", raw.kind, index);
        return None;
    }
    let event = match raw.kind {
        RawEventKind::TrackedDeviceActivated => LifecycleEvent::Connected(index),
        RawEventKind::TrackedDeviceDeactivated => LifecycleEvent::Disconnected(index),
        RawEventKind::TrackedDeviceRoleChanged => LifecycleEvent::RoleChanged(index),
        RawEventKind::ButtonPress | RawEventKind::ButtonUnpress => LifecycleEvent::ButtonChanged {
            index,
            button: ButtonId(raw.button),
            pressed: raw.kind == RawEventKind::ButtonPress,
        },
        RawEventKind::Other(code) => {
            log::trace!("Skipping runtime event {} for device {}", code, index);
            return None;
        }
        RawEventKind::Quit | RawEventKind::TrackersSectionSettingChanged => return None,
    };
    Some(event)
}
