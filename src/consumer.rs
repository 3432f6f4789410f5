//! Generic pose consumer.
//!
//! A [`PoseConsumer`] follows one device, picked per tick by its
//! [`DeviceSelector`], and keeps the last usable pose in the consumer's
//! left-handed convention. Invalid samples are never applied: the previous
//! pose stays and `is_valid` goes false.

use crate::bus::{Notification, Subscription};
use crate::source::TrackingFrame;
use crate::types::{ButtonId, ControllerRole, NotificationKinds, Pose};

/// How a consumer picks its device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// A fixed slot index.
    FixedIndex(u32),
    /// Whatever device currently resolves to this binding name, through
    /// either binding table.
    BoundBySerial(String),
    /// The controller the runtime assigns to this hand.
    RoleBySteamVrRole(ControllerRole),
}

/// A button transition on the followed device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: ButtonId,
    pub pressed: bool,
}

pub struct PoseConsumer {
    selector: DeviceSelector,
    device_index: Option<u32>,
    valid: bool,
    connected: bool,
    pose: Option<Pose>,
    buttons: Vec<ButtonEvent>,
}

impl PoseConsumer {
    pub fn new(selector: DeviceSelector) -> Self {
        let device_index = match selector {
            DeviceSelector::FixedIndex(i) => Some(i),
            _ => None,
        };
        Self {
            selector,
            device_index,
            valid: false,
            connected: false,
            pose: None,
            buttons: Vec::new(),
        }
    }

    pub fn selector(&self) -> &DeviceSelector {
        &self.selector
    }

    /// Notification kinds this consumer reacts to.
    pub fn kinds(&self) -> NotificationKinds {
        match self.selector {
            DeviceSelector::FixedIndex(_) => NotificationKinds::POSES | NotificationKinds::BUTTON,
            DeviceSelector::BoundBySerial(_) => {
                NotificationKinds::POSES
                    | NotificationKinds::BOUND_POSE
                    | NotificationKinds::CONNECTION
                    | NotificationKinds::ROLES_CHANGED
                    | NotificationKinds::BUTTON
            }
            DeviceSelector::RoleBySteamVrRole(_) => {
                NotificationKinds::POSES | NotificationKinds::CONNECTION | NotificationKinds::BUTTON
            }
        }
    }

    /// Slot currently followed, if any.
    pub fn device_index(&self) -> Option<u32> {
        self.device_index
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Last applied pose, left-handed. Only current while `is_valid`.
    pub fn pose(&self) -> Option<&Pose> {
        self.pose.as_ref()
    }

    /// Button transitions seen since the last call.
    pub fn take_button_events(&mut self) -> Vec<ButtonEvent> {
        std::mem::take(&mut self.buttons)
    }

    /// Feed everything queued on `subscription`. Returns how many
    /// notifications were read.
    pub fn pump(&mut self, subscription: &Subscription) -> usize {
        let mut n = 0;
        while let Some(notification) = subscription.try_recv() {
            self.observe(&notification);
            n += 1;
        }
        n
    }

    /// React to one notification. Returns true if a new pose was applied.
    pub fn observe(&mut self, notification: &Notification) -> bool {
        match notification {
            Notification::NewPoses(frame) => self.on_new_poses(frame),
            Notification::BoundPose { binding, pose, index } => match &self.selector {
                DeviceSelector::BoundBySerial(name) if name == binding => {
                    self.device_index = Some(*index);
                    self.apply(pose)
                }
                _ => false,
            },
            Notification::DeviceConnected { index, connected } => {
                if !connected && self.device_index == Some(*index) {
                    self.valid = false;
                    self.connected = false;
                }
                false
            }
            Notification::TrackerRolesChanged => {
                if matches!(self.selector, DeviceSelector::BoundBySerial(_)) {
                    self.valid = false;
                    self.connected = false;
                }
                false
            }
            Notification::ButtonChanged { index, button, pressed } => {
                if self.device_index == Some(*index) {
                    self.buttons.push(ButtonEvent {
                        button: *button,
                        pressed: *pressed,
                    });
                }
                false
            }
            Notification::DeviceRoleChanged { .. } | Notification::RuntimeQuit => false,
        }
    }

    fn on_new_poses(&mut self, frame: &TrackingFrame) -> bool {
        let index = match self.selector {
            DeviceSelector::FixedIndex(i) => Some(i),
            DeviceSelector::RoleBySteamVrRole(role) => frame.controller_roles.index_for(role),
            DeviceSelector::BoundBySerial(_) => {
                // A bound pose follows in this tick if the device is still
                // tracked; until then it is not valid.
                self.valid = false;
                return false;
            }
        };
        self.device_index = index;
        self.valid = false;

        match index.and_then(|i| frame.pose(i)) {
            Some(pose) => self.apply(pose),
            None => {
                self.connected = false;
                false
            }
        }
    }

    fn apply(&mut self, pose: &Pose) -> bool {
        self.connected = pose.connected;
        self.valid = pose.is_tracked();
        if self.valid {
            self.pose = Some(pose.to_left_handed());
        }
        self.valid
    }
}
