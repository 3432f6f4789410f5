use crate::math::{self, Matrix34, Quaternion};

/// Number of device slots exposed by the tracking runtime.
pub const MAX_DEVICE_COUNT: usize = 64;

/// Slot index reserved for the head-mounted display.
pub const HMD_INDEX: u32 = 0;

/// Raw pose for one device slot, in the runtime's right-handed convention.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPose {
    /// Device-to-tracking-space transform.
    pub device_to_absolute: Matrix34,
    /// Linear velocity in meters/second.
    pub velocity: [f32; 3],
    /// Angular velocity in radians/second, tracking-space axes.
    pub angular_velocity: [f32; 3],
    pub pose_is_valid: bool,
    pub device_is_connected: bool,
}

impl RawPose {
    pub const DISCONNECTED: RawPose = RawPose {
        device_to_absolute: math::IDENTITY_MATRIX34,
        velocity: [0.0; 3],
        angular_velocity: [0.0; 3],
        pose_is_valid: false,
        device_is_connected: false,
    };
}

impl Default for RawPose {
    fn default() -> Self {
        Self::DISCONNECTED
    }
}

/// 6DOF pose sample for one device slot.
///
/// `valid` implies `connected`. When `valid` is false, `position` and
/// `orientation` carry no meaning and must not be applied to a consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Position in meters [x, y, z].
    pub position: [f64; 3],
    pub orientation: Quaternion,
    /// Linear velocity in meters/second.
    pub velocity: [f64; 3],
    /// Angular velocity in radians/second.
    pub angular_velocity: [f64; 3],
    pub valid: bool,
    pub connected: bool,
}

impl Pose {
    pub const INVALID: Pose = Pose {
        position: [0.0; 3],
        orientation: Quaternion::IDENTITY,
        velocity: [0.0; 3],
        angular_velocity: [0.0; 3],
        valid: false,
        connected: false,
    };

    /// Decode a runtime sample. A disconnected device is never valid,
    /// whatever the runtime claims.
    pub fn from_raw(raw: &RawPose) -> Pose {
        Pose {
            position: math::position_from_matrix(&raw.device_to_absolute),
            orientation: math::quaternion_from_matrix(&raw.device_to_absolute),
            velocity: math::widen(raw.velocity),
            angular_velocity: math::widen(raw.angular_velocity),
            valid: raw.pose_is_valid && raw.device_is_connected,
            connected: raw.device_is_connected,
        }
    }

    /// Connected and carrying a usable position/orientation.
    pub fn is_tracked(&self) -> bool {
        self.connected && self.valid
    }

    /// Convert from the runtime's right-handed frame to the consumer's
    /// left-handed frame (Z negated).
    pub fn to_left_handed(&self) -> Pose {
        Pose {
            position: math::mirror_vector(self.position),
            orientation: math::mirror_quaternion(self.orientation),
            velocity: math::mirror_vector(self.velocity),
            angular_velocity: math::mirror_axial(self.angular_velocity),
            ..*self
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::INVALID
    }
}

/// One pose per device slot.
pub type PoseArray = [Pose; MAX_DEVICE_COUNT];

pub fn invalid_pose_array() -> Box<PoseArray> {
    Box::new([Pose::INVALID; MAX_DEVICE_COUNT])
}

/// Coordinate origin the runtime expresses poses in.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingOrigin {
    Seated = 0,
    #[default]
    Standing = 1,
    RawAndUncalibrated = 2,
}

impl TrackingOrigin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "seated" => Some(Self::Seated),
            "standing" => Some(Self::Standing),
            "raw" => Some(Self::RawAndUncalibrated),
            _ => None,
        }
    }
}

/// Hand assignment the runtime gives to a controller.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerRole {
    LeftHand = 0,
    RightHand = 1,
}

/// Device slots currently assigned to each controller role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerRoles {
    pub left_hand: Option<u32>,
    pub right_hand: Option<u32>,
}

impl ControllerRoles {
    pub fn index_for(&self, role: ControllerRole) -> Option<u32> {
        match role {
            ControllerRole::LeftHand => self.left_hand,
            ControllerRole::RightHand => self.right_hand,
        }
    }
}

/// Controller button identifier, numbered as the runtime numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonId(pub u32);

impl ButtonId {
    pub const SYSTEM: ButtonId = ButtonId(0);
    pub const APPLICATION_MENU: ButtonId = ButtonId(1);
    pub const GRIP: ButtonId = ButtonId(2);
    pub const A: ButtonId = ButtonId(7);
    pub const TOUCHPAD: ButtonId = ButtonId(32);
    pub const TRIGGER: ButtonId = ButtonId(33);
}

/// Typed device lifecycle notification produced by the event pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connected(u32),
    Disconnected(u32),
    RoleChanged(u32),
    ButtonChanged {
        index: u32,
        button: ButtonId,
        pressed: bool,
    },
    RuntimeQuitRequested,
}

impl LifecycleEvent {
    pub fn device_index(&self) -> Option<u32> {
        match *self {
            LifecycleEvent::Connected(i)
            | LifecycleEvent::Disconnected(i)
            | LifecycleEvent::RoleChanged(i) => Some(i),
            LifecycleEvent::ButtonChanged { index, .. } => Some(index),
            LifecycleEvent::RuntimeQuitRequested => None,
        }
    }
}

bitflags::bitflags! {
    /// Notification classes a bus subscriber can ask for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(C)]
    pub struct NotificationKinds: u32 {
        const CONNECTION    = 1 << 0;
        const ROLE          = 1 << 1;
        const BUTTON        = 1 << 2;
        const QUIT          = 1 << 3;
        const POSES         = 1 << 4;
        const BOUND_POSE    = 1 << 5;
        const ROLES_CHANGED = 1 << 6;

        const LIFECYCLE = Self::CONNECTION.bits()
            | Self::ROLE.bits()
            | Self::BUTTON.bits()
            | Self::QUIT.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_raw_pose_is_never_valid() {
        let raw = RawPose {
            pose_is_valid: true,
            device_is_connected: false,
            ..RawPose::DISCONNECTED
        };
        let pose = Pose::from_raw(&raw);
        assert!(!pose.valid);
        assert!(!pose.connected);
    }

    #[test]
    fn test_connected_but_invalid_is_kept() {
        let raw = RawPose {
            pose_is_valid: false,
            device_is_connected: true,
            ..RawPose::DISCONNECTED
        };
        let pose = Pose::from_raw(&raw);
        assert!(pose.connected);
        assert!(!pose.is_tracked());
    }

    #[test]
    fn test_from_raw_reads_translation_and_velocity() {
        let mut raw = RawPose {
            pose_is_valid: true,
            device_is_connected: true,
            velocity: [0.5, 0.0, -1.0],
            ..RawPose::DISCONNECTED
        };
        raw.device_to_absolute[0][3] = 1.5;
        raw.device_to_absolute[2][3] = -2.0;
        let pose = Pose::from_raw(&raw);
        assert!(pose.is_tracked());
        assert_eq!(pose.position, [1.5, 0.0, -2.0]);
        assert_eq!(pose.velocity, [0.5, 0.0, -1.0]);
        assert!(pose.orientation.approx_eq(Quaternion::IDENTITY, 1e-12));
    }

    #[test]
    fn test_left_handed_conversion_flips_z() {
        let pose = Pose {
            position: [1.0, 2.0, 3.0],
            orientation: Quaternion::new(0.1, 0.2, 0.3, 0.927),
            velocity: [0.0, 0.0, 1.0],
            angular_velocity: [1.0, 0.0, 1.0],
            valid: true,
            connected: true,
        };
        let lh = pose.to_left_handed();
        assert_eq!(lh.position, [1.0, 2.0, -3.0]);
        assert_eq!(lh.orientation, Quaternion::new(-0.1, -0.2, 0.3, 0.927));
        assert_eq!(lh.velocity, [0.0, 0.0, -1.0]);
        assert_eq!(lh.angular_velocity, [-1.0, 0.0, 1.0]);
        assert!(lh.valid && lh.connected);
    }

    #[test]
    fn test_invalid_array_shape() {
        let poses = invalid_pose_array();
        assert_eq!(poses.len(), MAX_DEVICE_COUNT);
        assert!(poses.iter().all(|p| !p.valid && !p.connected));
    }

    #[test]
    fn test_origin_names() {
        assert_eq!(TrackingOrigin::from_name("seated"), Some(TrackingOrigin::Seated));
        assert_eq!(TrackingOrigin::from_name("raw"), Some(TrackingOrigin::RawAndUncalibrated));
        assert_eq!(TrackingOrigin::from_name("sideways"), None);
    }
}
