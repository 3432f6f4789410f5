use crate::runtime::{DeviceProperty, RuntimeSession, UNKNOWN_PROPERTY};
use crate::types::{ControllerRole, ControllerRoles, LifecycleEvent, PoseArray, MAX_DEVICE_COUNT};
use std::sync::Arc;

/// One device slot. The index is fixed for the process lifetime; the
/// connection flag follows lifecycle events and the serial number is
/// queried lazily while the slot is connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    index: u32,
    connected: bool,
    serial: Option<Arc<str>>,
}

impl Device {
    fn new(index: u32) -> Self {
        Self {
            index,
            connected: false,
            serial: None,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Cached serial number, `None` until queried.
    pub fn serial(&self) -> Option<&Arc<str>> {
        self.serial.as_ref()
    }

    fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            // A slot can be reused by a different device after a reconnect.
            self.serial = None;
        }
        self.connected = connected;
    }
}

/// Connection state and identity for every device slot.
pub struct DeviceTable {
    devices: Vec<Device>,
    controller_roles: ControllerRoles,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self {
            devices: (0..MAX_DEVICE_COUNT as u32).map(Device::new).collect(),
            controller_roles: ControllerRoles::default(),
        }
    }

    pub fn get(&self, index: u32) -> Option<&Device> {
        self.devices.get(index as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn is_connected(&self, index: u32) -> bool {
        self.get(index).map_or(false, Device::is_connected)
    }

    pub fn connected_count(&self) -> usize {
        self.devices.iter().filter(|d| d.connected).count()
    }

    pub fn controller_roles(&self) -> ControllerRoles {
        self.controller_roles
    }

    /// Apply a lifecycle event. Returns true when controller-role
    /// assignments may have changed.
    pub fn apply(&mut self, event: &LifecycleEvent) -> bool {
        match *event {
            LifecycleEvent::Connected(i) => {
                if let Some(d) = self.devices.get_mut(i as usize) {
                    d.set_connected(true);
                }
                true
            }
            LifecycleEvent::Disconnected(i) => {
                if let Some(d) = self.devices.get_mut(i as usize) {
                    d.set_connected(false);
                }
                true
            }
            LifecycleEvent::RoleChanged(_) => true,
            LifecycleEvent::ButtonChanged { .. } | LifecycleEvent::RuntimeQuitRequested => false,
        }
    }

    /// Reconcile connection flags with a fresh sample. Devices that were
    /// already connected before the session started never send an
    /// activation event, so the sample is authoritative.
    pub fn sync_connections(&mut self, poses: &PoseArray) {
        for (device, pose) in self.devices.iter_mut().zip(poses.iter()) {
            if device.connected != pose.connected {
                log::debug!(
                    "Device {} {} (from pose sample)",
                    device.index,
                    if pose.connected { "connected" } else { "disconnected" }
                );
                device.set_connected(pose.connected);
            }
        }
    }

    /// Query serial numbers for connected slots that have none cached.
    /// A failed query is retried on the next call.
    pub fn refresh_serials(&mut self, session: &RuntimeSession) {
        if !session.is_ready() {
            return;
        }
        for device in self.devices.iter_mut().filter(|d| d.connected && d.serial.is_none()) {
            let serial = session.string_property(device.index, DeviceProperty::SerialNumber);
            if serial == UNKNOWN_PROPERTY {
                log::trace!("Serial number of device {} not available yet", device.index);
                continue;
            }
            log::debug!("Device {} has serial {}", device.index, serial);
            device.serial = Some(Arc::from(serial));
        }
    }

    /// Re-read which slots hold the left and right hand controllers.
    pub fn refresh_controller_roles(&mut self, session: &RuntimeSession) {
        let roles = match session.runtime() {
            Some(rt) => ControllerRoles {
                left_hand: rt.device_index_for_role(ControllerRole::LeftHand),
                right_hand: rt.device_index_for_role(ControllerRole::RightHand),
            },
            None => ControllerRoles::default(),
        };
        let roles = ControllerRoles {
            left_hand: roles.left_hand.filter(|&i| (i as usize) < MAX_DEVICE_COUNT),
            right_hand: roles.right_hand.filter(|&i| (i as usize) < MAX_DEVICE_COUNT),
        };
        if roles != self.controller_roles {
            log::debug!("Controller roles now {:?}", roles);
            self.controller_roles = roles;
        }
    }

    /// Forget everything; used when the session drops back to inert.
    pub fn reset(&mut self) {
        for device in &mut self.devices {
            device.connected = false;
            device.serial = None;
        }
        self.controller_roles = ControllerRoles::default();
    }
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRuntime;
    use crate::runtime::DEFAULT_INIT_TIMEOUT;
    use crate::types::{invalid_pose_array, Pose};

    fn ready_session(mock: &MockRuntime) -> RuntimeSession {
        let mut session = RuntimeSession::new(Box::new(mock.clone()), DEFAULT_INIT_TIMEOUT);
        session.initialize().unwrap();
        session
    }

    #[test]
    fn test_lifecycle_toggles_connection() {
        let mut table = DeviceTable::new();
        assert!(table.apply(&LifecycleEvent::Connected(4)));
        assert!(table.is_connected(4));
        assert_eq!(table.connected_count(), 1);
        assert!(table.apply(&LifecycleEvent::Disconnected(4)));
        assert!(!table.is_connected(4));
        assert!(!table.apply(&LifecycleEvent::RuntimeQuitRequested));
        // Out-of-range indices are ignored.
        table.apply(&LifecycleEvent::Connected(500));
        assert_eq!(table.connected_count(), 0);
    }

    #[test]
    fn test_serial_is_queried_once_while_connected() {
        let mock = MockRuntime::new();
        mock.connect_device(3, "LHR-ABC123");
        let session = ready_session(&mock);

        let mut table = DeviceTable::new();
        table.apply(&LifecycleEvent::Connected(3));
        table.refresh_serials(&session);
        table.refresh_serials(&session);
        assert_eq!(table.get(3).unwrap().serial().map(|s| &**s), Some("LHR-ABC123"));
        assert_eq!(mock.property_queries(), 1);
    }

    #[test]
    fn test_unknown_serial_is_retried() {
        let mock = MockRuntime::new();
        let session = ready_session(&mock);

        let mut table = DeviceTable::new();
        table.apply(&LifecycleEvent::Connected(2));
        table.refresh_serials(&session);
        assert!(table.get(2).unwrap().serial().is_none());

        mock.set_property(2, DeviceProperty::SerialNumber, "LHR-0002");
        table.refresh_serials(&session);
        assert_eq!(table.get(2).unwrap().serial().map(|s| &**s), Some("LHR-0002"));
        assert_eq!(mock.property_queries(), 2);
    }

    #[test]
    fn test_disconnect_clears_serial() {
        let mock = MockRuntime::new();
        mock.connect_device(1, "LHR-OLD");
        let session = ready_session(&mock);

        let mut table = DeviceTable::new();
        table.apply(&LifecycleEvent::Connected(1));
        table.refresh_serials(&session);
        table.apply(&LifecycleEvent::Disconnected(1));
        assert!(table.get(1).unwrap().serial().is_none());

        // Disconnected slots are not queried.
        table.refresh_serials(&session);
        assert_eq!(mock.property_queries(), 1);
    }

    #[test]
    fn test_sample_marks_preexisting_devices() {
        let mut table = DeviceTable::new();
        let mut poses = invalid_pose_array();
        poses[0] = Pose {
            connected: true,
            valid: true,
            ..Pose::INVALID
        };
        table.sync_connections(&poses);
        assert!(table.is_connected(0));
        assert_eq!(table.connected_count(), 1);
    }

    #[test]
    fn test_controller_roles_follow_runtime() {
        let mock = MockRuntime::new();
        mock.set_role_index(ControllerRole::LeftHand, Some(5));
        mock.set_role_index(ControllerRole::RightHand, Some(900));
        let session = ready_session(&mock);

        let mut table = DeviceTable::new();
        table.refresh_controller_roles(&session);
        assert_eq!(table.controller_roles().index_for(ControllerRole::LeftHand), Some(5));
        // Indices outside the slot range are dropped.
        assert_eq!(table.controller_roles().index_for(ControllerRole::RightHand), None);
    }
}
