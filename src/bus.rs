//! Per-tracker notification bus.
//!
//! Each [`Subscription`] owns an unbounded channel and removes itself from
//! the bus when dropped. Publishing never blocks and silently skips
//! subscribers whose receiving end is gone.

use crate::source::TrackingFrame;
use crate::types::{ButtonId, LifecycleEvent, NotificationKinds, Pose};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// Something a tick produced.
#[derive(Debug, Clone)]
pub enum Notification {
    DeviceConnected { index: u32, connected: bool },
    DeviceRoleChanged { index: u32 },
    ButtonChanged { index: u32, button: ButtonId, pressed: bool },
    RuntimeQuit,
    /// The role-derived binding table was replaced.
    TrackerRolesChanged,
    /// The full pose array of this tick.
    NewPoses(Arc<TrackingFrame>),
    /// Pose of a device that resolved to `binding`.
    BoundPose { binding: String, pose: Pose, index: u32 },
}

impl Notification {
    pub fn kind(&self) -> NotificationKinds {
        match self {
            Notification::DeviceConnected { .. } => NotificationKinds::CONNECTION,
            Notification::DeviceRoleChanged { .. } => NotificationKinds::ROLE,
            Notification::ButtonChanged { .. } => NotificationKinds::BUTTON,
            Notification::RuntimeQuit => NotificationKinds::QUIT,
            Notification::TrackerRolesChanged => NotificationKinds::ROLES_CHANGED,
            Notification::NewPoses(_) => NotificationKinds::POSES,
            Notification::BoundPose { .. } => NotificationKinds::BOUND_POSE,
        }
    }
}

impl From<LifecycleEvent> for Notification {
    fn from(event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::Connected(index) => Notification::DeviceConnected { index, connected: true },
            LifecycleEvent::Disconnected(index) => Notification::DeviceConnected { index, connected: false },
            LifecycleEvent::RoleChanged(index) => Notification::DeviceRoleChanged { index },
            LifecycleEvent::ButtonChanged { index, button, pressed } => {
                Notification::ButtonChanged { index, button, pressed }
            }
            LifecycleEvent::RuntimeQuitRequested => Notification::RuntimeQuit,
        }
    }
}

struct Subscriber {
    id: u64,
    kinds: NotificationKinds,
    sender: Sender<Notification>,
}

struct BusInner {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Receive every future notification whose kind is in `kinds`.
    pub fn subscribe(&self, kinds: NotificationKinds) -> Subscription {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers().push(Subscriber { id, kinds, sender });
        log::trace!("Subscriber {} registered for {:?}", id, kinds);
        Subscription {
            id,
            receiver,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver to every interested subscriber. Returns how many got it.
    pub fn publish(&self, notification: Notification) -> usize {
        let kind = notification.kind();
        let mut delivered = 0;
        self.inner.subscribers().retain(|s| {
            if !s.kinds.intersects(kind) {
                return true;
            }
            match s.sender.send(notification.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a bus subscription. Unregisters on drop.
pub struct Subscription {
    id: u64,
    receiver: Receiver<Notification>,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn try_recv(&self) -> Option<Notification> {
        match self.receiver.try_recv() {
            Ok(n) => Some(n),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout`. `None` on timeout or once the bus is gone and
    /// the queue is empty.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Notification> {
        match self.receiver.recv_timeout(timeout) {
            Ok(n) => Some(n),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued right now, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        self.receiver.try_iter().collect()
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers().retain(|s| s.id != self.id);
            log::trace!("Subscriber {} unregistered", self.id);
        }
    }
}
