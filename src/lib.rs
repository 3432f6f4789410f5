//! # vrtrack - pose polling and binding dispatch for OpenVR-style runtimes
//!
//! Sits between a real-time tracking runtime and the application. Provides:
//! - Lifecycle event pumping and per-slot pose sampling
//! - Motion-to-photon prediction (runtime-native or linear extrapolation)
//! - Serial-number bindings, explicit and read from the runtime's tracker roles
//! - Render-synchronous or decoupled (background poller) scheduling
//! - A scoped-subscription notification bus and generic pose consumers
//! - C FFI for integration with C/C++/Unity hosts
//!
//! ## Quick Start
//! ```no_run
//! use vrtrack::{MockRuntime, Notification, NotificationKinds, Tracker, TrackerConfig};
//!
//! let mut tracker = Tracker::new(Box::new(MockRuntime::new()), TrackerConfig::from_env());
//! tracker.initialize().unwrap();
//! tracker.bindings().load_bindings_json(r#"{"LHR-ABC123": "tracker.waist"}"#).unwrap();
//!
//! let bound = tracker.subscribe(NotificationKinds::BOUND_POSE);
//! for _ in 0..100 {
//!     tracker.tick();
//!     for n in bound.drain() {
//!         if let Notification::BoundPose { binding, pose, .. } = n {
//!             println!("{}: {:?}", binding, pose.position);
//!         }
//!     }
//! }
//! ```

pub mod error;
pub mod math;
pub mod types;
pub mod runtime;
pub mod mock;
pub mod timing;
pub mod device;
pub mod pump;
pub mod sampler;
pub mod predict;
pub mod bindings;
pub mod bus;
pub mod source;
pub mod poller;
pub mod dispatcher;
pub mod consumer;
pub mod config;
pub mod ffi;

pub use bindings::{BindingResolver, BindingTable, RoleSource, SettingsFileSource, StaticRoleSource};
pub use bus::{EventBus, Notification, Subscription};
pub use config::{Schedule, TrackerConfig};
pub use consumer::{DeviceSelector, PoseConsumer};
pub use dispatcher::{TickReport, Tracker};
pub use error::TrackerError;
pub use mock::MockRuntime;
pub use predict::PredictionStrategy;
pub use runtime::{DeviceProperty, TrackingRuntime};
pub use source::TrackingFrame;
pub use timing::FrameClock;
pub use types::*;

/// Result type alias for vrtrack operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
