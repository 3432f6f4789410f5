use crate::runtime::RuntimeSession;
use crate::types::{invalid_pose_array, Pose, PoseArray, RawPose, TrackingOrigin, MAX_DEVICE_COUNT};

/// Fetches the raw pose array for every device slot.
pub struct PoseSampler {
    raw: Vec<RawPose>,
}

impl PoseSampler {
    pub fn new() -> Self {
        Self {
            raw: vec![RawPose::DISCONNECTED; MAX_DEVICE_COUNT],
        }
    }

    /// Sample all slots `seconds_ahead` into the future (0 = now). Negative
    /// offsets are clamped to 0. An inert session gives all-invalid poses.
    pub fn sample(
        &mut self,
        session: &mut RuntimeSession,
        origin: TrackingOrigin,
        seconds_ahead: f64,
    ) -> Box<PoseArray> {
        let mut out = invalid_pose_array();
        self.sample_into(session, origin, seconds_ahead, &mut out);
        out
    }

    /// Like [`sample`](Self::sample), writing into an existing array.
    pub fn sample_into(
        &mut self,
        session: &mut RuntimeSession,
        origin: TrackingOrigin,
        seconds_ahead: f64,
        out: &mut PoseArray,
    ) {
        let Some(runtime) = session.runtime_mut() else {
            out.fill(Pose::INVALID);
            return;
        };

        let seconds_ahead = if seconds_ahead.is_finite() { seconds_ahead.max(0.0) } else { 0.0 };
        self.raw.fill(RawPose::DISCONNECTED);
        runtime.get_poses(origin, seconds_ahead as f32, &mut self.raw);

        for (pose, raw) in out.iter_mut().zip(self.raw.iter()) {
            *pose = Pose::from_raw(raw);
        }
    }
}

impl Default for PoseSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Quaternion;
    use crate::mock::MockRuntime;
    use crate::runtime::DEFAULT_INIT_TIMEOUT;

    #[test]
    fn test_not_installed_gives_all_invalid() {
        let mock = MockRuntime::new();
        mock.set_installed(false);
        mock.connect_device(0, "HMD");
        let mut session = RuntimeSession::new(Box::new(mock.clone()), DEFAULT_INIT_TIMEOUT);
        assert!(session.initialize().is_err());

        let poses = PoseSampler::new().sample(&mut session, TrackingOrigin::Standing, 0.0);
        assert!(poses.iter().all(|p| !p.connected && !p.valid));
        assert_eq!(mock.pose_requests(), 0);
    }

    #[test]
    fn test_samples_connected_slot() {
        let mock = MockRuntime::new();
        mock.connect_device(3, "LHR-ABC123");
        let q = Quaternion::from_axis_angle([0.0, 1.0, 0.0], 0.5);
        mock.set_pose(3, [0.1, 1.2, -0.4], q);
        let mut session = RuntimeSession::new(Box::new(mock.clone()), DEFAULT_INIT_TIMEOUT);
        session.initialize().unwrap();

        let poses = PoseSampler::new().sample(&mut session, TrackingOrigin::Seated, 0.0);
        let p = &poses[3];
        assert!(p.is_tracked());
        assert!((p.position[1] - 1.2).abs() < 1e-6);
        assert!(p.orientation.approx_eq(q, 1e-6));
        assert!(!poses[4].connected);
        assert_eq!(mock.last_origin(), Some(TrackingOrigin::Seated));
    }

    #[test]
    fn test_negative_offset_is_clamped() {
        let mock = MockRuntime::new();
        let mut session = RuntimeSession::new(Box::new(mock.clone()), DEFAULT_INIT_TIMEOUT);
        session.initialize().unwrap();

        let mut sampler = PoseSampler::new();
        sampler.sample(&mut session, TrackingOrigin::Standing, -0.5);
        assert_eq!(mock.last_seconds_ahead(), Some(0.0));
        sampler.sample(&mut session, TrackingOrigin::Standing, 0.02);
        assert!((mock.last_seconds_ahead().unwrap() - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_sample_into_overwrites_stale_slots() {
        let mock = MockRuntime::new();
        mock.connect_device(5, "LHR-5");
        let mut session = RuntimeSession::new(Box::new(mock.clone()), DEFAULT_INIT_TIMEOUT);
        session.initialize().unwrap();

        let mut sampler = PoseSampler::new();
        let mut poses = sampler.sample(&mut session, TrackingOrigin::Standing, 0.0);
        assert!(poses[5].is_tracked());

        mock.disconnect_device(5);
        sampler.sample_into(&mut session, TrackingOrigin::Standing, 0.0, &mut poses);
        assert!(!poses[5].connected && !poses[5].valid);
    }
}
