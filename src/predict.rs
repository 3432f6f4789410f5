//! Pose extrapolation.
//!
//! Position is advanced linearly. Orientation integrates a constant angular
//! velocity over the delta with the quaternion exponential map:
//!
//!   w  = delta * omega / 2
//!   dq = (sin|w| / |w| * w, cos|w|)
//!   q' = dq * q
//!
//! Angular velocity is expressed in tracking-space axes, hence the left
//! multiplication.

use crate::math::{self, Quaternion};
use crate::runtime::RuntimeSession;
use crate::sampler::PoseSampler;
use crate::types::{invalid_pose_array, Pose, PoseArray, TrackingOrigin};

/// Below this value of `theta^2`, `sin(theta)/theta` is replaced by its
/// Taylor expansion `1 - theta^2/6`.
pub fn small_angle_threshold() -> f64 {
    (120.0 * f64::EPSILON).sqrt()
}

/// Extrapolate `pose` by `delta` seconds using its own velocities.
///
/// Validity and connection flags are carried over untouched; callers check
/// them before using the result.
pub fn predict(pose: &Pose, delta: f64) -> Pose {
    let position = math::add_scaled(pose.position, delta, pose.velocity);

    let half = 0.5 * delta;
    let w = [
        pose.angular_velocity[0] * half,
        pose.angular_velocity[1] * half,
        pose.angular_velocity[2] * half,
    ];
    let theta_sq = w[0] * w[0] + w[1] * w[1] + w[2] * w[2];
    let theta = theta_sq.sqrt();
    let s = if theta_sq < small_angle_threshold() {
        1.0 - theta_sq / 6.0
    } else {
        theta.sin() / theta
    };
    let dq = Quaternion::new(s * w[0], s * w[1], s * w[2], theta.cos());

    Pose {
        position,
        orientation: dq.mul(pose.orientation),
        ..*pose
    }
}

/// Extrapolate every slot of `poses` in place.
pub fn predict_all(poses: &mut [Pose], delta: f64) {
    for pose in poses.iter_mut() {
        *pose = predict(pose, delta);
    }
}

/// How poses are projected forward before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredictionStrategy {
    /// Instantaneous poses, no prediction.
    #[default]
    None,
    /// Ask the runtime to predict.
    Native,
    /// Sample instantaneous poses and extrapolate them here.
    Linear,
    /// Run both, log the difference, deliver the linear result.
    Compare,
}

impl PredictionStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "native" => Some(Self::Native),
            "linear" => Some(Self::Linear),
            "compare" => Some(Self::Compare),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Native => "native",
            Self::Linear => "linear",
            Self::Compare => "compare",
        }
    }
}

/// Per-device difference between linear and native prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseDivergence {
    pub index: u32,
    /// Distance between the two predicted positions, meters.
    pub position_delta: f64,
    /// Rotation from native to linear as `[roll, pitch, yaw]` degrees.
    pub rotation_delta_deg: [f64; 3],
}

/// Divergence for every slot connected in both arrays.
///
/// # Panics
///
/// If the arrays differ in length: both must come from the same runtime.
pub fn compare(linear: &[Pose], native: &[Pose]) -> Vec<PoseDivergence> {
    assert_eq!(
        linear.len(),
        native.len(),
        "compared pose arrays must have the same device count"
    );
    linear
        .iter()
        .zip(native.iter())
        .enumerate()
        .filter(|(_, (a, b))| a.connected && b.connected)
        .map(|(i, (a, b))| PoseDivergence {
            index: i as u32,
            position_delta: math::norm(math::sub(a.position, b.position)),
            rotation_delta_deg: math::quaternion_to_euler(
                a.orientation.mul(b.orientation.conjugate()),
            ),
        })
        .collect()
}

/// Runs a [`PredictionStrategy`] on top of a [`PoseSampler`].
pub struct PosePredictor {
    strategy: PredictionStrategy,
    native: Box<PoseArray>,
    divergences: Vec<PoseDivergence>,
}

impl PosePredictor {
    pub fn new(strategy: PredictionStrategy) -> Self {
        Self {
            strategy,
            native: invalid_pose_array(),
            divergences: Vec::new(),
        }
    }

    pub fn strategy(&self) -> PredictionStrategy {
        self.strategy
    }

    /// Sample all slots and apply the strategy with `delta` seconds of
    /// lookahead, writing the delivered poses into `out`.
    pub fn sample_into(
        &mut self,
        sampler: &mut PoseSampler,
        session: &mut RuntimeSession,
        origin: TrackingOrigin,
        delta: f64,
        out: &mut PoseArray,
    ) {
        self.divergences.clear();
        match self.strategy {
            PredictionStrategy::None => sampler.sample_into(session, origin, 0.0, out),
            PredictionStrategy::Native => sampler.sample_into(session, origin, delta, out),
            PredictionStrategy::Linear => {
                sampler.sample_into(session, origin, 0.0, out);
                predict_all(out, delta);
            }
            PredictionStrategy::Compare => {
                sampler.sample_into(session, origin, delta, &mut self.native);
                sampler.sample_into(session, origin, 0.0, out);
                predict_all(out, delta);
                self.divergences = compare(&out[..], &self.native[..]);
                for d in &self.divergences {
                    log::debug!(
                        "Prediction divergence device {}: {:.4} m, rot [{:.3}, {:.3}, {:.3}] deg",
                        d.index,
                        d.position_delta,
                        d.rotation_delta_deg[0],
                        d.rotation_delta_deg[1],
                        d.rotation_delta_deg[2]
                    );
                }
            }
        }
    }

    /// Divergences recorded by the last compare-mode sample.
    pub fn divergences(&self) -> &[PoseDivergence] {
        &self.divergences
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRuntime;
    use crate::runtime::DEFAULT_INIT_TIMEOUT;
    use std::f64::consts::PI;

    fn moving_pose() -> Pose {
        Pose {
            position: [0.5, 1.6, -0.3],
            orientation: Quaternion::from_axis_angle([0.2, 1.0, -0.1], 0.8),
            velocity: [0.4, -0.1, 0.9],
            angular_velocity: [1.5, -0.7, 2.2],
            valid: true,
            connected: true,
        }
    }

    fn assert_pose_close(a: &Pose, b: &Pose, tol: f64) {
        for i in 0..3 {
            assert!((a.position[i] - b.position[i]).abs() < tol, "{:?} vs {:?}", a, b);
        }
        assert!(a.orientation.approx_eq(b.orientation, tol), "{:?} vs {:?}", a, b);
    }

    #[test]
    fn test_zero_delta_is_identity() {
        let p = moving_pose();
        let out = predict(&p, 0.0);
        assert_pose_close(&out, &p, 1e-12);
        assert_eq!(out.velocity, p.velocity);
    }

    #[test]
    fn test_zero_angular_velocity_keeps_orientation() {
        let p = Pose {
            angular_velocity: [0.0; 3],
            ..moving_pose()
        };
        for delta in [0.001, 0.1, 5.0, -2.0] {
            let out = predict(&p, delta);
            assert!(out.orientation.approx_eq(p.orientation, 1e-12));
            assert!((out.position[2] - (p.position[2] + delta * 0.9)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_half_turn_about_z() {
        let p = Pose {
            orientation: Quaternion::IDENTITY,
            angular_velocity: [0.0, 0.0, PI],
            ..moving_pose()
        };
        let out = predict(&p, 1.0);
        assert!((out.orientation.angle_to(Quaternion::IDENTITY) - PI).abs() < 1e-9);
        let v = out.orientation.rotate([1.0, 0.0, 0.0]);
        assert!((v[0] + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_world_frame_composition() {
        let q = Quaternion::from_axis_angle([1.0, 0.0, 0.0], 0.6);
        let p = Pose {
            orientation: q,
            angular_velocity: [0.0, 2.0, 0.0],
            ..moving_pose()
        };
        let out = predict(&p, 0.25);
        let expected = Quaternion::from_axis_angle([0.0, 1.0, 0.0], 0.5).mul(q);
        assert!(out.orientation.approx_eq(expected, 1e-12));
    }

    #[test]
    fn test_continuous_across_small_angle_threshold() {
        let threshold = small_angle_threshold();
        // Angular speed such that theta^2 sits right at the threshold at delta = 1.
        let omega = 2.0 * threshold.sqrt();
        let p = Pose {
            angular_velocity: [omega, 0.0, 0.0],
            ..moving_pose()
        };
        let below = predict(&p, 1.0 - 1e-9);
        let above = predict(&p, 1.0 + 1e-9);
        assert!(below.orientation.approx_eq(above.orientation, 1e-9));

        // Shrinking delta converges to the sample.
        let mut prev = f64::INFINITY;
        for delta in [1e-1, 1e-2, 1e-3, 1e-4, 1e-6] {
            let out = predict(&moving_pose(), delta);
            let err = out.orientation.angle_to(moving_pose().orientation);
            assert!(err < prev);
            prev = err;
        }
        assert!(prev < 1e-5);
    }

    #[test]
    fn test_result_stays_unit() {
        let out = predict(&moving_pose(), 0.37);
        assert!((out.orientation.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_flags_preserved_on_invalid_pose() {
        let p = Pose {
            valid: false,
            connected: true,
            ..moving_pose()
        };
        let out = predict(&p, 0.05);
        assert!(!out.valid);
        assert!(out.connected);
        assert!(!predict(&Pose::INVALID, 0.05).valid);
    }

    #[test]
    fn test_prediction_commutes_with_handedness() {
        let p = moving_pose();
        let a = predict(&p, 0.02).to_left_handed();
        let b = predict(&p.to_left_handed(), 0.02);
        assert_pose_close(&a, &b, 1e-12);
    }

    #[test]
    fn test_compare_reports_connected_slots() {
        let a = [moving_pose(), Pose::INVALID];
        let mut b = a;
        b[0].position[0] += 0.03;
        b[0].orientation = Quaternion::from_axis_angle([0.0, 1.0, 0.0], 0.1).mul(a[0].orientation);
        let d = compare(&a, &b);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].index, 0);
        assert!((d[0].position_delta - 0.03).abs() < 1e-12);
        // Linear lags native by 0.1 rad about Y.
        assert!((d[0].rotation_delta_deg[2] + 0.1f64.to_degrees()).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "same device count")]
    fn test_compare_length_mismatch_panics() {
        compare(&[Pose::INVALID; 3], &[Pose::INVALID; 2]);
    }

    #[test]
    fn test_strategy_names() {
        for s in [
            PredictionStrategy::None,
            PredictionStrategy::Native,
            PredictionStrategy::Linear,
            PredictionStrategy::Compare,
        ] {
            assert_eq!(PredictionStrategy::from_name(s.name()), Some(s));
        }
        assert_eq!(PredictionStrategy::from_name("kalman"), None);
    }

    fn moving_runtime() -> (MockRuntime, RuntimeSession) {
        let mock = MockRuntime::new();
        mock.connect_device(1, "LHR-1");
        mock.set_pose(1, [0.0, 1.0, 0.0], Quaternion::IDENTITY);
        mock.set_velocity(1, [1.0, 0.0, 0.0], [0.0, 2.0, 0.0]);
        let mut session = RuntimeSession::new(Box::new(mock.clone()), DEFAULT_INIT_TIMEOUT);
        session.initialize().unwrap();
        (mock, session)
    }

    #[test]
    fn test_native_strategy_forwards_offset() {
        let (mock, mut session) = moving_runtime();
        let mut predictor = PosePredictor::new(PredictionStrategy::Native);
        let mut out = invalid_pose_array();
        predictor.sample_into(&mut PoseSampler::new(), &mut session, TrackingOrigin::Standing, 0.05, &mut out);
        assert!((mock.last_seconds_ahead().unwrap() - 0.05).abs() < 1e-6);
        assert!((out[1].position[0] - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_linear_strategy_extrapolates_locally() {
        let (mock, mut session) = moving_runtime();
        let mut predictor = PosePredictor::new(PredictionStrategy::Linear);
        let mut out = invalid_pose_array();
        predictor.sample_into(&mut PoseSampler::new(), &mut session, TrackingOrigin::Standing, 0.5, &mut out);
        assert_eq!(mock.last_seconds_ahead(), Some(0.0));
        assert!((out[1].position[0] - 0.5).abs() < 1e-6);
        let expected = Quaternion::from_axis_angle([0.0, 1.0, 0.0], 1.0);
        assert!(out[1].orientation.approx_eq(expected, 1e-6));
    }

    #[test]
    fn test_compare_strategy_records_divergence() {
        let (_mock, mut session) = moving_runtime();
        let mut predictor = PosePredictor::new(PredictionStrategy::Compare);
        let mut out = invalid_pose_array();
        predictor.sample_into(&mut PoseSampler::new(), &mut session, TrackingOrigin::Standing, 0.5, &mut out);

        let d = predictor.divergences();
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].index, 1);
        // The mock predicts position only, so positions agree and the
        // orientations differ by the integrated yaw.
        assert!(d[0].position_delta < 1e-6);
        assert!((d[0].rotation_delta_deg[2] - 1.0f64.to_degrees()).abs() < 1e-3);
    }
}
