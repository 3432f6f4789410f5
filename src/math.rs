//! Rotation and coordinate-convention helpers shared by the sampler,
//! the predictor and the consumer side.

/// Row-major 3x4 rigid transform as delivered by the tracking runtime.
/// Columns 0..3 hold the rotation, column 3 the translation in meters.
pub type Matrix34 = [[f32; 4]; 3];

/// Identity transform: no rotation, origin translation.
pub const IDENTITY_MATRIX34: Matrix34 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

/// Unit quaternion stored as `[x, y, z, w]` fields.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle_rad` around a (not necessarily normalized) axis.
    pub fn from_axis_angle(axis: [f64; 3], angle_rad: f64) -> Self {
        let len = norm(axis);
        if len == 0.0 {
            return Self::IDENTITY;
        }
        let (s, c) = (angle_rad * 0.5).sin_cos();
        let k = s / len;
        Self::new(axis[0] * k, axis[1] * k, axis[2] * k, c)
    }

    /// Hamilton product `self * rhs` (apply `rhs` first, then `self`).
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }

    pub fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    pub fn normalized(self) -> Self {
        let n = self.norm();
        if n == 0.0 {
            return Self::IDENTITY;
        }
        Self::new(self.x / n, self.y / n, self.z / n, self.w / n)
    }

    /// Rotate a vector: `q * v * q^-1`.
    pub fn rotate(self, v: [f64; 3]) -> [f64; 3] {
        let p = Self::new(v[0], v[1], v[2], 0.0);
        let r = self.mul(p).mul(self.conjugate());
        [r.x, r.y, r.z]
    }

    /// Angle of the rotation that takes `self` onto `other`, in radians.
    pub fn angle_to(self, other: Self) -> f64 {
        let dot = (self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w)
            .abs()
            .min(1.0);
        2.0 * dot.acos()
    }

    /// Component-wise closeness, treating `q` and `-q` as the same rotation.
    pub fn approx_eq(self, other: Self, tol: f64) -> bool {
        let same = (self.x - other.x).abs() <= tol
            && (self.y - other.y).abs() <= tol
            && (self.z - other.z).abs() <= tol
            && (self.w - other.w).abs() <= tol;
        let flipped = (self.x + other.x).abs() <= tol
            && (self.y + other.y).abs() <= tol
            && (self.z + other.z).abs() <= tol
            && (self.w + other.w).abs() <= tol;
        same || flipped
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

pub fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

pub fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// `a + k * b`
pub fn add_scaled(a: [f64; 3], k: f64, b: [f64; 3]) -> [f64; 3] {
    [a[0] + k * b[0], a[1] + k * b[1], a[2] + k * b[2]]
}

pub fn widen(v: [f32; 3]) -> [f64; 3] {
    [v[0] as f64, v[1] as f64, v[2] as f64]
}

/// Translation column of a runtime transform.
pub fn position_from_matrix(m: &Matrix34) -> [f64; 3] {
    [m[0][3] as f64, m[1][3] as f64, m[2][3] as f64]
}

/// Rotation part of a runtime transform as a unit quaternion.
///
/// Uses the per-component square-root form with sign recovery from the
/// off-diagonal terms, which stays stable near 180 degree rotations.
pub fn quaternion_from_matrix(m: &Matrix34) -> Quaternion {
    let m00 = m[0][0] as f64;
    let m11 = m[1][1] as f64;
    let m22 = m[2][2] as f64;

    let w = (1.0 + m00 + m11 + m22).max(0.0).sqrt() * 0.5;
    let x = (1.0 + m00 - m11 - m22).max(0.0).sqrt() * 0.5;
    let y = (1.0 - m00 + m11 - m22).max(0.0).sqrt() * 0.5;
    let z = (1.0 - m00 - m11 + m22).max(0.0).sqrt() * 0.5;

    let x = x.copysign(m[2][1] as f64 - m[1][2] as f64);
    let y = y.copysign(m[0][2] as f64 - m[2][0] as f64);
    let z = z.copysign(m[1][0] as f64 - m[0][1] as f64);

    Quaternion::new(x, y, z, w).normalized()
}

/// Convert a quaternion to a 3x3 rotation matrix (row-major).
pub fn rotation_from_quaternion(q: Quaternion) -> [[f64; 3]; 3] {
    let Quaternion { x, y, z, w } = q;
    [
        [1.0 - 2.0*(y*y + z*z), 2.0*(x*y - z*w),       2.0*(x*z + y*w)],
        [2.0*(x*y + z*w),       1.0 - 2.0*(x*x + z*z), 2.0*(y*z - x*w)],
        [2.0*(x*z - y*w),       2.0*(y*z + x*w),       1.0 - 2.0*(x*x + y*y)],
    ]
}

/// Build a runtime transform from a position and orientation.
pub fn matrix_from_pose(position: [f64; 3], orientation: Quaternion) -> Matrix34 {
    let r = rotation_from_quaternion(orientation);
    let mut m = [[0.0f32; 4]; 3];
    for row in 0..3 {
        for col in 0..3 {
            m[row][col] = r[row][col] as f32;
        }
        m[row][3] = position[row] as f32;
    }
    m
}

/// Convert a quaternion to Euler angles `[roll, pitch, yaw]` in degrees for
/// the runtime's Y-up frame (YXZ order).
///
///   roll  (about Z) = atan2(2(xy+wz), 1 - 2(x²+z²))
///   pitch (about X) = asin(2(wx-yz))
///   yaw   (about Y) = atan2(2(xz+wy), 1 - 2(x²+y²))
pub fn quaternion_to_euler(q: Quaternion) -> [f64; 3] {
    let Quaternion { x, y, z, w } = q;
    let roll = (2.0 * (x * y + w * z)).atan2(1.0 - 2.0 * (x * x + z * z));
    let pitch = (2.0 * (w * x - y * z)).clamp(-1.0, 1.0).asin();
    let yaw = (2.0 * (x * z + w * y)).atan2(1.0 - 2.0 * (x * x + y * y));
    [roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees()]
}

/// Mirror a runtime (right-handed) vector into the consumer's left-handed
/// convention by negating Z.
pub fn mirror_vector(v: [f64; 3]) -> [f64; 3] {
    [v[0], v[1], -v[2]]
}

/// Mirror an axial vector (angular velocity) across the Z plane.
pub fn mirror_axial(v: [f64; 3]) -> [f64; 3] {
    [-v[0], -v[1], v[2]]
}

/// Mirror a rotation across the Z plane: `T·R·T` with `T = diag(1, 1, -1)`.
pub fn mirror_quaternion(q: Quaternion) -> Quaternion {
    Quaternion::new(-q.x, -q.y, q.z, q.w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_identity_matrix_to_quaternion() {
        let q = quaternion_from_matrix(&IDENTITY_MATRIX34);
        assert!(q.approx_eq(Quaternion::IDENTITY, 1e-9));
    }

    #[test]
    fn test_matrix_round_trip_recovers_rotation() {
        let q = Quaternion::from_axis_angle([0.3, -1.0, 0.5], 2.4);
        let m = matrix_from_pose([1.0, 2.0, -3.0], q);
        let back = quaternion_from_matrix(&m);
        assert!(back.approx_eq(q, 1e-6), "{:?} vs {:?}", back, q);
        let p = position_from_matrix(&m);
        assert!((p[2] + 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_half_turn_survives_conversion() {
        let q = Quaternion::from_axis_angle([0.0, 1.0, 0.0], PI);
        let back = quaternion_from_matrix(&matrix_from_pose([0.0; 3], q));
        assert!(back.approx_eq(q, 1e-6));
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let q = Quaternion::from_axis_angle([0.0, 0.0, 1.0], FRAC_PI_2);
        let v = q.rotate([1.0, 0.0, 0.0]);
        assert!(v[0].abs() < 1e-12);
        assert!((v[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_quaternion_to_euler_identity() {
        let euler = quaternion_to_euler(Quaternion::IDENTITY);
        assert!(euler[0].abs() < 1e-10);
        assert!(euler[1].abs() < 1e-10);
        assert!(euler[2].abs() < 1e-10);
    }

    #[test]
    fn test_quaternion_to_euler_yaw() {
        let q = Quaternion::from_axis_angle([0.0, 1.0, 0.0], FRAC_PI_2);
        let euler = quaternion_to_euler(q);
        assert!((euler[2] - 90.0).abs() < 1e-9);
        assert!(euler[0].abs() < 1e-9);
    }

    #[test]
    fn test_mirror_preserves_composition() {
        let a = Quaternion::from_axis_angle([1.0, 2.0, 3.0], 0.7);
        let b = Quaternion::from_axis_angle([-0.5, 0.1, 1.0], 1.9);
        let lhs = mirror_quaternion(a.mul(b));
        let rhs = mirror_quaternion(a).mul(mirror_quaternion(b));
        assert!(lhs.approx_eq(rhs, 1e-12));
    }

    #[test]
    fn test_mirror_matches_matrix_flip() {
        // T·R·T applied to a vector equals mirror(R·mirror(v)).
        let q = Quaternion::from_axis_angle([0.2, 0.9, -0.4], 1.1);
        let v = [0.3, -0.7, 1.5];
        let expected = mirror_vector(q.rotate(mirror_vector(v)));
        let got = mirror_quaternion(q).rotate(v);
        for i in 0..3 {
            assert!((expected[i] - got[i]).abs() < 1e-12);
        }
    }
}
