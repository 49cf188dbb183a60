//! Mathematical utilities and nalgebra extensions for the fusion pipeline

use nalgebra::{UnitQuaternion, Vector3};

/// Mathematical constants
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Standard gravity in m/s², used both for g → m/s² conversion and gravity removal
pub const STANDARD_GRAVITY: f32 = 9.81;

/// Tilt angles implied by a gravity-aligned vector, returned as `(pitch, roll)` in degrees.
///
/// ```text
/// pitch = atan2(x, sqrt(y² + z²))
/// roll  = atan2(y, sqrt(x² + z²))
/// ```
///
/// `atan2` is defined for every finite input, including the zero vector, so the
/// result is always finite for finite input.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use fusion_trail::accel_tilt;
///
/// let (pitch, roll) = accel_tilt(&Vector3::new(0.0, 0.0, 9.81));
/// assert_eq!((pitch, roll), (0.0, 0.0));
/// ```
pub fn accel_tilt(accel: &Vector3<f32>) -> (f32, f32) {
    let pitch = accel.x.atan2((accel.y * accel.y + accel.z * accel.z).sqrt());
    let roll = accel.y.atan2((accel.x * accel.x + accel.z * accel.z).sqrt());
    (pitch * RAD_TO_DEG, roll * RAD_TO_DEG)
}

/// Extension trait for Vector3 operations
pub trait Vector3Ext {
    /// Normalize the vector, returning zero vector if magnitude is zero
    fn safe_normalize(&self) -> Vector3<f32>;

    /// Whether every component is finite
    fn all_finite(&self) -> bool;

    /// Convert degrees to radians
    fn deg_to_rad(&self) -> Vector3<f32>;

    /// Convert radians to degrees
    fn rad_to_deg(&self) -> Vector3<f32>;
}

impl Vector3Ext for Vector3<f32> {
    fn safe_normalize(&self) -> Vector3<f32> {
        let mag = self.magnitude();
        if mag > 0.0 {
            *self / mag
        } else {
            Vector3::zeros()
        }
    }

    fn all_finite(&self) -> bool {
        self.iter().all(|c| c.is_finite())
    }

    fn deg_to_rad(&self) -> Vector3<f32> {
        *self * DEG_TO_RAD
    }

    fn rad_to_deg(&self) -> Vector3<f32> {
        *self * RAD_TO_DEG
    }
}

/// Extension trait for UnitQuaternion operations
pub trait QuaternionExt {
    /// Convert quaternion to Euler angles (roll, pitch, yaw) in degrees
    fn to_euler_degrees(&self) -> Vector3<f32>;

    /// Unit gravity direction expected in the sensor frame under this orientation.
    ///
    /// This is the vector a level, motionless accelerometer would report after
    /// normalization: `(0, 0, 1)` at identity.
    fn gravity_direction(&self) -> Vector3<f32>;

    /// Pitch and roll in degrees, derived from [`gravity_direction`](Self::gravity_direction)
    /// with the same formulas as [`accel_tilt`].
    fn tilt_degrees(&self) -> (f32, f32);

    /// Whether every component is finite
    fn all_finite(&self) -> bool;
}

impl QuaternionExt for UnitQuaternion<f32> {
    fn to_euler_degrees(&self) -> Vector3<f32> {
        let (roll, pitch, yaw) = self.euler_angles();
        Vector3::new(roll, pitch, yaw).rad_to_deg()
    }

    fn gravity_direction(&self) -> Vector3<f32> {
        let q = self.as_ref();
        let (qw, qx, qy, qz) = (q.w, q.i, q.j, q.k);

        Vector3::new(
            2.0 * (qx * qz - qw * qy),
            2.0 * (qy * qz + qw * qx),
            2.0 * (qw * qw - 0.5 + qz * qz),
        )
    }

    fn tilt_degrees(&self) -> (f32, f32) {
        accel_tilt(&self.gravity_direction())
    }

    fn all_finite(&self) -> bool {
        self.as_ref().coords.iter().all(|c| c.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_extensions() {
        let v = Vector3::new(3.0f32, 4.0, 0.0);
        let normalized = v.safe_normalize();
        assert!((normalized.magnitude() - 1.0).abs() < 1e-6);

        assert_eq!(Vector3::<f32>::zeros().safe_normalize(), Vector3::zeros());
        assert!(!Vector3::new(f32::NAN, 0.0, 0.0).all_finite());
    }

    #[test]
    fn test_accel_tilt_single_axis() {
        let angle = 25.0f32 * DEG_TO_RAD;
        let (pitch, roll) = accel_tilt(&Vector3::new(angle.sin(), 0.0, angle.cos()));
        assert!((pitch - 25.0).abs() < 1e-4);
        assert!(roll.abs() < 1e-4);

        let (pitch, roll) = accel_tilt(&Vector3::new(0.0, -angle.sin(), angle.cos()));
        assert!(pitch.abs() < 1e-4);
        assert!((roll + 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_accel_tilt_degenerate_axes() {
        let (pitch, roll) = accel_tilt(&Vector3::zeros());
        assert!(pitch.is_finite() && roll.is_finite());

        let (pitch, _) = accel_tilt(&Vector3::new(1.0, 0.0, 0.0));
        assert!((pitch - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_gravity_direction_identity() {
        let gravity = UnitQuaternion::<f32>::identity().gravity_direction();
        assert!((gravity - Vector3::new(0.0, 0.0, 1.0)).magnitude() < 1e-6);
    }
}
