//! Gradient-descent quaternion orientation filter (Madgwick, IMU variant)

use crate::math::Vector3Ext;
use nalgebra::{Matrix3x4, Quaternion, UnitQuaternion, Vector3};

/// Quaternion orientation filter using accelerometer gradient-descent correction.
///
/// Each update integrates the gyroscope rate `½·q⊗ω` and pulls it against the
/// normalized gradient of
///
/// ```text
/// f(q, â) = gravity direction predicted by q − â
/// ```
///
/// with gain `β`. Without a magnetometer, yaw is not referenced and drifts with
/// gyroscope bias.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use fusion_trail::MadgwickFilter;
///
/// let mut filter = MadgwickFilter::new(0.1);
/// let q = filter.update(Vector3::new(0.0, 0.0, 10.0), Vector3::new(0.0, 0.0, 9.81), 0.01);
/// assert!((q.as_ref().norm() - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MadgwickFilter {
    /// Correction gain in rad/s
    beta: f32,
    /// Current orientation
    quaternion: UnitQuaternion<f32>,
}

impl MadgwickFilter {
    /// Create a filter at identity orientation
    pub fn new(beta: f32) -> Self {
        Self {
            beta,
            quaternion: UnitQuaternion::identity(),
        }
    }

    /// Advance the orientation by `dt` seconds.
    ///
    /// # Arguments
    /// * `gyroscope` - Angular rate in degrees per second
    /// * `accelerometer` - Acceleration, any consistent unit; a zero vector skips the correction
    /// * `dt` - Elapsed time in seconds
    pub fn update(
        &mut self,
        gyroscope: Vector3<f32>,
        accelerometer: Vector3<f32>,
        dt: f32,
    ) -> UnitQuaternion<f32> {
        let q = self.quaternion.into_inner();

        // Rate of change from the gyroscope: ½·q⊗(0, ω)
        let omega = Quaternion::from_parts(0.0, gyroscope.deg_to_rad());
        let mut q_dot = q * omega * 0.5;

        let accelerometer = accelerometer.safe_normalize();
        if accelerometer != Vector3::zeros() {
            let step = objective_gradient(&q, &accelerometer);
            let norm = step.norm();
            if norm > 0.0 {
                q_dot -= step * (self.beta / norm);
            }
        }

        self.quaternion = UnitQuaternion::from_quaternion(q + q_dot * dt);
        self.quaternion
    }

    /// Current orientation
    pub fn quaternion(&self) -> UnitQuaternion<f32> {
        self.quaternion
    }

    /// Set orientation directly
    pub fn set_quaternion(&mut self, quaternion: UnitQuaternion<f32>) {
        self.quaternion = quaternion;
    }

    pub fn beta(&self) -> f32 {
        self.beta
    }

    /// Return to identity
    pub fn reset(&mut self) {
        self.quaternion = UnitQuaternion::identity();
    }
}

/// Gradient `Jᵀ·f` of the gravity objective for normalized acceleration `a`.
fn objective_gradient(q: &Quaternion<f32>, a: &Vector3<f32>) -> Quaternion<f32> {
    let (qw, qx, qy, qz) = (q.w, q.i, q.j, q.k);

    let f = Vector3::new(
        2.0 * (qx * qz - qw * qy) - a.x,
        2.0 * (qw * qx + qy * qz) - a.y,
        2.0 * (0.5 - qx * qx - qy * qy) - a.z,
    );

    #[rustfmt::skip]
    let jacobian = Matrix3x4::new(
        -2.0 * qy,  2.0 * qz, -2.0 * qw, 2.0 * qx,
         2.0 * qx,  2.0 * qw,  2.0 * qz, 2.0 * qy,
         0.0,      -4.0 * qx, -4.0 * qy, 0.0,
    );

    let gradient = jacobian.transpose() * f;
    Quaternion::new(gradient[0], gradient[1], gradient[2], gradient[3])
}
