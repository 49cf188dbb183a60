//! Sensor-frame to world-frame rotation and gravity removal

use crate::math::{DEG_TO_RAD, STANDARD_GRAVITY};
use crate::types::OrientationState;
use nalgebra::{Rotation3, Vector3};

/// Rotates sensor-frame acceleration into a level world frame and removes gravity.
///
/// The rotation undoes the estimated tilt, roll first then pitch. Pitch and
/// roll follow [`accel_tilt`](crate::accel_tilt), so the gravity direction they
/// describe is `ĝ = (sin pitch, sin roll, √(1 − sin²pitch − sin²roll))`:
///
/// ```text
/// R = Ry(−pitch) · Rx(atan2(ĝy, ĝz))
/// linear = R · accel − (0, 0, g)
/// ```
///
/// `R` maps `ĝ` exactly onto `+z`, so a motionless sensor at any combined
/// tilt reports zero linear acceleration. Yaw is never applied; the world
/// frame's heading follows the sensor.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use fusion_trail::FrameTransformer;
///
/// let transformer = FrameTransformer::new(9.81);
/// let linear = transformer.to_linear(&Vector3::new(0.0, 0.0, 9.81), 0.0, 0.0);
/// assert!(linear.magnitude() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransformer {
    /// m/s²
    gravity: f32,
}

impl FrameTransformer {
    pub fn new(gravity: f32) -> Self {
        Self { gravity }
    }

    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    /// Rotation from the sensor frame to the level frame for tilt in degrees
    pub fn rotation(pitch: f32, roll: f32) -> Rotation3<f32> {
        let sin_pitch = (pitch * DEG_TO_RAD).sin();
        let sin_roll = (roll * DEG_TO_RAD).sin();
        // Clamped, rounding can push the sum of squares past one
        let gravity_z = (1.0 - sin_pitch * sin_pitch - sin_roll * sin_roll).max(0.0).sqrt();

        let undo_pitch = Rotation3::from_axis_angle(&Vector3::y_axis(), -pitch * DEG_TO_RAD);
        let undo_roll = Rotation3::from_axis_angle(&Vector3::x_axis(), sin_roll.atan2(gravity_z));
        undo_pitch * undo_roll
    }

    /// Sensor-frame acceleration expressed in the level frame, gravity included
    pub fn to_world(&self, accel: &Vector3<f32>, pitch: f32, roll: f32) -> Vector3<f32> {
        Self::rotation(pitch, roll) * *accel
    }

    /// Gravity-free acceleration in the level frame
    pub fn to_linear(&self, accel: &Vector3<f32>, pitch: f32, roll: f32) -> Vector3<f32> {
        let mut world = self.to_world(accel, pitch, roll);
        world.z -= self.gravity;
        world
    }

    /// Gravity-free acceleration using the tilt of an estimator output
    pub fn linear_acceleration(&self, accel: &Vector3<f32>, orientation: &OrientationState) -> Vector3<f32> {
        let (pitch, roll) = orientation.tilt();
        self.to_linear(accel, pitch, roll)
    }
}

impl Default for FrameTransformer {
    fn default() -> Self {
        Self::new(STANDARD_GRAVITY)
    }
}
