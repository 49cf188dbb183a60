//! Complementary tilt filter

use crate::math::accel_tilt;
use nalgebra::Vector3;

/// Complementary filter estimating pitch and roll.
///
/// Blends integrated gyroscope rate (smooth, drifts) with the accelerometer
/// tilt (noisy, drift-free):
///
/// ```text
/// pitch = α·(pitch + gy·dt) + (1 − α)·accelPitch
/// roll  = α·(roll  + gx·dt) + (1 − α)·accelRoll
/// ```
///
/// Yaw is not observable without a magnetic reference and is not tracked.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use fusion_trail::ComplementaryFilter;
///
/// let mut filter = ComplementaryFilter::new(0.98);
/// let (pitch, roll) = filter.update(Vector3::zeros(), Vector3::new(0.0, 0.0, 9.81), 0.01);
/// assert_eq!((pitch, roll), (0.0, 0.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplementaryFilter {
    /// Gyro weight
    alpha: f32,
    /// Degrees
    pitch: f32,
    /// Degrees
    roll: f32,
}

impl ComplementaryFilter {
    /// Create a level filter with gyro weight `alpha`
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha,
            pitch: 0.0,
            roll: 0.0,
        }
    }

    /// Advance the estimate by `dt` seconds.
    ///
    /// # Arguments
    /// * `gyroscope` - Angular rate in degrees per second
    /// * `accelerometer` - Acceleration, any consistent unit
    /// * `dt` - Elapsed time in seconds
    ///
    /// # Returns
    /// `(pitch, roll)` in degrees
    pub fn update(&mut self, gyroscope: Vector3<f32>, accelerometer: Vector3<f32>, dt: f32) -> (f32, f32) {
        let (accel_pitch, accel_roll) = accel_tilt(&accelerometer);

        self.pitch = self.alpha * (self.pitch + gyroscope.y * dt) + (1.0 - self.alpha) * accel_pitch;
        self.roll = self.alpha * (self.roll + gyroscope.x * dt) + (1.0 - self.alpha) * accel_roll;

        (self.pitch, self.roll)
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn roll(&self) -> f32 {
        self.roll
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Overwrite the current estimate
    pub fn set_angles(&mut self, pitch: f32, roll: f32) {
        self.pitch = pitch;
        self.roll = roll;
    }

    /// Return to level
    pub fn reset(&mut self) {
        self.set_angles(0.0, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::DEG_TO_RAD;

    #[test]
    fn test_static_convergence() {
        let mut filter = ComplementaryFilter::new(0.98);
        let accel = Vector3::new(0.3, -0.4, 0.87) * 9.81;
        let (expected_pitch, expected_roll) = accel_tilt(&accel);

        for _ in 0..1000 {
            filter.update(Vector3::zeros(), accel, 0.01);
        }

        assert!((filter.pitch() - expected_pitch).abs() < 1e-3);
        assert!((filter.roll() - expected_roll).abs() < 1e-3);
    }

    #[test]
    fn test_single_step_blend() {
        let mut filter = ComplementaryFilter::new(0.9);
        filter.set_angles(10.0, -10.0);

        // level accelerometer, rotating at 20 deg/s about y and 0 about x
        let (pitch, roll) = filter.update(Vector3::new(0.0, 20.0, 0.0), Vector3::new(0.0, 0.0, 1.0), 0.5);

        assert!((pitch - 0.9 * (10.0 + 10.0)).abs() < 1e-5);
        assert!((roll - 0.9 * -10.0).abs() < 1e-5);
    }

    #[test]
    fn test_alpha_zero_follows_accelerometer() {
        let mut filter = ComplementaryFilter::new(0.0);
        let angle = 30.0 * DEG_TO_RAD;
        let (pitch, roll) = filter.update(
            Vector3::new(100.0, 100.0, 0.0),
            Vector3::new(angle.sin(), 0.0, angle.cos()),
            0.01,
        );
        assert!((pitch - 30.0).abs() < 1e-4);
        assert!(roll.abs() < 1e-4);
    }

    #[test]
    fn test_reset() {
        let mut filter = ComplementaryFilter::new(0.98);
        filter.update(Vector3::new(50.0, 50.0, 0.0), Vector3::new(1.0, 1.0, 1.0), 0.1);
        assert!(filter.pitch() != 0.0);

        filter.reset();
        assert_eq!((filter.pitch(), filter.roll()), (0.0, 0.0));
    }
}
