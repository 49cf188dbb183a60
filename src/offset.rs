//! Runtime gyroscope offset correction

use crate::types::GyroOffsetSettings;
use nalgebra::Vector3;

/// Gyroscope offset correction.
///
/// Estimates and removes gyroscope bias drift, typically caused by temperature
/// changes. While the corrected rate stays below the stationary threshold on
/// every axis for the configured timeout, the estimate follows the residual
/// rate through a first-order low-pass filter.
///
/// Sample spacing may vary, so the timeout is accumulated in seconds and the
/// filter coefficient is recomputed per update as `2π·fc·dt`.
#[derive(Debug, Clone, Copy)]
pub struct GyroOffset {
    settings: GyroOffsetSettings,
    /// Seconds the sensor has been stationary
    stationary_time: f32,
    /// Estimated gyroscope offset in degrees per second
    gyroscope_offset: Vector3<f32>,
}

impl GyroOffset {
    /// Create an offset estimator with a zero initial estimate
    ///
    /// # Example
    /// ```
    /// use fusion_trail::{GyroOffset, GyroOffsetSettings};
    ///
    /// let mut offset = GyroOffset::new(GyroOffsetSettings::default());
    /// ```
    pub fn new(settings: GyroOffsetSettings) -> Self {
        Self {
            settings,
            stationary_time: 0.0,
            gyroscope_offset: Vector3::zeros(),
        }
    }

    /// Update the offset estimate and return the corrected gyroscope reading
    ///
    /// # Arguments
    /// * `gyroscope` - Raw gyroscope reading in degrees per second
    /// * `dt` - Seconds since the previous reading
    ///
    /// # Example
    /// ```
    /// use nalgebra::Vector3;
    /// use fusion_trail::{GyroOffset, GyroOffsetSettings};
    ///
    /// let mut offset = GyroOffset::new(GyroOffsetSettings::default());
    /// let corrected = offset.update(Vector3::new(0.1, 0.2, 0.3), 0.01);
    /// ```
    pub fn update(&mut self, gyroscope: Vector3<f32>, dt: f32) -> Vector3<f32> {
        let corrected = gyroscope - self.gyroscope_offset;

        // Any axis above threshold counts as motion
        if corrected.iter().any(|rate| rate.abs() > self.settings.threshold) {
            self.stationary_time = 0.0;
            return corrected;
        }

        if self.stationary_time < self.settings.timeout {
            self.stationary_time += dt;
            return corrected;
        }

        let coefficient = 2.0 * core::f32::consts::PI * self.settings.cutoff_frequency * dt;
        self.gyroscope_offset += corrected * coefficient.min(1.0);

        corrected
    }

    /// Current offset estimate in degrees per second
    pub fn offset(&self) -> Vector3<f32> {
        self.gyroscope_offset
    }

    /// Whether the stationary timeout has elapsed and the estimate is moving
    pub fn is_active(&self) -> bool {
        self.stationary_time >= self.settings.timeout
    }

    /// Seconds the sensor has been stationary
    pub fn stationary_time(&self) -> f32 {
        self.stationary_time
    }

    /// Clear the estimate and the stationary timer
    pub fn reset(&mut self) {
        self.stationary_time = 0.0;
        self.gyroscope_offset = Vector3::zeros();
    }
}

impl Default for GyroOffset {
    fn default() -> Self {
        Self::new(GyroOffsetSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.01;

    #[test]
    fn test_offset_initialization() {
        let offset = GyroOffset::default();
        assert_eq!(offset.offset(), Vector3::zeros());
        assert!(!offset.is_active());
        assert_eq!(offset.stationary_time(), 0.0);
    }

    #[test]
    fn test_offset_motion_detection() {
        let mut offset = GyroOffset::default();

        let stationary = Vector3::new(2.0, 1.0, 1.5);
        let corrected = offset.update(stationary, DT);
        assert_eq!(offset.stationary_time(), DT);
        assert_eq!(corrected, stationary);

        offset.update(Vector3::new(5.0, 0.0, 0.0), DT);
        assert_eq!(offset.stationary_time(), 0.0);
        assert!(!offset.is_active());
    }

    #[test]
    fn test_offset_stationary_timeout() {
        let settings = GyroOffsetSettings {
            timeout: 0.5,
            ..Default::default()
        };
        let mut offset = GyroOffset::new(settings);
        let stationary = Vector3::new(0.1, 0.1, 0.1);

        // 0.125 s steps reach the 0.5 s timeout after four updates
        for _ in 0..4 {
            assert!(!offset.is_active());
            let corrected = offset.update(stationary, 0.125);
            assert_eq!(corrected, stationary);
        }
        assert!(offset.is_active());
        assert_eq!(offset.offset(), Vector3::zeros());

        offset.update(stationary, 0.125);
        assert!(offset.offset().magnitude() > 0.0);
    }

    #[test]
    fn test_offset_estimation_convergence() {
        let mut offset = GyroOffset::default();
        let true_bias = Vector3::new(0.5, -0.3, 0.2);

        // 5 s timeout at 100 Hz, then let the 0.02 Hz filter settle
        for _ in 0..(500 + 5000) {
            offset.update(true_bias, DT);
        }
        assert!(offset.is_active());

        let error = (offset.offset() - true_bias).magnitude();
        assert!(error < true_bias.magnitude() * 0.5);
    }

    #[test]
    fn test_offset_correction_application() {
        let mut offset = GyroOffset::default();
        for _ in 0..1000 {
            offset.update(Vector3::new(1.0, 2.0, 2.5), DT);
        }

        let raw = Vector3::new(5.0, 6.0, 7.0);
        let expected = raw - offset.offset();
        let corrected = offset.update(raw, DT);
        assert!((corrected - expected).magnitude() < 1e-6);
    }

    #[test]
    fn test_offset_threshold_is_exclusive() {
        let mut offset = GyroOffset::default();
        let threshold = GyroOffsetSettings::default().threshold;

        offset.update(Vector3::new(threshold - 0.1, 0.0, 0.0), DT);
        offset.update(Vector3::new(threshold, 0.0, 0.0), DT);
        assert!((offset.stationary_time() - 2.0 * DT).abs() < 1e-6);

        offset.update(Vector3::new(0.0, 0.0, -(threshold + 0.1)), DT);
        assert_eq!(offset.stationary_time(), 0.0);
    }

    #[test]
    fn test_offset_reset() {
        let mut offset = GyroOffset::default();
        for _ in 0..100 {
            offset.update(Vector3::new(0.1, 0.1, 0.1), DT);
        }
        assert!(offset.stationary_time() > 0.0);

        offset.reset();
        assert_eq!(offset.stationary_time(), 0.0);
        assert_eq!(offset.offset(), Vector3::zeros());
    }
}
