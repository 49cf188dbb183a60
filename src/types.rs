//! Core types and conventions for the fusion pipeline

use crate::error::{ConfigError, DecodeError};
use crate::math::{QuaternionExt, STANDARD_GRAVITY, Vector3Ext, RAD_TO_DEG};
use nalgebra::{UnitQuaternion, Vector3};

/// A timestamped inertial reading.
///
/// Inside the pipeline every sample is in the canonical convention:
/// - `timestamp` in milliseconds, monotonic non-decreasing
/// - `accel` in m/s²
/// - `gyro` in degrees per second
///
/// Samples produced by a source in other units are converted once, at the
/// pipeline boundary, by [`UnitConvention::to_canonical`].
///
/// # Example
/// ```
/// use fusion_trail::Sample;
///
/// let sample = Sample::new(1_000, [0.0, 0.0, 9.81], [0.0, 0.0, 0.0]);
/// assert!(sample.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Device time in milliseconds
    pub timestamp: u32,
    /// Tri-axial acceleration
    pub accel: Vector3<f32>,
    /// Tri-axial angular rate
    pub gyro: Vector3<f32>,
}

impl Sample {
    /// Create a sample from per-axis arrays
    pub fn new(timestamp: u32, accel: [f32; 3], gyro: [f32; 3]) -> Self {
        Self {
            timestamp,
            accel: Vector3::from(accel),
            gyro: Vector3::from(gyro),
        }
    }

    /// Reject samples carrying NaN or infinite components
    pub fn validate(&self) -> Result<(), DecodeError> {
        if !self.accel.all_finite() {
            return Err(DecodeError::NonFiniteSample {
                timestamp: self.timestamp,
                field: "accel",
            });
        }
        if !self.gyro.all_finite() {
            return Err(DecodeError::NonFiniteSample {
                timestamp: self.timestamp,
                field: "gyro",
            });
        }
        Ok(())
    }
}

/// Unit of the acceleration channels reported by a sample source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelUnit {
    /// Multiples of standard gravity
    #[default]
    G,
    /// Metres per second squared
    MetersPerSecondSquared,
}

/// Unit of the angular rate channels reported by a sample source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GyroUnit {
    /// Degrees per second
    #[default]
    DegreesPerSecond,
    /// Radians per second
    RadiansPerSecond,
}

/// Unit convention of a sample source.
///
/// Prototype firmware variants disagree on units, so the convention is always
/// stated explicitly rather than guessed from the data. The default matches the
/// reference IMU firmware: g and deg/s.
///
/// # Example
/// ```
/// use fusion_trail::{AccelUnit, GyroUnit, Sample, UnitConvention};
///
/// let units = UnitConvention {
///     accel: AccelUnit::G,
///     gyro: GyroUnit::RadiansPerSecond,
/// };
/// let canonical = units.to_canonical(Sample::new(0, [0.0, 0.0, 1.0], [0.0, 0.0, 1.0]), 9.81);
///
/// assert!((canonical.accel.z - 9.81).abs() < 1e-6);
/// assert!((canonical.gyro.z - 57.29578).abs() < 1e-3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnitConvention {
    pub accel: AccelUnit,
    pub gyro: GyroUnit,
}

impl UnitConvention {
    /// Canonical convention: m/s² and deg/s
    pub const CANONICAL: UnitConvention = UnitConvention {
        accel: AccelUnit::MetersPerSecondSquared,
        gyro: GyroUnit::DegreesPerSecond,
    };

    /// Convert a source sample into m/s² and deg/s
    pub fn to_canonical(&self, sample: Sample, gravity: f32) -> Sample {
        let accel = match self.accel {
            AccelUnit::G => sample.accel * gravity,
            AccelUnit::MetersPerSecondSquared => sample.accel,
        };
        let gyro = match self.gyro {
            GyroUnit::DegreesPerSecond => sample.gyro,
            GyroUnit::RadiansPerSecond => sample.gyro.rad_to_deg(),
        };

        Sample {
            timestamp: sample.timestamp,
            accel,
            gyro,
        }
    }
}

/// Orientation estimation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    /// Complementary filter, roll and pitch only
    #[default]
    Complementary,
    /// Gradient-descent quaternion filter (Madgwick), full 3-DoF without heading reference
    MadgwickQuaternion,
}

/// Orientation produced by an estimator update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrientationState {
    /// Pitch and roll in degrees from the complementary filter
    Tilt { pitch: f32, roll: f32 },
    /// Unit quaternion from the gradient-descent filter
    Quaternion(UnitQuaternion<f32>),
}

impl OrientationState {
    /// Level orientation for the given filter
    pub fn level(kind: FilterKind) -> Self {
        match kind {
            FilterKind::Complementary => OrientationState::Tilt {
                pitch: 0.0,
                roll: 0.0,
            },
            FilterKind::MadgwickQuaternion => OrientationState::Quaternion(UnitQuaternion::identity()),
        }
    }

    /// Pitch and roll in degrees, in the convention the frame transformer expects
    ///
    /// For the quaternion form these come from the estimated gravity direction,
    /// so both estimators share one sign convention.
    pub fn tilt(&self) -> (f32, f32) {
        match self {
            OrientationState::Tilt { pitch, roll } => (*pitch, *roll),
            OrientationState::Quaternion(q) => q.tilt_degrees(),
        }
    }

    /// Euler angles for presentation.
    ///
    /// Pitch and roll carry the same signs as [`tilt`](Self::tilt) for both forms.
    /// The quaternion yaw is not absolutely referenced and drifts freely. Near
    /// ±90° pitch the extraction is ill-conditioned; prefer [`quaternion`](Self::quaternion)
    /// where robustness matters.
    pub fn euler(&self) -> EulerAngles {
        match self {
            OrientationState::Tilt { pitch, roll } => EulerAngles {
                roll: *roll,
                pitch: *pitch,
                yaw: 0.0,
            },
            OrientationState::Quaternion(q) => {
                // q maps sensor to earth, which flips pitch relative to the tilt convention
                let (roll, pitch, yaw) = q.euler_angles();
                EulerAngles {
                    roll: roll * RAD_TO_DEG,
                    pitch: -pitch * RAD_TO_DEG,
                    yaw: yaw * RAD_TO_DEG,
                }
            }
        }
    }

    /// The quaternion, when the active estimator maintains one
    pub fn quaternion(&self) -> Option<UnitQuaternion<f32>> {
        match self {
            OrientationState::Quaternion(q) => Some(*q),
            OrientationState::Tilt { .. } => None,
        }
    }

    /// Whether every component is finite
    pub fn is_finite(&self) -> bool {
        match self {
            OrientationState::Tilt { pitch, roll } => pitch.is_finite() && roll.is_finite(),
            OrientationState::Quaternion(q) => q.all_finite(),
        }
    }
}

/// Euler angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// Gyroscope offset correction settings
///
/// Configuration for the runtime gyroscope bias estimator. The estimate only
/// moves while the corrected rate stays below `threshold` on every axis for at
/// least `timeout` seconds.
///
/// # Example
/// ```
/// use fusion_trail::GyroOffsetSettings;
///
/// let settings = GyroOffsetSettings {
///     timeout: 10.0,              // 10 seconds to detect stationary
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GyroOffsetSettings {
    /// Low-pass cutoff frequency of the offset estimate in Hz (typically 0.02)
    pub cutoff_frequency: f32,
    /// Seconds the sensor must remain stationary before estimation begins (typically 5.0)
    pub timeout: f32,
    /// Stationary threshold in degrees per second (typically 3.0)
    pub threshold: f32,
}

impl Default for GyroOffsetSettings {
    fn default() -> Self {
        Self {
            cutoff_frequency: 0.02,
            timeout: 5.0,
            threshold: 3.0,
        }
    }
}

/// Pipeline settings
///
/// Every tunable of the pipeline, passed by value at construction. Nothing is
/// read from global state.
///
/// # Example
/// ```
/// use fusion_trail::{FilterKind, PipelineSettings, UnitConvention};
///
/// let settings = PipelineSettings {
///     filter: FilterKind::MadgwickQuaternion,
///     beta: 0.1,
///     display_capacity: 500,
///     units: UnitConvention::CANONICAL,
///     ..Default::default()
/// };
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    /// Active orientation estimator
    pub filter: FilterKind,
    /// Complementary filter gyro weight (typically 0.98)
    ///
    /// Higher values trust gyro integration more; lower values follow the
    /// accelerometer tilt faster but pass more of its noise.
    pub alpha: f32,
    /// Quaternion filter gain (typically 0.033)
    ///
    /// Magnitude of the accelerometer correction step in rad/s.
    pub beta: f32,
    /// Number of positions kept for display
    pub display_capacity: usize,
    /// Number of samples the ingestion channel buffers before the producer waits
    pub channel_capacity: usize,
    /// Units reported by the sample source
    pub units: UnitConvention,
    /// Gravitational acceleration in m/s²
    pub gravity: f32,
    /// Runtime gyroscope bias correction, disabled when `None`
    pub gyro_offset: Option<GyroOffsetSettings>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            filter: FilterKind::default(),
            alpha: 0.98,
            beta: 0.033,
            display_capacity: 100,
            channel_capacity: 256,
            units: UnitConvention::default(),
            gravity: STANDARD_GRAVITY,
            gyro_offset: None,
        }
    }
}

impl PipelineSettings {
    /// Check every field is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::Alpha(self.alpha));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(ConfigError::Beta(self.beta));
        }
        if !self.gravity.is_finite() || self.gravity <= 0.0 {
            return Err(ConfigError::Gravity(self.gravity));
        }
        if self.display_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("display_capacity"));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("channel_capacity"));
        }
        if let Some(offset) = self.gyro_offset {
            if !(offset.cutoff_frequency.is_finite() && offset.cutoff_frequency > 0.0) {
                return Err(ConfigError::GyroOffset("cutoff_frequency must be positive"));
            }
            if !(offset.timeout.is_finite() && offset.timeout >= 0.0) {
                return Err(ConfigError::GyroOffset("timeout must be non-negative"));
            }
            if !(offset.threshold.is_finite() && offset.threshold > 0.0) {
                return Err(ConfigError::GyroOffset("threshold must be positive"));
            }
        }
        Ok(())
    }
}

/// Why a pipeline stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every producer closed the ingestion channel and the queue was drained
    ChannelClosed,
    /// A stop was requested through the pipeline handle
    StopRequested,
}

/// Lifecycle of a pipeline driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStatus {
    #[default]
    Idle,
    Running,
    Stopped(StopReason),
}
