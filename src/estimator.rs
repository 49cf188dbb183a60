//! Interchangeable orientation estimators behind one update contract

use crate::complementary::ComplementaryFilter;
use crate::madgwick::MadgwickFilter;
use crate::types::{FilterKind, OrientationState, PipelineSettings, Sample};
use tracing::warn;

/// Orientation strategy, selected once at construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrientationFilter {
    Complementary(ComplementaryFilter),
    MadgwickQuaternion(MadgwickFilter),
}

impl OrientationFilter {
    fn update(&mut self, sample: &Sample, dt: f32) -> OrientationState {
        match self {
            OrientationFilter::Complementary(filter) => {
                let (pitch, roll) = filter.update(sample.gyro, sample.accel, dt);
                OrientationState::Tilt { pitch, roll }
            }
            OrientationFilter::MadgwickQuaternion(filter) => {
                OrientationState::Quaternion(filter.update(sample.gyro, sample.accel, dt))
            }
        }
    }

    fn restore(&mut self, state: &OrientationState) {
        match (self, state) {
            (OrientationFilter::Complementary(filter), OrientationState::Tilt { pitch, roll }) => {
                filter.set_angles(*pitch, *roll);
            }
            (OrientationFilter::MadgwickQuaternion(filter), OrientationState::Quaternion(q)) => {
                filter.set_quaternion(*q);
            }
            (OrientationFilter::Complementary(filter), _) => filter.reset(),
            (OrientationFilter::MadgwickQuaternion(filter), _) => filter.reset(),
        }
    }

    fn kind(&self) -> FilterKind {
        match self {
            OrientationFilter::Complementary(_) => FilterKind::Complementary,
            OrientationFilter::MadgwickQuaternion(_) => FilterKind::MadgwickQuaternion,
        }
    }
}

/// Orientation estimator guarding against non-finite output.
///
/// Whenever an update produces a non-finite orientation, the filter is rolled
/// back to the last finite state (level at start) and that state is returned,
/// so downstream stages only ever see finite orientations.
///
/// # Example
/// ```
/// use fusion_trail::{FilterKind, OrientationEstimator, PipelineSettings, Sample};
///
/// let settings = PipelineSettings {
///     filter: FilterKind::MadgwickQuaternion,
///     ..Default::default()
/// };
/// let mut estimator = OrientationEstimator::new(&settings);
/// let state = estimator.update(&Sample::new(10, [0.0, 0.0, 9.81], [0.0; 3]), 0.01);
/// assert!(state.quaternion().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct OrientationEstimator {
    filter: OrientationFilter,
    last_good: OrientationState,
    resets: u64,
}

impl OrientationEstimator {
    /// Create the estimator selected by `settings.filter`
    pub fn new(settings: &PipelineSettings) -> Self {
        let filter = match settings.filter {
            FilterKind::Complementary => {
                OrientationFilter::Complementary(ComplementaryFilter::new(settings.alpha))
            }
            FilterKind::MadgwickQuaternion => {
                OrientationFilter::MadgwickQuaternion(MadgwickFilter::new(settings.beta))
            }
        };
        Self::with_filter(filter)
    }

    /// Wrap an already configured filter
    pub fn with_filter(filter: OrientationFilter) -> Self {
        Self {
            filter,
            last_good: OrientationState::level(filter.kind()),
            resets: 0,
        }
    }

    /// Advance the estimate with a canonical-unit sample (m/s², deg/s) over `dt` seconds
    pub fn update(&mut self, sample: &Sample, dt: f32) -> OrientationState {
        let state = self.filter.update(sample, dt);
        if state.is_finite() {
            self.last_good = state;
            return state;
        }

        self.resets += 1;
        warn!(
            timestamp = sample.timestamp,
            dt,
            resets = self.resets,
            "Non-finite orientation, restoring last good estimate"
        );
        self.filter.restore(&self.last_good);
        self.last_good
    }

    /// Latest finite orientation
    pub fn state(&self) -> OrientationState {
        self.last_good
    }

    pub fn kind(&self) -> FilterKind {
        self.filter.kind()
    }

    /// Number of times a non-finite update was rolled back
    pub fn resets(&self) -> u64 {
        self.resets
    }

    pub fn filter(&self) -> &OrientationFilter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;

    fn level_sample(timestamp: u32) -> Sample {
        Sample::new(timestamp, [0.0, 0.0, 9.81], [0.0; 3])
    }

    #[test]
    fn test_selects_configured_filter() {
        let complementary = OrientationEstimator::new(&PipelineSettings::default());
        assert_eq!(complementary.kind(), FilterKind::Complementary);
        assert_eq!(
            complementary.state(),
            OrientationState::Tilt {
                pitch: 0.0,
                roll: 0.0
            }
        );

        let settings = PipelineSettings {
            filter: FilterKind::MadgwickQuaternion,
            ..Default::default()
        };
        let madgwick = OrientationEstimator::new(&settings);
        assert_eq!(madgwick.kind(), FilterKind::MadgwickQuaternion);
        assert_eq!(
            madgwick.state(),
            OrientationState::Quaternion(UnitQuaternion::identity())
        );
    }

    #[test]
    fn test_non_finite_update_restores_last_good() {
        let mut estimator = OrientationEstimator::new(&PipelineSettings::default());
        let good = estimator.update(&Sample::new(10, [1.0, 0.0, 9.7], [5.0, 0.0, 0.0]), 0.01);
        assert!(good.is_finite());

        let restored = estimator.update(&level_sample(20), f32::NAN);
        assert_eq!(restored, good);
        assert_eq!(estimator.resets(), 1);

        // The filter itself was rolled back, not just the reported state
        let next = estimator.update(&level_sample(30), 0.01);
        assert!(next.is_finite());
    }

    #[test]
    fn test_quaternion_reset_on_infinite_rate() {
        let settings = PipelineSettings {
            filter: FilterKind::MadgwickQuaternion,
            ..Default::default()
        };
        let mut estimator = OrientationEstimator::new(&settings);

        let state = estimator.update(
            &Sample::new(10, [0.0, 0.0, 9.81], [f32::INFINITY, 0.0, 0.0]),
            0.01,
        );
        assert!(state.is_finite());
        assert_eq!(estimator.resets(), 1);
        assert_eq!(state, OrientationState::Quaternion(UnitQuaternion::identity()));
    }
}
