//! Semi-implicit Euler dead reckoning

use nalgebra::Vector3;

/// Velocity and position accumulated by the [`Integrator`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicState {
    /// m/s
    pub velocity: Vector3<f32>,
    /// m
    pub position: Vector3<f32>,
    /// Timestamp of the last accepted sample in milliseconds
    pub prev_timestamp: Option<u32>,
}

impl Default for KinematicState {
    fn default() -> Self {
        Self {
            velocity: Vector3::zeros(),
            position: Vector3::zeros(),
            prev_timestamp: None,
        }
    }
}

/// Time elapsed since the previous accepted sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeStep {
    /// No sample accepted yet
    First,
    /// Timestamp did not advance
    NonPositive { elapsed_ms: i64 },
    /// Seconds since the previous sample
    Elapsed(f32),
}

/// Result of [`Integrator::step`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// First sample, only the timestamp was recorded
    Seeded,
    /// Non-positive elapsed time, state left untouched
    Skipped,
    /// State advanced by `dt` seconds
    Integrated { dt: f32 },
}

/// Double integration of world-frame linear acceleration.
///
/// ```text
/// v_new = v_prev + a·dt
/// p_new = p_prev + v_new·dt
/// ```
///
/// Velocity is updated first and the new velocity moves the position. There is
/// no drift compensation, so any residual acceleration bias grows the position
/// error quadratically.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use fusion_trail::{Integrator, StepOutcome};
///
/// let mut integrator = Integrator::new();
/// assert_eq!(integrator.step(0, Vector3::new(1.0, 0.0, 0.0)), StepOutcome::Seeded);
/// assert_eq!(
///     integrator.step(500, Vector3::new(1.0, 0.0, 0.0)),
///     StepOutcome::Integrated { dt: 0.5 }
/// );
/// assert_eq!(integrator.velocity(), Vector3::new(0.5, 0.0, 0.0));
/// assert_eq!(integrator.position(), Vector3::new(0.25, 0.0, 0.0));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Integrator {
    state: KinematicState,
}

impl Integrator {
    /// Start at rest at the origin
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed time from the previous accepted sample to `timestamp`, without
    /// modifying any state.
    pub fn time_step(&self, timestamp: u32) -> TimeStep {
        match self.state.prev_timestamp {
            None => TimeStep::First,
            Some(prev) => {
                let elapsed_ms = i64::from(timestamp) - i64::from(prev);
                if elapsed_ms <= 0 {
                    TimeStep::NonPositive { elapsed_ms }
                } else {
                    TimeStep::Elapsed(elapsed_ms as f32 / 1000.0)
                }
            }
        }
    }

    /// Advance with world-frame linear acceleration in m/s² observed at `timestamp` ms
    pub fn step(&mut self, timestamp: u32, accel: Vector3<f32>) -> StepOutcome {
        match self.time_step(timestamp) {
            TimeStep::First => {
                self.state.prev_timestamp = Some(timestamp);
                StepOutcome::Seeded
            }
            TimeStep::NonPositive { .. } => StepOutcome::Skipped,
            TimeStep::Elapsed(dt) => {
                self.state.velocity += accel * dt;
                self.state.position += self.state.velocity * dt;
                self.state.prev_timestamp = Some(timestamp);
                StepOutcome::Integrated { dt }
            }
        }
    }

    pub fn state(&self) -> &KinematicState {
        &self.state
    }

    pub fn velocity(&self) -> Vector3<f32> {
        self.state.velocity
    }

    pub fn position(&self) -> Vector3<f32> {
        self.state.position
    }

    /// Return to rest at the origin and forget the previous timestamp
    pub fn reset(&mut self) {
        self.state = KinematicState::default();
    }
}
