//! Pipeline driver: pull samples, estimate orientation, dead-reckon, publish.
//!
//! [`PipelineDriver`] owns every piece of fusion state and advances it one
//! sample at a time with [`PipelineDriver::process`], which is synchronous and
//! needs no scheduler. [`PipelineTask::run`] wraps the driver in an `async` loop
//! that waits on the ingestion channel and the stop signal at the same time.
//!
//! Readers never touch driver state. After every sample the driver publishes a
//! [`PipelineSnapshot`] into a single-slot latest-value channel, read through
//! [`PipelineMonitor`].

use crate::display::{DisplayBuffer, DisplayWindow};
use crate::error::{ConfigError, DecodeError, LifecycleError};
use crate::estimator::OrientationEstimator;
use crate::frame::FrameTransformer;
use crate::ingest::{self, SampleReceiver, SampleSender};
use crate::integrator::{Integrator, TimeStep};
use crate::math::Vector3Ext;
use crate::offset::GyroOffset;
use crate::recorder::{RecordRow, Recorder};
use crate::types::{
    EulerAngles, OrientationState, PipelineSettings, PipelineStatus, Sample, StopReason,
};
use nalgebra::Vector3;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

/// Samples between periodic progress logs
const PROGRESS_INTERVAL: u64 = 1000;

/// Per-run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Samples pulled from the channel while running
    pub received: u64,
    /// Samples that advanced the integrator
    pub processed: u64,
    /// Samples dropped for non-finite values
    pub dropped: u64,
    /// Samples whose timestamp did not advance
    pub skipped: u64,
    /// Non-finite orientation updates rolled back
    pub orientation_resets: u64,
}

/// What the driver did with one sample
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// First sample of the run, timestamp recorded only
    Seeded,
    /// Orientation, kinematics and display advanced by `dt` seconds
    Processed { dt: f32 },
    /// Timestamp did not advance, state unchanged
    Skipped { elapsed_ms: i64 },
    /// Sample rejected
    Dropped(DecodeError),
    /// Driver is not running
    NotRunning,
}

/// Latest pipeline state as seen by a visualizer
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSnapshot {
    pub status: PipelineStatus,
    pub orientation: OrientationState,
    /// Degrees, for presentation only
    pub euler: EulerAngles,
    /// m/s
    pub velocity: Vector3<f32>,
    /// Latest position in m
    pub position: Vector3<f32>,
    pub window: DisplayWindow,
    pub stats: PipelineStats,
}

impl PipelineSnapshot {
    fn idle(settings: &PipelineSettings) -> Self {
        let orientation = OrientationState::level(settings.filter);
        Self {
            status: PipelineStatus::Idle,
            orientation,
            euler: orientation.euler(),
            velocity: Vector3::zeros(),
            position: Vector3::zeros(),
            window: DisplayWindow::default(),
            stats: PipelineStats::default(),
        }
    }
}

/// Fusion state that exists only while the driver is running
#[derive(Debug)]
struct FusionState {
    estimator: OrientationEstimator,
    transformer: FrameTransformer,
    integrator: Integrator,
    display: DisplayBuffer,
    gyro_offset: Option<GyroOffset>,
    first_timestamp: Option<u32>,
}

impl FusionState {
    fn new(settings: &PipelineSettings) -> Self {
        Self {
            estimator: OrientationEstimator::new(settings),
            transformer: FrameTransformer::new(settings.gravity),
            integrator: Integrator::new(),
            display: DisplayBuffer::new(settings.display_capacity),
            gyro_offset: settings.gyro_offset.map(GyroOffset::new),
            first_timestamp: None,
        }
    }

    fn snapshot(&self, status: PipelineStatus, stats: PipelineStats) -> PipelineSnapshot {
        let orientation = self.estimator.state();
        PipelineSnapshot {
            status,
            orientation,
            euler: orientation.euler(),
            velocity: self.integrator.velocity(),
            position: self.integrator.position(),
            window: self.display.snapshot(),
            stats,
        }
    }
}

/// Single consumer of the sample stream.
///
/// Lifecycle is `Idle → Running → Stopped`. Fusion state is created by
/// [`start`](Self::start) and released by [`stop`](Self::stop); a stopped
/// driver does not restart.
///
/// # Example
/// ```
/// use fusion_trail::{PipelineDriver, PipelineSettings, Sample, SampleOutcome, StopReason};
///
/// let mut driver = PipelineDriver::new(PipelineSettings::default()).unwrap();
/// let monitor = driver.monitor();
/// driver.start().unwrap();
///
/// assert_eq!(driver.process(Sample::new(0, [0.0, 0.0, 1.0], [0.0; 3])), SampleOutcome::Seeded);
/// assert_eq!(
///     driver.process(Sample::new(10, [0.0, 0.0, 1.0], [0.0; 3])),
///     SampleOutcome::Processed { dt: 0.01 }
/// );
/// assert_eq!(monitor.snapshot().window.len(), 1);
///
/// driver.stop(StopReason::ChannelClosed);
/// ```
pub struct PipelineDriver {
    settings: PipelineSettings,
    status: PipelineStatus,
    fusion: Option<FusionState>,
    stats: PipelineStats,
    recorder: Option<Box<dyn Recorder + Send>>,
    snapshots: watch::Sender<PipelineSnapshot>,
}

impl PipelineDriver {
    /// Create an idle driver, rejecting invalid settings
    pub fn new(settings: PipelineSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let (snapshots, _) = watch::channel(PipelineSnapshot::idle(&settings));
        Ok(Self {
            settings,
            status: PipelineStatus::Idle,
            fusion: None,
            stats: PipelineStats::default(),
            recorder: None,
            snapshots,
        })
    }

    /// Attach a recorder receiving every accepted sample
    pub fn set_recorder<R: Recorder + Send + 'static>(&mut self, recorder: R) {
        self.recorder = Some(Box::new(recorder));
    }

    /// Subscribe to published snapshots
    pub fn monitor(&self) -> PipelineMonitor {
        PipelineMonitor {
            snapshots: self.snapshots.subscribe(),
        }
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Create fusion state and begin accepting samples
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        if self.status != PipelineStatus::Idle {
            return Err(LifecycleError::NotIdle(self.status));
        }

        self.fusion = Some(FusionState::new(&self.settings));
        self.status = PipelineStatus::Running;
        info!(
            filter = ?self.settings.filter,
            display_capacity = self.settings.display_capacity,
            gyro_offset = self.settings.gyro_offset.is_some(),
            "Pipeline started"
        );
        self.snapshots.send_modify(|snapshot| snapshot.status = PipelineStatus::Running);
        Ok(())
    }

    /// Advance the pipeline by one sample in the source's unit convention
    pub fn process(&mut self, sample: Sample) -> SampleOutcome {
        let Some(fusion) = self.fusion.as_mut() else {
            return SampleOutcome::NotRunning;
        };
        self.stats.received += 1;

        let sample = self.settings.units.to_canonical(sample, self.settings.gravity);
        if let Err(err) = sample.validate() {
            self.stats.dropped += 1;
            warn!(%err, dropped = self.stats.dropped, "Dropping sample");
            self.snapshots.send_replace(fusion.snapshot(self.status, self.stats));
            return SampleOutcome::Dropped(err);
        }

        let first = *fusion.first_timestamp.get_or_insert(sample.timestamp);
        if let Some(recorder) = self.recorder.as_mut() {
            let row = RecordRow {
                relative_timestamp: sample.timestamp.saturating_sub(first),
                accel_x: sample.accel.x,
                accel_y: sample.accel.y,
                accel_z: sample.accel.z,
            };
            if let Err(err) = recorder.record(&row) {
                warn!(%err, timestamp = sample.timestamp, "Recorder failed to store row");
            }
        }

        let outcome = match fusion.integrator.time_step(sample.timestamp) {
            TimeStep::First => {
                fusion.integrator.step(sample.timestamp, Vector3::zeros());
                SampleOutcome::Seeded
            }
            TimeStep::NonPositive { elapsed_ms } => {
                self.stats.skipped += 1;
                debug!(
                    timestamp = sample.timestamp,
                    elapsed_ms,
                    "Skipping sample, timestamp did not advance"
                );
                SampleOutcome::Skipped { elapsed_ms }
            }
            TimeStep::Elapsed(dt) => {
                // A dropped sample must not advance orientation past the integrator
                let estimator_before = fusion.estimator.clone();
                let offset_before = fusion.gyro_offset;

                let gyro = match fusion.gyro_offset.as_mut() {
                    Some(offset) => offset.update(sample.gyro, dt),
                    None => sample.gyro,
                };
                let corrected = Sample { gyro, ..sample };

                let orientation = fusion.estimator.update(&corrected, dt);
                let linear = fusion.transformer.linear_acceleration(&corrected.accel, &orientation);
                if !linear.all_finite() {
                    fusion.estimator = estimator_before;
                    fusion.gyro_offset = offset_before;
                    self.stats.dropped += 1;
                    let err = DecodeError::NonFiniteSample {
                        timestamp: sample.timestamp,
                        field: "linear acceleration",
                    };
                    warn!(%err, "Dropping sample before integration");
                    SampleOutcome::Dropped(err)
                } else {
                    self.stats.orientation_resets = fusion.estimator.resets();
                    fusion.integrator.step(sample.timestamp, linear);
                    fusion.display.push(fusion.integrator.position());
                    self.stats.processed += 1;
                    if self.stats.processed % PROGRESS_INTERVAL == 0 {
                        debug!(
                            processed = self.stats.processed,
                            position = ?fusion.integrator.position(),
                            "Pipeline progress"
                        );
                    }
                    SampleOutcome::Processed { dt }
                }
            }
        };

        self.snapshots.send_replace(fusion.snapshot(self.status, self.stats));
        outcome
    }

    /// Release fusion state and enter `Stopped`. Stopping twice keeps the first reason.
    pub fn stop(&mut self, reason: StopReason) {
        if matches!(self.status, PipelineStatus::Stopped(_)) {
            return;
        }

        self.fusion = None;
        self.status = PipelineStatus::Stopped(reason);
        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(err) = recorder.finish(reason) {
                warn!(%err, "Recorder failed to finish");
            }
        }

        info!(
            ?reason,
            received = self.stats.received,
            processed = self.stats.processed,
            dropped = self.stats.dropped,
            skipped = self.stats.skipped,
            "Pipeline stopped"
        );

        let (status, stats) = (self.status, self.stats);
        self.snapshots.send_modify(|snapshot| {
            snapshot.status = status;
            snapshot.stats = stats;
        });
    }
}

/// Read side of the snapshot channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PipelineMonitor {
    snapshots: watch::Receiver<PipelineSnapshot>,
}

impl PipelineMonitor {
    /// Copy of the latest snapshot
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn status(&self) -> PipelineStatus {
        self.snapshots.borrow().status
    }

    /// Wait for a snapshot newer than the last one seen. `false` once the driver is gone.
    pub async fn changed(&mut self) -> bool {
        let changed = self.snapshots.changed().await.is_ok();
        self.snapshots.borrow_and_update();
        changed
    }

    /// Wait until the pipeline stops. `None` if the driver was dropped without stopping.
    pub async fn stopped(&mut self) -> Option<StopReason> {
        loop {
            if let PipelineStatus::Stopped(reason) = self.snapshots.borrow_and_update().status {
                return Some(reason);
            }
            if self.snapshots.changed().await.is_err() {
                return match self.snapshots.borrow().status {
                    PipelineStatus::Stopped(reason) => Some(reason),
                    _ => None,
                };
            }
        }
    }
}

/// Control side of a running pipeline
#[derive(Debug)]
pub struct PipelineHandle {
    stop: Option<oneshot::Sender<()>>,
    monitor: PipelineMonitor,
}

impl PipelineHandle {
    /// Ask the pipeline to stop. Samples still queued are discarded.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The task may already have ended
            let _ = stop.send(());
        }
    }

    pub fn monitor(&self) -> PipelineMonitor {
        self.monitor.clone()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.monitor.snapshot()
    }
}

/// The consumer loop, ready to be spawned
pub struct PipelineTask {
    driver: PipelineDriver,
    samples: SampleReceiver,
    stop: oneshot::Receiver<()>,
}

impl PipelineTask {
    /// Attach a recorder receiving every accepted sample
    pub fn with_recorder<R: Recorder + Send + 'static>(mut self, recorder: R) -> Self {
        self.driver.set_recorder(recorder);
        self
    }

    /// Consume samples until the channel is closed and drained or a stop is requested.
    ///
    /// A stop request wins over queued samples: they are discarded. Dropping the
    /// [`PipelineHandle`] without calling stop leaves the pipeline running.
    pub async fn run(self) -> StopReason {
        let PipelineTask {
            mut driver,
            mut samples,
            mut stop,
        } = self;

        if let Err(err) = driver.start() {
            warn!(%err, "Pipeline task could not start");
        }

        let mut stop_armed = true;
        let reason = loop {
            tokio::select! {
                biased;
                signal = &mut stop, if stop_armed => {
                    match signal {
                        Ok(()) => break StopReason::StopRequested,
                        Err(_) => stop_armed = false,
                    }
                }
                next = samples.pop() => {
                    match next {
                        Some(sample) => {
                            driver.process(sample);
                        }
                        None => break StopReason::ChannelClosed,
                    }
                }
            }
        };

        samples.close();
        drop(samples);
        driver.stop(reason);
        reason
    }
}

/// A pipeline split into its producer, consumer and control parts
///
/// # Example
/// ```
/// use fusion_trail::{Pipeline, PipelineSettings, Sample, StopReason};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let Pipeline { sender, task, handle } = Pipeline::build(PipelineSettings::default()).unwrap();
///
/// for t in 0..10 {
///     sender.push(Sample::new(t * 10, [0.0, 0.0, 1.0], [0.0; 3])).await.unwrap();
/// }
/// drop(sender);
///
/// assert_eq!(task.run().await, StopReason::ChannelClosed);
/// assert_eq!(handle.snapshot().stats.processed, 9);
/// # });
/// ```
pub struct Pipeline {
    pub sender: SampleSender,
    pub task: PipelineTask,
    pub handle: PipelineHandle,
}

impl Pipeline {
    pub fn build(settings: PipelineSettings) -> Result<Self, ConfigError> {
        let driver = PipelineDriver::new(settings)?;
        let (sender, samples) = ingest::channel(settings.channel_capacity);
        let (stop_tx, stop_rx) = oneshot::channel();
        let monitor = driver.monitor();

        Ok(Self {
            sender,
            task: PipelineTask {
                driver,
                samples,
                stop: stop_rx,
            },
            handle: PipelineHandle {
                stop: Some(stop_tx),
                monitor,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FilterKind, UnitConvention};

    fn level(timestamp: u32) -> Sample {
        Sample::new(timestamp, [0.0, 0.0, 1.0], [0.0; 3])
    }

    fn running(settings: PipelineSettings) -> PipelineDriver {
        let mut driver = PipelineDriver::new(settings).unwrap();
        driver.start().unwrap();
        driver
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut driver = PipelineDriver::new(PipelineSettings::default()).unwrap();
        assert_eq!(driver.status(), PipelineStatus::Idle);
        assert_eq!(driver.process(level(0)), SampleOutcome::NotRunning);

        driver.start().unwrap();
        assert_eq!(driver.status(), PipelineStatus::Running);
        assert_eq!(
            driver.start(),
            Err(LifecycleError::NotIdle(PipelineStatus::Running))
        );

        driver.stop(StopReason::StopRequested);
        driver.stop(StopReason::ChannelClosed);
        assert_eq!(
            driver.status(),
            PipelineStatus::Stopped(StopReason::StopRequested)
        );
        assert_eq!(driver.process(level(10)), SampleOutcome::NotRunning);
        assert!(driver.start().is_err());
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let settings = PipelineSettings {
            alpha: -0.5,
            ..Default::default()
        };
        assert!(matches!(
            PipelineDriver::new(settings),
            Err(ConfigError::Alpha(_))
        ));
    }

    #[test]
    fn test_level_stream_stays_at_origin() {
        for filter in [FilterKind::Complementary, FilterKind::MadgwickQuaternion] {
            let mut driver = running(PipelineSettings {
                filter,
                ..Default::default()
            });
            let monitor = driver.monitor();

            for t in 0..200 {
                driver.process(level(t * 10));
            }

            let snapshot = monitor.snapshot();
            assert_eq!(snapshot.stats.processed, 199);
            assert!(snapshot.position.magnitude() < 1e-3, "{filter:?}: {:?}", snapshot.position);
            assert!(snapshot.velocity.magnitude() < 1e-3);
            assert_eq!(snapshot.window.len(), 100);
        }
    }

    #[test]
    fn test_drops_non_finite_and_skips_stale() {
        let mut driver = running(PipelineSettings::default());

        assert_eq!(driver.process(level(100)), SampleOutcome::Seeded);
        assert!(matches!(
            driver.process(Sample::new(110, [f32::NAN, 0.0, 1.0], [0.0; 3])),
            SampleOutcome::Dropped(DecodeError::NonFiniteSample { timestamp: 110, .. })
        ));
        assert_eq!(
            driver.process(level(100)),
            SampleOutcome::Skipped { elapsed_ms: 0 }
        );
        assert_eq!(
            driver.process(level(120)),
            SampleOutcome::Processed { dt: 0.02 }
        );

        let stats = driver.stats();
        assert_eq!(stats.received, 4);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.processed, 1);
    }

    #[test]
    fn test_overflowing_sample_leaves_orientation_untouched() {
        let mut driver = running(PipelineSettings {
            units: UnitConvention::CANONICAL,
            ..Default::default()
        });
        let monitor = driver.monitor();

        assert_eq!(
            driver.process(Sample::new(100, [0.0, 0.0, 9.81], [0.0; 3])),
            SampleOutcome::Seeded
        );
        let before = monitor.snapshot();

        // Finite input whose rotated acceleration overflows
        let extreme = Sample::new(
            110,
            [f32::MAX, f32::MAX, -f32::MAX],
            [90.0, 90.0, 0.0],
        );
        assert!(matches!(
            driver.process(extreme),
            SampleOutcome::Dropped(DecodeError::NonFiniteSample {
                timestamp: 110,
                field: "linear acceleration"
            })
        ));

        let after = monitor.snapshot();
        assert_eq!(after.orientation, before.orientation);
        assert_eq!(after.stats.orientation_resets, 0);

        assert_eq!(
            driver.process(Sample::new(120, [0.0, 0.0, 9.81], [0.0; 3])),
            SampleOutcome::Processed { dt: 0.02 }
        );
        let (pitch, roll) = monitor.snapshot().orientation.tilt();
        assert!(pitch.abs() < 1e-6 && roll.abs() < 1e-6);
    }

    #[test]
    fn test_constant_acceleration_moves_along_x() {
        let mut driver = running(PipelineSettings {
            units: UnitConvention::CANONICAL,
            alpha: 1.0,
            ..Default::default()
        });
        let monitor = driver.monitor();

        // alpha = 1 trusts the gyro only, so the filter stays level
        for t in 0..=100 {
            driver.process(Sample::new(t * 10, [1.0, 0.0, 9.81], [0.0; 3]));
        }

        let snapshot = monitor.snapshot();
        assert!((snapshot.velocity.x - 1.0).abs() < 1e-3);
        assert!((snapshot.position.x - 0.505).abs() < 1e-3);
        assert!(snapshot.position.z.abs() < 1e-4);
    }

    #[test]
    fn test_records_relative_timestamps() {
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Shared(Arc<Mutex<Vec<RecordRow>>>);

        impl Recorder for Shared {
            fn record(&mut self, row: &RecordRow) -> Result<(), crate::error::RecorderError> {
                self.0.lock().unwrap().push(*row);
                Ok(())
            }
        }

        let shared = Shared::default();
        let mut driver = PipelineDriver::new(PipelineSettings::default()).unwrap();
        driver.set_recorder(shared.clone());
        driver.start().unwrap();

        driver.process(level(5_000));
        driver.process(level(5_020));
        driver.process(Sample::new(5_040, [f32::INFINITY, 0.0, 0.0], [0.0; 3]));
        driver.process(level(5_060));

        let rows = shared.0.lock().unwrap();
        let times: Vec<u32> = rows.iter().map(|row| row.relative_timestamp).collect();
        assert_eq!(times, vec![0, 20, 60]);
        assert!((rows[0].accel_z - 9.81).abs() < 1e-6);
    }

    #[test]
    fn test_stop_keeps_last_published_window() {
        let mut driver = running(PipelineSettings::default());
        let monitor = driver.monitor();
        for t in 0..5 {
            driver.process(level(t * 10));
        }
        driver.stop(StopReason::ChannelClosed);

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.status, PipelineStatus::Stopped(StopReason::ChannelClosed));
        assert_eq!(snapshot.window.len(), 4);
        assert_eq!(snapshot.stats.received, 5);
    }
}
