//! Fusion Trail - streaming IMU fusion and dead reckoning
//!
//! Consumes timestamped accelerometer and gyroscope samples, estimates sensor
//! orientation, rotates acceleration into a level world frame, removes gravity
//! and double-integrates the remainder into velocity and position. A bounded
//! window of recent positions is published for display.
//!
//! # Features
//!
//! - Complementary tilt filter (pitch and roll)
//! - Gradient-descent quaternion filter (Madgwick, IMU variant)
//! - Semi-implicit Euler integration with non-positive `dt` skipping
//! - Bounded ingestion channel with blocking backpressure and drain-on-close
//! - Latest-value snapshots for visualizers, optional CSV recording
//! - Optional runtime gyroscope offset correction
//! - Decoding of the per-channel little-endian BLE payloads of the reference IMU
//!
//! The per-sample step ([`PipelineDriver::process`]) is synchronous. The run loop
//! ([`PipelineTask::run`]) is an `async fn` that only uses `tokio::sync`
//! primitives, so it can be driven by any executor.
//!
//! # Quick Start
//!
//! ```rust
//! use fusion_trail::{Pipeline, PipelineSettings, Sample, StopReason};
//!
//! let Pipeline { sender, task, handle } = Pipeline::build(PipelineSettings::default()).unwrap();
//!
//! // Producer thread, units per `PipelineSettings::units` (g and deg/s by default)
//! let producer = std::thread::spawn(move || {
//!     for t in 0..100u32 {
//!         let sample = Sample::new(t * 10, [0.0, 0.0, 1.0], [0.0, 0.0, 0.0]);
//!         sender.blocking_push(sample).unwrap();
//!     }
//! });
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let reason = runtime.block_on(task.run());
//! producer.join().unwrap();
//!
//! assert_eq!(reason, StopReason::ChannelClosed);
//! let snapshot = handle.snapshot();
//! println!("position: {:?}, window: {}", snapshot.position, snapshot.window.len());
//! ```

pub mod complementary;
pub mod decode;
pub mod display;
pub mod error;
pub mod estimator;
pub mod frame;
pub mod ingest;
pub mod integrator;
pub mod madgwick;
mod math;
pub mod offset;
pub mod pipeline;
pub mod recorder;
mod types;

// Re-export all public types and functions
pub use complementary::ComplementaryFilter;
pub use decode::{ChannelId, DeviceProfile, RawSample};
pub use display::{DisplayBuffer, DisplayWindow};
pub use error::{ConfigError, DecodeError, LifecycleError, PushError, RecorderError};
pub use estimator::{OrientationEstimator, OrientationFilter};
pub use frame::FrameTransformer;
pub use ingest::{SampleReceiver, SampleSender};
pub use integrator::{Integrator, KinematicState, StepOutcome, TimeStep};
pub use madgwick::MadgwickFilter;
pub use math::{DEG_TO_RAD, QuaternionExt, RAD_TO_DEG, STANDARD_GRAVITY, Vector3Ext, accel_tilt};
pub use offset::GyroOffset;
pub use pipeline::{
    Pipeline, PipelineDriver, PipelineHandle, PipelineMonitor, PipelineSnapshot, PipelineStats,
    PipelineTask, SampleOutcome,
};
pub use recorder::{CsvRecorder, RecordRow, Recorder};
pub use types::*;
