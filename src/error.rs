//! Error types for sample decoding, ingestion, configuration and recording

use crate::decode::ChannelId;
use crate::types::{PipelineStatus, Sample};
use thiserror::Error;

/// A sample field that could not be turned into a usable value.
///
/// Decode errors are per-sample: the offending sample is dropped and the
/// stream continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("{channel} payload must be {expected} bytes, got {actual}")]
    PayloadLength {
        channel: ChannelId,
        expected: usize,
        actual: usize,
    },

    #[error("{channel} decoded to non-finite value {value}")]
    NonFinite { channel: ChannelId, value: f32 },

    #[error("no payload received for {0}")]
    MissingChannel(ChannelId),

    #[error("sample at {timestamp} ms has a non-finite {field} component")]
    NonFiniteSample {
        timestamp: u32,
        field: &'static str,
    },
}

/// Rejected pipeline configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("complementary gain alpha must be within [0, 1], got {0}")]
    Alpha(f32),

    #[error("quaternion filter gain beta must be finite and non-negative, got {0}")]
    Beta(f32),

    #[error("gravity must be finite and positive, got {0}")]
    Gravity(f32),

    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    #[error("invalid gyroscope offset settings: {0}")]
    GyroOffset(&'static str),
}

/// A sample the ingestion channel refused, handed back to the producer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PushError {
    #[error("ingestion channel is full")]
    Full(Sample),

    #[error("ingestion channel is closed")]
    Closed(Sample),
}

impl PushError {
    /// Recover the rejected sample
    pub fn into_sample(self) -> Sample {
        match self {
            PushError::Full(sample) | PushError::Closed(sample) => sample,
        }
    }
}

/// Driver lifecycle transition that is not allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("pipeline can only start from Idle, currently {0:?}")]
    NotIdle(PipelineStatus),
}

/// Failure while handing rows to a recorder
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
