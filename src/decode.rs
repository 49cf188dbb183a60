//! Transport payload decoding for the reference BLE IMU.
//!
//! The device exposes every axis and the clock as a separate GATT
//! characteristic. Axis payloads are 4-byte little-endian IEEE-754 floats and
//! the clock is a 4-byte little-endian unsigned millisecond counter. A source
//! collects one payload per channel into a [`RawSample`] and decodes it into a
//! [`Sample`] before pushing it to the pipeline.
//!
//! # Example
//! ```
//! use fusion_trail::decode::{ChannelId, RawSample};
//!
//! let mut raw = RawSample::new();
//! raw.set(ChannelId::Timestamp, &1500u32.to_le_bytes());
//! for channel in [ChannelId::AccelX, ChannelId::AccelY, ChannelId::GyroX, ChannelId::GyroY, ChannelId::GyroZ] {
//!     raw.set(channel, &0.0f32.to_le_bytes());
//! }
//! raw.set(ChannelId::AccelZ, &1.0f32.to_le_bytes());
//!
//! let sample = raw.decode().unwrap();
//! assert_eq!(sample.timestamp, 1500);
//! assert_eq!(sample.accel.z, 1.0);
//! ```

use crate::error::DecodeError;
use crate::types::Sample;
use nalgebra::Vector3;
use std::fmt;

/// Payload size of every channel
const PAYLOAD_LEN: usize = 4;

/// Logical channel of the transport, one characteristic each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Timestamp,
    AccelX,
    AccelY,
    AccelZ,
    GyroX,
    GyroY,
    GyroZ,
}

impl ChannelId {
    /// Every channel, in slot order
    pub const ALL: [ChannelId; 7] = [
        ChannelId::Timestamp,
        ChannelId::AccelX,
        ChannelId::AccelY,
        ChannelId::AccelZ,
        ChannelId::GyroX,
        ChannelId::GyroY,
        ChannelId::GyroZ,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelId::Timestamp => "timestamp",
            ChannelId::AccelX => "accel x",
            ChannelId::AccelY => "accel y",
            ChannelId::AccelZ => "accel z",
            ChannelId::GyroX => "gyro x",
            ChannelId::GyroY => "gyro y",
            ChannelId::GyroZ => "gyro z",
        };
        f.write_str(name)
    }
}

/// Service and characteristic UUIDs of a device family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub service: &'static str,
    /// Characteristic UUID per channel, in [`ChannelId::ALL`] order
    pub characteristics: [&'static str; 7],
}

impl DeviceProfile {
    /// The reference IMU firmware
    pub const STANDARD_IMU: DeviceProfile = DeviceProfile {
        name: "Standard IMU",
        service: "0b91a798-23b1-4369-9d45-a3a26d936904",
        characteristics: [
            "72d913bb-e8df-44b8-b8ec-4f098978e0be",
            "026080c9-dc3a-401b-829c-2ee3b5565200",
            "e0a0b53e-5c53-4acf-bf79-39d2982362e9",
            "94b54966-faa7-48c1-9b53-7e44a9a872be",
            "d30c8099-5b3e-4d4f-9c42-40b47a3f71ea",
            "734c0d37-c4fc-4265-953f-0aa24d28b1a5",
            "e51f3e60-3fdd-4591-9910-87362247c68d",
        ],
    };

    /// Characteristic UUID carrying `channel`
    pub fn characteristic(&self, channel: ChannelId) -> &'static str {
        self.characteristics[channel.slot()]
    }

    /// Channel carried by a characteristic UUID, compared case-insensitively
    pub fn channel_for(&self, uuid: &str) -> Option<ChannelId> {
        ChannelId::ALL
            .into_iter()
            .find(|channel| self.characteristic(*channel).eq_ignore_ascii_case(uuid))
    }
}

/// Raw characteristic payloads making up one sample
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSample {
    payloads: [Option<Vec<u8>>; 7],
}

impl RawSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the payload read from `channel`, replacing any earlier one
    pub fn set(&mut self, channel: ChannelId, payload: &[u8]) {
        self.payloads[channel.slot()] = Some(payload.to_vec());
    }

    /// Whether a payload has been stored for every channel
    pub fn is_complete(&self) -> bool {
        self.payloads.iter().all(Option::is_some)
    }

    /// Decode every channel into a [`Sample`] in source units
    pub fn decode(&self) -> Result<Sample, DecodeError> {
        let timestamp = decode_u32(ChannelId::Timestamp, self.payload(ChannelId::Timestamp)?)?;
        let accel = Vector3::new(
            self.axis(ChannelId::AccelX)?,
            self.axis(ChannelId::AccelY)?,
            self.axis(ChannelId::AccelZ)?,
        );
        let gyro = Vector3::new(
            self.axis(ChannelId::GyroX)?,
            self.axis(ChannelId::GyroY)?,
            self.axis(ChannelId::GyroZ)?,
        );

        Ok(Sample {
            timestamp,
            accel,
            gyro,
        })
    }

    fn payload(&self, channel: ChannelId) -> Result<&[u8], DecodeError> {
        self.payloads[channel.slot()]
            .as_deref()
            .ok_or(DecodeError::MissingChannel(channel))
    }

    fn axis(&self, channel: ChannelId) -> Result<f32, DecodeError> {
        decode_f32(channel, self.payload(channel)?)
    }
}

fn fixed_payload(channel: ChannelId, payload: &[u8]) -> Result<[u8; PAYLOAD_LEN], DecodeError> {
    payload.try_into().map_err(|_| DecodeError::PayloadLength {
        channel,
        expected: PAYLOAD_LEN,
        actual: payload.len(),
    })
}

/// Decode a little-endian `f32` axis payload, rejecting NaN and infinities
pub fn decode_f32(channel: ChannelId, payload: &[u8]) -> Result<f32, DecodeError> {
    let value = f32::from_le_bytes(fixed_payload(channel, payload)?);
    if !value.is_finite() {
        return Err(DecodeError::NonFinite { channel, value });
    }
    Ok(value)
}

/// Decode a little-endian `u32` timestamp payload
pub fn decode_u32(channel: ChannelId, payload: &[u8]) -> Result<u32, DecodeError> {
    Ok(u32::from_le_bytes(fixed_payload(channel, payload)?))
}
