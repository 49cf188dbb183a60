//! Recording of raw acceleration rows alongside the fusion loop

use crate::error::RecorderError;
use crate::types::StopReason;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One recorded sample: acceleration in m/s² at a time relative to the first sample seen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    /// Milliseconds since the first sample of the run
    pub relative_timestamp: u32,
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
}

/// Sink for recorded rows.
///
/// Errors returned here are logged by the driver and never stop the pipeline.
pub trait Recorder {
    /// Store one row
    fn record(&mut self, row: &RecordRow) -> Result<(), RecorderError>;

    /// Called once when the pipeline stops
    fn finish(&mut self, reason: StopReason) -> Result<(), RecorderError> {
        let _ = reason;
        Ok(())
    }
}

impl Recorder for Vec<RecordRow> {
    fn record(&mut self, row: &RecordRow) -> Result<(), RecorderError> {
        self.push(*row);
        Ok(())
    }
}

/// Writes rows as CSV with a header line.
///
/// # Example
/// ```
/// use fusion_trail::{CsvRecorder, RecordRow, Recorder};
///
/// let mut recorder = CsvRecorder::new(Vec::new());
/// recorder
///     .record(&RecordRow { relative_timestamp: 0, accel_x: 0.0, accel_y: 0.0, accel_z: 9.81 })
///     .unwrap();
///
/// let bytes = recorder.into_inner().unwrap();
/// let text = String::from_utf8(bytes).unwrap();
/// assert!(text.starts_with("relative_timestamp,accel_x,accel_y,accel_z\n"));
/// ```
pub struct CsvRecorder<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvRecorder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }

    /// Flush buffered rows and return the underlying writer
    pub fn into_inner(self) -> Result<W, RecorderError> {
        self.writer
            .into_inner()
            .map_err(|err| RecorderError::Io(err.into_error()))
    }
}

impl CsvRecorder<File> {
    /// Record into a new file at `path`, truncating any existing one
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, RecorderError> {
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl<W: Write> Recorder for CsvRecorder<W> {
    fn record(&mut self, row: &RecordRow) -> Result<(), RecorderError> {
        self.writer.serialize(row)?;
        Ok(())
    }

    fn finish(&mut self, _reason: StopReason) -> Result<(), RecorderError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(relative_timestamp: u32, z: f32) -> RecordRow {
        RecordRow {
            relative_timestamp,
            accel_x: 0.5,
            accel_y: -1.0,
            accel_z: z,
        }
    }

    #[test]
    fn test_csv_rows_with_header() {
        let mut recorder = CsvRecorder::new(Vec::new());
        recorder.record(&row(0, 9.5)).unwrap();
        recorder.record(&row(20, 9.75)).unwrap();
        recorder.finish(StopReason::ChannelClosed).unwrap();

        let text = String::from_utf8(recorder.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "relative_timestamp,accel_x,accel_y,accel_z\n0,0.5,-1.0,9.5\n20,0.5,-1.0,9.75\n"
        );
    }

    #[test]
    fn test_csv_reads_back() {
        let mut recorder = CsvRecorder::new(Vec::new());
        recorder.record(&row(7, 9.81)).unwrap();
        let bytes = recorder.into_inner().unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let rows: Vec<RecordRow> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows, vec![row(7, 9.81)]);
    }

    #[test]
    fn test_vec_recorder() {
        let mut rows: Vec<RecordRow> = Vec::new();
        rows.record(&row(1, 1.0)).unwrap();
        assert!(rows.finish(StopReason::StopRequested).is_ok());
        assert_eq!(rows.len(), 1);
    }
}
