//! Dead-reckoning trajectory demonstration
//!
//! Streams IMU samples through the pipeline from a producer thread, watches the
//! published snapshots, records the accepted samples to CSV and plots the
//! estimated x-y trajectory.
//!
//! Samples come from a CSV file when a path is given, otherwise a synthetic
//! run is generated: the sensor rests, accelerates along x, coasts, then brakes.
//!
//! Run with: `cargo run --example trajectory [-- sensor_data.csv]`
//! Set `RUST_LOG=fusion_trail=debug` for per-sample diagnostics.

use fusion_trail::{
    CsvRecorder, FilterKind, Pipeline, PipelineSettings, PipelineStatus, Sample, StopReason,
};
use nalgebra::Vector3;
use plotters::prelude::*;
use serde::Deserialize;
use std::error::Error;
use tracing_subscriber::EnvFilter;

/// CSV input, g and deg/s
#[derive(Debug, Deserialize)]
struct SensorData {
    #[serde(rename = "Time (s)")]
    time: f32,
    #[serde(rename = "Gyroscope X (deg/s)")]
    gyro_x: f32,
    #[serde(rename = "Gyroscope Y (deg/s)")]
    gyro_y: f32,
    #[serde(rename = "Gyroscope Z (deg/s)")]
    gyro_z: f32,
    #[serde(rename = "Accelerometer X (g)")]
    accel_x: f32,
    #[serde(rename = "Accelerometer Y (g)")]
    accel_y: f32,
    #[serde(rename = "Accelerometer Z (g)")]
    accel_z: f32,
}

const SAMPLE_PERIOD_MS: u32 = 10; // 100 Hz

fn load_samples(path: &str) -> Result<Vec<Sample>, Box<dyn Error>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut samples = Vec::new();

    for result in reader.deserialize() {
        let record: SensorData = result?;
        samples.push(Sample::new(
            (record.time * 1000.0) as u32,
            [record.accel_x, record.accel_y, record.accel_z],
            [record.gyro_x, record.gyro_y, record.gyro_z],
        ));
    }

    Ok(samples)
}

/// Level sensor: 1 s at rest, 2 s at +0.05 g along x, 2 s coasting, 2 s at −0.05 g
fn synthetic_samples() -> Vec<Sample> {
    (0..700u32)
        .map(|i| {
            let accel_x = match i {
                100..300 => 0.05,
                500..700 => -0.05,
                _ => 0.0,
            };
            Sample::new(i * SAMPLE_PERIOD_MS, [accel_x, 0.0, 1.0], [0.0, 0.0, 0.0])
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let samples = match std::env::args().nth(1) {
        Some(path) => load_samples(&path)?,
        None => synthetic_samples(),
    };
    println!("Trajectory example - {} samples", samples.len());

    // Source reports g and deg/s, which is the default convention
    let settings = PipelineSettings {
        filter: FilterKind::MadgwickQuaternion,
        beta: 0.1,
        display_capacity: samples.len().max(1),
        channel_capacity: 64,
        ..Default::default()
    };
    let Pipeline {
        sender,
        task,
        handle,
    } = Pipeline::build(settings)?;
    let task = task.with_recorder(CsvRecorder::create("trajectory_samples.csv")?);
    let running = tokio::spawn(task.run());

    // Producer thread, blocked by backpressure whenever the pipeline falls behind
    let producer = std::thread::spawn(move || {
        for sample in samples {
            if sender.blocking_push(sample).is_err() {
                break;
            }
        }
    });

    let mut monitor = handle.monitor();
    let mut last_report = 0;
    while monitor.changed().await {
        let snapshot = monitor.snapshot();
        if let PipelineStatus::Stopped(_) = snapshot.status {
            break;
        }
        if snapshot.stats.processed >= last_report + 100 {
            last_report = snapshot.stats.processed;
            println!(
                "Sample {}: orientation=({:.1}°,{:.1}°,{:.1}°) velocity={:.3} m/s position=({:.3}, {:.3}) m",
                snapshot.stats.received,
                snapshot.euler.roll,
                snapshot.euler.pitch,
                snapshot.euler.yaw,
                snapshot.velocity.magnitude(),
                snapshot.position.x,
                snapshot.position.y,
            );
        }
    }

    let reason = running.await?;
    if producer.join().is_err() {
        return Err("producer thread panicked".into());
    }
    debug_assert_eq!(reason, StopReason::ChannelClosed);

    let snapshot = handle.snapshot();
    println!(
        "Stopped ({reason:?}): {} received, {} processed, {} dropped, {} skipped",
        snapshot.stats.received,
        snapshot.stats.processed,
        snapshot.stats.dropped,
        snapshot.stats.skipped
    );

    println!("Generating trajectory plot...");
    plot_trajectory(snapshot.window.positions())?;

    println!("✓ Trajectory saved to trajectory.png");
    println!("✓ Accepted samples recorded to trajectory_samples.csv");
    Ok(())
}

/// Plot the x-y projection of the display window
fn plot_trajectory(positions: &[Vector3<f32>]) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new("trajectory.png", (800, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let (min, max) = positions.iter().fold(
        (Vector3::repeat(f32::MAX), Vector3::repeat(f32::MIN)),
        |(min, max), p| (min.inf(p), max.sup(p)),
    );
    let (x_range, y_range) = if positions.is_empty() {
        (-1f32..1f32, -1f32..1f32)
    } else {
        // Equal padding on both axes keeps short runs visible
        let pad = ((max.x - min.x).max(max.y - min.y) * 0.1).max(0.01);
        ((min.x - pad)..(max.x + pad), (min.y - pad)..(max.y + pad))
    };

    let mut chart = ChartBuilder::on(&root)
        .caption("Estimated trajectory (x-y)", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc("x (m)")
        .y_desc("y (m)")
        .draw()?;

    chart
        .draw_series(LineSeries::new(positions.iter().map(|p| (p.x, p.y)), &BLUE))?
        .label("Position")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], BLUE));

    if let Some(last) = positions.last() {
        chart.draw_series(std::iter::once(Circle::new((last.x, last.y), 4, RED.filled())))?;
    }

    chart.configure_series_labels().draw()?;
    root.present()?;
    Ok(())
}
