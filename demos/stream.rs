//! Drive a decoupled tracker over the in-memory runtime and print the pose
//! of one bound tracker as it orbits.
//!
//! Usage: cargo run --example stream
//! Set VRTRACK_PREDICTION=linear (or compare) to see prediction at work.

use std::time::{Duration, Instant};
use vrtrack::math::Quaternion;
use vrtrack::{DeviceSelector, MockRuntime, PoseConsumer, Schedule, Tracker, TrackerConfig};

fn main() {
    env_logger::init();

    let mock = MockRuntime::new();
    mock.connect_device(3, "LHR-ABC123");

    let config = TrackerConfig {
        schedule: Schedule::Decoupled,
        ..TrackerConfig::from_env()
    };
    let mut tracker = Tracker::new(Box::new(mock.clone()), config);
    if let Err(e) = tracker.initialize() {
        eprintln!("Failed to initialize tracker: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = tracker.bindings().load_bindings_json(r#"{"LHR-ABC123": "tracker.waist"}"#) {
        eprintln!("Bad bindings: {}", e);
        std::process::exit(1);
    }

    let mut consumer = PoseConsumer::new(DeviceSelector::BoundBySerial("tracker.waist".into()));
    let subscription = tracker.subscribe(consumer.kinds());

    println!("Streaming for 5s...");

    let start = Instant::now();
    let mut ticks: u64 = 0;
    let mut last_report = Instant::now();

    while start.elapsed() < Duration::from_secs(5) {
        let t = start.elapsed().as_secs_f64();
        let (s, c) = t.sin_cos();
        mock.set_pose(3, [c, 1.0, s], Quaternion::from_axis_angle([0.0, 1.0, 0.0], t));
        mock.set_velocity(3, [-s as f32, 0.0, c as f32], [0.0, 1.0, 0.0]);

        // Stand-in for the display's vsync.
        tracker.frame_clock().on_display_refresh_now();
        tracker.tick();
        consumer.pump(&subscription);
        ticks += 1;

        if ticks % 90 == 1 {
            match consumer.pose() {
                Some(p) if consumer.is_valid() => println!(
                    "slot={:?}  pos=[{:+.4}, {:+.4}, {:+.4}]  quat=[{:+.3}, {:+.3}, {:+.3}, {:+.3}]",
                    consumer.device_index(),
                    p.position[0], p.position[1], p.position[2],
                    p.orientation.x, p.orientation.y, p.orientation.z, p.orientation.w,
                ),
                _ => println!("tracker.waist not tracked"),
            }
        }

        let now = Instant::now();
        if now.duration_since(last_report) >= Duration::from_secs(1) {
            println!(
                "--- {} ticks, poller at {:.0} samples/s ---",
                ticks,
                tracker.samples_per_second().unwrap_or(0.0)
            );
            last_report = now;
        }

        std::thread::sleep(Duration::from_micros(11_111));
    }

    tracker.shutdown();
    println!("\nTotal: {} ticks in {:.1}s", ticks, start.elapsed().as_secs_f64());
}
