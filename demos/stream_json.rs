//! Emit bound poses as JSON lines, one object per binding per tick:
//!
//! {"binding":"tracker.waist","index":3,"x":0.5,"y":1.0,"z":0.2,"qx":0,"qy":0,"qz":0,"qw":1,"t":0.011}
//!
//! Usage: cargo run --example stream_json [BINDINGS_JSON]

use serde_json::json;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use vrtrack::{MockRuntime, Notification, NotificationKinds, Tracker, TrackerConfig};

fn main() {
    env_logger::init();

    let bindings = std::env::args()
        .nth(1)
        .unwrap_or_else(|| r#"{"LHR-ABC123": "tracker.waist", "LHR-DEF456": "tracker.left_foot"}"#.into());

    let mock = MockRuntime::new();
    mock.connect_device(3, "LHR-ABC123");
    mock.connect_device(4, "LHR-DEF456");

    let mut tracker = Tracker::new(Box::new(mock.clone()), TrackerConfig::from_env());
    if let Err(e) = tracker.initialize() {
        eprintln!("Failed to initialize tracker: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = tracker.bindings().load_bindings_json(&bindings) {
        eprintln!("Bad bindings: {}", e);
        std::process::exit(1);
    }

    let bound = tracker.subscribe(NotificationKinds::BOUND_POSE | NotificationKinds::QUIT);
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let start = Instant::now();

    eprintln!("Streaming JSON for 3s...");

    while start.elapsed() < Duration::from_secs(3) {
        let t = start.elapsed().as_secs_f64();
        mock.set_pose(3, [0.5, 1.0, 0.2 * t.sin()], vrtrack::math::Quaternion::IDENTITY);
        mock.set_pose(4, [-0.2, 0.1, 0.3 * t.cos()], vrtrack::math::Quaternion::IDENTITY);

        if tracker.tick().quit {
            break;
        }
        for n in bound.drain() {
            if let Notification::BoundPose { binding, pose, index } = n {
                let p = pose.to_left_handed();
                let q = p.orientation;
                let line = json!({
                    "binding": binding,
                    "index": index,
                    "x": p.position[0], "y": p.position[1], "z": p.position[2],
                    "qx": q.x, "qy": q.y, "qz": q.z, "qw": q.w,
                    "t": t,
                });
                if writeln!(out, "{}", line).is_err() {
                    return;
                }
            }
        }
        let _ = out.flush();
        std::thread::sleep(Duration::from_micros(11_111));
    }
}
