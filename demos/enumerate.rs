//! List connected device slots with their serial and model numbers and the
//! bindings each serial resolves to.

use vrtrack::{DeviceProperty, MockRuntime, Tracker, TrackerConfig};

fn main() {
    env_logger::init();

    let mock = MockRuntime::new();
    mock.connect_device(0, "HMD-0001");
    mock.connect_device(3, "LHR-ABC123");
    mock.set_property(0, DeviceProperty::ModelNumber, "Index HMD");
    mock.set_property(3, DeviceProperty::ModelNumber, "VIVE Tracker 3.0");

    let mut tracker = Tracker::new(Box::new(mock), TrackerConfig::from_env());
    if let Err(e) = tracker.initialize() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = tracker.bindings().load_bindings_json(r#"{"LHR-ABC123": "tracker.waist"}"#) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    tracker.tick();

    let frame = tracker.latest_frame();
    let connected: Vec<u32> = (0..vrtrack::MAX_DEVICE_COUNT as u32)
        .filter(|&i| frame.pose(i).map_or(false, |p| p.connected))
        .collect();

    println!("Found {} connected device(s):", connected.len());
    for index in connected {
        let serial = frame.serial(index).unwrap_or("?");
        let resolved = tracker.bindings().resolve(serial);
        let bindings: Vec<&str> = resolved.names().collect();
        println!(
            "  [{}] Serial={}  Model={}  Bindings={:?}",
            index,
            serial,
            tracker.string_property(index, DeviceProperty::ModelNumber),
            bindings
        );
    }
}
