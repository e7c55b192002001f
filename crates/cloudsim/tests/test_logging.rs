use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};

use cloudsim::core::cloudlet::CloudletSpec;
use cloudsim::core::config::{SimulationConfig, VmConfig};
use cloudsim::simulation::CloudSimulation;

/// Keeps warnings and errors written by simulation components.
struct RecordingLogger {
    records: Mutex<Vec<(Level, String, String)>>,
}

impl Log for RecordingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            if let Ok(mut records) = self.records.lock() {
                records.push((record.level(), record.target().to_owned(), record.args().to_string()));
            }
        }
    }

    fn flush(&self) {}
}

static LOGGER: RecordingLogger = RecordingLogger {
    records: Mutex::new(Vec::new()),
};

fn records_of(target: &str, level: Level) -> Vec<String> {
    LOGGER
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|(l, t, _)| *l == level && t == target)
        .map(|(_, _, msg)| msg.clone())
        .collect()
}

#[test]
// This is the only test of the binary, so the logger is installed once and sees records of this simulation only.
fn test_unsupported_scaling_type_is_reported() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Info);

    let mut cloud_sim = CloudSimulation::from_config(SimulationConfig::default()).unwrap();
    cloud_sim.add_host("h", 1000., 8, 16384, 10000, 1_000_000);
    let vm = cloud_sim
        .create_vm(
            &VmConfig::new(1000., 1, 2048, 1000, 100_000)
                .with_scheduler("time")
                .with_scaling("vertical"),
        )
        .unwrap();
    cloud_sim.submit_cloudlet(CloudletSpec::new(10000, 1));
    cloud_sim.run();

    let warnings = records_of("vm_factory", Level::Warn);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("scaling type vertical is not supported"));
    assert!(warnings[0].contains(&format!("vm #{}", vm)));

    let scale_outs = records_of("datacenter", Level::Info);
    assert!(scale_outs
        .iter()
        .any(|msg| msg.contains(&format!("vm #{} is overloaded", vm))));
    assert_eq!(cloud_sim.vm_count(), 2);
}
