use approx::assert_relative_eq;

use env_logger::Builder;

use cloudsim_core::Simulation;

use cloudsim::core::cloudlet::{CloudletSpec, CloudletStatus};
use cloudsim::core::config::{SimulationConfig, VmConfig};
use cloudsim::core::error::ConfigError;
use cloudsim::core::scaling::ScalingPolicy;
use cloudsim::core::vm::VmStatus;
use cloudsim::simulation::CloudSimulation;

fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

fn sim_config() -> SimulationConfig {
    SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap()
}

fn cloud_sim(sim_config: SimulationConfig) -> CloudSimulation {
    let _ = Builder::from_default_env().is_test(true).try_init();
    let sim = Simulation::new(123);
    let mut cloud_sim = CloudSimulation::new(sim, sim_config).unwrap();
    cloud_sim.add_host("h", 1000., 8, 16384, 10000, 1_000_000);
    cloud_sim
}

fn vm_config(pes: u32, scheduler: &str) -> VmConfig {
    VmConfig::new(1000., pes, 2048, 1000, 100_000).with_scheduler(scheduler)
}

#[test]
// Two cloudlets of 1000 MI share a single 1000 MIPS PE, so each runs at 500 MIPS and both finish at 2.0.
fn test_time_shared_cloudlets_share_pe() {
    let mut cloud_sim = cloud_sim(sim_config());
    cloud_sim.create_vm(&vm_config(1, "time")).unwrap();
    let c1 = cloud_sim.submit_cloudlet(CloudletSpec::new(1000, 1));
    let c2 = cloud_sim.submit_cloudlet(CloudletSpec::new(1000, 1));

    cloud_sim.run();

    assert_eq!(cloud_sim.current_time(), 2.);
    for id in [c1, c2] {
        let cloudlet = cloud_sim.cloudlet(id).unwrap();
        assert_eq!(cloudlet.status(), CloudletStatus::Success);
        assert_eq!(cloudlet.exec_start_time(), Some(0.));
        assert_eq!(cloudlet.finish_time(), Some(2.));
        assert_relative_eq!(cloudlet.actual_cpu_time(), 2.);
    }
}

#[test]
// The only PE of space-shared VM is taken, so the second cloudlet waits until the first one completes.
fn test_space_shared_cloudlet_waits_for_pe() {
    let mut cloud_sim = cloud_sim(sim_config());
    cloud_sim.create_vm(&vm_config(1, "space")).unwrap();
    let c1 = cloud_sim.submit_cloudlet(CloudletSpec::new(1000, 1));
    let c2 = cloud_sim.submit_cloudlet(CloudletSpec::new(1000, 1));

    cloud_sim.step_for_duration(0.5);
    assert_eq!(cloud_sim.cloudlet_status(c1), Some(CloudletStatus::InExec));
    assert_eq!(cloud_sim.cloudlet_status(c2), Some(CloudletStatus::Queued));

    cloud_sim.run();
    let second = cloud_sim.cloudlet(c2).unwrap();
    assert_eq!(second.status(), CloudletStatus::Success);
    assert_eq!(second.exec_start_time(), Some(1.));
    assert_eq!(second.finish_time(), Some(2.));
    assert_relative_eq!(second.actual_cpu_time(), 1.);
}

#[test]
// Cloudlets without explicit VM are spread over VMs in round-robin order.
fn test_unbound_cloudlets_round_robin() {
    let mut cloud_sim = cloud_sim(sim_config());
    let vm1 = cloud_sim.create_vm(&vm_config(1, "time")).unwrap();
    let vm2 = cloud_sim.create_vm(&vm_config(1, "time")).unwrap();
    let ids: Vec<u64> = (0..4)
        .map(|_| cloud_sim.submit_cloudlet(CloudletSpec::new(1000, 1)))
        .collect();
    let bound = cloud_sim.submit_cloudlet(CloudletSpec::new(1000, 1).with_vm(vm1));

    cloud_sim.run();

    let vms: Vec<Option<u32>> = ids
        .iter()
        .map(|id| cloud_sim.cloudlet(*id).unwrap().vm_id())
        .collect();
    assert_eq!(vms, vec![Some(vm1), Some(vm2), Some(vm1), Some(vm2)]);
    assert_eq!(cloud_sim.cloudlet(bound).unwrap().vm_id(), Some(vm1));
}

#[test]
// CPU cost is charged for 1 second of execution, bandwidth cost for 100 MB of input and 200 MB of output.
fn test_cost_accounting() {
    let mut config = sim_config();
    config.cost_per_second = 0.5;
    config.cost_per_bw = 0.01;
    let mut cloud_sim = cloud_sim(config);
    cloud_sim.create_vm(&vm_config(1, "fair")).unwrap();
    cloud_sim.submit_cloudlet(CloudletSpec::new(1000, 1).with_files(100, 200));

    cloud_sim.run();

    let reports = cloud_sim.cloudlet_reports();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.status, CloudletStatus::Success);
    assert_relative_eq!(report.actual_cpu_time, 1.);
    assert_relative_eq!(report.accumulated_cpu_cost, 0.5);
    assert_relative_eq!(report.accumulated_bw_cost, 3.);
    assert_eq!(report.total_cost, report.accumulated_cpu_cost + report.accumulated_bw_cost);
}

#[test]
// Utilization of the single-PE VM is 1.0 > 0.7, so the first overload check requests a second VM.
// Vertical scaling is not supported, horizontal scaling is used instead (the warning is checked in test_logging.rs).
fn test_unsupported_scaling_type_scales_horizontally() {
    let mut cloud_sim = cloud_sim(sim_config());
    let vm = cloud_sim
        .create_vm(&vm_config(1, "time").with_scaling("vertical"))
        .unwrap();
    let cloudlet = cloud_sim.submit_cloudlet(CloudletSpec::new(10000, 1));

    cloud_sim.run();

    assert_eq!(cloud_sim.vm_count(), 2);
    assert_eq!(cloud_sim.vm_status(1), Some(VmStatus::Running));
    let datacenter = cloud_sim.datacenter();
    assert_eq!(
        datacenter.borrow().vm(vm).unwrap().scaling_policy(),
        Some(ScalingPolicy::horizontal(0.7))
    );
    // scaled-out VMs are not scaled themselves
    assert_eq!(datacenter.borrow().vm(1).unwrap().scaling_policy(), None);
    assert_eq!(cloud_sim.cloudlet(cloudlet).unwrap().finish_time(), Some(10.));
}

#[test]
// A single cloudlet loads 1 of 4 PEs, which is below the threshold.
fn test_underloaded_vm_is_not_scaled() {
    let mut cloud_sim = cloud_sim(sim_config());
    cloud_sim
        .create_vm(&vm_config(4, "time").with_scaling("horizontal"))
        .unwrap();
    cloud_sim.submit_cloudlet(CloudletSpec::new(5000, 1));

    cloud_sim.run();

    assert_eq!(cloud_sim.vm_count(), 1);
    assert_eq!(cloud_sim.current_time(), 5.);
}

#[test]
// The host is too small for the VM, after the allocation timeout (5 seconds) the VM and its cloudlet fail.
fn test_vm_allocation_timeout() {
    let mut cloud_sim = cloud_sim(sim_config());
    let vm = cloud_sim.create_vm(&vm_config(16, "time")).unwrap();
    let cloudlet = cloud_sim.submit_cloudlet(CloudletSpec::new(1000, 1));

    cloud_sim.run();

    assert_eq!(cloud_sim.vm_status(vm), Some(VmStatus::FailedToAllocate));
    let reports = cloud_sim.cloudlet_reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].id, cloudlet);
    assert_eq!(reports[0].status, CloudletStatus::Failed);
    assert_eq!(reports[0].finish_time, Some(5.));
}

#[test]
// The idle VM is destroyed 1 second after its last cloudlet completes and releases the host.
fn test_idle_vm_is_destroyed() {
    let mut config = sim_config();
    config.vm_destruction_delay = Some(1.);
    let mut cloud_sim = cloud_sim(config);
    let vm = cloud_sim.create_vm(&vm_config(2, "space")).unwrap();
    cloud_sim.submit_cloudlet(CloudletSpec::new(1000, 1));

    cloud_sim.step_for_duration(0.5);
    assert_eq!(cloud_sim.vm_host(vm), Some(0));
    assert_eq!(cloud_sim.datacenter().borrow().host(0).unwrap().pes_available(), 6);

    cloud_sim.run();

    assert_eq!(cloud_sim.current_time(), 2.);
    assert_eq!(cloud_sim.vm_status(vm), Some(VmStatus::Destroyed));
    assert_eq!(cloud_sim.datacenter().borrow().host(0).unwrap().pes_available(), 8);
}

#[test]
// The simulation length cuts the run before the cloudlet completes.
fn test_simulation_length() {
    let mut config = sim_config();
    config.simulation_length = 3.;
    let mut cloud_sim = cloud_sim(config);
    cloud_sim.create_vm(&vm_config(1, "time")).unwrap();
    let cloudlet = cloud_sim.submit_cloudlet(CloudletSpec::new(10000, 1));

    cloud_sim.run();

    assert_eq!(cloud_sim.current_time(), 3.);
    let cloudlet = cloud_sim.cloudlet(cloudlet).unwrap();
    assert_eq!(cloudlet.status(), CloudletStatus::InExec);
    assert_relative_eq!(cloudlet.finished_so_far(), 3000.);
    assert!(cloud_sim.cloudlet_reports().is_empty());
}

#[test]
// The first cloudlet is paused at 1.0 with half of its work done and resumed at 2.0.
fn test_pause_and_resume() {
    let mut cloud_sim = cloud_sim(sim_config());
    cloud_sim.create_vm(&vm_config(2, "space")).unwrap();
    let long = cloud_sim.submit_cloudlet(CloudletSpec::new(2000, 1));
    let short = cloud_sim.submit_cloudlet_with_delay(CloudletSpec::new(1000, 1), 1.);

    cloud_sim.step_for_duration(1.);
    assert_eq!(cloud_sim.current_time(), 1.);
    assert!(cloud_sim.pause_cloudlet(long));
    assert_eq!(cloud_sim.cloudlet_status(long), Some(CloudletStatus::Paused));

    cloud_sim.run();
    assert_eq!(cloud_sim.current_time(), 2.);
    assert_eq!(cloud_sim.cloudlet_status(short), Some(CloudletStatus::Success));
    assert_eq!(cloud_sim.cloudlet_status(long), Some(CloudletStatus::Paused));

    assert!(cloud_sim.resume_cloudlet(long));
    cloud_sim.run();
    let long = cloud_sim.cloudlet(long).unwrap();
    assert_eq!(long.status(), CloudletStatus::Success);
    assert_eq!(long.finish_time(), Some(3.));
    assert_relative_eq!(long.actual_cpu_time(), 2.);
}

#[test]
// The only cloudlet of a scalable VM is paused at 2.0, so the overload check at 3.0 stops rescheduling itself
// and the run ends. Resuming the cloudlet restarts the check, the remaining 8000 MI take 8 seconds.
fn test_paused_cloudlet_does_not_keep_scaling_check_alive() {
    let mut cloud_sim = cloud_sim(sim_config());
    let vm = cloud_sim
        .create_vm(&vm_config(4, "time").with_scaling("horizontal"))
        .unwrap();
    let cloudlet = cloud_sim.submit_cloudlet(CloudletSpec::new(10000, 1));

    cloud_sim.step_for_duration(2.);
    assert_eq!(cloud_sim.current_time(), 2.);
    assert!(cloud_sim.pause_cloudlet(cloudlet));

    assert!(!cloud_sim.run_until(100.));
    assert_eq!(cloud_sim.current_time(), 3.);
    assert_eq!(cloud_sim.cloudlet_status(cloudlet), Some(CloudletStatus::Paused));
    let datacenter = cloud_sim.datacenter();
    assert!(!datacenter.borrow().vm(vm).unwrap().scaling_check_scheduled());

    assert!(cloud_sim.resume_cloudlet(cloudlet));
    assert!(datacenter.borrow().vm(vm).unwrap().scaling_check_scheduled());
    cloud_sim.run();

    assert_eq!(cloud_sim.vm_count(), 1);
    let cloudlet = cloud_sim.cloudlet(cloudlet).unwrap();
    assert_eq!(cloudlet.status(), CloudletStatus::Success);
    assert_relative_eq!(cloudlet.finish_time().unwrap(), 11.);
    assert_relative_eq!(cloudlet.actual_cpu_time(), 10.);
}

#[test]
fn test_cancelled_cloudlet_is_reported_as_failed() {
    let mut cloud_sim = cloud_sim(sim_config());
    cloud_sim.create_vm(&vm_config(1, "space")).unwrap();
    let first = cloud_sim.submit_cloudlet(CloudletSpec::new(1000, 1));
    let second = cloud_sim.submit_cloudlet(CloudletSpec::new(1000, 1));

    cloud_sim.step_for_duration(0.5);
    assert!(cloud_sim.cancel_cloudlet(second));
    assert!(!cloud_sim.cancel_cloudlet(second));
    cloud_sim.run();

    assert_eq!(cloud_sim.cloudlet_status(first), Some(CloudletStatus::Success));
    assert_eq!(cloud_sim.cloudlet_status(second), Some(CloudletStatus::Failed));
    assert_eq!(cloud_sim.current_time(), 1.);
}

#[test]
// A cloudlet requesting more PEs than the space-shared VM has can never run.
fn test_oversized_cloudlet_fails() {
    let mut cloud_sim = cloud_sim(sim_config());
    cloud_sim.create_vm(&vm_config(2, "space")).unwrap();
    let cloudlet = cloud_sim.submit_cloudlet(CloudletSpec::new(1000, 4));

    cloud_sim.run();

    assert_eq!(cloud_sim.cloudlet_status(cloudlet), Some(CloudletStatus::Failed));
}

#[test]
fn test_missing_vm_key() {
    let mut cloud_sim = cloud_sim(sim_config());
    let mut config = vm_config(1, "time");
    config.pes = None;
    match cloud_sim.create_vm(&config) {
        Err(ConfigError::Missing { key }) => assert_eq!(key, "PEs"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(cloud_sim.vm_count(), 0);
}

#[test]
fn test_unknown_placement_algorithm() {
    let mut config = sim_config();
    config.vm_placement = "Random".to_owned();
    let result = CloudSimulation::new(Simulation::new(123), config);
    assert!(matches!(result, Err(ConfigError::Unsupported { .. })));
}

#[test]
// Hosts, VMs and cloudlets are all taken from the config file.
fn test_simulation_from_config_file() {
    let config = SimulationConfig::from_file(&name_wrapper("full.yaml")).unwrap();
    let mut cloud_sim = CloudSimulation::from_config(config).unwrap();

    cloud_sim.run();

    assert_eq!(cloud_sim.vm_count(), 2);
    assert_eq!(cloud_sim.vm_host(0), Some(0));
    assert_eq!(cloud_sim.vm_host(1), Some(0));
    let reports = cloud_sim.cloudlet_reports();
    assert_eq!(reports.len(), 6);
    assert!(reports.iter().all(|r| r.status == CloudletStatus::Success));
    for report in reports.iter() {
        assert_relative_eq!(report.total_cost, report.accumulated_cpu_cost + report.accumulated_bw_cost);
        assert_relative_eq!(report.accumulated_cpu_cost, report.actual_cpu_time * 0.01);
    }
    // cloudlets with files pay for 300 MB in and 300 MB out
    assert_relative_eq!(reports.iter().map(|r| r.accumulated_bw_cost).sum::<f64>(), 4. * 0.6);
}

#[test]
fn test_same_seed_gives_same_reports() {
    let run = || {
        let config = SimulationConfig::from_file(&name_wrapper("full.yaml")).unwrap();
        let mut cloud_sim = CloudSimulation::from_config(config).unwrap();
        cloud_sim.run();
        (cloud_sim.event_count(), cloud_sim.cloudlet_reports())
    };
    assert_eq!(run(), run());
}
