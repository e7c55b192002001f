use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use sugars::{rc, refcell};

use cloudsim_core::{log_info, Id, Simulation, SimulationContext};

use crate::core::cloudlet::{Cloudlet, CloudletSpec, CloudletStatus};
use crate::core::config::{HostConfig, SimulationConfig, VmConfig};
use crate::core::cost::CostModel;
use crate::core::datacenter::Datacenter;
use crate::core::error::ConfigError;
use crate::core::events::cloudlet::CloudletSubmit;
use crate::core::events::simulation::SimulationEnd;
use crate::core::report::{save_reports, CloudletReport};
use crate::core::vm::VmStatus;
use crate::core::vm_factory::VmFactory;

/// Entry point of the cloud simulation.
///
/// Wires the datacenter into the event engine and submits hosts, VMs and cloudlets on behalf of the user.
pub struct CloudSimulation {
    datacenter: Rc<RefCell<Datacenter>>,
    datacenter_id: Id,
    next_cloudlet_id: u64,
    sim: Simulation,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl CloudSimulation {
    /// Creates the simulation and populates it with hosts, VMs and cloudlets described in the config.
    pub fn new(mut sim: Simulation, sim_config: SimulationConfig) -> Result<Self, ConfigError> {
        let vm_factory = VmFactory::new(
            sim_config.overload_threshold,
            CostModel::new(sim_config.cost_per_second, sim_config.cost_per_bw),
            sim.create_context("vm_factory"),
        );
        let datacenter = rc!(refcell!(Datacenter::new(
            vm_factory,
            sim.create_context("datacenter"),
            sim_config.clone(),
        )?));
        let datacenter_id = sim.add_handler("datacenter", datacenter.clone());
        let ctx = sim.create_context("broker");

        let mut cloud_sim = Self {
            datacenter,
            datacenter_id,
            next_cloudlet_id: 0,
            sim,
            ctx,
            sim_config: rc!(sim_config),
        };

        let config = cloud_sim.sim_config.clone();
        for host in config.hosts.iter() {
            cloud_sim.add_hosts(host);
        }
        for vm in config.vms.iter() {
            for _ in 0..vm.count.unwrap_or(1) {
                cloud_sim.create_vm(vm)?;
            }
        }
        for cloudlets in config.cloudlets.iter() {
            for _ in 0..cloudlets.count.unwrap_or(1) {
                cloud_sim.submit_cloudlet_with_delay(cloudlets.spec.clone(), cloudlets.delay.unwrap_or(0.));
            }
        }
        if config.simulation_length > 0. {
            cloud_sim
                .ctx
                .emit(SimulationEnd {}, datacenter_id, config.simulation_length);
        }
        Ok(cloud_sim)
    }

    /// Creates the simulation seeded from the config.
    pub fn from_config(sim_config: SimulationConfig) -> Result<Self, ConfigError> {
        let sim = Simulation::new(sim_config.seed);
        Self::new(sim, sim_config)
    }

    // SETUP -----------------------------------------------------------------------------------------------------------

    pub fn add_host(&mut self, name: &str, mips: f64, pes: u32, ram: u64, bw: u64, storage: u64) -> u32 {
        self.datacenter.borrow_mut().add_host(name, mips, pes, ram, bw, storage)
    }

    pub fn add_hosts(&mut self, config: &HostConfig) -> Vec<u32> {
        self.datacenter.borrow_mut().add_hosts(config)
    }

    /// Creates a VM from the config, attaching the scaling policy if enabled there. Returns the VM id.
    ///
    /// The VM is placed on a host when the simulation runs.
    pub fn create_vm(&mut self, config: &VmConfig) -> Result<u32, ConfigError> {
        self.datacenter.borrow_mut().create_vm(config)
    }

    /// Submits a cloudlet at the current time, returns its id.
    pub fn submit_cloudlet(&mut self, spec: CloudletSpec) -> u64 {
        self.submit_cloudlet_with_delay(spec, 0.)
    }

    pub fn submit_cloudlet_with_delay(&mut self, spec: CloudletSpec, delay: f64) -> u64 {
        let cloudlet_id = self.next_cloudlet_id;
        self.next_cloudlet_id += 1;
        let cloudlet = Cloudlet::new(cloudlet_id, spec);
        self.ctx.emit(CloudletSubmit { cloudlet }, self.datacenter_id, delay);
        cloudlet_id
    }

    pub fn pause_cloudlet(&mut self, cloudlet_id: u64) -> bool {
        self.datacenter.borrow_mut().pause_cloudlet(cloudlet_id)
    }

    pub fn resume_cloudlet(&mut self, cloudlet_id: u64) -> bool {
        self.datacenter.borrow_mut().resume_cloudlet(cloudlet_id)
    }

    pub fn cancel_cloudlet(&mut self, cloudlet_id: u64) -> bool {
        self.datacenter.borrow_mut().cancel_cloudlet(cloudlet_id)
    }

    // EXECUTION -------------------------------------------------------------------------------------------------------

    /// Runs the simulation until all events are processed or the simulation length is reached.
    pub fn run(&mut self) {
        log_info!(self.ctx, "simulation started");
        self.sim.run();
        log_info!(
            self.ctx,
            "simulation finished: {} events, {} cloudlets completed",
            self.sim.event_count(),
            self.datacenter.borrow().finished_cloudlets().len()
        );
    }

    /// Processes events up to the given time, returns whether there are pending events.
    pub fn run_until(&mut self, time: f64) -> bool {
        self.sim.run_until(time)
    }

    pub fn step(&mut self) -> bool {
        self.sim.step()
    }

    pub fn steps(&mut self, step_count: u64) -> bool {
        self.sim.steps(step_count)
    }

    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        self.sim.step_for_duration(duration)
    }

    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }

    pub fn current_time(&self) -> f64 {
        self.sim.time()
    }

    // QUERIES ---------------------------------------------------------------------------------------------------------

    pub fn datacenter(&self) -> Rc<RefCell<Datacenter>> {
        self.datacenter.clone()
    }

    pub fn sim_config(&self) -> Rc<SimulationConfig> {
        self.sim_config.clone()
    }

    pub fn vm_count(&self) -> usize {
        self.datacenter.borrow().vms().count()
    }

    pub fn vm_status(&self, vm_id: u32) -> Option<VmStatus> {
        self.datacenter.borrow().vm(vm_id).map(|vm| vm.status())
    }

    pub fn vm_host(&self, vm_id: u32) -> Option<u32> {
        self.datacenter.borrow().vm(vm_id).and_then(|vm| vm.host_id())
    }

    pub fn vm_cpu_utilization(&self, vm_id: u32) -> Option<f64> {
        self.datacenter.borrow().vm(vm_id).map(|vm| vm.cpu_utilization())
    }

    pub fn cloudlet(&self, cloudlet_id: u64) -> Option<Cloudlet> {
        self.datacenter.borrow().cloudlet(cloudlet_id).cloned()
    }

    pub fn cloudlet_status(&self, cloudlet_id: u64) -> Option<CloudletStatus> {
        self.datacenter.borrow().cloudlet(cloudlet_id).map(|c| c.status())
    }

    /// Reports of cloudlets which reached a terminal status, in the order of completion.
    pub fn cloudlet_reports(&self) -> Vec<CloudletReport> {
        self.datacenter.borrow().cloudlet_reports()
    }

    pub fn save_report<P: AsRef<Path>>(&self, path: P) -> Result<(), csv::Error> {
        save_reports(&self.cloudlet_reports(), path)
    }
}
