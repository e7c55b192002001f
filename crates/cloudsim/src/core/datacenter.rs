//! Datacenter component, which hosts VMs and runs cloudlets on them.

use std::collections::BTreeMap;

use cloudsim_core::{cast, log_debug, log_error, log_info, log_warn, Event, EventHandler, EventId, SimulationContext};

use crate::core::cloudlet::{Cloudlet, CloudletStatus};
use crate::core::common::AllocationVerdict;
use crate::core::config::{HostConfig, SimulationConfig, VmConfig};
use crate::core::error::ConfigError;
use crate::core::events::cloudlet::{CloudletFinish, CloudletSubmit, ProcessingUpdate};
use crate::core::events::scaling::ScalingCheck;
use crate::core::events::simulation::SimulationEnd;
use crate::core::events::vm::{HostAllocate, VmCreate, VmDestroy};
use crate::core::host::Host;
use crate::core::report::CloudletReport;
use crate::core::vm::{Vm, VmStatus};
use crate::core::vm_factory::VmFactory;
use crate::core::vm_placement_algorithm::{placement_algorithm_resolver, VmPlacementAlgorithm};

/// Owns hosts and VMs, places VMs on hosts, dispatches cloudlets to VMs and advances their execution.
///
/// Cloudlet progress is updated lazily: every event which changes the state of some VM first brings all
/// running cloudlets up to date, and a single [`ProcessingUpdate`] event is kept scheduled at the earliest
/// expected completion.
pub struct Datacenter {
    hosts: BTreeMap<u32, Host>,
    vms: BTreeMap<u32, Vm>,
    vm_factory: VmFactory,
    vm_placement_algorithm: Box<dyn VmPlacementAlgorithm>,
    // cloudlets bound to VMs that are not running yet, in arrival order
    pending_cloudlets: Vec<Cloudlet>,
    finished_cloudlets: Vec<Cloudlet>,
    round_robin_cursor: usize,
    last_update: f64,
    next_update: Option<EventId>,
    ctx: SimulationContext,
    sim_config: SimulationConfig,
}

impl Datacenter {
    pub fn new(
        vm_factory: VmFactory,
        ctx: SimulationContext,
        sim_config: SimulationConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            hosts: BTreeMap::new(),
            vms: BTreeMap::new(),
            vm_factory,
            vm_placement_algorithm: placement_algorithm_resolver(&sim_config.vm_placement)?,
            pending_cloudlets: Vec::new(),
            finished_cloudlets: Vec::new(),
            round_robin_cursor: 0,
            last_update: 0.,
            next_update: None,
            ctx,
            sim_config,
        })
    }

    pub fn id(&self) -> u32 {
        self.ctx.id()
    }

    // SETUP -----------------------------------------------------------------------------------------------------------

    /// Adds hosts described by the config, returns their ids.
    pub fn add_hosts(&mut self, config: &HostConfig) -> Vec<u32> {
        let count = config.count.unwrap_or(1);
        let mut ids = Vec::new();
        for i in 0..count {
            let name = match (&config.name, &config.name_prefix) {
                (Some(name), _) if count == 1 => name.clone(),
                (_, Some(prefix)) => format!("{}{}", prefix, i + 1),
                _ => format!("host{}", self.hosts.len()),
            };
            ids.push(self.add_host(&name, config.mips, config.pes, config.ram, config.bw, config.storage));
        }
        ids
    }

    pub fn add_host(&mut self, name: &str, mips: f64, pes: u32, ram: u64, bw: u64, storage: u64) -> u32 {
        let id = self.hosts.len() as u32;
        self.hosts.insert(id, Host::new(id, name, mips, pes, ram, bw, storage));
        log_debug!(self.ctx, "added host #{} {}: {} PEs x {} MIPS", id, name, pes, mips);
        id
    }

    /// Builds a VM from the config and requests its placement.
    pub fn create_vm(&mut self, config: &VmConfig) -> Result<u32, ConfigError> {
        let vm = self.vm_factory.create_scalable_vm(config)?;
        Ok(self.request_vm_placement(vm))
    }

    fn request_vm_placement(&mut self, vm: Vm) -> u32 {
        let vm_id = vm.id;
        self.vms.insert(vm_id, vm);
        self.ctx.emit_self_now(VmCreate { vm_id });
        vm_id
    }

    // QUERIES ---------------------------------------------------------------------------------------------------------

    pub fn host(&self, host_id: u32) -> Option<&Host> {
        self.hosts.get(&host_id)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn vm(&self, vm_id: u32) -> Option<&Vm> {
        self.vms.get(&vm_id)
    }

    pub fn vms(&self) -> impl Iterator<Item = &Vm> {
        self.vms.values()
    }

    /// Cloudlets which reached a terminal status, in the order of completion.
    pub fn finished_cloudlets(&self) -> &[Cloudlet] {
        &self.finished_cloudlets
    }

    pub fn cloudlet(&self, cloudlet_id: u64) -> Option<&Cloudlet> {
        self.finished_cloudlets
            .iter()
            .chain(self.pending_cloudlets.iter())
            .find(|c| c.id == cloudlet_id)
            .or_else(|| self.vms.values().find_map(|vm| vm.scheduler().cloudlet(cloudlet_id)))
    }

    pub fn cloudlet_reports(&self) -> Vec<CloudletReport> {
        self.finished_cloudlets.iter().map(CloudletReport::from).collect()
    }

    // CLOUDLET CONTROL ------------------------------------------------------------------------------------------------

    /// Suspends a running cloudlet, returns whether it was found.
    pub fn pause_cloudlet(&mut self, cloudlet_id: u64) -> bool {
        self.update_processing();
        let time = self.ctx.time();
        let paused = self
            .vms
            .values_mut()
            .filter(|vm| vm.is_running())
            .any(|vm| vm.scheduler_mut().pause(cloudlet_id, time));
        if paused {
            log_debug!(self.ctx, "cloudlet #{} paused", cloudlet_id);
        }
        self.schedule_processing_update();
        paused
    }

    /// Resumes a paused cloudlet, returns whether it was found.
    pub fn resume_cloudlet(&mut self, cloudlet_id: u64) -> bool {
        self.update_processing();
        let time = self.ctx.time();
        let vm_id = self
            .vms
            .values_mut()
            .filter(|vm| vm.is_running())
            .find_map(|vm| vm.scheduler_mut().resume(cloudlet_id, time).then_some(vm.id));
        if let Some(vm_id) = vm_id {
            log_debug!(self.ctx, "cloudlet #{} resumed", cloudlet_id);
            self.schedule_scaling_check(vm_id);
        }
        self.schedule_processing_update();
        vm_id.is_some()
    }

    /// Cancels a cloudlet that has not finished yet, it is reported as failed.
    pub fn cancel_cloudlet(&mut self, cloudlet_id: u64) -> bool {
        self.update_processing();
        let time = self.ctx.time();
        let cancelled = match self.pending_cloudlets.iter().position(|c| c.id == cloudlet_id) {
            Some(pos) => {
                let mut cloudlet = self.pending_cloudlets.remove(pos);
                cloudlet.terminate(CloudletStatus::Failed, time);
                Some(cloudlet)
            }
            None => self
                .vms
                .values_mut()
                .filter(|vm| vm.is_running())
                .find_map(|vm| vm.scheduler_mut().cancel(cloudlet_id, time)),
        };
        let found = cancelled.is_some();
        if let Some(cloudlet) = cancelled {
            log_info!(self.ctx, "cloudlet #{} cancelled", cloudlet_id);
            self.finished_cloudlets.push(cloudlet);
        }
        self.schedule_processing_update();
        found
    }

    // PROCESSING ------------------------------------------------------------------------------------------------------

    /// Advances all running cloudlets up to the current time and collects the completed ones.
    fn update_processing(&mut self) {
        let time = self.ctx.time();
        let delta = time - self.last_update;
        self.last_update = time;
        for vm in self.vms.values_mut().filter(|vm| vm.is_running()) {
            let cost = vm.cost();
            for mut cloudlet in vm.scheduler_mut().update_processing(delta, time) {
                cloudlet.add_bw_cost(cost.bw_cost(cloudlet.file_size_out));
                log_debug!(self.ctx, "cloudlet #{} completed on vm #{}", cloudlet.id, vm.id);
                self.ctx.emit_self_now(CloudletFinish {
                    cloudlet_id: cloudlet.id,
                    vm_id: vm.id,
                });
                self.finished_cloudlets.push(cloudlet);
            }
        }
    }

    /// Keeps a single processing update scheduled at the earliest cloudlet completion.
    fn schedule_processing_update(&mut self) {
        if let Some(event_id) = self.next_update.take() {
            self.ctx.cancel_event(event_id);
        }
        let mut delay = self
            .vms
            .values()
            .filter(|vm| vm.is_running())
            .filter_map(|vm| vm.scheduler().next_completion_delay())
            .min_by(|a, b| a.total_cmp(b));
        if self.sim_config.scheduling_interval > 0. {
            delay = delay.map(|d| d.min(self.sim_config.scheduling_interval));
        }
        if let Some(delay) = delay {
            self.next_update = Some(self.ctx.emit_self(ProcessingUpdate {}, delay));
        }
    }

    // CLOUDLET DISPATCHING --------------------------------------------------------------------------------------------

    /// Picks the next VM able to accept cloudlets in round-robin order.
    fn next_vm(&mut self) -> Option<u32> {
        let alive: Vec<u32> = self.vms.values().filter(|vm| vm.is_alive()).map(|vm| vm.id).collect();
        if alive.is_empty() {
            return None;
        }
        let vm_id = alive[self.round_robin_cursor % alive.len()];
        self.round_robin_cursor += 1;
        Some(vm_id)
    }

    fn fail_cloudlet(&mut self, mut cloudlet: Cloudlet, reason: &str) {
        log_warn!(self.ctx, "cloudlet #{} failed: {}", cloudlet.id, reason);
        cloudlet.terminate(CloudletStatus::Failed, self.ctx.time());
        self.finished_cloudlets.push(cloudlet);
    }

    fn dispatch_cloudlet(&mut self, mut cloudlet: Cloudlet, vm_id: u32) {
        let time = self.ctx.time();
        let Some(vm) = self.vms.get_mut(&vm_id) else {
            self.fail_cloudlet(cloudlet, &format!("vm #{} does not exist", vm_id));
            return;
        };
        match vm.status() {
            VmStatus::Created => {
                log_debug!(self.ctx, "cloudlet #{} waits for vm #{} to start", cloudlet.id, vm_id);
                cloudlet.bind(vm_id, vm.cost().cost_per_second);
                self.pending_cloudlets.push(cloudlet);
            }
            VmStatus::Running => {
                cloudlet.bind(vm_id, vm.cost().cost_per_second);
                if !vm.scheduler().can_ever_fit(&cloudlet) {
                    self.fail_cloudlet(cloudlet, &format!("does not fit into vm #{}", vm_id));
                    return;
                }
                cloudlet.add_bw_cost(vm.cost().bw_cost(cloudlet.file_size_in));
                let cloudlet_id = cloudlet.id;
                vm.on_cloudlet_submitted();
                match vm.scheduler_mut().submit(cloudlet, time) {
                    Ok(()) => log_debug!(self.ctx, "cloudlet #{} started on vm #{}", cloudlet_id, vm_id),
                    Err(e) => log_debug!(self.ctx, "cloudlet #{} queued: {}", cloudlet_id, e),
                }
                self.schedule_scaling_check(vm_id);
            }
            status => {
                self.fail_cloudlet(cloudlet, &format!("vm #{} is {}", vm_id, status));
            }
        }
    }

    fn on_cloudlet_submit(&mut self, mut cloudlet: Cloudlet) {
        self.update_processing();
        cloudlet.set_submission_time(self.ctx.time());
        log_debug!(self.ctx, "cloudlet #{} submitted", cloudlet.id);
        let vm_id = match cloudlet.vm_id() {
            Some(vm_id) => Some(vm_id),
            None => self.next_vm(),
        };
        match vm_id {
            Some(vm_id) => self.dispatch_cloudlet(cloudlet, vm_id),
            None => self.fail_cloudlet(cloudlet, "no vms available"),
        }
        self.schedule_processing_update();
    }

    fn on_cloudlet_finish(&mut self, cloudlet_id: u64, vm_id: u32) {
        if let Some(cloudlet) = self.finished_cloudlets.iter().rev().find(|c| c.id == cloudlet_id) {
            log_info!(
                self.ctx,
                "cloudlet #{} finished on vm #{}: cpu time {:.3}, cost {:.3}",
                cloudlet_id,
                vm_id,
                cloudlet.actual_cpu_time(),
                cloudlet.total_cost()
            );
        }
        if let (Some(delay), Some(vm)) = (self.sim_config.vm_destruction_delay, self.vms.get(&vm_id)) {
            if vm.is_running() && vm.scheduler().is_idle() {
                self.ctx.emit_self(VmDestroy { vm_id }, delay);
            }
        }
    }

    // VM LIFECYCLE ----------------------------------------------------------------------------------------------------

    fn on_vm_create(&mut self, vm_id: u32) {
        let Some(vm) = self.vms.get(&vm_id) else {
            log_error!(self.ctx, "unknown vm #{}", vm_id);
            return;
        };
        if vm.status() != VmStatus::Created {
            return;
        }
        match self.vm_placement_algorithm.select_host(vm.spec(), &self.hosts) {
            Some(host_id) => {
                log_debug!(self.ctx, "selected host #{} for vm #{}", host_id, vm_id);
                self.ctx.emit_self_now(HostAllocate { vm_id, host_id });
            }
            None if self.ctx.time() >= vm.creation_time() + self.sim_config.vm_allocation_timeout => {
                self.fail_vm_allocation(vm_id);
            }
            None => {
                log_debug!(self.ctx, "no suitable host for vm #{}, retrying", vm_id);
                self.ctx
                    .emit_self(VmCreate { vm_id }, self.sim_config.allocation_retry_period);
            }
        }
    }

    fn fail_vm_allocation(&mut self, vm_id: u32) {
        if let Some(vm) = self.vms.get_mut(&vm_id) {
            vm.fail_allocation();
        }
        log_warn!(self.ctx, "failed to allocate vm #{}", vm_id);
        let (bound, rest): (Vec<Cloudlet>, Vec<Cloudlet>) = std::mem::take(&mut self.pending_cloudlets)
            .into_iter()
            .partition(|c| c.vm_id() == Some(vm_id));
        self.pending_cloudlets = rest;
        for cloudlet in bound {
            self.fail_cloudlet(cloudlet, &format!("vm #{} failed to allocate", vm_id));
        }
    }

    fn on_host_allocate(&mut self, vm_id: u32, host_id: u32) {
        self.update_processing();
        let time = self.ctx.time();
        let (Some(vm), Some(host)) = (self.vms.get_mut(&vm_id), self.hosts.get_mut(&host_id)) else {
            log_error!(self.ctx, "can't allocate vm #{} on host #{}", vm_id, host_id);
            return;
        };
        if vm.status() != VmStatus::Created {
            return;
        }
        match host.allocate(vm_id, vm.spec()) {
            AllocationVerdict::Success => {
                vm.start(host_id, time);
                log_info!(self.ctx, "vm #{} started on host #{}", vm_id, host_id);
            }
            verdict => {
                // the host was taken by another VM since the selection
                log_debug!(self.ctx, "vm #{} does not fit into host #{}: {}", vm_id, host_id, verdict);
                self.ctx.emit_self_now(VmCreate { vm_id });
                return;
            }
        }
        let (bound, rest): (Vec<Cloudlet>, Vec<Cloudlet>) = std::mem::take(&mut self.pending_cloudlets)
            .into_iter()
            .partition(|c| c.vm_id() == Some(vm_id));
        self.pending_cloudlets = rest;
        for cloudlet in bound {
            self.dispatch_cloudlet(cloudlet, vm_id);
        }
        self.schedule_processing_update();
    }

    fn on_vm_destroy(&mut self, vm_id: u32) {
        let has_pending = self.pending_cloudlets.iter().any(|c| c.vm_id() == Some(vm_id));
        let Some(vm) = self.vms.get_mut(&vm_id) else {
            return;
        };
        if !vm.is_running() || !vm.scheduler().is_idle() || has_pending {
            return;
        }
        if let Some(host) = vm.host_id().and_then(|host_id| self.hosts.get_mut(&host_id)) {
            host.release(vm_id, vm.spec());
        }
        vm.destroy();
        log_info!(self.ctx, "vm #{} destroyed", vm_id);
    }

    // SCALING ---------------------------------------------------------------------------------------------------------

    /// Schedules the periodic overload check of a scalable VM unless it is already scheduled.
    fn schedule_scaling_check(&mut self, vm_id: u32) {
        let Some(vm) = self.vms.get_mut(&vm_id) else {
            return;
        };
        if vm.scaling_policy().is_some() && !vm.scaling_check_scheduled() && vm.scheduler().is_active() {
            vm.set_scaling_check_scheduled(true);
            self.ctx
                .emit_self(ScalingCheck { vm_id }, self.sim_config.scaling_check_interval);
        }
    }

    fn on_scaling_check(&mut self, vm_id: u32) {
        let Some(vm) = self.vms.get_mut(&vm_id) else {
            return;
        };
        // paused cloudlets alone do not keep the check alive
        if !vm.is_running() || !vm.scheduler().is_active() {
            vm.set_scaling_check_scheduled(false);
            return;
        }
        let scale_out = vm.is_overloaded() && vm.submitted_since_scaling() > 0;
        if scale_out {
            vm.on_scaled_out();
            log_info!(
                self.ctx,
                "vm #{} is overloaded (cpu utilization {:.3}), requesting a new vm",
                vm_id,
                vm.cpu_utilization()
            );
        }
        let config = vm.config().clone();
        self.ctx
            .emit_self(ScalingCheck { vm_id }, self.sim_config.scaling_check_interval);
        if scale_out {
            match self.vm_factory.create_vm(&config) {
                Ok(new_vm) => {
                    let new_vm_id = self.request_vm_placement(new_vm);
                    log_info!(self.ctx, "vm #{} created to offload vm #{}", new_vm_id, vm_id);
                }
                Err(e) => log_error!(self.ctx, "can't scale out vm #{}: {}", vm_id, e),
            }
        }
    }

    fn on_simulation_end(&mut self) {
        self.update_processing();
        log_info!(self.ctx, "simulation end");
        self.ctx.stop_simulation();
    }
}

impl EventHandler for Datacenter {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            CloudletSubmit { cloudlet } => {
                self.on_cloudlet_submit(cloudlet);
            }
            CloudletFinish { cloudlet_id, vm_id } => {
                self.on_cloudlet_finish(cloudlet_id, vm_id);
            }
            ProcessingUpdate {} => {
                self.next_update = None;
                self.update_processing();
                self.schedule_processing_update();
            }
            VmCreate { vm_id } => {
                self.on_vm_create(vm_id);
            }
            HostAllocate { vm_id, host_id } => {
                self.on_host_allocate(vm_id, host_id);
            }
            VmDestroy { vm_id } => {
                self.update_processing();
                self.on_vm_destroy(vm_id);
                self.schedule_processing_update();
            }
            ScalingCheck { vm_id } => {
                self.update_processing();
                self.on_scaling_check(vm_id);
                self.schedule_processing_update();
            }
            SimulationEnd {} => {
                self.on_simulation_end();
            }
        })
    }
}
