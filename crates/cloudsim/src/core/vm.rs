use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::core::cloudlet_scheduler::{CloudletScheduler, SchedulingPolicy};
use crate::core::config::VmConfig;
use crate::core::cost::CostModel;
use crate::core::scaling::ScalingPolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VmStatus {
    /// Waiting for a host.
    Created,
    Running,
    FailedToAllocate,
    Destroyed,
}

impl Display for VmStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmStatus::Created => write!(f, "created"),
            VmStatus::Running => write!(f, "running"),
            VmStatus::FailedToAllocate => write!(f, "failed_to_allocate"),
            VmStatus::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Resources requested by a VM. RAM, bandwidth and storage are in MB.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VmSpec {
    /// Speed of a single PE.
    pub mips: f64,
    pub pes: u32,
    pub ram: u64,
    pub bw: u64,
    pub storage: u64,
    pub time_zone: f64,
    pub scheduler: SchedulingPolicy,
}

/// A virtual machine hosting cloudlets.
#[derive(Clone, Debug)]
pub struct Vm {
    pub id: u32,
    spec: VmSpec,
    config: VmConfig,
    cost: CostModel,
    scheduler: CloudletScheduler,
    scaling_policy: Option<ScalingPolicy>,
    status: VmStatus,
    host_id: Option<u32>,
    creation_time: f64,
    start_time: Option<f64>,
    submitted_since_scaling: u64,
    scaling_check_scheduled: bool,
}

impl Vm {
    pub fn new(id: u32, spec: VmSpec, config: VmConfig, cost: CostModel, creation_time: f64) -> Self {
        let scheduler = CloudletScheduler::new(
            id,
            spec.scheduler,
            spec.mips,
            spec.pes,
            spec.ram,
            spec.bw,
            spec.storage,
        );
        Self {
            id,
            spec,
            config,
            cost,
            scheduler,
            scaling_policy: None,
            status: VmStatus::Created,
            host_id: None,
            creation_time,
            start_time: None,
            submitted_since_scaling: 0,
            scaling_check_scheduled: false,
        }
    }

    pub fn spec(&self) -> &VmSpec {
        &self.spec
    }

    /// Config the VM was created from. Scaled-out VMs are built from it.
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn cost(&self) -> CostModel {
        self.cost
    }

    pub fn scheduler(&self) -> &CloudletScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut CloudletScheduler {
        &mut self.scheduler
    }

    pub fn status(&self) -> VmStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == VmStatus::Running
    }

    /// Running VMs and VMs still waiting for a host can accept cloudlets.
    pub fn is_alive(&self) -> bool {
        matches!(self.status, VmStatus::Created | VmStatus::Running)
    }

    pub fn host_id(&self) -> Option<u32> {
        self.host_id
    }

    pub fn creation_time(&self) -> f64 {
        self.creation_time
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    pub fn start(&mut self, host_id: u32, time: f64) {
        self.status = VmStatus::Running;
        self.host_id = Some(host_id);
        self.start_time = Some(time);
    }

    pub fn fail_allocation(&mut self) {
        self.status = VmStatus::FailedToAllocate;
    }

    pub fn destroy(&mut self) {
        self.status = VmStatus::Destroyed;
    }

    pub fn cpu_utilization(&self) -> f64 {
        if self.is_running() {
            self.scheduler.cpu_utilization()
        } else {
            0.
        }
    }

    // SCALING ---------------------------------------------------------------------------------------------------------

    pub fn scaling_policy(&self) -> Option<ScalingPolicy> {
        self.scaling_policy
    }

    pub fn set_scaling_policy(&mut self, policy: ScalingPolicy) {
        self.scaling_policy = Some(policy);
    }

    pub fn is_overloaded(&self) -> bool {
        self.scaling_policy.map_or(false, |policy| policy.is_overloaded(self))
    }

    /// Number of cloudlets submitted since the last scale-out request.
    pub fn submitted_since_scaling(&self) -> u64 {
        self.submitted_since_scaling
    }

    pub fn on_cloudlet_submitted(&mut self) {
        self.submitted_since_scaling += 1;
    }

    pub fn on_scaled_out(&mut self) {
        self.submitted_since_scaling = 0;
    }

    pub fn scaling_check_scheduled(&self) -> bool {
        self.scaling_check_scheduled
    }

    pub fn set_scaling_check_scheduled(&mut self, scheduled: bool) {
        self.scaling_check_scheduled = scheduled;
    }
}
