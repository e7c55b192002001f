use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Remaining length (in MI) below which a cloudlet is considered complete.
pub const FINISH_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CloudletStatus {
    Created,
    Queued,
    InExec,
    Paused,
    Success,
    Failed,
}

impl CloudletStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CloudletStatus::Success | CloudletStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            CloudletStatus::Created => 0,
            CloudletStatus::Queued => 1,
            CloudletStatus::InExec | CloudletStatus::Paused => 2,
            CloudletStatus::Success | CloudletStatus::Failed => 3,
        }
    }

    /// Statuses only move forward, the exception being the pause/resume cycle.
    /// A paused cloudlet which waits for capacity after resume goes straight to execution.
    pub fn can_move_to(&self, next: CloudletStatus) -> bool {
        match (self, next) {
            (CloudletStatus::InExec, CloudletStatus::Paused) | (CloudletStatus::Paused, CloudletStatus::InExec) => true,
            (CloudletStatus::Paused, CloudletStatus::Success) => false,
            _ => next.rank() > self.rank(),
        }
    }
}

impl Display for CloudletStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CloudletStatus::Created => write!(f, "created"),
            CloudletStatus::Queued => write!(f, "queued"),
            CloudletStatus::InExec => write!(f, "in_exec"),
            CloudletStatus::Paused => write!(f, "paused"),
            CloudletStatus::Success => write!(f, "success"),
            CloudletStatus::Failed => write!(f, "failed"),
        }
    }
}

fn default_pes() -> u32 {
    1
}

fn default_weight() -> f64 {
    1.
}

/// Describes the work a user wants to run.
///
/// File sizes, RAM and bandwidth are in MB, length is in MI (millions of instructions).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CloudletSpec {
    pub length: u64,
    #[serde(default = "default_pes")]
    pub pes: u32,
    #[serde(default)]
    pub file_size_in: u64,
    #[serde(default)]
    pub file_size_out: u64,
    #[serde(default)]
    pub ram: u64,
    #[serde(default)]
    pub bw: u64,
    /// Relative priority under the fair share scheduler.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// VM the cloudlet is explicitly bound to.
    #[serde(default)]
    pub vm: Option<u32>,
}

impl CloudletSpec {
    pub fn new(length: u64, pes: u32) -> Self {
        Self {
            length,
            pes,
            file_size_in: 0,
            file_size_out: 0,
            ram: 0,
            bw: 0,
            weight: default_weight(),
            vm: None,
        }
    }

    pub fn with_files(mut self, file_size_in: u64, file_size_out: u64) -> Self {
        self.file_size_in = file_size_in;
        self.file_size_out = file_size_out;
        self
    }

    pub fn with_resources(mut self, ram: u64, bw: u64) -> Self {
        self.ram = ram;
        self.bw = bw;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_vm(mut self, vm_id: u32) -> Self {
        self.vm = Some(vm_id);
        self
    }
}

/// A unit of work executed on a VM.
#[derive(Clone, Debug, Serialize)]
pub struct Cloudlet {
    pub id: u64,
    pub length: u64,
    pub pes: u32,
    pub file_size_in: u64,
    pub file_size_out: u64,
    pub ram: u64,
    pub bw: u64,
    pub weight: f64,
    vm_id: Option<u32>,
    status: CloudletStatus,
    finished_so_far: f64,
    cost_per_second: f64,
    accumulated_cpu_cost: f64,
    accumulated_bw_cost: f64,
    actual_cpu_time: f64,
    submission_time: f64,
    exec_start_time: Option<f64>,
    finish_time: Option<f64>,
}

impl Cloudlet {
    pub fn new(id: u64, spec: CloudletSpec) -> Self {
        Self {
            id,
            length: spec.length,
            pes: spec.pes.max(1),
            file_size_in: spec.file_size_in,
            file_size_out: spec.file_size_out,
            ram: spec.ram,
            bw: spec.bw,
            weight: if spec.weight > 0. { spec.weight } else { default_weight() },
            vm_id: spec.vm,
            status: CloudletStatus::Created,
            finished_so_far: 0.,
            cost_per_second: 0.,
            accumulated_cpu_cost: 0.,
            accumulated_bw_cost: 0.,
            actual_cpu_time: 0.,
            submission_time: 0.,
            exec_start_time: None,
            finish_time: None,
        }
    }

    pub fn status(&self) -> CloudletStatus {
        self.status
    }

    /// Panics on a transition which breaks the cloudlet lifecycle.
    pub fn set_status(&mut self, status: CloudletStatus) {
        assert!(
            self.status.can_move_to(status),
            "cloudlet #{} can't move from {} to {}",
            self.id,
            self.status,
            status
        );
        self.status = status;
    }

    pub fn vm_id(&self) -> Option<u32> {
        self.vm_id
    }

    /// Binds the cloudlet to a VM with the given price of a second of execution.
    pub fn bind(&mut self, vm_id: u32, cost_per_second: f64) {
        self.vm_id = Some(vm_id);
        self.cost_per_second = cost_per_second;
    }

    pub fn finished_so_far(&self) -> f64 {
        self.finished_so_far
    }

    pub fn remaining_length(&self) -> f64 {
        (self.length as f64 - self.finished_so_far).max(0.)
    }

    pub fn is_finished(&self) -> bool {
        self.remaining_length() <= FINISH_TOLERANCE
    }

    /// Adds executed instructions, never going past the cloudlet length.
    pub fn add_progress(&mut self, mi: f64) {
        self.finished_so_far = (self.finished_so_far + mi).min(self.length as f64);
    }

    pub fn submission_time(&self) -> f64 {
        self.submission_time
    }

    pub fn set_submission_time(&mut self, time: f64) {
        self.submission_time = time;
    }

    pub fn exec_start_time(&self) -> Option<f64> {
        self.exec_start_time
    }

    /// Moves the cloudlet into execution, remembering the first start time.
    pub fn start(&mut self, time: f64) {
        self.set_status(CloudletStatus::InExec);
        self.exec_start_time.get_or_insert(time);
    }

    pub fn finish_time(&self) -> Option<f64> {
        self.finish_time
    }

    /// Moves the cloudlet into a terminal status.
    pub fn terminate(&mut self, status: CloudletStatus, time: f64) {
        debug_assert!(status.is_terminal());
        self.set_status(status);
        self.finish_time = Some(time);
    }

    // COSTS -----------------------------------------------------------------------------------------------------------

    pub fn cost_per_second(&self) -> f64 {
        self.cost_per_second
    }

    /// Accounts `duration` seconds of execution.
    pub fn add_cpu_time(&mut self, duration: f64) {
        self.actual_cpu_time += duration;
        self.accumulated_cpu_cost += duration * self.cost_per_second;
    }

    pub fn add_bw_cost(&mut self, cost: f64) {
        self.accumulated_bw_cost += cost;
    }

    pub fn actual_cpu_time(&self) -> f64 {
        self.actual_cpu_time
    }

    pub fn accumulated_cpu_cost(&self) -> f64 {
        self.accumulated_cpu_cost
    }

    pub fn accumulated_bw_cost(&self) -> f64 {
        self.accumulated_bw_cost
    }

    pub fn total_cost(&self) -> f64 {
        self.accumulated_cpu_cost + self.accumulated_bw_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_moves_forward() {
        let mut cloudlet = Cloudlet::new(0, CloudletSpec::new(1000, 1));
        cloudlet.set_status(CloudletStatus::Queued);
        cloudlet.start(2.);
        cloudlet.set_status(CloudletStatus::Paused);
        cloudlet.start(5.);
        assert_eq!(cloudlet.exec_start_time(), Some(2.));
        cloudlet.terminate(CloudletStatus::Success, 7.);
        assert_eq!(cloudlet.finish_time(), Some(7.));
        assert!(cloudlet.status().is_terminal());
    }

    #[test]
    #[should_panic]
    fn test_terminal_status_is_final() {
        let mut cloudlet = Cloudlet::new(0, CloudletSpec::new(1000, 1));
        cloudlet.terminate(CloudletStatus::Failed, 1.);
        cloudlet.set_status(CloudletStatus::InExec);
    }

    #[test]
    fn test_progress_is_capped_by_length() {
        let mut cloudlet = Cloudlet::new(0, CloudletSpec::new(1000, 1));
        cloudlet.add_progress(600.);
        assert!(!cloudlet.is_finished());
        cloudlet.add_progress(600.);
        assert_eq!(cloudlet.finished_so_far(), 1000.);
        assert!(cloudlet.is_finished());
    }

    #[test]
    fn test_nonpositive_weight_is_replaced() {
        let cloudlet = Cloudlet::new(0, CloudletSpec::new(1000, 0).with_weight(0.));
        assert_eq!(cloudlet.weight, 1.);
        assert_eq!(cloudlet.pes, 1);
    }
}
