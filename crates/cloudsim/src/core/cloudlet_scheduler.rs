//! Sharing of VM processing capacity between cloudlets.

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::core::cloudlet::{Cloudlet, CloudletStatus};
use crate::core::common::AllocationVerdict;
use crate::core::error::CapacityExceededError;

/// Policy used by a VM to divide its PEs between hosted cloudlets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingPolicy {
    /// All running cloudlets share the PEs, each gets at most one PE per requested PE.
    TimeShared,
    /// Each running cloudlet owns its PEs exclusively, the rest wait in FIFO order.
    SpaceShared,
    /// Capacity is split in proportion to cloudlet weights.
    FairShare,
}

impl SchedulingPolicy {
    /// Resolves the policy by its config name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "time" => Some(SchedulingPolicy::TimeShared),
            "space" => Some(SchedulingPolicy::SpaceShared),
            "fair" => Some(SchedulingPolicy::FairShare),
            _ => None,
        }
    }
}

impl Display for SchedulingPolicy {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SchedulingPolicy::TimeShared => write!(f, "time-shared"),
            SchedulingPolicy::SpaceShared => write!(f, "space-shared"),
            SchedulingPolicy::FairShare => write!(f, "fair-share"),
        }
    }
}

/// Per-VM cloudlet scheduler.
///
/// Keeps running, paused and waiting cloudlets of a single VM and advances their progress.
/// Every running cloudlet holds a reservation of RAM, bandwidth and storage (input plus output files),
/// under the space-shared policy it also holds its PEs. Waiting cloudlets are started strictly in the order
/// they were queued.
#[derive(Clone, Debug)]
pub struct CloudletScheduler {
    vm_id: u32,
    policy: SchedulingPolicy,
    mips: f64,
    pes: u32,
    ram: u64,
    bw: u64,
    storage: u64,
    used_pes: u32,
    used_ram: u64,
    used_bw: u64,
    used_storage: u64,
    exec_list: Vec<Cloudlet>,
    paused_list: Vec<Cloudlet>,
    waiting_list: VecDeque<Cloudlet>,
}

impl CloudletScheduler {
    pub fn new(vm_id: u32, policy: SchedulingPolicy, mips: f64, pes: u32, ram: u64, bw: u64, storage: u64) -> Self {
        Self {
            vm_id,
            policy,
            mips,
            pes,
            ram,
            bw,
            storage,
            used_pes: 0,
            used_ram: 0,
            used_bw: 0,
            used_storage: 0,
            exec_list: Vec::new(),
            paused_list: Vec::new(),
            waiting_list: VecDeque::new(),
        }
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Total VM capacity in MIPS.
    pub fn capacity(&self) -> f64 {
        self.mips * self.pes as f64
    }

    pub fn used_pes(&self) -> u32 {
        self.used_pes
    }

    // ADMISSION -------------------------------------------------------------------------------------------------------

    fn storage_demand(cloudlet: &Cloudlet) -> u64 {
        cloudlet.file_size_in + cloudlet.file_size_out
    }

    fn reservation_verdict(&self, cloudlet: &Cloudlet) -> AllocationVerdict {
        if self.policy == SchedulingPolicy::SpaceShared && self.used_pes + cloudlet.pes > self.pes {
            AllocationVerdict::NotEnoughPes
        } else if self.used_ram + cloudlet.ram > self.ram {
            AllocationVerdict::NotEnoughRam
        } else if self.used_bw + cloudlet.bw > self.bw {
            AllocationVerdict::NotEnoughBw
        } else if self.used_storage + Self::storage_demand(cloudlet) > self.storage {
            AllocationVerdict::NotEnoughStorage
        } else {
            AllocationVerdict::Success
        }
    }

    /// Checks whether the cloudlet fits into the currently free VM capacity.
    pub fn try_reserve(&self, cloudlet: &Cloudlet) -> Result<(), CapacityExceededError> {
        match self.reservation_verdict(cloudlet) {
            AllocationVerdict::Success => Ok(()),
            verdict => Err(CapacityExceededError {
                cloudlet_id: cloudlet.id,
                vm_id: self.vm_id,
                verdict,
            }),
        }
    }

    /// Checks whether the cloudlet fits into the idle VM, i.e. could ever be started.
    pub fn can_ever_fit(&self, cloudlet: &Cloudlet) -> bool {
        (self.policy != SchedulingPolicy::SpaceShared || cloudlet.pes <= self.pes)
            && cloudlet.ram <= self.ram
            && cloudlet.bw <= self.bw
            && Self::storage_demand(cloudlet) <= self.storage
    }

    fn reserve(&mut self, cloudlet: &Cloudlet) {
        if self.policy == SchedulingPolicy::SpaceShared {
            self.used_pes += cloudlet.pes;
        }
        self.used_ram += cloudlet.ram;
        self.used_bw += cloudlet.bw;
        self.used_storage += Self::storage_demand(cloudlet);
    }

    fn release(&mut self, cloudlet: &Cloudlet) {
        if self.policy == SchedulingPolicy::SpaceShared {
            self.used_pes -= cloudlet.pes;
        }
        self.used_ram -= cloudlet.ram;
        self.used_bw -= cloudlet.bw;
        self.used_storage -= Self::storage_demand(cloudlet);
    }

    /// Accepts a cloudlet for execution on this VM.
    ///
    /// The cloudlet starts immediately if nothing is waiting and it fits into the free capacity.
    /// Otherwise it is queued and the error describing the missing resource is returned.
    pub fn submit(&mut self, mut cloudlet: Cloudlet, time: f64) -> Result<(), CapacityExceededError> {
        let admission = match self.waiting_list.front() {
            // the queue head has precedence over the new cloudlet
            Some(head) => Err(CapacityExceededError {
                cloudlet_id: cloudlet.id,
                vm_id: self.vm_id,
                verdict: self.reservation_verdict(head),
            }),
            None => self.try_reserve(&cloudlet),
        };
        match admission {
            Ok(()) => {
                self.reserve(&cloudlet);
                cloudlet.start(time);
                self.exec_list.push(cloudlet);
            }
            Err(_) => {
                cloudlet.set_status(CloudletStatus::Queued);
                self.waiting_list.push_back(cloudlet);
            }
        }
        admission
    }

    fn start_waiting(&mut self, time: f64) {
        while let Some(head) = self.waiting_list.front() {
            if self.try_reserve(head).is_err() {
                break;
            }
            if let Some(mut cloudlet) = self.waiting_list.pop_front() {
                self.reserve(&cloudlet);
                cloudlet.start(time);
                self.exec_list.push(cloudlet);
            }
        }
    }

    // PROCESSING ------------------------------------------------------------------------------------------------------

    /// Returns the MIPS currently allocated to each running cloudlet, in the order of execution list.
    fn allocated_mips(&self) -> Vec<f64> {
        match self.policy {
            SchedulingPolicy::SpaceShared => self.exec_list.iter().map(|c| c.pes as f64 * self.mips).collect(),
            SchedulingPolicy::TimeShared => {
                let requested_pes: u32 = self.exec_list.iter().map(|c| c.pes).sum();
                let share = (self.pes as f64 / requested_pes as f64).min(1.);
                self.exec_list.iter().map(|c| c.pes as f64 * self.mips * share).collect()
            }
            SchedulingPolicy::FairShare => self.fair_share_mips(),
        }
    }

    /// Returns the MIPS allocated to the cloudlet if it is running.
    pub fn cloudlet_mips(&self, cloudlet_id: u64) -> Option<f64> {
        let pos = self.exec_list.iter().position(|c| c.id == cloudlet_id)?;
        self.allocated_mips().get(pos).copied()
    }

    /// Splits the capacity in proportion to `weight * pes` while no cloudlet gets more than one PE per
    /// requested PE. The capacity left by capped cloudlets is redistributed between the others.
    fn fair_share_mips(&self) -> Vec<f64> {
        let weight = |c: &Cloudlet| c.weight * c.pes as f64;
        let cap = |c: &Cloudlet| c.pes as f64 * self.mips;
        let mut mips = vec![0.; self.exec_list.len()];
        let mut active: Vec<usize> = (0..self.exec_list.len()).collect();
        let mut remaining = self.capacity();
        while !active.is_empty() {
            let weight_sum: f64 = active.iter().map(|&i| weight(&self.exec_list[i])).sum();
            let (capped, uncapped): (Vec<usize>, Vec<usize>) = active.iter().partition(|&&i| {
                let cloudlet = &self.exec_list[i];
                remaining * weight(cloudlet) / weight_sum >= cap(cloudlet)
            });
            if capped.is_empty() {
                for i in uncapped {
                    mips[i] = remaining * weight(&self.exec_list[i]) / weight_sum;
                }
                break;
            }
            for i in capped {
                mips[i] = cap(&self.exec_list[i]);
                remaining -= mips[i];
            }
            active = uncapped;
        }
        mips
    }

    /// Advances running cloudlets by `delta` seconds of execution and returns the ones that completed.
    ///
    /// Completed cloudlets release their reservations, so waiting cloudlets may start at `time`.
    pub fn update_processing(&mut self, delta: f64, time: f64) -> Vec<Cloudlet> {
        if delta > 0. {
            let mips = self.allocated_mips();
            for (cloudlet, mips) in self.exec_list.iter_mut().zip(mips) {
                cloudlet.add_progress(mips * delta);
                cloudlet.add_cpu_time(delta);
            }
        }
        let mut finished = Vec::new();
        let mut i = 0;
        while i < self.exec_list.len() {
            if self.exec_list[i].is_finished() {
                let mut cloudlet = self.exec_list.remove(i);
                self.release(&cloudlet);
                cloudlet.terminate(CloudletStatus::Success, time);
                finished.push(cloudlet);
            } else {
                i += 1;
            }
        }
        if !finished.is_empty() {
            self.start_waiting(time);
        }
        finished
    }

    /// Returns the delay until the next running cloudlet completes at the current rates.
    pub fn next_completion_delay(&self) -> Option<f64> {
        self.exec_list
            .iter()
            .zip(self.allocated_mips())
            .filter(|(_, mips)| *mips > 0.)
            .map(|(cloudlet, mips)| cloudlet.remaining_length() / mips)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Returns the fraction of VM capacity currently allocated to running cloudlets.
    pub fn cpu_utilization(&self) -> f64 {
        if self.capacity() <= 0. {
            return 0.;
        }
        self.allocated_mips().iter().sum::<f64>() / self.capacity()
    }

    // CONTROL ---------------------------------------------------------------------------------------------------------

    /// Suspends a running cloudlet and releases its reservation.
    pub fn pause(&mut self, cloudlet_id: u64, time: f64) -> bool {
        let Some(pos) = self.exec_list.iter().position(|c| c.id == cloudlet_id) else {
            return false;
        };
        let mut cloudlet = self.exec_list.remove(pos);
        self.release(&cloudlet);
        cloudlet.set_status(CloudletStatus::Paused);
        self.paused_list.push(cloudlet);
        self.start_waiting(time);
        true
    }

    /// Resumes a paused cloudlet. If it doesn't fit now, it waits at the tail of the queue.
    pub fn resume(&mut self, cloudlet_id: u64, time: f64) -> bool {
        let Some(pos) = self.paused_list.iter().position(|c| c.id == cloudlet_id) else {
            return false;
        };
        let mut cloudlet = self.paused_list.remove(pos);
        if self.waiting_list.is_empty() && self.try_reserve(&cloudlet).is_ok() {
            self.reserve(&cloudlet);
            cloudlet.start(time);
            self.exec_list.push(cloudlet);
        } else {
            self.waiting_list.push_back(cloudlet);
        }
        true
    }

    /// Removes a hosted cloudlet and marks it as failed.
    pub fn cancel(&mut self, cloudlet_id: u64, time: f64) -> Option<Cloudlet> {
        let mut cloudlet = if let Some(pos) = self.exec_list.iter().position(|c| c.id == cloudlet_id) {
            let cloudlet = self.exec_list.remove(pos);
            self.release(&cloudlet);
            cloudlet
        } else if let Some(pos) = self.paused_list.iter().position(|c| c.id == cloudlet_id) {
            self.paused_list.remove(pos)
        } else {
            let pos = self.waiting_list.iter().position(|c| c.id == cloudlet_id)?;
            self.waiting_list.remove(pos)?
        };
        cloudlet.terminate(CloudletStatus::Failed, time);
        self.start_waiting(time);
        Some(cloudlet)
    }

    /// Removes all hosted cloudlets, marking them as failed.
    pub fn cancel_all(&mut self, time: f64) -> Vec<Cloudlet> {
        let ids: Vec<u64> = self.cloudlets().map(|c| c.id).collect();
        ids.into_iter().filter_map(|id| self.cancel(id, time)).collect()
    }

    // QUERIES ---------------------------------------------------------------------------------------------------------

    /// Iterates over hosted cloudlets: running, then paused, then waiting.
    pub fn cloudlets(&self) -> impl Iterator<Item = &Cloudlet> {
        self.exec_list
            .iter()
            .chain(self.paused_list.iter())
            .chain(self.waiting_list.iter())
    }

    pub fn cloudlet(&self, cloudlet_id: u64) -> Option<&Cloudlet> {
        self.cloudlets().find(|c| c.id == cloudlet_id)
    }

    pub fn running_count(&self) -> usize {
        self.exec_list.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting_list.len()
    }

    pub fn is_idle(&self) -> bool {
        self.exec_list.is_empty() && self.paused_list.is_empty() && self.waiting_list.is_empty()
    }

    /// Checks whether some cloudlets are running or waiting to run. Paused cloudlets are not counted.
    pub fn is_active(&self) -> bool {
        !self.exec_list.is_empty() || !self.waiting_list.is_empty()
    }
}
