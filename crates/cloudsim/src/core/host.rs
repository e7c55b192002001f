use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::common::AllocationVerdict;
use crate::core::vm::VmSpec;

/// Physical machine which runs VMs.
///
/// VMs get dedicated PEs, so the host can't run more VM PEs than it has.
#[derive(Clone, Debug, Serialize)]
pub struct Host {
    pub id: u32,
    pub name: String,
    mips: f64,
    pes: u32,
    ram: u64,
    bw: u64,
    storage: u64,
    pes_available: u32,
    ram_available: u64,
    bw_available: u64,
    storage_available: u64,
    vms: BTreeSet<u32>,
}

impl Host {
    pub fn new(id: u32, name: &str, mips: f64, pes: u32, ram: u64, bw: u64, storage: u64) -> Self {
        Self {
            id,
            name: name.to_owned(),
            mips,
            pes,
            ram,
            bw,
            storage,
            pes_available: pes,
            ram_available: ram,
            bw_available: bw,
            storage_available: storage,
            vms: BTreeSet::new(),
        }
    }

    pub fn mips(&self) -> f64 {
        self.mips
    }

    pub fn pes(&self) -> u32 {
        self.pes
    }

    pub fn pes_available(&self) -> u32 {
        self.pes_available
    }

    pub fn ram_available(&self) -> u64 {
        self.ram_available
    }

    /// Fraction of host PEs given to VMs.
    pub fn pe_allocation(&self) -> f64 {
        (self.pes - self.pes_available) as f64 / self.pes as f64
    }

    pub fn vms(&self) -> &BTreeSet<u32> {
        &self.vms
    }

    pub fn can_allocate(&self, vm: &VmSpec) -> AllocationVerdict {
        if vm.mips > self.mips {
            AllocationVerdict::NotEnoughMips
        } else if vm.pes > self.pes_available {
            AllocationVerdict::NotEnoughPes
        } else if vm.ram > self.ram_available {
            AllocationVerdict::NotEnoughRam
        } else if vm.bw > self.bw_available {
            AllocationVerdict::NotEnoughBw
        } else if vm.storage > self.storage_available {
            AllocationVerdict::NotEnoughStorage
        } else {
            AllocationVerdict::Success
        }
    }

    /// Reserves host resources for the VM, returns the verdict of capacity check.
    pub fn allocate(&mut self, vm_id: u32, vm: &VmSpec) -> AllocationVerdict {
        let verdict = self.can_allocate(vm);
        if verdict == AllocationVerdict::Success && self.vms.insert(vm_id) {
            self.pes_available -= vm.pes;
            self.ram_available -= vm.ram;
            self.bw_available -= vm.bw;
            self.storage_available -= vm.storage;
        }
        verdict
    }

    pub fn release(&mut self, vm_id: u32, vm: &VmSpec) {
        if self.vms.remove(&vm_id) {
            self.pes_available += vm.pes;
            self.ram_available += vm.ram;
            self.bw_available += vm.bw;
            self.storage_available += vm.storage;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cloudlet_scheduler::SchedulingPolicy;

    fn vm(mips: f64, pes: u32, ram: u64) -> VmSpec {
        VmSpec {
            mips,
            pes,
            ram,
            bw: 100,
            storage: 1000,
            time_zone: 0.,
            scheduler: SchedulingPolicy::TimeShared,
        }
    }

    #[test]
    fn test_allocate_and_release() {
        let mut host = Host::new(0, "h", 1000., 4, 4096, 1000, 10000);
        assert_eq!(host.allocate(0, &vm(1000., 3, 1024)), AllocationVerdict::Success);
        assert_eq!(host.pes_available(), 1);
        assert_eq!(host.pe_allocation(), 0.75);
        assert_eq!(host.allocate(1, &vm(1000., 2, 1024)), AllocationVerdict::NotEnoughPes);
        assert_eq!(host.can_allocate(&vm(2000., 1, 1024)), AllocationVerdict::NotEnoughMips);
        assert_eq!(host.can_allocate(&vm(500., 1, 8192)), AllocationVerdict::NotEnoughRam);

        host.release(0, &vm(1000., 3, 1024));
        assert_eq!(host.pes_available(), 4);
        assert_eq!(host.ram_available(), 4096);
        assert!(host.vms().is_empty());
    }
}
