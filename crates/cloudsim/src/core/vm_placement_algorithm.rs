//! Virtual machine placement algorithms.

use std::collections::BTreeMap;

use crate::core::common::AllocationVerdict;
use crate::core::error::ConfigError;
use crate::core::host::Host;
use crate::core::vm::VmSpec;

/// Trait for implementation of VM placement algorithms.
///
/// The algorithm is defined as a function of requested VM resources and current hosts state, which returns an
/// ID of host selected for VM placement or `None` if there is no suitable host.
pub trait VmPlacementAlgorithm {
    fn select_host(&self, vm: &VmSpec, hosts: &BTreeMap<u32, Host>) -> Option<u32>;
}

pub fn placement_algorithm_resolver(name: &str) -> Result<Box<dyn VmPlacementAlgorithm>, ConfigError> {
    match name {
        "FirstFit" => Ok(Box::new(FirstFit)),
        "BestFit" => Ok(Box::new(BestFit)),
        "WorstFit" => Ok(Box::new(WorstFit)),
        _ => Err(ConfigError::Unsupported {
            key: "vm_placement".to_owned(),
            value: name.to_owned(),
        }),
    }
}

fn suitable_hosts<'a>(vm: &'a VmSpec, hosts: &'a BTreeMap<u32, Host>) -> impl Iterator<Item = &'a Host> {
    hosts
        .values()
        .filter(move |host| host.can_allocate(vm) == AllocationVerdict::Success)
}

////////////////////////////////////////////////////////////////////////////////

/// FirstFit algorithm, which returns the first suitable host.
pub struct FirstFit;

impl VmPlacementAlgorithm for FirstFit {
    fn select_host(&self, vm: &VmSpec, hosts: &BTreeMap<u32, Host>) -> Option<u32> {
        suitable_hosts(vm, hosts).next().map(|host| host.id)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// BestFit algorithm, which returns the suitable host with the fewest free PEs.
pub struct BestFit;

impl VmPlacementAlgorithm for BestFit {
    fn select_host(&self, vm: &VmSpec, hosts: &BTreeMap<u32, Host>) -> Option<u32> {
        let mut result: Option<u32> = None;
        let mut min_available_pes = u32::MAX;
        for host in suitable_hosts(vm, hosts) {
            if host.pes_available() < min_available_pes {
                min_available_pes = host.pes_available();
                result = Some(host.id);
            }
        }
        result
    }
}

////////////////////////////////////////////////////////////////////////////////

/// WorstFit algorithm, which returns the suitable host with the most free PEs.
pub struct WorstFit;

impl VmPlacementAlgorithm for WorstFit {
    fn select_host(&self, vm: &VmSpec, hosts: &BTreeMap<u32, Host>) -> Option<u32> {
        let mut result: Option<u32> = None;
        let mut max_available_pes = 0;
        for host in suitable_hosts(vm, hosts) {
            if result.is_none() || host.pes_available() > max_available_pes {
                max_available_pes = host.pes_available();
                result = Some(host.id);
            }
        }
        result
    }
}
