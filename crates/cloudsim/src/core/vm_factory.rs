//! Construction of VMs from configs.

use cloudsim_core::{log_debug, log_info, log_warn, SimulationContext};

use crate::core::cloudlet_scheduler::SchedulingPolicy;
use crate::core::config::{require, VmConfig};
use crate::core::cost::CostModel;
use crate::core::error::ConfigError;
use crate::core::scaling::{ScalingPolicy, ScalingType};
use crate::core::vm::{Vm, VmSpec};

/// Builds VMs and assigns their ids.
///
/// Ids are unique within the factory and assigned sequentially, starting from 0.
pub struct VmFactory {
    next_vm_id: u32,
    overload_threshold: f64,
    cost: CostModel,
    ctx: SimulationContext,
}

impl VmFactory {
    pub fn new(overload_threshold: f64, cost: CostModel, ctx: SimulationContext) -> Self {
        Self {
            next_vm_id: 0,
            overload_threshold,
            cost,
            ctx,
        }
    }

    /// Number of VMs built so far.
    pub fn vm_count(&self) -> u32 {
        self.next_vm_id
    }

    fn scheduling_policy(&self, config: &VmConfig) -> SchedulingPolicy {
        match config.cloudlet_scheduler.as_deref() {
            None => SchedulingPolicy::FairShare,
            Some(name) => SchedulingPolicy::from_name(name).unwrap_or_else(|| {
                log_warn!(
                    self.ctx,
                    "unknown cloudlet scheduler {}, using {} scheduler",
                    name,
                    SchedulingPolicy::FairShare
                );
                SchedulingPolicy::FairShare
            }),
        }
    }

    /// Builds a VM without scaling policy.
    ///
    /// Fails if any of the capacity keys or `timezone` is missing.
    pub fn create_vm(&mut self, config: &VmConfig) -> Result<Vm, ConfigError> {
        let spec = VmSpec {
            mips: require(config.mips_capacity, "mipsCapacity")?,
            pes: require(config.pes, "PEs")?,
            ram: require(config.ram, "RAMInMBs")?,
            bw: require(config.bw, "BandwidthInMBps")?,
            storage: require(config.storage, "StorageInMBs")?,
            time_zone: require(config.timezone, "timezone")?,
            scheduler: self.scheduling_policy(config),
        };
        let vm_id = self.next_vm_id;
        self.next_vm_id += 1;
        log_debug!(
            self.ctx,
            "created vm #{}: {} PEs x {} MIPS, {} scheduler",
            vm_id,
            spec.pes,
            spec.mips,
            spec.scheduler
        );
        Ok(Vm::new(vm_id, spec, config.clone(), self.cost, self.ctx.time()))
    }

    /// Builds a VM and attaches the horizontal scaling policy if the config enables scaling.
    ///
    /// Scaling types other than horizontal are not supported, such VMs are scaled horizontally.
    pub fn create_scalable_vm(&mut self, config: &VmConfig) -> Result<Vm, ConfigError> {
        let mut vm = self.create_vm(config)?;
        if config.scaling_enabled() {
            if let ScalingType::Unsupported(name) = config.scaling_type() {
                log_warn!(
                    self.ctx,
                    "scaling type {} is not supported for vm #{}, using horizontal scaling",
                    name,
                    vm.id
                );
            }
            let threshold = config.overload_threshold.unwrap_or(self.overload_threshold);
            vm.set_scaling_policy(ScalingPolicy::horizontal(threshold));
            log_info!(
                self.ctx,
                "enabled horizontal scaling for vm #{} with overload threshold {}",
                vm.id,
                threshold
            );
        }
        Ok(vm)
    }
}

#[cfg(test)]
mod tests {
    use cloudsim_core::Simulation;

    use super::*;
    use crate::core::scaling::DEFAULT_OVERLOAD_THRESHOLD;

    fn factory(sim: &mut Simulation) -> VmFactory {
        VmFactory::new(DEFAULT_OVERLOAD_THRESHOLD, CostModel::default(), sim.create_context("vm_factory"))
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut sim = Simulation::new(123);
        let mut factory = factory(&mut sim);
        let config = VmConfig::new(1000., 2, 1024, 100, 1000);
        let ids: Vec<u32> = (0..3).map(|_| factory.create_vm(&config).unwrap().id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(factory.vm_count(), 3);
    }

    #[test]
    fn test_missing_key_is_reported() {
        let mut sim = Simulation::new(123);
        let mut factory = factory(&mut sim);
        let mut config = VmConfig::new(1000., 2, 1024, 100, 1000);
        config.timezone = None;
        match factory.create_vm(&config) {
            Err(ConfigError::Missing { key }) => assert_eq!(key, "timezone"),
            other => panic!("unexpected result: {:?}", other.map(|vm| vm.id)),
        }
        // failed configs do not consume ids
        config.timezone = Some(0.);
        assert_eq!(factory.create_vm(&config).unwrap().id, 0);
    }

    #[test]
    fn test_scheduler_resolution() {
        let mut sim = Simulation::new(123);
        let mut factory = factory(&mut sim);
        let base = VmConfig::new(1000., 2, 1024, 100, 1000);
        let policy = |factory: &mut VmFactory, config: VmConfig| factory.create_vm(&config).unwrap().spec().scheduler;
        assert_eq!(policy(&mut factory, base.clone().with_scheduler("time")), SchedulingPolicy::TimeShared);
        assert_eq!(policy(&mut factory, base.clone().with_scheduler("space")), SchedulingPolicy::SpaceShared);
        assert_eq!(policy(&mut factory, base.clone().with_scheduler("lottery")), SchedulingPolicy::FairShare);
        assert_eq!(policy(&mut factory, base), SchedulingPolicy::FairShare);
    }

    #[test]
    fn test_scaling_policy_attachment() {
        let mut sim = Simulation::new(123);
        let mut factory = factory(&mut sim);
        let base = VmConfig::new(1000., 2, 1024, 100, 1000);

        let plain = factory.create_scalable_vm(&base).unwrap();
        assert_eq!(plain.scaling_policy(), None);

        let horizontal = factory.create_scalable_vm(&base.clone().with_scaling("horizontal")).unwrap();
        assert_eq!(horizontal.scaling_policy(), Some(ScalingPolicy::horizontal(0.7)));

        // unsupported type falls back to horizontal scaling
        let vertical = factory.create_scalable_vm(&base.clone().with_scaling("vertical")).unwrap();
        assert_eq!(vertical.scaling_policy(), Some(ScalingPolicy::horizontal(0.7)));

        let mut custom = base.with_scaling("horizontal");
        custom.overload_threshold = Some(0.9);
        let custom = factory.create_scalable_vm(&custom).unwrap();
        assert_eq!(custom.scaling_policy(), Some(ScalingPolicy::horizontal(0.9)));
    }
}
