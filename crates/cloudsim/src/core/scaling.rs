//! VM scaling policies.

use serde::{Deserialize, Serialize};

use crate::core::vm::Vm;

pub const DEFAULT_OVERLOAD_THRESHOLD: f64 = 0.7;

/// Scaling type requested in VM config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScalingType {
    Horizontal,
    /// Any other requested type, kept for diagnostics. Such VMs are scaled horizontally.
    Unsupported(String),
}

impl ScalingType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "horizontal" => ScalingType::Horizontal,
            other => ScalingType::Unsupported(other.to_owned()),
        }
    }
}

/// Scaling policy attached to a VM.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScalingPolicy {
    /// Requests a new VM with the same configuration when CPU utilization goes above the threshold.
    Horizontal { overload_threshold: f64 },
}

impl ScalingPolicy {
    pub fn horizontal(overload_threshold: f64) -> Self {
        ScalingPolicy::Horizontal { overload_threshold }
    }

    pub fn overload_threshold(&self) -> f64 {
        match self {
            ScalingPolicy::Horizontal { overload_threshold } => *overload_threshold,
        }
    }

    /// Checks whether the VM CPU utilization exceeds the threshold. Has no side effects.
    pub fn is_overloaded(&self, vm: &Vm) -> bool {
        vm.cpu_utilization() > self.overload_threshold()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cloudlet::{Cloudlet, CloudletSpec};
    use crate::core::cloudlet_scheduler::SchedulingPolicy;
    use crate::core::config::VmConfig;
    use crate::core::cost::CostModel;
    use crate::core::vm::VmSpec;

    fn vm(pes: u32) -> Vm {
        let spec = VmSpec {
            mips: 1000.,
            pes,
            ram: 1024,
            bw: 100,
            storage: 1000,
            time_zone: 0.,
            scheduler: SchedulingPolicy::TimeShared,
        };
        Vm::new(0, spec, VmConfig::default(), CostModel::default(), 0.)
    }

    #[test]
    fn test_scaling_type_is_compared_by_value() {
        let requested = String::from("hori") + "zontal";
        assert_eq!(ScalingType::from_name(&requested), ScalingType::Horizontal);
        assert_eq!(
            ScalingType::from_name("vertical"),
            ScalingType::Unsupported("vertical".to_owned())
        );
    }

    #[test]
    fn test_overload_predicate() {
        let policy = ScalingPolicy::horizontal(DEFAULT_OVERLOAD_THRESHOLD);
        let mut vm = vm(4);
        vm.start(0, 0.);
        assert!(!policy.is_overloaded(&vm));

        for id in 0..3 {
            let _ = vm.scheduler_mut().submit(Cloudlet::new(id, CloudletSpec::new(1000, 1)), 0.);
        }
        // 0.75 > 0.7
        assert!(policy.is_overloaded(&vm));
        assert!(policy.is_overloaded(&vm));
        assert!(!ScalingPolicy::horizontal(0.8).is_overloaded(&vm));
    }
}
