//! Simulation configuration.

use serde::{Deserialize, Serialize};

use crate::core::cloudlet::CloudletSpec;
use crate::core::error::ConfigError;
use crate::core::scaling::{ScalingType, DEFAULT_OVERLOAD_THRESHOLD};

/// Holds configuration of a single VM or a set of identical VMs.
///
/// Keys follow the naming used in VM description files. Capacity keys and `timezone` are required
/// when a VM is built from the config, the rest are optional.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize, Clone)]
pub struct VmConfig {
    /// Speed of a single PE in MIPS.
    #[serde(rename = "mipsCapacity")]
    pub mips_capacity: Option<f64>,
    #[serde(rename = "PEs")]
    pub pes: Option<u32>,
    #[serde(rename = "RAMInMBs")]
    pub ram: Option<u64>,
    #[serde(rename = "BandwidthInMBps")]
    pub bw: Option<u64>,
    #[serde(rename = "StorageInMBs")]
    pub storage: Option<u64>,
    pub timezone: Option<f64>,
    /// One of `time`, `space` or `fair`.
    #[serde(rename = "cloudletScheduler")]
    pub cloudlet_scheduler: Option<String>,
    /// `yes` enables scaling.
    #[serde(rename = "scalingEnabled")]
    pub scaling_enabled: Option<String>,
    #[serde(rename = "scalingType")]
    pub scaling_type: Option<String>,
    /// Overrides the simulation-wide overload threshold.
    #[serde(rename = "overloadThreshold")]
    pub overload_threshold: Option<f64>,
    /// Number of such VMs.
    pub count: Option<u32>,
}

impl VmConfig {
    /// Creates config with all required keys set and the default cloudlet scheduler.
    pub fn new(mips_capacity: f64, pes: u32, ram: u64, bw: u64, storage: u64) -> Self {
        Self {
            mips_capacity: Some(mips_capacity),
            pes: Some(pes),
            ram: Some(ram),
            bw: Some(bw),
            storage: Some(storage),
            timezone: Some(0.),
            ..Default::default()
        }
    }

    pub fn with_scheduler(mut self, name: &str) -> Self {
        self.cloudlet_scheduler = Some(name.to_owned());
        self
    }

    pub fn with_scaling(mut self, scaling_type: &str) -> Self {
        self.scaling_enabled = Some("yes".to_owned());
        self.scaling_type = Some(scaling_type.to_owned());
        self
    }

    pub fn scaling_enabled(&self) -> bool {
        self.scaling_enabled.as_deref() == Some("yes")
    }

    /// Requested scaling type, horizontal if not specified.
    pub fn scaling_type(&self) -> ScalingType {
        self.scaling_type
            .as_deref()
            .map_or(ScalingType::Horizontal, ScalingType::from_name)
    }
}

/// Returns the value of a required key.
pub fn require<T>(value: Option<T>, key: &str) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::missing(key))
}

/// Holds configuration of a single physical host or a set of identical hosts.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct HostConfig {
    /// Host name.
    /// Should be set if count = 1.
    pub name: Option<String>,
    /// Host name prefix.
    /// Full name is produced by appending host instance number to the prefix.
    /// Should be set if count > 1.
    pub name_prefix: Option<String>,
    /// Speed of a single PE in MIPS.
    pub mips: f64,
    pub pes: u32,
    /// Memory capacity in MB.
    pub ram: u64,
    /// Bandwidth in MB/s.
    pub bw: u64,
    /// Storage capacity in MB.
    pub storage: u64,
    /// Number of such hosts.
    pub count: Option<u32>,
}

/// Holds configuration of a batch of identical cloudlets.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct CloudletConfig {
    #[serde(flatten)]
    pub spec: CloudletSpec,
    /// Submission delay from the simulation start.
    pub delay: Option<f64>,
    /// Number of such cloudlets.
    pub count: Option<u32>,
}

/// Holds raw simulation config parsed from YAML file.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize, Clone)]
struct RawSimulationConfig {
    pub seed: Option<u64>,
    pub scheduling_interval: Option<f64>,
    pub scaling_check_interval: Option<f64>,
    pub overload_threshold: Option<f64>,
    pub allocation_retry_period: Option<f64>,
    pub vm_allocation_timeout: Option<f64>,
    pub vm_destruction_delay: Option<f64>,
    pub simulation_length: Option<f64>,
    pub vm_placement: Option<String>,
    pub cost_per_second: Option<f64>,
    pub cost_per_bw: Option<f64>,
    pub hosts: Option<Vec<HostConfig>>,
    pub vms: Option<Vec<VmConfig>>,
    pub cloudlets: Option<Vec<CloudletConfig>>,
}

/// Represents simulation configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulationConfig {
    /// Seed of the simulation random number generator.
    pub seed: u64,
    /// Maximum period in seconds between updates of cloudlet processing, 0 means updates happen only
    /// when some cloudlet is expected to complete.
    pub scheduling_interval: f64,
    /// Period in seconds between overload checks of scalable VMs.
    pub scaling_check_interval: f64,
    /// Default CPU utilization above which a scalable VM is overloaded.
    pub overload_threshold: f64,
    /// Period in seconds for waiting before retrying failed VM placement.
    pub allocation_retry_period: f64,
    /// Timeout in seconds after which unallocated VM becomes failed.
    pub vm_allocation_timeout: f64,
    /// Delay after which an idle VM is destroyed, VMs are kept forever if not set.
    pub vm_destruction_delay: Option<f64>,
    /// Time at which the simulation is stopped, 0 means no limit.
    pub simulation_length: f64,
    /// Name of VM placement algorithm.
    pub vm_placement: String,
    /// Price of a second of cloudlet execution.
    pub cost_per_second: f64,
    /// Price of a MB transferred to or from a VM.
    pub cost_per_bw: f64,
    /// Configurations of physical hosts.
    pub hosts: Vec<HostConfig>,
    /// Configurations of VMs created at start.
    pub vms: Vec<VmConfig>,
    /// Configurations of submitted cloudlets.
    pub cloudlets: Vec<CloudletConfig>,
}

impl SimulationConfig {
    fn from_raw(raw: RawSimulationConfig) -> Self {
        Self {
            seed: raw.seed.unwrap_or(123),
            scheduling_interval: raw.scheduling_interval.unwrap_or(0.),
            scaling_check_interval: raw.scaling_check_interval.unwrap_or(1.),
            overload_threshold: raw.overload_threshold.unwrap_or(DEFAULT_OVERLOAD_THRESHOLD),
            allocation_retry_period: raw.allocation_retry_period.unwrap_or(1.),
            vm_allocation_timeout: raw.vm_allocation_timeout.unwrap_or(50.),
            vm_destruction_delay: raw.vm_destruction_delay,
            simulation_length: raw.simulation_length.unwrap_or(0.),
            vm_placement: raw.vm_placement.unwrap_or_else(|| "FirstFit".to_owned()),
            cost_per_second: raw.cost_per_second.unwrap_or(0.),
            cost_per_bw: raw.cost_per_bw.unwrap_or(0.),
            hosts: raw.hosts.unwrap_or_default(),
            vms: raw.vms.unwrap_or_default(),
            cloudlets: raw.cloudlets.unwrap_or_default(),
        }
    }

    /// Creates simulation config from YAML string (uses default values if some parameters are absent).
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RawSimulationConfig = serde_yaml::from_str(yaml)?;
        Ok(Self::from_raw(raw))
    }

    /// Creates simulation config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Io {
            path: file_name.to_owned(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::from_raw(RawSimulationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::from_yaml("seed: 7").unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.overload_threshold, 0.7);
        assert_eq!(config.scaling_check_interval, 1.);
        assert_eq!(config.vm_placement, "FirstFit");
        assert_eq!(config.vm_destruction_delay, None);
        assert!(config.hosts.is_empty());
    }

    #[test]
    fn test_vm_keys() {
        let yaml = r#"
vms:
  - mipsCapacity: 1000
    PEs: 2
    RAMInMBs: 2048
    BandwidthInMBps: 1000
    StorageInMBs: 10000
    timezone: 3
    cloudletScheduler: space
    scalingEnabled: "yes"
    scalingType: vertical
    count: 2
cloudlets:
  - length: 5000
    pes: 2
    count: 3
"#;
        let config = SimulationConfig::from_yaml(yaml).unwrap();
        let vm = &config.vms[0];
        assert_eq!(vm.mips_capacity, Some(1000.));
        assert_eq!(vm.pes, Some(2));
        assert_eq!(vm.timezone, Some(3.));
        assert!(vm.scaling_enabled());
        assert_eq!(vm.scaling_type(), ScalingType::Unsupported("vertical".to_owned()));
        assert_eq!(vm.count, Some(2));

        let cloudlets = &config.cloudlets[0];
        assert_eq!(cloudlets.spec.length, 5000);
        assert_eq!(cloudlets.spec.weight, 1.);
        assert_eq!(cloudlets.count, Some(3));
    }

    #[test]
    fn test_missing_file() {
        let err = SimulationConfig::from_file("test-configs/no-such-file.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = SimulationConfig::from_yaml("hosts: 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
