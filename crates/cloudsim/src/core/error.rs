//! Errors reported by the cloud simulation.

use thiserror::Error;

use crate::core::common::AllocationVerdict;

/// Errors produced while reading or applying configuration.
///
/// All of them are fatal for the construction of the affected VM or simulation run.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required key is absent.
    #[error("missing required config key `{key}`")]
    Missing { key: String },
    /// A key has a value which can't be used.
    #[error("unsupported value `{value}` for config key `{key}`")]
    Unsupported { key: String, value: String },
    /// The config file can't be read.
    #[error("can't read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The config is not a valid YAML document of the expected shape.
    #[error("can't parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub fn missing(key: &str) -> Self {
        ConfigError::Missing { key: key.to_owned() }
    }
}

/// A cloudlet does not fit into the free capacity of a VM.
///
/// This error is recoverable: the cloudlet is kept in the VM waiting list and started once the capacity is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cloudlet #{cloudlet_id} does not fit into vm #{vm_id}: {verdict}")]
pub struct CapacityExceededError {
    pub cloudlet_id: u64,
    pub vm_id: u32,
    pub verdict: AllocationVerdict,
}
