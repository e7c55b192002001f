//! Tools for running experiments with multiple simulation runs.

use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};

use indexmap::map::IndexMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use threadpool::ThreadPool;

use crate::core::cloudlet::CloudletStatus;
use crate::core::config::SimulationConfig;
use crate::core::error::ConfigError;
use crate::simulation::CloudSimulation;

/// Changes applied to the base config in a single experiment run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunVariant {
    pub name: String,
    pub seed: Option<u64>,
    /// Overrides cloudlet scheduler of all VMs.
    pub cloudlet_scheduler: Option<String>,
    pub overload_threshold: Option<f64>,
    pub scaling_check_interval: Option<f64>,
    pub vm_placement: Option<String>,
    pub cost_per_second: Option<f64>,
    pub cost_per_bw: Option<f64>,
}

impl RunVariant {
    pub fn apply(&self, base: &SimulationConfig) -> SimulationConfig {
        let mut config = base.clone();
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(scheduler) = &self.cloudlet_scheduler {
            for vm in config.vms.iter_mut() {
                vm.cloudlet_scheduler = Some(scheduler.clone());
            }
        }
        if let Some(threshold) = self.overload_threshold {
            config.overload_threshold = threshold;
        }
        if let Some(interval) = self.scaling_check_interval {
            config.scaling_check_interval = interval;
        }
        if let Some(vm_placement) = &self.vm_placement {
            config.vm_placement = vm_placement.clone();
        }
        if let Some(cost_per_second) = self.cost_per_second {
            config.cost_per_second = cost_per_second;
        }
        if let Some(cost_per_bw) = self.cost_per_bw {
            config.cost_per_bw = cost_per_bw;
        }
        config
    }
}

#[derive(Debug, Deserialize)]
struct RawExperimentConfig {
    /// Path to the base simulation config, relative to the experiment config.
    base: String,
    runs: Vec<RunVariant>,
}

/// Experiment config: a base simulation config and a list of its variants, one per run.
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub base: SimulationConfig,
    pub runs: Vec<RunVariant>,
}

impl ExperimentConfig {
    pub fn new(base: SimulationConfig, runs: Vec<RunVariant>) -> Self {
        Self { base, runs }
    }

    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Io {
            path: file_name.to_owned(),
            source,
        })?;
        let raw: RawExperimentConfig = serde_yaml::from_str(&yaml)?;
        let base_path = Path::new(file_name)
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&raw.base);
        let base = SimulationConfig::from_file(&base_path.to_string_lossy())?;
        Ok(Self::new(base, raw.runs))
    }
}

/// Results of a single run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub id: usize,
    pub name: String,
    pub config: SimulationConfig,
    /// Summary metrics in a fixed order, empty if the run could not be started.
    pub metrics: IndexMap<String, f64>,
    pub error: Option<String>,
}

/// Implements execution of experiment.
pub struct Experiment {
    pub config: ExperimentConfig,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Self {
        Self { config }
    }

    /// Runs the experiment using the specified number of threads, returns results ordered by run id.
    pub fn run(&self, num_threads: usize) -> Vec<RunResult> {
        let results = Arc::new(Mutex::new(Vec::new()));
        let pool = ThreadPool::new(num_threads.max(1));

        for (run_id, variant) in self.config.runs.iter().enumerate() {
            let run_config = variant.apply(&self.config.base);
            let name = variant.name.clone();
            let results = results.clone();
            pool.execute(move || {
                info!("RUN {} ({}) started", run_id, name);
                let result = run_simulation(run_id, name, run_config);
                if let Ok(mut results) = results.lock() {
                    results.push(result);
                }
            });
        }

        pool.join();
        let mut results = std::mem::take(&mut *results.lock().unwrap_or_else(|e| e.into_inner()));
        results.sort_by_key(|r: &RunResult| r.id);
        results
    }
}

fn run_simulation(id: usize, name: String, config: SimulationConfig) -> RunResult {
    let mut cloud_sim = match CloudSimulation::from_config(config.clone()) {
        Ok(cloud_sim) => cloud_sim,
        Err(e) => {
            warn!("RUN {} ({}) failed: {}", id, name, e);
            return RunResult {
                id,
                name,
                config,
                metrics: IndexMap::new(),
                error: Some(e.to_string()),
            };
        }
    };
    cloud_sim.run();

    let reports = cloud_sim.cloudlet_reports();
    let succeeded = reports.iter().filter(|r| r.status == CloudletStatus::Success).count();
    let mut metrics = IndexMap::new();
    metrics.insert("simulation_time".to_owned(), cloud_sim.current_time());
    metrics.insert("event_count".to_owned(), cloud_sim.event_count() as f64);
    metrics.insert("vm_count".to_owned(), cloud_sim.vm_count() as f64);
    metrics.insert("cloudlets_succeeded".to_owned(), succeeded as f64);
    metrics.insert("cloudlets_failed".to_owned(), (reports.len() - succeeded) as f64);
    let turnaround: f64 = reports
        .iter()
        .filter(|r| r.status == CloudletStatus::Success)
        .filter_map(|r| r.finish_time.map(|t| t - r.submission_time))
        .sum();
    metrics.insert(
        "mean_turnaround_time".to_owned(),
        if succeeded > 0 { turnaround / succeeded as f64 } else { 0. },
    );
    metrics.insert(
        "cpu_cost".to_owned(),
        reports.iter().map(|r| r.accumulated_cpu_cost).sum(),
    );
    metrics.insert("bw_cost".to_owned(), reports.iter().map(|r| r.accumulated_bw_cost).sum());
    metrics.insert("total_cost".to_owned(), reports.iter().map(|r| r.total_cost).sum());
    info!("RUN {} ({}) finished: {:?}", id, name, metrics);

    RunResult {
        id,
        name,
        config,
        metrics,
        error: None,
    }
}

/// Writes run results to a JSON file.
pub fn save_results<P: AsRef<Path>>(results: &[RunResult], path: P) -> std::io::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, results)?;
    Ok(())
}
