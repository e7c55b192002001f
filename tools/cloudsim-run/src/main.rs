use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use env_logger::Builder;

use cloudsim::core::cloudlet::CloudletStatus;
use cloudsim::core::config::SimulationConfig;
use cloudsim::experiment::{save_results, Experiment, ExperimentConfig};
use cloudsim::simulation::CloudSimulation;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Runs cloud simulation or batch experiment described by YAML config
struct Args {
    /// Path to YAML file with simulation configuration (or experiment configuration with --experiment)
    #[arg(short, long)]
    config: PathBuf,

    /// Path to produced CSV file with cloudlet reports (simulation mode)
    /// or JSON file with run results (experiment mode)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Treat config as experiment config with multiple runs
    #[arg(short, long)]
    experiment: bool,

    /// Number of threads used in experiment mode
    #[arg(short, long, default_value_t = 1)]
    threads: usize,
}

fn run_single(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = SimulationConfig::from_file(&args.config.to_string_lossy())?;
    let mut cloud_sim = CloudSimulation::from_config(config)?;
    cloud_sim.run();

    let reports = cloud_sim.cloudlet_reports();
    let succeeded = reports.iter().filter(|r| r.status == CloudletStatus::Success).count();
    let total_cost: f64 = reports.iter().map(|r| r.total_cost).sum();
    println!("Simulation time: {:.3}", cloud_sim.current_time());
    println!("Processed events: {}", cloud_sim.event_count());
    println!("VMs: {}", cloud_sim.vm_count());
    println!("Cloudlets: {} succeeded, {} failed", succeeded, reports.len() - succeeded);
    println!("Total cost: {:.3}", total_cost);

    if let Some(output) = &args.output {
        cloud_sim.save_report(output)?;
    }
    Ok(())
}

fn run_experiment(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = ExperimentConfig::from_file(&args.config.to_string_lossy())?;
    let results = Experiment::new(config).run(args.threads);

    for result in &results {
        match &result.error {
            Some(error) => println!("{}: error: {}", result.name, error),
            None => println!("{}: {:?}", result.name, result.metrics),
        }
    }

    let output = args.output.clone().unwrap_or_else(|| {
        let stem = args.config.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        args.config
            .with_file_name([stem.as_ref(), "-results"].concat())
            .with_extension("json")
    });
    save_results(&results, output)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let args = Args::parse();
    if args.experiment {
        run_experiment(&args)
    } else {
        run_single(&args)
    }
}
