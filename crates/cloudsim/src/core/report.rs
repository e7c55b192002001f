//! Per-cloudlet execution reports.

use std::path::Path;

use serde::Serialize;

use crate::core::cloudlet::{Cloudlet, CloudletStatus};

/// Outcome and cost of a single cloudlet.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CloudletReport {
    pub id: u64,
    pub vm_id: Option<u32>,
    pub status: CloudletStatus,
    pub length: u64,
    pub submission_time: f64,
    pub exec_start_time: Option<f64>,
    pub finish_time: Option<f64>,
    pub actual_cpu_time: f64,
    pub cost_per_second: f64,
    pub accumulated_cpu_cost: f64,
    pub accumulated_bw_cost: f64,
    pub total_cost: f64,
}

impl From<&Cloudlet> for CloudletReport {
    fn from(cloudlet: &Cloudlet) -> Self {
        Self {
            id: cloudlet.id,
            vm_id: cloudlet.vm_id(),
            status: cloudlet.status(),
            length: cloudlet.length,
            submission_time: cloudlet.submission_time(),
            exec_start_time: cloudlet.exec_start_time(),
            finish_time: cloudlet.finish_time(),
            actual_cpu_time: cloudlet.actual_cpu_time(),
            cost_per_second: cloudlet.cost_per_second(),
            accumulated_cpu_cost: cloudlet.accumulated_cpu_cost(),
            accumulated_bw_cost: cloudlet.accumulated_bw_cost(),
            total_cost: cloudlet.total_cost(),
        }
    }
}

/// Writes reports to a CSV file with a header row.
pub fn save_reports<P: AsRef<Path>>(reports: &[CloudletReport], path: P) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for report in reports {
        writer.serialize(report)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cloudlet::CloudletSpec;

    #[test]
    fn test_csv_output() {
        let mut cloudlet = Cloudlet::new(3, CloudletSpec::new(1000, 1));
        cloudlet.bind(1, 0.5);
        cloudlet.start(0.);
        cloudlet.add_progress(1000.);
        cloudlet.add_cpu_time(2.);
        cloudlet.terminate(CloudletStatus::Success, 2.);

        let path = std::env::temp_dir().join("cloudsim-report-test.csv");
        save_reports(&[CloudletReport::from(&cloudlet)], &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("id,vm_id,status,length,submission_time,exec_start_time,finish_time,actual_cpu_time,cost_per_second,accumulated_cpu_cost,accumulated_bw_cost,total_cost")
        );
        assert_eq!(lines.next(), Some("3,1,Success,1000,0.0,0.0,2.0,2.0,0.5,1.0,0.0,1.0"));
        std::fs::remove_file(path).unwrap();
    }
}
