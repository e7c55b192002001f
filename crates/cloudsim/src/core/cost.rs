//! Pricing of cloudlet execution.

use serde::{Deserialize, Serialize};

/// Prices applied to cloudlets running on a VM.
///
/// CPU cost grows with the time a cloudlet actually executes, bandwidth cost is charged for the input file
/// when the cloudlet is submitted to a VM and for the output file when it finishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub cost_per_second: f64,
    pub cost_per_bw: f64,
}

impl CostModel {
    pub fn new(cost_per_second: f64, cost_per_bw: f64) -> Self {
        Self {
            cost_per_second,
            cost_per_bw,
        }
    }

    pub fn bw_cost(&self, size: u64) -> f64 {
        size as f64 * self.cost_per_bw
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::core::cloudlet::{Cloudlet, CloudletSpec};

    #[test]
    fn test_total_cost_is_cpu_plus_bw() {
        let cost = CostModel::new(0.5, 0.01);
        let mut cloudlet = Cloudlet::new(0, CloudletSpec::new(1000, 1).with_files(300, 100));
        cloudlet.bind(0, cost.cost_per_second);
        cloudlet.add_bw_cost(cost.bw_cost(cloudlet.file_size_in));
        cloudlet.add_cpu_time(1.5);
        cloudlet.add_cpu_time(2.5);
        cloudlet.add_bw_cost(cost.bw_cost(cloudlet.file_size_out));

        assert_relative_eq!(cloudlet.actual_cpu_time(), 4.);
        assert_relative_eq!(cloudlet.accumulated_cpu_cost(), 4. * cost.cost_per_second);
        assert_relative_eq!(cloudlet.accumulated_bw_cost(), 4.);
        assert_eq!(
            cloudlet.total_cost(),
            cloudlet.accumulated_cpu_cost() + cloudlet.accumulated_bw_cost()
        );
    }

    #[test]
    fn test_free_vm_costs_nothing() {
        let mut cloudlet = Cloudlet::new(0, CloudletSpec::new(1000, 1));
        cloudlet.bind(0, CostModel::default().cost_per_second);
        cloudlet.add_cpu_time(10.);
        assert_eq!(cloudlet.actual_cpu_time(), 10.);
        assert_eq!(cloudlet.total_cost(), 0.);
    }
}
