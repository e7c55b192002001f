use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Result of checking whether some consumer (a VM on a host, a cloudlet on a VM) fits into the free capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AllocationVerdict {
    NotEnoughPes,
    NotEnoughMips,
    NotEnoughRam,
    NotEnoughBw,
    NotEnoughStorage,
    Success,
}

impl Display for AllocationVerdict {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            AllocationVerdict::NotEnoughPes => write!(f, "not enough PEs"),
            AllocationVerdict::NotEnoughMips => write!(f, "not enough MIPS per PE"),
            AllocationVerdict::NotEnoughRam => write!(f, "not enough RAM"),
            AllocationVerdict::NotEnoughBw => write!(f, "not enough bandwidth"),
            AllocationVerdict::NotEnoughStorage => write!(f, "not enough storage"),
            AllocationVerdict::Success => write!(f, "success"),
        }
    }
}
