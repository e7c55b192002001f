//! Standard simulation events.

// CLOUDLET EVENTS /////////////////////////////////////////////////////////////////////////////////

pub mod cloudlet {
    use serde::Serialize;

    use crate::core::cloudlet::Cloudlet;

    /// Cloudlet arrives at the datacenter.
    #[derive(Serialize)]
    pub struct CloudletSubmit {
        pub cloudlet: Cloudlet,
    }

    /// Cloudlet completed its execution.
    #[derive(Serialize)]
    pub struct CloudletFinish {
        pub cloudlet_id: u64,
        pub vm_id: u32,
    }

    /// Cloudlet progress should be brought up to date.
    #[derive(Serialize)]
    pub struct ProcessingUpdate {}
}

// VM LIFECYCLE EVENTS /////////////////////////////////////////////////////////////////////////////

pub mod vm {
    use serde::Serialize;

    /// VM should be placed on some host.
    #[derive(Serialize)]
    pub struct VmCreate {
        pub vm_id: u32,
    }

    /// VM is placed on the selected host.
    #[derive(Serialize)]
    pub struct HostAllocate {
        pub vm_id: u32,
        pub host_id: u32,
    }

    #[derive(Serialize)]
    pub struct VmDestroy {
        pub vm_id: u32,
    }
}

// SCALING EVENTS //////////////////////////////////////////////////////////////////////////////////

pub mod scaling {
    use serde::Serialize;

    /// Periodic overload check of a scalable VM.
    #[derive(Serialize)]
    pub struct ScalingCheck {
        pub vm_id: u32,
    }
}

// SIMULATION EVENTS ///////////////////////////////////////////////////////////////////////////////

pub mod simulation {
    use serde::Serialize;

    #[derive(Serialize)]
    pub struct SimulationEnd {}
}
