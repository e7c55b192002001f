//! Building blocks of the cloud simulation.

pub mod cloudlet;
pub mod cloudlet_scheduler;
pub mod common;
pub mod config;
pub mod cost;
pub mod datacenter;
pub mod error;
pub mod events;
pub mod host;
pub mod report;
pub mod scaling;
pub mod vm;
pub mod vm_factory;
pub mod vm_placement_algorithm;
