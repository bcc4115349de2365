//! Firmware tasks
pub mod measure_cycle;
pub mod report;
