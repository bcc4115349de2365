//! Core system components of the monitoring node
pub mod event;
pub mod io;
pub mod resources;
