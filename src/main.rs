//! Sump monitor firmware entry point
//!
//! Initializes the system and spawns the acquisition and report tasks.

#![no_std]
#![no_main]

use crate::task::{measure_cycle::measure_cycle, report::report};
use embassy_executor::Spawner;
use embassy_rp::block::ImageDef;
use embassy_rp::config::Config;
use system::resources::{self, AssignedResources, PowerSensorResources, RangingSensorResources};
use {defmt_rtt as _, panic_probe as _};

/// Firmware image type for bootloader
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

/// System core modules
mod system;
/// Task implementations
mod task;

/// Firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Config::default());

    // The power window locks the ADC from its own task, so it has to exist first
    resources::init_adc(p.ADC);

    let r = split_resources!(p);

    // Reporter first so no measurement waits on a missing consumer
    spawner.spawn(report().unwrap());
    spawner.spawn(measure_cycle(r.ranging_sensor, r.power_sensor).unwrap());
}
