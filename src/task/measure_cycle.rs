//! Periodic acquisition of water level and mains power
//!
//! Owns both sensors and runs one ranging batch followed by one power window every
//! cycle, so acquisitions never overlap and the trigger critical section never lands
//! in the middle of an ADC window.
//!
//! # Ranging
//! - 5 triggers per batch, 60 ms settle before each, 100 ms echo timeout
//! - Batch rejected on any failed trigger or on more than 5 cm spread
//! - Invalid batches are still reported so the collector sees the sensor state
//!
//! # Power
//! - 20 crossings (10 mains cycles) per window, 2 s bound per phase
//! - The ADC lock is held for the whole window
//! - Offset filters persist across cycles and converge after a few windows

use defmt::{error, info, warn};
use embassy_rp::adc::Channel;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_time::{Delay, Duration, Timer};
use sump_core::{EdgeEcho, PowerConfig, PowerMonitorState, Ranger, RangingConfig};

use crate::system::event::{self, Events};
use crate::system::io::{AdcPair, SystemClock};
use crate::system::resources::{get_adc, PowerSensorResources, RangingSensorResources};

/// Time from the start of one cycle to the start of the next
const MEASUREMENT_INTERVAL: Duration = Duration::from_secs(1);

/// Lets the sensor supply and the CT burden settle after power-up
const STARTUP_DELAY: Duration = Duration::from_millis(500);

#[embassy_executor::task]
pub async fn measure_cycle(ranging: RangingSensorResources, power: PowerSensorResources) {
    info!("Measurement cycle started");

    let config = RangingConfig::default();
    let trigger = Output::new(ranging.trigger_pin, Level::Low);
    let echo = Input::new(ranging.echo_pin, Pull::Down);
    let echo = EdgeEcho::new(echo, Delay, SystemClock, config.echo_idle);
    let mut ranger = match Ranger::new(trigger, Delay, echo, config) {
        Ok(ranger) => ranger,
        Err(e) => {
            error!("Invalid ranging configuration: {}", e);
            return;
        }
    };

    let power_config = PowerConfig::default();
    if let Err(e) = power_config.validate() {
        error!("Invalid power configuration: {}", e);
        return;
    }
    let mut monitor = match PowerMonitorState::new(power_config.calibration, power_config.adc) {
        Ok(monitor) => monitor,
        Err(e) => {
            error!("Invalid ADC description: {}", e);
            return;
        }
    };
    let mut voltage = Channel::new_pin(power.voltage_pin, Pull::None);
    let mut current = Channel::new_pin(power.current_pin, Pull::None);

    Timer::after(STARTUP_DELAY).await;

    loop {
        let range = ranger.measure().await;
        if !range.valid {
            warn!("Ranging batch rejected ({} so far)", ranger.failed_batches());
        }
        event::send(Events::RangeMeasured(range)).await;

        // Hold the ADC for the whole window: every voltage read must be paired with
        // the current read right after it, and the window timing assumes no other
        // conversions in between
        let measurement = {
            let mut adc_guard = get_adc().lock().await;
            adc_guard.as_mut().map(|adc| {
                // Both channels go through the one converter, read back to back
                let mut sampler = AdcPair {
                    adc,
                    voltage: &mut voltage,
                    current: &mut current,
                };
                // Blocking reads, the executor is stalled for up to twice the timeout
                monitor.measure(&mut sampler, &SystemClock, power_config.mode)
            })
            // Guard dropped here, the ADC is free again before the event is sent
        };
        match measurement {
            Some(measurement) => event::send(measurement.into()).await,
            None => warn!("ADC not initialized, power reading skipped"),
        }

        Timer::after(MEASUREMENT_INTERVAL).await;
    }
}
