//! Hardware Resource Management
//!
//! Allocates pins and peripherals to the tasks of the monitoring node.
//!
//! # Resource Groups
//! - Ranging Sensor: waterproof ultrasonic sensor trigger and echo pins
//! - Power Sensor: voltage divider and current transformer ADC pins
//!
//! # Shared Resources
//! The ADC is shared and protected by a mutex. The power window keeps the lock for
//! its whole duration, so every paired read comes from the same converter without
//! another task interleaving conversions.

use assign_resources::assign_resources;
use embassy_rp::adc::InterruptHandler as AdcInterruptHandler;
use embassy_rp::adc::{Adc, Async as AdcAsync};
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::{self, ADC};
use embassy_rp::Peri;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;

/// Global ADC instance protected by a mutex.
static ADC: Mutex<CriticalSectionRawMutex, Option<Adc<'static, AdcAsync>>> = Mutex::new(None);

/// Initializes the ADC peripheral.
///
/// This should only be called once during system initialization in main.rs,
/// before any tasks are spawned.
pub fn init_adc(adc: Peri<'static, ADC>) {
    let adc = Adc::new(adc, Irqs, embassy_rp::adc::Config::default());
    critical_section::with(|_| {
        if let Ok(mut slot) = ADC.try_lock() {
            *slot = Some(adc);
        }
    });
}

/// Returns a reference to the protected ADC instance.
pub fn get_adc() -> &'static Mutex<CriticalSectionRawMutex, Option<Adc<'static, AdcAsync>>> {
    &ADC
}

assign_resources! {
    /// Ultrasonic ranging sensor pins
    ranging_sensor: RangingSensorResources {
        trigger_pin: PIN_15,
        echo_pin: PIN_14,
    },
    /// Biased AC inputs: mains voltage divider and current transformer burden
    power_sensor: PowerSensorResources {
        voltage_pin: PIN_26,
        current_pin: PIN_27,
    },
}

bind_interrupts!(pub struct Irqs {
    ADC_IRQ_FIFO => AdcInterruptHandler;
});
