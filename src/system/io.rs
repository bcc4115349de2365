//! Hardware adapters for the acquisition core
//!
//! Binds the core traits to the RP2350: the embassy time driver as clock, the ADC as
//! paired sampler, and the RTT log as report transport.

use core::convert::Infallible;

use defmt::info;
use embassy_rp::adc::{Adc, Async, Channel, Error as AdcError};
use embassy_time::Instant;
use sump_core::{AcSampler, Clock, Link, Publisher, SamplePair, TimeSource};

/// Clock backed by the embassy time driver
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Voltage and current channels on the shared ADC
///
/// Reads are blocking conversions, back to back, so a pair is about 4 us apart.
pub struct AdcPair<'a> {
    pub adc: &'a mut Adc<'static, Async>,
    pub voltage: &'a mut Channel<'static>,
    pub current: &'a mut Channel<'static>,
}

impl AcSampler for AdcPair<'_> {
    type Error = AdcError;

    fn sample(&mut self) -> Result<SamplePair, AdcError> {
        // Voltage first; phasecal is tuned for the current conversion trailing it
        let voltage = self.adc.blocking_read(self.voltage)?;
        let current = self.adc.blocking_read(self.current)?;
        Ok(SamplePair { voltage, current })
    }

    fn sample_voltage(&mut self) -> Result<u16, AdcError> {
        self.adc.blocking_read(self.voltage)
    }

    fn sample_current(&mut self) -> Result<u16, AdcError> {
        self.adc.blocking_read(self.current)
    }
}

/// Uptime presented as Unix time, timestamps start at the epoch on every boot
#[derive(Clone, Copy, Default)]
pub struct UptimeClock;

impl TimeSource for UptimeClock {
    fn unix_time(&self) -> Option<u64> {
        Some(Instant::now().as_secs())
    }
}

/// The debug probe is the only link and it is always there
#[derive(Clone, Copy, Default)]
pub struct AlwaysUp;

impl Link for AlwaysUp {
    fn is_up(&self) -> bool {
        true
    }
}

/// Publishes reports into the defmt log
#[derive(Default)]
pub struct RttPublisher;

impl Publisher for RttPublisher {
    type Error = Infallible;

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), Infallible> {
        info!("{=str} {=str}", topic, payload);
        Ok(())
    }
}
