//! System Events
//!
//! Defines events and channels for inter-task communication.

use defmt::Format;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use sump_core::{CurrentMeasurement, Measurement, PowerMeasurement, RangeMeasurement};

/// Multi-producer, single-consumer event channel with capacity of 10
pub static EVENT_CHANNEL: Channel<CriticalSectionRawMutex, Events, 10> = Channel::new();

/// Sends an event to the system channel
pub async fn send(event: Events) {
    EVENT_CHANNEL.sender().send(event).await;
}

/// Receives the next event from the system channel
pub async fn wait() -> Events {
    EVENT_CHANNEL.receiver().receive().await
}

/// System-wide events
#[derive(Debug, Clone, Copy, Format)]
pub enum Events {
    /// A ranging batch finished, valid or not
    RangeMeasured(RangeMeasurement),
    /// A voltage/current window closed
    PowerMeasured(PowerMeasurement),
    /// A current-only reading finished
    CurrentMeasured(CurrentMeasurement),
}

impl From<Measurement> for Events {
    fn from(measurement: Measurement) -> Self {
        match measurement {
            Measurement::Range(range) => Events::RangeMeasured(range),
            Measurement::Power(power) => Events::PowerMeasured(power),
            Measurement::Current(current) => Events::CurrentMeasured(current),
        }
    }
}

impl From<Events> for Measurement {
    fn from(event: Events) -> Self {
        match event {
            Events::RangeMeasured(range) => Measurement::Range(range),
            Events::PowerMeasured(power) => Measurement::Power(power),
            Events::CurrentMeasured(current) => Measurement::Current(current),
        }
    }
}
