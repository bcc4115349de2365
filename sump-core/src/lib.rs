//! Signal acquisition and estimation for the sump monitoring node
//!
//! Turns raw, time-sensitive hardware samples into validated physical measurements:
//! - Ultrasonic ranging: one echo pulse width per trigger, several triggers per batch,
//!   batch rejected on any failed sample or on excessive spread
//! - AC power: zero-crossing aligned windows of paired voltage/current ADC samples,
//!   DC-offset tracking filters and phase compensation, RMS and power at window close
//!
//! Hardware is reached through `embedded-hal` traits plus the small [`Clock`] and
//! [`AcSampler`] seams, so the same code runs on the RP2350 firmware and on the host.
//!
//! ```no_run
//! # use sump_core::{PowerMonitorState, Calibration, AdcSpec, AcSampler, SamplePair, Clock};
//! # use embassy_time::{Duration, Instant};
//! # struct Adc; impl AcSampler for Adc { type Error = (); fn sample(&mut self) -> Result<SamplePair, ()> { Ok(SamplePair { voltage: 2048, current: 2048 }) } }
//! # struct Uptime; impl Clock for Uptime { fn now(&self) -> Instant { Instant::from_ticks(0) } }
//! let mut state = PowerMonitorState::new(Calibration::default(), AdcSpec::default())?;
//! let power = state.estimate_window(&mut Adc, &Uptime, 20, Duration::from_millis(2000));
//! if power.is_indeterminate() {
//!     // no current flowing, power factor is NaN
//! }
//! # Ok::<(), sump_core::ConfigError>(())
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible in the modules below
#[macro_use]
mod fmt;

pub mod capture;
pub mod clock;
pub mod config;
pub mod error;
pub mod measurement;
pub mod power;
pub mod ranging;
pub mod report;
pub mod sampler;

pub use capture::{distance_cm, EchoCapture, EchoFrame, EchoInterval, EdgeEcho, Level, PulseTimer, RawPulse};
pub use clock::Clock;
pub use config::{AdcSpec, Calibration, PowerConfig, PowerMode, RangingConfig, TriggerTiming};
pub use error::{CaptureError, ConfigError, FaultKind, ReportError};
pub use measurement::Measurement;
pub use power::{CurrentMeasurement, PowerMeasurement, PowerMonitorState};
pub use ranging::{BatchRejection, RangeBatch, RangeMeasurement, RangeSample, Ranger, SampleFault};
pub use report::{iso8601_utc, Link, NodeId, Publisher, Report, Reporter, TimeSource};
pub use sampler::{AcSampler, SamplePair};

/// Speed of sound used for ranging, in centimetres per microsecond
pub const SPEED_OF_SOUND_CM_PER_US: f64 = 0.0342;
