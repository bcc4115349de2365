//! Error types and the fault taxonomy
//!
//! Nothing here is fatal:
//! - a capture error fails one sample
//! - a failed sample or a wide batch makes the range measurement invalid
//! - zero apparent power makes the power factor indeterminate
//!
//! Each maps onto exactly one [`FaultKind`], which is what gets logged when a reading
//! is thrown away.

use thiserror_no_std::Error;

/// Why a reading was rejected or degraded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultKind {
    /// No echo arrived before the capture timeout
    CaptureTimeout,
    /// The echo did not consist of exactly one high interval
    CaptureMalformed,
    /// The derived distance fell outside the physically valid range
    OutOfRange,
    /// The spread between samples of a batch exceeded the allowed maximum
    BatchInconsistent,
    /// A ratio was taken over a zero denominator (power factor without current)
    Indeterminate,
}

/// Failure of a single trigger/echo capture
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureError {
    /// No edge seen on the echo line within the timeout
    #[error("no echo within {timeout_us} us")]
    Timeout {
        /// Timeout that elapsed
        timeout_us: u64,
    },
    /// More or fewer than one interval was recorded
    #[error("expected one echo interval, captured {intervals}")]
    IntervalCount {
        /// Number of intervals actually recorded
        intervals: usize,
    },
    /// The first captured interval was not a high level
    #[error("echo interval does not start with a rising edge")]
    LeadingLevel,
    /// The trigger or echo line could not be driven or read
    #[error("trigger or echo line fault")]
    Line,
}

impl CaptureError {
    /// Taxonomy kind for logging and attribution
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Timeout { .. } => FaultKind::CaptureTimeout,
            // A line we cannot drive or read produces no well-formed echo either
            Self::IntervalCount { .. } | Self::LeadingLevel | Self::Line => FaultKind::CaptureMalformed,
        }
    }
}

/// Rejected configuration values
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A batch needs at least one sample
    #[error("number of samples must be greater than 0")]
    NoSamples,
    /// Valid distance window is empty or not finite
    #[error("invalid distance window [{min_cm}, {max_cm}]")]
    DistanceWindow {
        /// Lower bound in cm
        min_cm: f64,
        /// Upper bound in cm
        max_cm: f64,
    },
    /// Spread threshold or offset is negative or not finite
    #[error("invalid {field}: {value}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Offending value
        value: f64,
    },
    /// ADC bit depth outside 1..=16
    #[error("unsupported ADC resolution of {bits} bits")]
    AdcBits {
        /// Configured bit depth
        bits: u8,
    },
    /// A power window needs a crossing target or a sample count of at least one
    #[error("power window must cover at least one crossing or sample")]
    EmptyWindow,
}

/// Failure to hand a measurement to the transport
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportError {
    /// Connectivity is not established
    #[error("link is down")]
    LinkDown,
    /// The time source has no valid time yet
    #[error("no time available")]
    NoTime,
    /// The encoded message does not fit the buffer
    #[error("report does not fit into {capacity} bytes")]
    Overflow {
        /// Buffer capacity
        capacity: usize,
    },
    /// The transport refused the message
    #[error("publish failed")]
    Publish,
}
