//! Batch ranging
//!
//! A reading is `num_samples` triggers folded into running sum, min and max. The batch
//! is reported invalid if any sample failed, or if the accepted samples disagree by
//! more than `max_spread_cm`; otherwise the distance is their mean. Individual
//! samples are never stored.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs as AsyncDelayNs;

use crate::capture::{EchoCapture, PulseTimer, RawPulse};
use crate::config::RangingConfig;
use crate::error::{CaptureError, ConfigError, FaultKind};

/// Why a single sample was not accepted
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleFault {
    /// Trigger/echo capture failed
    Capture(CaptureError),
    /// Distance outside the valid window of the sensor
    OutOfRange {
        /// Distance before offset correction (cm)
        distance_cm: f64,
    },
    /// Distance became zero or negative after removing the target offset
    NonPositive {
        /// Distance after offset correction (cm)
        distance_cm: f64,
    },
}

impl SampleFault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Capture(err) => err.kind(),
            Self::OutOfRange { .. } | Self::NonPositive { .. } => FaultKind::OutOfRange,
        }
    }
}

/// Outcome of one trigger
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangeSample {
    /// Echo high time, if an echo was captured
    pub raw_us: Option<u32>,
    /// Offset-corrected distance (cm), 0.0 when nothing was captured
    pub distance_cm: f64,
    /// Set when the sample must not contribute to the mean
    pub fault: Option<SampleFault>,
}

impl RangeSample {
    /// Validates a captured pulse against the configured window and offset
    pub fn from_pulse(pulse: RawPulse, config: &RangingConfig) -> Self {
        let raw = pulse.distance_cm();
        let mut sample = Self {
            raw_us: Some(pulse.duration_us),
            distance_cm: raw,
            fault: None,
        };
        if raw < config.min_valid_cm || raw > config.max_valid_cm {
            sample.fault = Some(SampleFault::OutOfRange { distance_cm: raw });
            return sample;
        }
        let corrected = raw - config.target_offset_cm;
        sample.distance_cm = corrected;
        if corrected <= 0.0 {
            sample.fault = Some(SampleFault::NonPositive { distance_cm: corrected });
        }
        sample
    }

    pub fn failed(err: CaptureError) -> Self {
        Self {
            raw_us: None,
            distance_cm: 0.0,
            fault: Some(SampleFault::Capture(err)),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.fault.is_none()
    }
}

/// Why a batch was reported invalid
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatchRejection {
    /// At least one sample failed
    FailedSamples {
        /// Number of failed samples
        failed: u32,
        /// Kind of the first failure
        first: FaultKind,
    },
    /// Accepted samples disagree too much
    Inconsistent {
        /// max - min of the accepted samples (cm)
        spread_cm: f64,
    },
}

impl BatchRejection {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::FailedSamples { first, .. } => *first,
            Self::Inconsistent { .. } => FaultKind::BatchInconsistent,
        }
    }
}

/// Result of one batch
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangeMeasurement {
    /// Mean distance (cm), 0.0 when invalid
    pub distance_cm: f64,
    pub valid: bool,
    /// Samples that failed capture or validation
    pub failed_samples: u32,
    /// Set exactly when `valid` is false
    pub rejection: Option<BatchRejection>,
}

/// Running statistics of a batch in progress
#[derive(Debug, Clone, Copy)]
pub struct RangeBatch {
    expected: u32,
    accepted: u32,
    failed: u32,
    sum: f64,
    min: f64,
    max: f64,
    first_fault: Option<FaultKind>,
}

impl RangeBatch {
    pub fn new(expected: u32) -> Self {
        Self {
            expected,
            accepted: 0,
            failed: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            first_fault: None,
        }
    }

    pub fn push(&mut self, sample: &RangeSample) {
        match sample.fault {
            Some(fault) => {
                self.failed += 1;
                self.first_fault.get_or_insert(fault.kind());
            }
            None => {
                self.accepted += 1;
                self.sum += sample.distance_cm;
                self.min = self.min.min(sample.distance_cm);
                self.max = self.max.max(sample.distance_cm);
            }
        }
    }

    /// Applies the decision rule. Samples that were expected but never pushed
    /// count as capture timeouts.
    pub fn finish(self, max_spread_cm: f64) -> RangeMeasurement {
        let missing = self.expected.saturating_sub(self.accepted + self.failed);
        let failed = self.failed + missing;
        let rejection = if failed > 0 {
            Some(BatchRejection::FailedSamples {
                failed,
                first: self.first_fault.unwrap_or(FaultKind::CaptureTimeout),
            })
        } else if self.accepted == 0 {
            // Empty batch of zero expected samples
            Some(BatchRejection::FailedSamples {
                failed: 0,
                first: FaultKind::CaptureTimeout,
            })
        } else if self.max - self.min > max_spread_cm {
            Some(BatchRejection::Inconsistent {
                spread_cm: self.max - self.min,
            })
        } else {
            None
        };

        match rejection {
            Some(rejection) => RangeMeasurement {
                distance_cm: 0.0,
                valid: false,
                failed_samples: failed,
                rejection: Some(rejection),
            },
            None => RangeMeasurement {
                distance_cm: self.sum / self.accepted as f64,
                valid: true,
                failed_samples: 0,
                rejection: None,
            },
        }
    }
}

/// A validated ranging session owning the sensor lines
pub struct Ranger<T, D, E> {
    timer: PulseTimer<T, D, E>,
    config: RangingConfig,
    failed_batches: u32,
}

impl<T, D, E> Ranger<T, D, E>
where
    T: OutputPin,
    D: DelayNs + AsyncDelayNs,
    E: EchoCapture,
{
    pub fn new(trigger: T, delay: D, echo: E, config: RangingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            timer: PulseTimer::new(trigger, delay, echo, &config),
            config,
            failed_batches: 0,
        })
    }

    /// Runs one batch. A capture error only fails its own sample.
    pub async fn measure(&mut self) -> RangeMeasurement {
        let mut batch = RangeBatch::new(self.config.num_samples);
        for _ in 0..self.config.num_samples {
            let sample = match self.timer.capture().await {
                Ok(pulse) => RangeSample::from_pulse(pulse, &self.config),
                Err(err) => RangeSample::failed(err),
            };
            if let Some(fault) = sample.fault {
                debug!("range sample rejected: {:?}", fault.kind());
            }
            batch.push(&sample);
        }

        let result = batch.finish(self.config.max_spread_cm);
        if let Some(rejection) = result.rejection {
            self.failed_batches = self.failed_batches.wrapping_add(1);
            warn!(
                "range batch rejected: {:?}, {} failed sample(s)",
                rejection.kind(),
                result.failed_samples
            );
        }
        result
    }

    /// Batches rejected since the session started
    pub fn failed_batches(&self) -> u32 {
        self.failed_batches
    }

    pub fn config(&self) -> &RangingConfig {
        &self.config
    }

    pub fn release(self) -> (T, D, E) {
        self.timer.release()
    }
}
