//! AC power estimation from paired voltage/current samples
//!
//! Each window is aligned on a voltage sample near midscale, then accumulates squared
//! and multiplied samples until the requested number of crossings (half-wavelengths)
//! has been seen or the timeout runs out. Sampling a whole number of half-cycles keeps
//! the RMS values free of partial-cycle ripple.
//!
//! Both channels are biased to half the converter range. The bias is tracked with a
//! first-order filter, `offset += (sample - offset) / ADC_COUNTS`, which is never reset
//! and therefore keeps converging across windows. The voltage channel is phase
//! corrected by interpolating between the previous and current filtered sample,
//! weighted by `phasecal`, to compensate the delay between the two conversions and the
//! transformer phase errors.
//!
//! After the window:
//! ```text
//! V_RATIO = VCAL * (supply_mV / 1000) / ADC_COUNTS
//! Vrms    = V_RATIO * sqrt(sumV / N)
//! real    = V_RATIO * I_RATIO * sumP / N
//! pf      = real / (Vrms * Irms)          NaN when Vrms * Irms == 0
//! ```

use embassy_time::Duration;

use crate::clock::Clock;
use crate::config::{AdcSpec, Calibration, PowerMode};
use crate::error::{ConfigError, FaultKind};
use crate::measurement::Measurement;
use crate::sampler::AcSampler;

/// Result of one voltage/current window
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerMeasurement {
    /// RMS voltage (V)
    pub vrms: f64,
    /// RMS current (A)
    pub irms: f64,
    /// Mean instantaneous power (W)
    pub real_power: f64,
    /// `vrms * irms` (VA)
    pub apparent_power: f64,
    /// `real_power / apparent_power`, NaN when indeterminate
    pub power_factor: f64,
    /// Sample pairs accumulated (N)
    pub samples: u32,
    /// Crossings observed
    pub crossings: u32,
    /// Reads that failed and were skipped
    pub dropped: u32,
}

impl PowerMeasurement {
    /// Power factor could not be computed, because no current (or voltage) was
    /// present or because the window holds no samples
    pub fn is_indeterminate(&self) -> bool {
        self.power_factor.is_nan()
    }

    pub fn fault(&self) -> Option<FaultKind> {
        self.is_indeterminate().then_some(FaultKind::Indeterminate)
    }
}

/// Result of a current-only reading
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurrentMeasurement {
    /// RMS current (A), NaN when no sample could be read
    pub irms: f64,
    /// Samples accumulated
    pub samples: u32,
    /// Reads that failed and were skipped
    pub dropped: u32,
}

/// Persistent estimator state: offset filters, last filtered voltage, accumulators
#[derive(Debug, Clone)]
pub struct PowerMonitorState {
    calibration: Calibration,
    adc: AdcSpec,
    offset_v: f64,
    offset_i: f64,
    filtered_v: f64,
    sum_v: f64,
    sum_i: f64,
    sum_p: f64,
}

impl PowerMonitorState {
    /// Creates the state with both offset filters seeded at midscale
    pub fn new(calibration: Calibration, adc: AdcSpec) -> Result<Self, ConfigError> {
        adc.validate()?;
        let midscale = adc.midscale() as f64;
        Ok(Self {
            calibration,
            adc,
            offset_v: midscale,
            offset_i: midscale,
            filtered_v: 0.0,
            sum_v: 0.0,
            sum_i: 0.0,
            sum_p: 0.0,
        })
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn adc(&self) -> &AdcSpec {
        &self.adc
    }

    /// Current DC offset estimate of the voltage channel (counts)
    pub fn offset_v(&self) -> f64 {
        self.offset_v
    }

    /// Current DC offset estimate of the current channel (counts)
    pub fn offset_i(&self) -> f64 {
        self.offset_i
    }

    /// Takes one reading in the given mode
    pub fn measure<S, C>(&mut self, sampler: &mut S, clock: &C, mode: PowerMode) -> Measurement
    where
        S: AcSampler,
        C: Clock,
    {
        match mode {
            PowerMode::Full { crossings, timeout } => {
                Measurement::Power(self.estimate_window(sampler, clock, crossings, timeout))
            }
            PowerMode::CurrentOnly { samples } => Measurement::Current(self.estimate_irms(sampler, samples)),
        }
    }

    /// Measures one window bounded by `crossings` or `timeout`.
    ///
    /// The timeout applies to the alignment phase and to accumulation separately, so a
    /// call lasts at most about twice `timeout`.
    pub fn estimate_window<S, C>(
        &mut self,
        sampler: &mut S,
        clock: &C,
        crossings: u32,
        timeout: Duration,
    ) -> PowerMeasurement
    where
        S: AcSampler,
        C: Clock,
    {
        let counts = self.adc.counts() as f64;
        let mut dropped = 0u32;

        // Wait for the voltage to be near the zero of the sine so the window starts
        // on a crossing
        let band_low = counts * 0.45;
        let band_high = counts * 0.55;
        let mut start_v = self.adc.midscale() as f64;
        let start = clock.now();
        loop {
            match sampler.sample_voltage() {
                Ok(raw) => {
                    start_v = raw as f64;
                    if start_v > band_low && start_v < band_high {
                        break;
                    }
                }
                Err(_) => dropped += 1,
            }
            if clock.now().saturating_duration_since(start) > timeout {
                trace!("no alignment sample within timeout, anchoring on {}", start_v);
                break;
            }
        }

        let mut samples = 0u32;
        let mut crossed = 0u32;
        let mut last_above = false;
        let start = clock.now();
        while crossed < crossings && clock.now().saturating_duration_since(start) < timeout {
            let pair = match sampler.sample() {
                Ok(pair) => pair,
                Err(_) => {
                    dropped += 1;
                    continue;
                }
            };
            samples += 1;
            let last_filtered_v = self.filtered_v;

            let raw_v = pair.voltage as f64;
            let raw_i = pair.current as f64;
            self.offset_v += (raw_v - self.offset_v) / counts;
            self.filtered_v = raw_v - self.offset_v;
            self.offset_i += (raw_i - self.offset_i) / counts;
            let filtered_i = raw_i - self.offset_i;

            self.sum_v += self.filtered_v * self.filtered_v;
            self.sum_i += filtered_i * filtered_i;

            let shifted_v = last_filtered_v + self.calibration.phasecal * (self.filtered_v - last_filtered_v);
            self.sum_p += shifted_v * filtered_i;

            let above = raw_v > start_v;
            if samples == 1 {
                last_above = above;
            }
            if above != last_above {
                crossed += 1;
            }
            last_above = above;
        }

        let result = self.close_window(samples, crossed, dropped);
        if let Some(kind) = result.fault() {
            warn!("power window indeterminate: {:?}, {} sample(s)", kind, samples);
        }
        result
    }

    /// Current-only RMS over a fixed number of read attempts
    pub fn estimate_irms<S: AcSampler>(&mut self, sampler: &mut S, samples: u32) -> CurrentMeasurement {
        let counts = self.adc.counts() as f64;
        let mut taken = 0u32;
        let mut dropped = 0u32;
        for _ in 0..samples {
            let raw_i = match sampler.sample_current() {
                Ok(raw) => raw as f64,
                Err(_) => {
                    dropped += 1;
                    continue;
                }
            };
            taken += 1;
            self.offset_i += (raw_i - self.offset_i) / counts;
            let filtered_i = raw_i - self.offset_i;
            self.sum_i += filtered_i * filtered_i;
        }

        let irms = if taken == 0 {
            f64::NAN
        } else {
            self.ratio(self.calibration.ical) * libm::sqrt(self.sum_i / taken as f64)
        };
        self.sum_i = 0.0;
        CurrentMeasurement {
            irms,
            samples: taken,
            dropped,
        }
    }

    fn ratio(&self, cal: f64) -> f64 {
        cal * self.adc.volts_per_count()
    }

    fn close_window(&mut self, samples: u32, crossings: u32, dropped: u32) -> PowerMeasurement {
        let result = if samples == 0 {
            PowerMeasurement {
                vrms: f64::NAN,
                irms: f64::NAN,
                real_power: f64::NAN,
                apparent_power: f64::NAN,
                power_factor: f64::NAN,
                samples,
                crossings,
                dropped,
            }
        } else {
            let n = samples as f64;
            let v_ratio = self.ratio(self.calibration.vcal);
            let i_ratio = self.ratio(self.calibration.ical);
            let vrms = v_ratio * libm::sqrt(self.sum_v / n);
            let irms = i_ratio * libm::sqrt(self.sum_i / n);
            let real_power = v_ratio * i_ratio * self.sum_p / n;
            let apparent_power = vrms * irms;
            let power_factor = if apparent_power == 0.0 {
                f64::NAN
            } else {
                real_power / apparent_power
            };
            PowerMeasurement {
                vrms,
                irms,
                real_power,
                apparent_power,
                power_factor,
                samples,
                crossings,
                dropped,
            }
        };

        self.sum_v = 0.0;
        self.sum_i = 0.0;
        self.sum_p = 0.0;
        result
    }
}
