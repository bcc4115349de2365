//! Acquisition configuration
//!
//! Defaults are the values the node shipped with:
//! - SR04T-class waterproof sensor: stable between 25 cm and 350 cm, 60 ms between
//!   triggers so the previous echo has died down, no-object echo is ~38 ms high
//! - 12-bit ADC referenced to 3.3 V
//! - Current transformer calibrated to 30.0 against an ammeter and a heater load
//!
//! Configurations are plain values, validated once when a session is created and
//! never modified while it runs.

use embassy_time::Duration;

use crate::error::ConfigError;

/// Trigger pulse shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TriggerTiming {
    /// Time the trigger is held low before the pulse (us)
    pub low_us: u32,
    /// Width of the trigger pulse (us)
    pub high_us: u32,
}

impl Default for TriggerTiming {
    fn default() -> Self {
        Self { low_us: 60, high_us: 25 }
    }
}

/// Ranging session configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangingConfig {
    /// Triggers per reported distance (>= 1)
    pub num_samples: u32,
    /// Largest allowed max-min spread of one batch (cm)
    pub max_spread_cm: f64,
    /// Shortest distance the sensor resolves reliably (cm)
    pub min_valid_cm: f64,
    /// Longest distance the sensor resolves reliably (cm)
    pub max_valid_cm: f64,
    /// Fixed distance between sensor face and the measured artifact, subtracted from every sample (cm)
    pub target_offset_cm: f64,
    /// Quiet time before each trigger
    pub settle: Duration,
    /// Longest wait for the echo to start and finish
    pub echo_timeout: Duration,
    /// Echo line quiet time after which the capture is considered complete
    pub echo_idle: Duration,
    /// Trigger pulse shape
    pub trigger: TriggerTiming,
}

impl Default for RangingConfig {
    fn default() -> Self {
        Self {
            num_samples: 5,
            max_spread_cm: 5.0,
            min_valid_cm: 25.0,
            max_valid_cm: 350.0,
            target_offset_cm: 0.0,
            settle: Duration::from_millis(60),
            echo_timeout: Duration::from_millis(100),
            echo_idle: Duration::from_millis(10),
            trigger: TriggerTiming::default(),
        }
    }
}

impl RangingConfig {
    /// Checks the configuration before a session is started
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_samples == 0 {
            return Err(ConfigError::NoSamples);
        }
        if !self.min_valid_cm.is_finite()
            || !self.max_valid_cm.is_finite()
            || self.min_valid_cm < 0.0
            || self.min_valid_cm >= self.max_valid_cm
        {
            return Err(ConfigError::DistanceWindow {
                min_cm: self.min_valid_cm,
                max_cm: self.max_valid_cm,
            });
        }
        if !self.max_spread_cm.is_finite() || self.max_spread_cm < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "max_spread_cm",
                value: self.max_spread_cm,
            });
        }
        if !self.target_offset_cm.is_finite() || self.target_offset_cm < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "target_offset_cm",
                value: self.target_offset_cm,
            });
        }
        Ok(())
    }
}

/// Analog front end description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdcSpec {
    /// Converter resolution in bits
    pub bits: u8,
    /// Full-scale input voltage in millivolts
    pub supply_mv: u32,
}

impl Default for AdcSpec {
    fn default() -> Self {
        Self {
            bits: 12,
            supply_mv: 3300,
        }
    }
}

impl AdcSpec {
    /// 12-bit converter without input attenuation: 0..1.1 V full scale, divider midpoint at 573 mV
    pub const fn attenuated_1v1() -> Self {
        Self {
            bits: 12,
            supply_mv: 1146,
        }
    }

    /// Number of converter steps (`ADC_COUNTS`), saturating for out-of-range resolutions
    pub const fn counts(&self) -> u32 {
        match 1u32.checked_shl(self.bits as u32) {
            Some(counts) => counts,
            None => u32::MAX,
        }
    }

    /// Theoretical zero level of a biased AC signal
    pub const fn midscale(&self) -> u32 {
        self.counts() >> 1
    }

    /// Volts per count before calibration
    pub fn volts_per_count(&self) -> f64 {
        (self.supply_mv as f64 / 1000.0) / self.counts() as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bits == 0 || self.bits > 16 {
            return Err(ConfigError::AdcBits { bits: self.bits });
        }
        Ok(())
    }
}

/// Calibration coefficients of the voltage and current channels
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    /// Voltage calibration (`VCAL`)
    pub vcal: f64,
    /// Current calibration (`ICAL`)
    pub ical: f64,
    /// Phase calibration (`PHASECAL`), 1.0 means no correction
    pub phasecal: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            vcal: 234.26,
            // 246.9 on paper, 30.0 measured on the installed CT and burden resistor
            ical: 30.0,
            phasecal: 1.7,
        }
    }
}

/// How each power reading is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMode {
    /// Voltage and current, window bounded by crossings or timeout
    Full {
        /// Half-wavelengths to sample
        crossings: u32,
        /// Bound for alignment and for accumulation, each
        timeout: Duration,
    },
    /// Current only, fixed number of samples
    CurrentOnly {
        /// Samples per reading
        samples: u32,
    },
}

/// Power measurement configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerConfig {
    /// Analog front end
    pub adc: AdcSpec,
    /// Channel calibration
    pub calibration: Calibration,
    /// Windowing mode
    pub mode: PowerMode,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            adc: AdcSpec::default(),
            calibration: Calibration::default(),
            mode: PowerMode::Full {
                crossings: 20,
                timeout: Duration::from_millis(2000),
            },
        }
    }
}

impl PowerConfig {
    /// Current-only metering as deployed without a voltage reference
    pub fn current_only() -> Self {
        Self {
            mode: PowerMode::CurrentOnly { samples: 1480 },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.adc.validate()?;
        match self.mode {
            PowerMode::Full { crossings: 0, .. } | PowerMode::CurrentOnly { samples: 0 } => Err(ConfigError::EmptyWindow),
            _ => Ok(()),
        }
    }
}
