//! Measurements as handed from acquisition to reporting

use core::fmt::{self, Write};

use crate::power::{CurrentMeasurement, PowerMeasurement};
use crate::ranging::RangeMeasurement;

/// One finished reading of either sensor
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Measurement {
    Range(RangeMeasurement),
    Power(PowerMeasurement),
    Current(CurrentMeasurement),
}

impl Measurement {
    /// Writes the report fields as `,"name":"value"` pairs.
    ///
    /// Values are quoted strings and floats use six decimals, which is what the
    /// collecting backend parses.
    pub fn write_fields<W: Write>(&self, out: &mut W) -> fmt::Result {
        match self {
            Self::Range(range) => {
                write!(out, r#","distance_cm":"{:.6}""#, range.distance_cm)?;
                write!(out, r#","valid":"{}""#, range.valid)?;
                write!(out, r#","failed":"{}""#, range.failed_samples)
            }
            Self::Power(power) => {
                write!(out, r#","Vrms":"{:.6}""#, power.vrms)?;
                write!(out, r#","Irms":"{:.6}""#, power.irms)?;
                write!(out, r#","realPower":"{:.6}""#, power.real_power)?;
                write!(out, r#","apparentPower":"{:.6}""#, power.apparent_power)?;
                write!(out, r#","powerFactor":"{:.6}""#, power.power_factor)
            }
            Self::Current(current) => write!(out, r#","Irms":"{:.6}""#, current.irms),
        }
    }
}

impl From<RangeMeasurement> for Measurement {
    fn from(value: RangeMeasurement) -> Self {
        Self::Range(value)
    }
}

impl From<PowerMeasurement> for Measurement {
    fn from(value: PowerMeasurement) -> Self {
        Self::Power(value)
    }
}

impl From<CurrentMeasurement> for Measurement {
    fn from(value: CurrentMeasurement) -> Self {
        Self::Current(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_fields() {
        let mut out = String::new();
        Measurement::Current(CurrentMeasurement {
            irms: 1.25,
            samples: 1480,
            dropped: 0,
        })
        .write_fields(&mut out)
        .unwrap();
        assert_eq!(out, r#","Irms":"1.250000""#);
    }

    #[test]
    fn invalid_range_fields() {
        let mut out = String::new();
        Measurement::Range(RangeMeasurement {
            distance_cm: 0.0,
            valid: false,
            failed_samples: 2,
            rejection: None,
        })
        .write_fields(&mut out)
        .unwrap();
        assert_eq!(out, r#","distance_cm":"0.000000","valid":"false","failed":"2""#);
    }
}
