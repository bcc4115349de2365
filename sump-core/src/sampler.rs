//! Paired analog reads of the voltage and current channels

/// Raw converter readings, both in `0..ADC_COUNTS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SamplePair {
    pub voltage: u16,
    pub current: u16,
}

/// Analog front end of the power meter
///
/// `sample` reads both channels back to back so the pair is as close to
/// simultaneous as the converter allows. Single-channel reads default to a paired
/// read; implementations with independent channels may override them.
pub trait AcSampler {
    type Error;

    fn sample(&mut self) -> Result<SamplePair, Self::Error>;

    fn sample_voltage(&mut self) -> Result<u16, Self::Error> {
        self.sample().map(|pair| pair.voltage)
    }

    fn sample_current(&mut self) -> Result<u16, Self::Error> {
        self.sample().map(|pair| pair.current)
    }
}

impl<S: AcSampler + ?Sized> AcSampler for &mut S {
    type Error = S::Error;

    fn sample(&mut self) -> Result<SamplePair, Self::Error> {
        (**self).sample()
    }

    fn sample_voltage(&mut self) -> Result<u16, Self::Error> {
        (**self).sample_voltage()
    }

    fn sample_current(&mut self) -> Result<u16, Self::Error> {
        (**self).sample_current()
    }
}
