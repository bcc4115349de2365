//! Ultrasonic pulse timing
//!
//! One capture is: let the previous echo die down, emit the trigger pulse with
//! interrupts masked, then time the echo line until it stays quiet.
//!
//! # Echo frames
//! The echo line is recorded the way a pulse-capture peripheral (RMT, PIO) does it:
//! each interval starts at an edge, has a leading level and a leading duration, and
//! runs until the edge after that. A clean echo is exactly one interval with a high
//! leading level. Two echoes or a line that was already high when we started
//! listening are rejected before a distance is derived.
//!
//! ```text
//!  trigger  __|~~|__________________________________
//!  echo     _________|~~~~~~~~~~~~~~|_______________
//!                    ^ leading High  ^ trailing Low until idle
//! ```

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs as AsyncDelayNs;
use embedded_hal_async::digital::Wait;
use heapless::Vec;

use crate::clock::Clock;
use crate::config::{RangingConfig, TriggerTiming};
use crate::error::CaptureError;
use crate::SPEED_OF_SOUND_CM_PER_US;

/// Intervals kept per frame, enough to describe every malformed echo we reject
pub const MAX_INTERVALS: usize = 4;

/// Converts an echo round-trip time into a one-way distance
pub fn distance_cm(duration_us: u32) -> f64 {
    (duration_us as f64 / 2.0) * SPEED_OF_SOUND_CM_PER_US
}

/// Logic level of a captured interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl Level {
    fn toggled(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// One recorded interval of the echo line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EchoInterval {
    /// Level right after the starting edge
    pub level: Level,
    /// Time until the next edge (us)
    pub duration_us: u32,
}

/// Intervals recorded during one capture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EchoFrame {
    intervals: Vec<EchoInterval, MAX_INTERVALS>,
    recorded: usize,
}

impl EchoFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an interval; intervals beyond [`MAX_INTERVALS`] are counted but not kept
    pub fn push(&mut self, interval: EchoInterval) {
        self.recorded += 1;
        let _ = self.intervals.push(interval);
    }

    /// Number of intervals seen, including those not kept
    pub fn len(&self) -> usize {
        self.recorded
    }

    pub fn is_empty(&self) -> bool {
        self.recorded == 0
    }

    pub fn intervals(&self) -> &[EchoInterval] {
        &self.intervals
    }

    /// Accepts the frame only if it is a single high interval
    pub fn into_pulse(self) -> Result<RawPulse, CaptureError> {
        if self.recorded != 1 {
            return Err(CaptureError::IntervalCount {
                intervals: self.recorded,
            });
        }
        match self.intervals.first() {
            Some(EchoInterval {
                level: Level::High,
                duration_us,
            }) => Ok(RawPulse {
                duration_us: *duration_us,
            }),
            _ => Err(CaptureError::LeadingLevel),
        }
    }
}

/// High time of a single well-formed echo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawPulse {
    /// Round-trip time in microseconds
    pub duration_us: u32,
}

impl RawPulse {
    pub fn distance_cm(&self) -> f64 {
        distance_cm(self.duration_us)
    }
}

/// Source of echo frames
#[allow(async_fn_in_trait)]
pub trait EchoCapture {
    /// Records the echo line until it goes quiet or `timeout` runs out.
    ///
    /// Returns [`CaptureError::Timeout`] when no edge at all was seen.
    async fn receive(&mut self, timeout: Duration) -> Result<EchoFrame, CaptureError>;
}

/// Echo capture by timestamping edges of a GPIO input
///
/// Works with any pin offering async edge waits. Once a leading interval has ended,
/// the capture finishes after `idle` without further edges.
pub struct EdgeEcho<P, D, C> {
    pin: P,
    delay: D,
    clock: C,
    idle: Duration,
}

impl<P, D, C> EdgeEcho<P, D, C>
where
    P: InputPin + Wait,
    D: AsyncDelayNs,
    C: Clock,
{
    pub fn new(pin: P, delay: D, clock: C, idle: Duration) -> Self {
        Self { pin, delay, clock, idle }
    }

    pub fn release(self) -> (P, D, C) {
        (self.pin, self.delay, self.clock)
    }
}

impl<P, D, C> EchoCapture for EdgeEcho<P, D, C>
where
    P: InputPin + Wait,
    D: AsyncDelayNs,
    C: Clock,
{
    async fn receive(&mut self, timeout: Duration) -> Result<EchoFrame, CaptureError> {
        let deadline = self.clock.now() + timeout;
        let mut level = if self.pin.is_high().map_err(|_| CaptureError::Line)? {
            Level::High
        } else {
            Level::Low
        };
        let mut frame = EchoFrame::new();
        // Leading part of the interval being timed: its level and starting edge
        let mut open: Option<(Level, Instant)> = None;

        loop {
            let now = self.clock.now();
            if now >= deadline {
                break;
            }
            let remaining = deadline - now;
            let wait = if open.is_none() && !frame.is_empty() {
                remaining.min(self.idle)
            } else {
                remaining
            };
            let wait_us = u32::try_from(wait.as_micros()).unwrap_or(u32::MAX);

            match select(self.pin.wait_for_any_edge(), self.delay.delay_us(wait_us)).await {
                Either::First(edge) => {
                    edge.map_err(|_| CaptureError::Line)?;
                    let at = self.clock.now();
                    level = level.toggled();
                    match open.take() {
                        None => open = Some((level, at)),
                        Some((leading, since)) => frame.push(EchoInterval {
                            level: leading,
                            duration_us: micros_between(since, at),
                        }),
                    }
                }
                Either::Second(()) => break,
            }
        }

        if let Some((leading, since)) = open {
            frame.push(EchoInterval {
                level: leading,
                duration_us: micros_between(since, self.clock.now()),
            });
        }
        if frame.is_empty() {
            return Err(CaptureError::Timeout {
                timeout_us: timeout.as_micros(),
            });
        }
        trace!("echo frame with {} interval(s)", frame.len());
        Ok(frame)
    }
}

fn micros_between(from: Instant, to: Instant) -> u32 {
    u32::try_from(to.saturating_duration_since(from).as_micros()).unwrap_or(u32::MAX)
}

/// Trigger line, delay source and echo capture of one sensor
///
/// The delay provider is used both blocking (inside the trigger critical section)
/// and async (settle time before each trigger).
pub struct PulseTimer<T, D, E> {
    trigger: T,
    delay: D,
    echo: E,
    timing: TriggerTiming,
    settle: Duration,
    timeout: Duration,
}

impl<T, D, E> PulseTimer<T, D, E>
where
    T: OutputPin,
    D: DelayNs + AsyncDelayNs,
    E: EchoCapture,
{
    pub fn new(trigger: T, delay: D, echo: E, config: &RangingConfig) -> Self {
        Self {
            trigger,
            delay,
            echo,
            timing: config.trigger,
            settle: config.settle,
            timeout: config.echo_timeout,
        }
    }

    /// Triggers the sensor once and returns the echo high time
    pub async fn capture(&mut self) -> Result<RawPulse, CaptureError> {
        // A late echo from the previous trigger is indistinguishable from a real one
        self.trigger.set_low().map_err(|_| CaptureError::Line)?;
        let settle_us = u32::try_from(self.settle.as_micros()).unwrap_or(u32::MAX);
        AsyncDelayNs::delay_us(&mut self.delay, settle_us).await;

        self.emit_trigger()?;
        let frame = self.echo.receive(self.timeout).await?;
        frame.into_pulse()
    }

    /// Low, high, low with interrupts masked; the pulse width tolerance is tighter than
    /// a scheduler tick.
    fn emit_trigger(&mut self) -> Result<(), CaptureError> {
        let timing = self.timing;
        let trigger = &mut self.trigger;
        let delay = &mut self.delay;
        critical_section::with(|_| {
            trigger.set_low()?;
            DelayNs::delay_us(delay, timing.low_us);
            trigger.set_high()?;
            DelayNs::delay_us(delay, timing.high_us);
            trigger.set_low()
        })
        .map_err(|_| CaptureError::Line)
    }

    pub fn release(self) -> (T, D, E) {
        (self.trigger, self.delay, self.echo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn high(duration_us: u32) -> EchoInterval {
        EchoInterval {
            level: Level::High,
            duration_us,
        }
    }

    #[test]
    fn distance_halves_round_trip() {
        assert_eq!(distance_cm(0), 0.0);
        assert_eq!(distance_cm(2), 0.0342);
        assert_eq!(distance_cm(5848), 2924.0 * 0.0342);
    }

    #[test]
    fn single_high_interval_is_a_pulse() {
        let mut frame = EchoFrame::new();
        frame.push(high(5848));
        assert_eq!(frame.into_pulse(), Ok(RawPulse { duration_us: 5848 }));
    }

    #[test]
    fn empty_frame_is_malformed() {
        assert_eq!(EchoFrame::new().into_pulse(), Err(CaptureError::IntervalCount { intervals: 0 }));
    }

    #[test]
    fn overflowing_frame_counts_every_interval() {
        let mut frame = EchoFrame::new();
        for _ in 0..MAX_INTERVALS + 2 {
            frame.push(high(100));
        }
        assert_eq!(frame.intervals().len(), MAX_INTERVALS);
        assert_eq!(
            frame.into_pulse(),
            Err(CaptureError::IntervalCount {
                intervals: MAX_INTERVALS + 2
            })
        );
    }

    #[test]
    fn low_leading_level_is_rejected() {
        let mut frame = EchoFrame::new();
        frame.push(EchoInterval {
            level: Level::Low,
            duration_us: 300,
        });
        assert_eq!(frame.into_pulse(), Err(CaptureError::LeadingLevel));
    }
}
