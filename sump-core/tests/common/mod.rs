//! Shared fakes for the integration tests
//!
//! - [`Bench`]: a simulated ultrasonic sensor. The trigger pin, echo pin, delay and
//!   clock all share one microsecond timeline; every trigger pulse releases the next
//!   scripted echo onto the echo line.
//! - [`ScriptedEcho`]: hands out prepared echo frames without any timing.
//! - [`SineSampler`] / [`ConstantSampler`] / [`Flaky`]: synthetic ADC input for the
//!   power estimator, advancing a [`FakeClock`] per read.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embassy_futures::yield_now;
use embassy_time::{Duration, Instant};
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal_async::digital::Wait;
use sump_core::{
    AcSampler, CaptureError, Clock, EchoCapture, EchoFrame, EchoInterval, Level, SamplePair,
};

/// Microsecond clock advanced by hand or by fakes
#[derive(Clone, Default)]
pub struct FakeClock {
    now_us: Rc<Cell<u64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_us(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }

    pub fn now_us(&self) -> u64 {
        self.now_us.get()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.now_us.get())
    }
}

/// What the sensor does after a trigger pulse
#[derive(Debug, Clone, Copy)]
pub enum Echo {
    /// One clean echo: rising edge after `delay_us`, high for `width_us`
    Pulse { delay_us: u64, width_us: u64 },
    /// Nothing comes back
    Silent,
    /// Two echoes `gap_us` apart, each `width_us` wide
    Double { width_us: u64, gap_us: u64 },
    /// Line is still high from an earlier echo and falls after `remaining_us`
    StaleHigh { remaining_us: u64 },
}

#[derive(Default)]
struct BenchState {
    now_us: u64,
    echo_high: bool,
    edges: VecDeque<u64>,
    script: VecDeque<Echo>,
    /// Deadline of the delay currently racing the echo pin
    deadline: Option<u64>,
    /// Set by the echo pin on every poll, consumed by the racing delay
    listening: bool,
    trigger_high: bool,
    trigger_high_since: u64,
    trigger_low_since: u64,
    /// (low time before the pulse, pulse width, rising edge time)
    pulses: Vec<(u64, u64, u64)>,
}

impl BenchState {
    fn release_echo(&mut self) {
        let at = self.now_us;
        self.edges.clear();
        self.echo_high = false;
        match self.script.pop_front().unwrap_or(Echo::Silent) {
            Echo::Pulse { delay_us, width_us } => {
                self.edges.extend([at + delay_us, at + delay_us + width_us]);
            }
            Echo::Silent => {}
            Echo::Double { width_us, gap_us } => {
                let first = at + 500;
                let second = first + width_us + gap_us;
                self.edges.extend([first, first + width_us, second, second + width_us]);
            }
            Echo::StaleHigh { remaining_us } => {
                self.echo_high = true;
                self.edges.push_back(at + remaining_us);
            }
        }
    }

    fn take_edge(&mut self) {
        if let Some(at) = self.edges.pop_front() {
            self.now_us = self.now_us.max(at);
            self.echo_high = !self.echo_high;
        }
    }
}

/// Simulated sensor on a shared timeline
#[derive(Clone, Default)]
pub struct Bench {
    state: Rc<RefCell<BenchState>>,
}

impl Bench {
    pub fn new(script: impl IntoIterator<Item = Echo>) -> Self {
        let bench = Self::default();
        bench.state.borrow_mut().script.extend(script);
        bench
    }

    pub fn trigger(&self) -> BenchTrigger {
        BenchTrigger(self.clone())
    }

    pub fn echo(&self) -> BenchEcho {
        BenchEcho(self.clone())
    }

    pub fn delay(&self) -> BenchDelay {
        BenchDelay(self.clone())
    }

    pub fn clock(&self) -> BenchClock {
        BenchClock(self.clone())
    }

    pub fn now_us(&self) -> u64 {
        self.state.borrow().now_us
    }

    /// Every trigger pulse emitted so far as (low before, width, rising edge time)
    pub fn pulses(&self) -> Vec<(u64, u64, u64)> {
        self.state.borrow().pulses.clone()
    }
}

pub struct BenchTrigger(Bench);

impl ErrorType for BenchTrigger {
    type Error = Infallible;
}

impl OutputPin for BenchTrigger {
    fn set_low(&mut self) -> Result<(), Infallible> {
        let mut s = self.0.state.borrow_mut();
        if s.trigger_high {
            let width = s.now_us - s.trigger_high_since;
            let low_before = s.trigger_high_since - s.trigger_low_since;
            let rising = s.trigger_high_since;
            s.pulses.push((low_before, width, rising));
            s.trigger_high = false;
            s.trigger_low_since = s.now_us;
            s.release_echo();
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        let mut s = self.0.state.borrow_mut();
        if !s.trigger_high {
            s.trigger_high = true;
            s.trigger_high_since = s.now_us;
        }
        Ok(())
    }
}

pub struct BenchEcho(Bench);

impl ErrorType for BenchEcho {
    type Error = Infallible;
}

impl InputPin for BenchEcho {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.state.borrow().echo_high)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.state.borrow().echo_high)
    }
}

impl Wait for BenchEcho {
    async fn wait_for_high(&mut self) -> Result<(), Infallible> {
        while !self.0.state.borrow().echo_high {
            self.wait_for_any_edge().await?;
        }
        Ok(())
    }

    async fn wait_for_low(&mut self) -> Result<(), Infallible> {
        while self.0.state.borrow().echo_high {
            self.wait_for_any_edge().await?;
        }
        Ok(())
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Infallible> {
        self.wait_for_low().await?;
        self.wait_for_any_edge().await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Infallible> {
        self.wait_for_high().await?;
        self.wait_for_any_edge().await
    }

    /// Resolves once a racing delay has published its deadline and the next edge
    /// falls before it
    async fn wait_for_any_edge(&mut self) -> Result<(), Infallible> {
        loop {
            {
                let mut s = self.0.state.borrow_mut();
                let due = match (s.deadline, s.edges.front()) {
                    (Some(deadline), Some(&edge)) => edge <= deadline,
                    _ => false,
                };
                if due {
                    s.take_edge();
                    s.deadline = None;
                    s.listening = false;
                    return Ok(());
                }
                s.listening = true;
            }
            yield_now().await;
        }
    }
}

pub struct BenchDelay(Bench);

impl embedded_hal::delay::DelayNs for BenchDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.state.borrow_mut().now_us += u64::from(ns).div_ceil(1000);
    }
}

impl embedded_hal_async::delay::DelayNs for BenchDelay {
    async fn delay_ns(&mut self, ns: u32) {
        let deadline = {
            let mut s = self.0.state.borrow_mut();
            let deadline = s.now_us + u64::from(ns).div_ceil(1000);
            s.deadline = Some(deadline);
            deadline
        };
        loop {
            {
                let mut s = self.0.state.borrow_mut();
                let listening = std::mem::take(&mut s.listening);
                let edge_first = s.edges.front().is_some_and(|&edge| edge <= deadline);
                if !edge_first || !listening {
                    // Nobody watches the line: edges before the deadline just happen
                    while s.edges.front().is_some_and(|&edge| edge <= deadline) {
                        s.take_edge();
                    }
                    s.now_us = s.now_us.max(deadline);
                    s.deadline = None;
                    return;
                }
            }
            yield_now().await;
        }
    }
}

#[derive(Clone)]
pub struct BenchClock(Bench);

impl Clock for BenchClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.0.now_us())
    }
}

/// Echo capture returning prepared results, a timeout once the script runs out
pub struct ScriptedEcho {
    frames: VecDeque<Result<EchoFrame, CaptureError>>,
}

impl ScriptedEcho {
    pub fn new(frames: impl IntoIterator<Item = Result<EchoFrame, CaptureError>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl EchoCapture for ScriptedEcho {
    async fn receive(&mut self, timeout: Duration) -> Result<EchoFrame, CaptureError> {
        self.frames.pop_front().unwrap_or(Err(CaptureError::Timeout {
            timeout_us: timeout.as_micros(),
        }))
    }
}

/// A single clean echo of `duration_us`
pub fn echo_us(duration_us: u32) -> Result<EchoFrame, CaptureError> {
    let mut frame = EchoFrame::new();
    frame.push(EchoInterval {
        level: Level::High,
        duration_us,
    });
    Ok(frame)
}

/// Trigger pin and delay that do nothing, for use with [`ScriptedEcho`]
pub struct NullTrigger;

impl ErrorType for NullTrigger {
    type Error = Infallible;
}

impl OutputPin for NullTrigger {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

pub struct NullDelay;

impl embedded_hal::delay::DelayNs for NullDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

impl embedded_hal_async::delay::DelayNs for NullDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

/// Biased sine pair on a 12-bit converter, `period` reads per cycle
pub struct SineSampler {
    clock: FakeClock,
    step_us: u64,
    period: u32,
    k: u32,
    pub v_amplitude: f64,
    pub i_amplitude: f64,
    /// Current lag in radians
    pub i_phase: f64,
}

impl SineSampler {
    pub fn new(clock: FakeClock, step_us: u64) -> Self {
        Self {
            clock,
            step_us,
            period: 40,
            k: 0,
            v_amplitude: 1000.0,
            i_amplitude: 400.0,
            i_phase: 0.0,
        }
    }

    /// Back to the start of a cycle
    pub fn restart(&mut self) {
        self.k = 0;
    }

    fn level(amplitude: f64, angle: f64) -> u16 {
        (2048.0 + amplitude * angle.sin()).round() as u16
    }
}

impl AcSampler for SineSampler {
    type Error = Infallible;

    fn sample(&mut self) -> Result<SamplePair, Infallible> {
        let angle = 2.0 * std::f64::consts::PI * f64::from(self.k) / f64::from(self.period);
        self.k = (self.k + 1) % self.period;
        self.clock.advance_us(self.step_us);
        Ok(SamplePair {
            voltage: Self::level(self.v_amplitude, angle),
            current: Self::level(self.i_amplitude, angle - self.i_phase),
        })
    }
}

/// Fixed readings on both channels
pub struct ConstantSampler {
    pub clock: FakeClock,
    pub step_us: u64,
    pub pair: SamplePair,
    pub reads: u32,
}

impl ConstantSampler {
    pub fn new(clock: FakeClock, step_us: u64, voltage: u16, current: u16) -> Self {
        Self {
            clock,
            step_us,
            pair: SamplePair { voltage, current },
            reads: 0,
        }
    }
}

impl AcSampler for ConstantSampler {
    type Error = Infallible;

    fn sample(&mut self) -> Result<SamplePair, Infallible> {
        self.reads += 1;
        self.clock.advance_us(self.step_us);
        Ok(self.pair)
    }
}

/// Returns `first` on the first read and `then` on every read after it
pub struct StepSampler {
    pub clock: FakeClock,
    pub step_us: u64,
    pub first: SamplePair,
    pub then: SamplePair,
    pub reads: u32,
}

impl StepSampler {
    pub fn new(clock: FakeClock, step_us: u64, first: SamplePair, then: SamplePair) -> Self {
        Self {
            clock,
            step_us,
            first,
            then,
            reads: 0,
        }
    }
}

impl AcSampler for StepSampler {
    type Error = Infallible;

    fn sample(&mut self) -> Result<SamplePair, Infallible> {
        self.reads += 1;
        self.clock.advance_us(self.step_us);
        Ok(if self.reads == 1 { self.first } else { self.then })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadFailed;

/// Fails every `every`-th read of the inner sampler; `every == 1` fails all reads
pub struct Flaky<S> {
    pub inner: S,
    pub every: u32,
    calls: u32,
}

impl<S> Flaky<S> {
    pub fn new(inner: S, every: u32) -> Self {
        Self { inner, every, calls: 0 }
    }
}

impl<S: AcSampler> AcSampler for Flaky<S> {
    type Error = ReadFailed;

    fn sample(&mut self) -> Result<SamplePair, ReadFailed> {
        self.calls += 1;
        let pair = self.inner.sample().map_err(|_| ReadFailed)?;
        if self.calls.is_multiple_of(self.every) {
            return Err(ReadFailed);
        }
        Ok(pair)
    }
}
