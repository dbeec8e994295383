//! Oscillator - lock-free sine tone generator for the real-time thread
//!
//! The oscillator is split in two halves:
//! - [`Oscillator`] owns the phase and renders samples. It is moved into the
//!   stream's data callback and only ever touched by the audio thread.
//! - [`OscillatorHandle`] is a cheap clone shared with control threads. It
//!   flips the tone on and off and sets the phase increment once per stream.
//!
//! Both halves share their controls through atomics, so rendering never
//! locks, allocates, or blocks.
//!
//! Whenever the tone is off the phase is held at zero, so every audible
//! segment starts on a zero crossing and switching on never clicks.
//! Switching off mid-cycle can still click because the last non-zero sample
//! is followed directly by silence.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::ToneConfig;

/// Tone frequency used by [`Oscillator::new`], in Hz
pub const DEFAULT_FREQUENCY_HZ: f64 = 440.0;

/// Peak amplitude used by [`Oscillator::new`]
pub const DEFAULT_AMPLITUDE: f64 = 0.3;

struct Controls {
    wave_on: AtomicBool,
    /// f64 bits, radians per sample
    phase_increment: AtomicU64,
    frequency_hz: f64,
    amplitude: f64,
}

/// Control-side view of an oscillator
#[derive(Clone)]
pub struct OscillatorHandle {
    controls: Arc<Controls>,
}

impl OscillatorHandle {
    /// Recompute the phase increment for a new stream sample rate.
    ///
    /// Call after the stream is opened and before it is started, never while
    /// a callback for the stream may be running. A zero rate leaves the
    /// oscillator parked at phase zero.
    pub fn set_sample_rate(&self, sample_rate: u32) {
        let increment = if sample_rate == 0 {
            0.0
        } else {
            (TAU * self.controls.frequency_hz) / f64::from(sample_rate)
        };
        self.controls
            .phase_increment
            .store(increment.to_bits(), Ordering::Relaxed);
    }

    /// Switch the tone on or off. Safe from any thread, never blocks.
    pub fn set_wave_on(&self, on: bool) {
        self.controls.wave_on.store(on, Ordering::Relaxed);
    }

    pub fn is_wave_on(&self) -> bool {
        self.controls.wave_on.load(Ordering::Relaxed)
    }

    /// Radians advanced per rendered sample
    pub fn phase_increment(&self) -> f64 {
        f64::from_bits(self.controls.phase_increment.load(Ordering::Relaxed))
    }

    pub fn frequency_hz(&self) -> f64 {
        self.controls.frequency_hz
    }

    pub fn amplitude(&self) -> f64 {
        self.controls.amplitude
    }
}

/// Sine wave renderer
///
/// # Real-Time Safety
/// `render` performs one relaxed atomic load per frame plus arithmetic.
/// No locks, no allocation, no I/O.
pub struct Oscillator {
    controls: Arc<Controls>,
    phase: f64,
}

impl Oscillator {
    /// 440 Hz at amplitude 0.3, tone off, no sample rate yet
    pub fn new() -> Self {
        Self::with_tone(DEFAULT_FREQUENCY_HZ, DEFAULT_AMPLITUDE)
    }

    pub fn with_tone(frequency_hz: f64, amplitude: f64) -> Self {
        Self {
            controls: Arc::new(Controls {
                wave_on: AtomicBool::new(false),
                phase_increment: AtomicU64::new(0.0_f64.to_bits()),
                frequency_hz,
                amplitude,
            }),
            phase: 0.0,
        }
    }

    pub fn from_config(config: &ToneConfig) -> Self {
        Self::with_tone(config.frequency_hz, config.amplitude)
    }

    /// A fresh renderer (phase 0) sharing the controls behind `handle`.
    ///
    /// Used when a new stream is opened: the old renderer dies with the old
    /// stream's callback, the tone flag carries over.
    pub fn attach(handle: &OscillatorHandle) -> Self {
        Self {
            controls: Arc::clone(&handle.controls),
            phase: 0.0,
        }
    }

    pub fn handle(&self) -> OscillatorHandle {
        OscillatorHandle {
            controls: Arc::clone(&self.controls),
        }
    }

    /// Current phase in radians, within [0, 2π)
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Fill a mono buffer, one sample per frame.
    pub fn render(&mut self, buffer: &mut [f32]) {
        self.render_interleaved(buffer, 1);
    }

    /// Fill an interleaved buffer, writing the same sample to every channel.
    pub fn render_interleaved(&mut self, buffer: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let increment = f64::from_bits(self.controls.phase_increment.load(Ordering::Relaxed));
        let amplitude = self.controls.amplitude;

        for frame in buffer.chunks_mut(channels) {
            let sample = if self.controls.wave_on.load(Ordering::Relaxed) {
                let value = (self.phase.sin() * amplitude) as f32;
                self.phase += increment;
                if self.phase >= TAU {
                    self.phase = self.phase.rem_euclid(TAU);
                }
                value
            } else {
                self.phase = 0.0;
                0.0
            };
            frame.fill(sample);
        }
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new()
    }
}
