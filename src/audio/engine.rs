//! StreamEngine - output stream lifecycle and tone control
//!
//! The engine owns at most one device stream and bridges control-thread
//! commands to the real-time render path.
//!
//! Architecture:
//! - Data callback ([`ToneCallback`]): owns an [`Oscillator`] renderer and
//!   fills each device buffer on the real-time thread.
//! - Fault callback ([`FaultHandler`]): runs on whatever thread the backend
//!   reports faults from. A disconnect is handed to the [`RecoveryExecutor`],
//!   which calls [`StreamEngine::restart`] on a blocking-pool thread.
//! - Control thread: `start` / `stop` / `set_tone_on`.
//!
//! Thread safety:
//! - tone flag and phase increment: atomics shared with the renderer
//! - stream slot: `Mutex`, only ever locked off the audio thread
//! - restart: per-engine [`RestartGuard`], concurrent requests are dropped
//! - recovery: each stream carries a generation; a fault from a stream that
//!   is no longer in the slot (stopped or replaced) restarts nothing

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::{debug, info, warn};
use tokio::sync::broadcast;

use super::oscillator::{Oscillator, OscillatorHandle};
use super::recovery::{RecoveryExecutor, RestartGuard};
use crate::backend::{
    AudioDevice, CallbackResult, DeviceStream, ErrorCallback, RenderCallback, StreamFault,
    StreamRequest,
};
use crate::config::AppConfig;
use crate::error::{log_audio_error, AudioError, ErrorCode};

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No stream
    Idle,
    /// Stream open and pulling data
    Running,
    /// A stop/start recovery sequence is in flight
    Restarting,
}

/// Notifications published on the engine's broadcast channel
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Started {
        sample_rate: u32,
        frames_per_burst: u32,
        buffer_size_frames: Option<u32>,
    },
    Stopped,
    Disconnected,
    StreamFault {
        detail: String,
    },
    RestartSuppressed,
    RestartFailed {
        code: i32,
        message: String,
    },
}

/// Result of a [`StreamEngine::restart`] call
#[derive(Debug, Clone, PartialEq)]
pub enum RestartOutcome {
    /// Stop and start both ran and the new stream is running
    Restarted,
    /// Stop ran but start failed; the engine is idle
    Failed(AudioError),
    /// Another restart was in flight; nothing was done
    Suppressed,
    /// The faulting stream was already stopped or replaced; nothing was done
    Stale,
}

/// Data callback bound to the engine's oscillator
struct ToneCallback {
    oscillator: Oscillator,
}

impl RenderCallback for ToneCallback {
    fn render(&mut self, frames: &mut [f32], channels: usize) -> CallbackResult {
        // Real-time audio callback - NO ALLOCATIONS, LOCKS, OR BLOCKING!
        self.oscillator.render_interleaved(frames, channels);
        CallbackResult::Continue
    }
}

/// Fault callback bound weakly to the engine and to one stream generation
struct FaultHandler {
    engine: Weak<EngineInner>,
    generation: u64,
    events: broadcast::Sender<EngineEvent>,
    executor: RecoveryExecutor,
}

impl ErrorCallback for FaultHandler {
    fn on_stream_fault(&self, fault: StreamFault) {
        match fault {
            StreamFault::Disconnected => {
                log_audio_error(&AudioError::DeviceDisconnected, "on_stream_fault");
                let _ = self.events.send(EngineEvent::Disconnected);

                // Starting or stopping streams from the fault notifier's own
                // thread can crash the audio service.
                let engine = self.engine.clone();
                let generation = self.generation;
                self.executor.dispatch(move || {
                    if let Some(inner) = engine.upgrade() {
                        StreamEngine { inner }.recover(generation);
                    }
                });
            }
            StreamFault::Backend(detail) => {
                warn!("[StreamEngine] Stream fault: {}", detail);
                let _ = self.events.send(EngineEvent::StreamFault { detail });
            }
        }
    }
}

/// The open stream and the generation it was opened as
struct LiveStream {
    stream: Box<dyn DeviceStream>,
    generation: u64,
}

type StreamSlot = Option<LiveStream>;

struct EngineInner {
    device: Arc<dyn AudioDevice>,
    oscillator: OscillatorHandle,
    buffer_size_in_bursts: u32,
    stream: Mutex<StreamSlot>,
    next_generation: AtomicU64,
    restarting: AtomicBool,
    executor: RecoveryExecutor,
    events: broadcast::Sender<EngineEvent>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        let slot = match self.stream.get_mut() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut live) = slot.take() {
            debug!("[StreamEngine] Closing stream on drop");
            if let Err(err) = live.stream.request_stop() {
                log_audio_error(&err, "drop");
            }
            if let Err(err) = live.stream.close() {
                log_audio_error(&err, "drop");
            }
        }
    }
}

/// Tone engine driving one output stream
///
/// Cloning yields another handle to the same engine.
///
/// # Example
/// ```ignore
/// let engine = StreamEngine::new(platform_device(), &AppConfig::default(), executor);
/// engine.start()?;
/// engine.set_tone_on(true);
/// // ... samples are rendered on the device's real-time thread
/// engine.stop()?;
/// ```
#[derive(Clone)]
pub struct StreamEngine {
    inner: Arc<EngineInner>,
}

impl StreamEngine {
    pub fn new(
        device: Arc<dyn AudioDevice>,
        config: &AppConfig,
        executor: RecoveryExecutor,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let oscillator = Oscillator::from_config(&config.tone).handle();

        Self {
            inner: Arc::new(EngineInner {
                device,
                oscillator,
                buffer_size_in_bursts: config.output.buffer_size_in_bursts.max(1),
                stream: Mutex::new(None),
                next_generation: AtomicU64::new(0),
                restarting: AtomicBool::new(false),
                executor,
                events,
            }),
        }
    }

    /// Open and start an output stream
    ///
    /// On success the device is pulling samples through the oscillator.
    ///
    /// # Errors
    /// - `AlreadyRunning` if a stream is already owned
    /// - `StreamOpenFailed` if the device refused the stream; nothing is kept
    /// - `StreamStartFailed` if the stream opened but would not start; the
    ///   stream is closed again
    pub fn start(&self) -> Result<(), AudioError> {
        let mut slot = self.lock_stream()?;
        self.start_locked(&mut slot)
    }

    /// Stop and close the owned stream, if any
    ///
    /// Stop and close failures are logged; the stream is released either way.
    /// Safe to call when already stopped.
    pub fn stop(&self) -> Result<(), AudioError> {
        let mut slot = self.lock_stream()?;
        self.stop_locked(&mut slot);
        Ok(())
    }

    /// Tear the stream down and bring it back up
    ///
    /// Returns [`RestartOutcome::Suppressed`] without doing anything if
    /// another restart is already running on this engine.
    pub fn restart(&self) -> RestartOutcome {
        self.restart_if(|_| true)
    }

    /// Switch the tone on or off. Never blocks.
    pub fn set_tone_on(&self, on: bool) {
        self.inner.oscillator.set_wave_on(on);
    }

    pub fn is_tone_on(&self) -> bool {
        self.inner.oscillator.is_wave_on()
    }

    pub fn state(&self) -> EngineState {
        if self.inner.restarting.load(Ordering::Acquire) {
            return EngineState::Restarting;
        }
        match self.inner.stream.lock() {
            Ok(slot) if slot.is_some() => EngineState::Running,
            Ok(_) => EngineState::Idle,
            Err(poisoned) if poisoned.get_ref().is_some() => EngineState::Running,
            Err(_) => EngineState::Idle,
        }
    }

    /// Control handle of the engine's oscillator
    pub fn oscillator(&self) -> OscillatorHandle {
        self.inner.oscillator.clone()
    }

    /// Subscribe to lifecycle and fault events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    // ========================================================================
    // PRIVATE HELPER METHODS
    // ========================================================================

    /// Restart on behalf of the stream opened as `generation`
    ///
    /// Does nothing unless that stream still owns the slot: an idle engine
    /// stays idle, and a newer stream is left running.
    fn recover(&self, generation: u64) -> RestartOutcome {
        self.restart_if(|current| current == Some(generation))
    }

    fn restart_if(&self, wanted: impl FnOnce(Option<u64>) -> bool) -> RestartOutcome {
        let Some(_guard) = RestartGuard::try_acquire(&self.inner.restarting) else {
            debug!("[StreamEngine] Restart already in progress, dropping request");
            let _ = self.inner.events.send(EngineEvent::RestartSuppressed);
            return RestartOutcome::Suppressed;
        };

        let mut slot = match self.lock_stream() {
            Ok(slot) => slot,
            Err(err) => return self.restart_failed(err),
        };

        let current = slot.as_ref().map(|live| live.generation);
        if !wanted(current) {
            debug!(
                "[StreamEngine] Faulting stream no longer current (slot: {:?})",
                current
            );
            return RestartOutcome::Stale;
        }

        info!("[StreamEngine] Restarting output stream");
        self.stop_locked(&mut slot);
        match self.start_locked(&mut slot) {
            Ok(()) => RestartOutcome::Restarted,
            Err(err) => self.restart_failed(err),
        }
    }

    fn start_locked(&self, slot: &mut StreamSlot) -> Result<(), AudioError> {
        if slot.is_some() {
            let err = AudioError::AlreadyRunning;
            log_audio_error(&err, "start");
            return Err(err);
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let request = StreamRequest::default();
        let render = Box::new(ToneCallback {
            oscillator: Oscillator::attach(&self.inner.oscillator),
        });
        let on_fault = Arc::new(FaultHandler {
            engine: Arc::downgrade(&self.inner),
            generation,
            events: self.inner.events.clone(),
            executor: self.inner.executor.clone(),
        });

        let mut stream = self
            .inner
            .device
            .open_stream(&request, render, on_fault)
            .map_err(|err| {
                log_audio_error(&err, "start");
                err
            })?;

        let sample_rate = stream.sample_rate();
        self.inner.oscillator.set_sample_rate(sample_rate);

        let frames_per_burst = stream.frames_per_burst();
        let buffer_size_frames = self.apply_buffer_size(stream.as_mut(), frames_per_burst);

        // The stream stays running and renders zeros while the tone is off,
        // avoiding warm-up latency on every touch.
        if let Err(err) = stream.request_start() {
            log_audio_error(&err, "start");
            if let Err(close_err) = stream.close() {
                log_audio_error(&close_err, "start");
            }
            return Err(err);
        }

        info!(
            "[StreamEngine] Stream started on {}: sample_rate={} burst={} buffer={:?}",
            self.inner.device.name(),
            sample_rate,
            frames_per_burst,
            buffer_size_frames
        );
        *slot = Some(LiveStream { stream, generation });
        let _ = self.inner.events.send(EngineEvent::Started {
            sample_rate,
            frames_per_burst,
            buffer_size_frames,
        });

        Ok(())
    }

    fn stop_locked(&self, slot: &mut StreamSlot) {
        let Some(mut live) = slot.take() else {
            return;
        };

        if let Err(err) = live.stream.request_stop() {
            log_audio_error(&err, "stop");
        }
        if let Err(err) = live.stream.close() {
            log_audio_error(&err, "stop");
        }

        info!("[StreamEngine] Stream stopped");
        let _ = self.inner.events.send(EngineEvent::Stopped);
    }

    /// Size the buffer to `buffer_size_in_bursts` bursts; failure is not fatal
    fn apply_buffer_size(
        &self,
        stream: &mut dyn DeviceStream,
        frames_per_burst: u32,
    ) -> Option<u32> {
        if frames_per_burst == 0 {
            return None;
        }
        let requested = frames_per_burst.saturating_mul(self.inner.buffer_size_in_bursts);
        match stream.set_buffer_size_in_frames(requested) {
            Ok(actual) => Some(actual),
            Err(AudioError::Unsupported { .. }) => {
                debug!("[StreamEngine] Backend manages its own buffer size");
                None
            }
            Err(err) => {
                warn!(
                    "[StreamEngine] Could not set buffer size to {} frames: {}",
                    requested,
                    err.message()
                );
                None
            }
        }
    }

    fn restart_failed(&self, err: AudioError) -> RestartOutcome {
        log_audio_error(&err, "restart");
        let _ = self.inner.events.send(EngineEvent::RestartFailed {
            code: err.code(),
            message: err.message(),
        });
        RestartOutcome::Failed(err)
    }

    fn lock_stream(&self) -> Result<MutexGuard<'_, StreamSlot>, AudioError> {
        self.inner.stream.lock().map_err(|_| {
            let err = AudioError::LockPoisoned {
                component: "stream_engine".to_string(),
            };
            log_audio_error(&err, "lock_stream");
            err
        })
    }
}
