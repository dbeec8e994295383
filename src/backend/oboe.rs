//! Oboe-based output device for Android (AAudio / OpenSL ES)
//!
//! # Architecture
//! ```text
//! StreamEngine::start()
//!   └─> OboeDevice::open_stream()
//!       └─> oboe::AudioStreamBuilder::set_callback(OboeCallback)
//!           ├─> OboeCallback::on_audio_ready()        [Real-time thread]
//!           │     └─> RenderCallback::render()
//!           └─> OboeCallback::on_error_after_close()  [Oboe notifier thread]
//!                 └─> ErrorCallback::on_stream_fault()
//! ```

use std::sync::Arc;

use oboe::{
    AudioOutputCallback, AudioOutputStreamSafe, AudioStream, AudioStreamAsync, AudioStreamBase,
    AudioStreamBuilder, AudioStreamSafe, DataCallbackResult, Mono, Output,
};

use crate::error::AudioError;

use super::{
    AudioDevice, CallbackResult, DeviceStream, ErrorCallback, PerformanceMode, RenderCallback,
    StreamFault, StreamRequest,
};

/// Android output device backed by oboe-rs
#[derive(Default)]
pub struct OboeDevice {
    _unit: (),
}

impl OboeDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Adapter between oboe's callback trait and the engine's callbacks
struct OboeCallback {
    render: Box<dyn RenderCallback>,
    on_fault: Arc<dyn ErrorCallback>,
}

impl AudioOutputCallback for OboeCallback {
    type FrameType = (f32, Mono);

    fn on_error_after_close(
        &mut self,
        _stream: &mut dyn AudioOutputStreamSafe,
        error: oboe::Error,
    ) {
        let fault = match error {
            oboe::Error::Disconnected => StreamFault::Disconnected,
            other => StreamFault::Backend(format!("{:?}", other)),
        };
        self.on_fault.on_stream_fault(fault);
    }

    fn on_audio_ready(
        &mut self,
        _stream: &mut dyn AudioOutputStreamSafe,
        frames: &mut [f32],
    ) -> DataCallbackResult {
        // Real-time audio callback - NO ALLOCATIONS, LOCKS, OR BLOCKING!
        match self.render.render(frames, 1) {
            CallbackResult::Continue => DataCallbackResult::Continue,
            CallbackResult::Stop => DataCallbackResult::Stop,
        }
    }
}

impl AudioDevice for OboeDevice {
    fn name(&self) -> &str {
        "oboe"
    }

    fn open_stream(
        &self,
        request: &StreamRequest,
        render: Box<dyn RenderCallback>,
        on_fault: Arc<dyn ErrorCallback>,
    ) -> Result<Box<dyn DeviceStream>, AudioError> {
        if request.channel_count != 1 {
            return Err(AudioError::StreamOpenFailed {
                reason: format!(
                    "Oboe backend renders mono only (requested {} channels)",
                    request.channel_count
                ),
            });
        }

        let performance_mode = match request.performance_mode {
            PerformanceMode::LowLatency => oboe::PerformanceMode::LowLatency,
            PerformanceMode::None => oboe::PerformanceMode::None,
        };

        let stream = AudioStreamBuilder::default()
            .set_performance_mode(performance_mode)
            .set_direction::<Output>()
            .set_channel_count::<Mono>()
            .set_format::<f32>()
            .set_callback(OboeCallback { render, on_fault })
            .open_stream()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Output stream: {:?}", e),
            })?;

        Ok(Box::new(OboeStream {
            stream,
            closed: false,
        }))
    }
}

struct OboeStream {
    stream: AudioStreamAsync<Output, OboeCallback>,
    closed: bool,
}

impl DeviceStream for OboeStream {
    fn sample_rate(&self) -> u32 {
        self.stream.get_sample_rate().max(0) as u32
    }

    fn frames_per_burst(&self) -> u32 {
        self.stream.get_frames_per_burst().max(0) as u32
    }

    fn set_buffer_size_in_frames(&mut self, frames: u32) -> Result<u32, AudioError> {
        let requested = i32::try_from(frames).unwrap_or(i32::MAX);
        self.stream
            .set_buffer_size_in_frames(requested)
            .map(|actual| actual.max(0) as u32)
            .map_err(|e| AudioError::HardwareError {
                details: format!("Failed to set buffer size: {:?}", e),
            })
    }

    fn request_start(&mut self) -> Result<(), AudioError> {
        self.stream
            .request_start()
            .map_err(|e| AudioError::StreamStartFailed {
                reason: format!("Output stream: {:?}", e),
            })
    }

    fn request_stop(&mut self) -> Result<(), AudioError> {
        // Blocking stop: returns once the stream has drained.
        self.stream.stop().map_err(|e| AudioError::StreamStopFailed {
            reason: format!("Output stream: {:?}", e),
        })
    }

    fn close(&mut self) -> Result<(), AudioError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream.close().map_err(|e| AudioError::StreamCloseFailed {
            reason: format!("Output stream: {:?}", e),
        })
    }
}
