//! Device abstractions for the stream engine.
//!
//! The engine never talks to a platform audio API directly. It asks an
//! [`AudioDevice`] to open a stream with a [`StreamRequest`], hands it a
//! [`RenderCallback`] for the real-time thread and an [`ErrorCallback`] for
//! fault notification, and drives the returned [`DeviceStream`] through its
//! lifecycle.

use std::sync::Arc;

use crate::error::AudioError;

/// Sample format requested from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    F32,
}

/// Performance mode requested from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceMode {
    LowLatency,
    None,
}

/// Stream parameters the engine asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub format: SampleFormat,
    pub channel_count: u16,
    pub performance_mode: PerformanceMode,
}

impl Default for StreamRequest {
    /// 32-bit float mono output in low-latency mode.
    fn default() -> Self {
        Self {
            format: SampleFormat::F32,
            channel_count: 1,
            performance_mode: PerformanceMode::LowLatency,
        }
    }
}

/// Status returned by the data callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackResult {
    /// Keep the stream alive and call again for the next buffer
    Continue,
    /// Stop pulling data
    Stop,
}

/// Terminal fault reported by a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFault {
    /// The output device went away (unplugged, route change)
    Disconnected,
    /// Any other backend error
    Backend(String),
}

/// Data callback invoked on the device's real-time thread.
///
/// Implementations must not lock, allocate, or block.
pub trait RenderCallback: Send + 'static {
    /// Fill `frames` (interleaved, `channels` samples per frame) in place.
    fn render(&mut self, frames: &mut [f32], channels: usize) -> CallbackResult;
}

/// Fault callback, possibly invoked on an arbitrary backend thread.
///
/// Implementations must return promptly and must not start or stop streams.
pub trait ErrorCallback: Send + Sync + 'static {
    fn on_stream_fault(&self, fault: StreamFault);
}

/// An open device stream, exclusively owned by the engine.
pub trait DeviceStream: Send {
    /// Sample rate negotiated with the device, in Hz
    fn sample_rate(&self) -> u32;

    /// Frames the device transfers per burst
    fn frames_per_burst(&self) -> u32;

    /// Request a buffer size; returns the size actually applied
    fn set_buffer_size_in_frames(&mut self, frames: u32) -> Result<u32, AudioError>;

    /// Begin pulling data through the render callback
    fn request_start(&mut self) -> Result<(), AudioError>;

    /// Stop pulling data; returns once the stream has stopped
    fn request_stop(&mut self) -> Result<(), AudioError>;

    /// Release the stream. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), AudioError>;
}

/// Trait implemented by platform-specific audio devices.
pub trait AudioDevice: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    fn open_stream(
        &self,
        request: &StreamRequest,
        render: Box<dyn RenderCallback>,
        on_fault: Arc<dyn ErrorCallback>,
    ) -> Result<Box<dyn DeviceStream>, AudioError>;
}

#[cfg(target_os = "android")]
mod oboe;
#[cfg(target_os = "android")]
pub use self::oboe::OboeDevice;

#[cfg(not(target_os = "android"))]
mod cpal;
#[cfg(not(target_os = "android"))]
pub use self::cpal::CpalDevice;

mod simulated;
pub use simulated::{DeviceStats, SimulatedDevice};

/// The real output device for the current platform.
pub fn platform_device() -> Arc<dyn AudioDevice> {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "android")] {
            Arc::new(OboeDevice::new())
        } else {
            Arc::new(CpalDevice::new())
        }
    }
}
