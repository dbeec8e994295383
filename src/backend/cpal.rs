//! CPAL-based output device for desktop platforms (Linux, macOS, Windows)
//!
//! `cpal::Stream` is not `Send`, so every stream is built, played, paused and
//! dropped on its own owner thread. The [`DeviceStream`] handed to the engine
//! is a command channel to that thread.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, warn};

use crate::error::AudioError;

use super::{
    AudioDevice, CallbackResult, DeviceStream, ErrorCallback, RenderCallback, StreamFault,
    StreamRequest,
};

/// Burst size reported when the host does not expose a buffer size range
const DEFAULT_FRAMES_PER_BURST: u32 = 256;

/// Default output device of the default cpal host
#[derive(Default)]
pub struct CpalDevice {
    _unit: (),
}

impl CpalDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What the owner thread reports back once the stream is built
struct Negotiated {
    sample_rate: u32,
    frames_per_burst: u32,
}

enum Command {
    Play(SyncSender<Result<(), AudioError>>),
    Pause(SyncSender<Result<(), AudioError>>),
    Close,
}

impl AudioDevice for CpalDevice {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open_stream(
        &self,
        request: &StreamRequest,
        render: Box<dyn RenderCallback>,
        on_fault: Arc<dyn ErrorCallback>,
    ) -> Result<Box<dyn DeviceStream>, AudioError> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let (command_tx, command_rx) = mpsc::channel();
        let request = request.clone();

        let owner = std::thread::Builder::new()
            .name("cpal-output".to_string())
            .spawn(move || run_owner(request, render, on_fault, reply_tx, command_rx))
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to spawn stream owner thread: {}", e),
            })?;

        let negotiated = match reply_rx.recv() {
            Ok(result) => result?,
            Err(_) => {
                let _ = owner.join();
                return Err(AudioError::StreamOpenFailed {
                    reason: "Stream owner thread exited before reporting".to_string(),
                });
            }
        };

        Ok(Box::new(CpalStream {
            commands: command_tx,
            owner: Some(owner),
            sample_rate: negotiated.sample_rate,
            frames_per_burst: negotiated.frames_per_burst,
        }))
    }
}

fn run_owner(
    request: StreamRequest,
    render: Box<dyn RenderCallback>,
    on_fault: Arc<dyn ErrorCallback>,
    reply: SyncSender<Result<Negotiated, AudioError>>,
    commands: Receiver<Command>,
) {
    let (stream, negotiated) = match build_stream(&request, render, on_fault) {
        Ok(built) => built,
        Err(err) => {
            let _ = reply.send(Err(err));
            return;
        }
    };
    if reply.send(Ok(negotiated)).is_err() {
        return;
    }

    while let Ok(command) = commands.recv() {
        match command {
            Command::Play(ack) => {
                let result = stream.play().map_err(|e| AudioError::StreamStartFailed {
                    reason: e.to_string(),
                });
                let _ = ack.send(result);
            }
            Command::Pause(ack) => {
                let result = stream.pause().map_err(|e| AudioError::StreamStopFailed {
                    reason: e.to_string(),
                });
                let _ = ack.send(result);
            }
            Command::Close => break,
        }
    }

    drop(stream);
    debug!("[CpalDevice] Stream owner thread exiting");
}

fn build_stream(
    request: &StreamRequest,
    mut render: Box<dyn RenderCallback>,
    on_fault: Arc<dyn ErrorCallback>,
) -> Result<(cpal::Stream, Negotiated), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::StreamOpenFailed {
            reason: "No default output device found".to_string(),
        })?;

    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Failed to get default output config: {:?}", e),
        })?;

    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::StreamOpenFailed {
            reason: "Only F32 sample format is currently supported for output".to_string(),
        });
    }

    let sample_rate = supported.sample_rate();
    let channels = if supports_channel_count(&device, request.channel_count, sample_rate) {
        request.channel_count
    } else {
        debug!(
            "[CpalDevice] {} channel(s) unsupported, fanning out to {}",
            request.channel_count,
            supported.channels()
        );
        supported.channels()
    };

    let frames_per_burst = match supported.buffer_size() {
        cpal::SupportedBufferSize::Range { min, .. } if *min > 0 => *min,
        _ => DEFAULT_FRAMES_PER_BURST,
    };

    let config = cpal::StreamConfig {
        channels,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    let channel_count = usize::from(channels.max(1));

    let mut stopped = false;
    let err_fn = move |err: cpal::StreamError| {
        let fault = match err {
            cpal::StreamError::DeviceNotAvailable => StreamFault::Disconnected,
            other => StreamFault::Backend(other.to_string()),
        };
        on_fault.on_stream_fault(fault);
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if stopped {
                    data.fill(0.0);
                    return;
                }
                if render.render(data, channel_count) == CallbackResult::Stop {
                    stopped = true;
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })?;

    // Some hosts start streams as soon as they are built.
    if let Err(e) = stream.pause() {
        debug!("[CpalDevice] Initial pause not supported: {}", e);
    }

    Ok((
        stream,
        Negotiated {
            sample_rate: sample_rate.0,
            frames_per_burst,
        },
    ))
}

fn supports_channel_count(device: &cpal::Device, channels: u16, rate: cpal::SampleRate) -> bool {
    match device.supported_output_configs() {
        Ok(mut configs) => configs.any(|range| {
            range.channels() == channels
                && range.sample_format() == cpal::SampleFormat::F32
                && range.min_sample_rate() <= rate
                && rate <= range.max_sample_rate()
        }),
        Err(_) => false,
    }
}

/// Handle to a stream living on its owner thread
struct CpalStream {
    commands: Sender<Command>,
    owner: Option<JoinHandle<()>>,
    sample_rate: u32,
    frames_per_burst: u32,
}

impl CpalStream {
    fn send_and_wait(
        &self,
        make: impl FnOnce(SyncSender<Result<(), AudioError>>) -> Command,
    ) -> Result<(), AudioError> {
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        self.commands
            .send(make(ack_tx))
            .map_err(|_| AudioError::HardwareError {
                details: "Stream owner thread is gone".to_string(),
            })?;
        ack_rx.recv().map_err(|_| AudioError::HardwareError {
            details: "Stream owner thread dropped the request".to_string(),
        })?
    }
}

impl DeviceStream for CpalStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frames_per_burst(&self) -> u32 {
        self.frames_per_burst
    }

    fn set_buffer_size_in_frames(&mut self, _frames: u32) -> Result<u32, AudioError> {
        // cpal fixes the buffer size when the stream is built.
        Err(AudioError::Unsupported {
            operation: "set_buffer_size_in_frames".to_string(),
        })
    }

    fn request_start(&mut self) -> Result<(), AudioError> {
        self.send_and_wait(Command::Play)
    }

    fn request_stop(&mut self) -> Result<(), AudioError> {
        self.send_and_wait(Command::Pause)
    }

    fn close(&mut self) -> Result<(), AudioError> {
        let Some(owner) = self.owner.take() else {
            return Ok(());
        };
        let _ = self.commands.send(Command::Close);
        owner.join().map_err(|_| AudioError::StreamCloseFailed {
            reason: "Stream owner thread panicked".to_string(),
        })
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("[CpalDevice] {}", err);
        }
    }
}
