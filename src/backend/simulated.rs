use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AudioError;

use super::{
    AudioDevice, CallbackResult, DeviceStream, ErrorCallback, RenderCallback, StreamFault,
    StreamRequest,
};

/// Deterministic in-process device used by tests and the CLI's dry-run mode.
///
/// Nothing plays: the caller drives the live stream with [`pull`](Self::pull)
/// and injects faults with [`disconnect`](Self::disconnect). Failure switches
/// and an artificial open latency let tests exercise the engine's error and
/// concurrency paths.
#[derive(Clone)]
pub struct SimulatedDevice {
    shared: Arc<DeviceShared>,
}

/// Counters observed by the simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStats {
    pub opened: usize,
    pub closed: usize,
    pub live: usize,
    pub max_live: usize,
    pub max_concurrent_opens: usize,
    pub last_buffer_size: u32,
}

struct DeviceShared {
    sample_rate: AtomicU32,
    frames_per_burst: AtomicU32,
    fail_open: AtomicBool,
    fail_start: AtomicBool,
    open_latency_ms: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    opening: AtomicUsize,
    max_concurrent_opens: AtomicUsize,
    last_buffer_size: AtomicU32,
    // every stream opened so far, newest last
    streams: Mutex<Vec<Arc<StreamShared>>>,
}

struct StreamShared {
    render: Mutex<Box<dyn RenderCallback>>,
    on_fault: Arc<dyn ErrorCallback>,
    channels: usize,
    running: AtomicBool,
    closed: AtomicBool,
}

impl SimulatedDevice {
    pub fn new(sample_rate: u32, frames_per_burst: u32) -> Self {
        Self {
            shared: Arc::new(DeviceShared {
                sample_rate: AtomicU32::new(sample_rate),
                frames_per_burst: AtomicU32::new(frames_per_burst),
                fail_open: AtomicBool::new(false),
                fail_start: AtomicBool::new(false),
                open_latency_ms: AtomicU64::new(0),
                opened: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
                live: AtomicUsize::new(0),
                max_live: AtomicUsize::new(0),
                opening: AtomicUsize::new(0),
                max_concurrent_opens: AtomicUsize::new(0),
                last_buffer_size: AtomicU32::new(0),
                streams: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Sample rate reported by streams opened from now on
    pub fn set_sample_rate(&self, sample_rate: u32) {
        self.shared.sample_rate.store(sample_rate, Ordering::SeqCst);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.shared.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Make every `open_stream` call sleep, widening race windows
    pub fn set_open_latency(&self, latency: Duration) {
        self.shared
            .open_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Render `frames` frames through the most recently opened running stream.
    ///
    /// Returns `None` when no stream is running.
    pub fn pull(&self, frames: usize) -> Option<Vec<f32>> {
        let stream = self.current_stream()?;
        if !stream.running.load(Ordering::SeqCst) || stream.closed.load(Ordering::SeqCst) {
            return None;
        }

        let mut buffer = vec![0.0_f32; frames * stream.channels];
        let mut render = stream.render.lock().ok()?;
        if render.render(&mut buffer, stream.channels) == CallbackResult::Stop {
            stream.running.store(false, Ordering::SeqCst);
        }
        Some(buffer)
    }

    /// Report a disconnect for the current stream on the calling thread.
    ///
    /// The stream stops delivering data, as a real device would.
    pub fn disconnect(&self) -> bool {
        self.fault(StreamFault::Disconnected)
    }

    /// Report an arbitrary fault for the current stream on the calling thread.
    pub fn fault(&self, fault: StreamFault) -> bool {
        match self.current_stream() {
            Some(stream) => Self::deliver(&stream, fault),
            None => false,
        }
    }

    /// Report a fault from the `index`th stream ever opened (0-based), even
    /// if it has since been closed, as a late backend notification would.
    pub fn fault_stream(&self, index: usize, fault: StreamFault) -> bool {
        let stream = match self.shared.streams.lock() {
            Ok(streams) => streams.get(index).cloned(),
            Err(_) => None,
        };
        match stream {
            Some(stream) => Self::deliver(&stream, fault),
            None => false,
        }
    }

    fn deliver(stream: &StreamShared, fault: StreamFault) -> bool {
        if fault == StreamFault::Disconnected {
            stream.running.store(false, Ordering::SeqCst);
        }
        stream.on_fault.on_stream_fault(fault);
        true
    }

    pub fn is_running(&self) -> bool {
        self.current_stream()
            .map(|stream| {
                stream.running.load(Ordering::SeqCst) && !stream.closed.load(Ordering::SeqCst)
            })
            .unwrap_or(false)
    }

    pub fn stats(&self) -> DeviceStats {
        let shared = &self.shared;
        DeviceStats {
            opened: shared.opened.load(Ordering::SeqCst),
            closed: shared.closed.load(Ordering::SeqCst),
            live: shared.live.load(Ordering::SeqCst),
            max_live: shared.max_live.load(Ordering::SeqCst),
            max_concurrent_opens: shared.max_concurrent_opens.load(Ordering::SeqCst),
            last_buffer_size: shared.last_buffer_size.load(Ordering::SeqCst),
        }
    }

    fn current_stream(&self) -> Option<Arc<StreamShared>> {
        self.shared.streams.lock().ok()?.last().cloned()
    }
}

impl Default for SimulatedDevice {
    /// 48 kHz with 192-frame bursts
    fn default() -> Self {
        Self::new(48000, 192)
    }
}

impl AudioDevice for SimulatedDevice {
    fn name(&self) -> &str {
        "simulated"
    }

    fn open_stream(
        &self,
        request: &StreamRequest,
        render: Box<dyn RenderCallback>,
        on_fault: Arc<dyn ErrorCallback>,
    ) -> Result<Box<dyn DeviceStream>, AudioError> {
        let shared = &self.shared;
        let opening = shared.opening.fetch_add(1, Ordering::SeqCst) + 1;
        shared
            .max_concurrent_opens
            .fetch_max(opening, Ordering::SeqCst);

        let latency = shared.open_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            std::thread::sleep(Duration::from_millis(latency));
        }

        let result = if shared.fail_open.load(Ordering::SeqCst) {
            Err(AudioError::StreamOpenFailed {
                reason: "simulated open failure".to_string(),
            })
        } else {
            let stream = Arc::new(StreamShared {
                render: Mutex::new(render),
                on_fault,
                channels: usize::from(request.channel_count.max(1)),
                running: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            });
            if let Ok(mut streams) = shared.streams.lock() {
                streams.push(Arc::clone(&stream));
            }

            shared.opened.fetch_add(1, Ordering::SeqCst);
            let live = shared.live.fetch_add(1, Ordering::SeqCst) + 1;
            shared.max_live.fetch_max(live, Ordering::SeqCst);

            Ok(Box::new(SimulatedStream {
                device: Arc::clone(shared),
                stream,
                sample_rate: shared.sample_rate.load(Ordering::SeqCst),
                frames_per_burst: shared.frames_per_burst.load(Ordering::SeqCst),
            }) as Box<dyn DeviceStream>)
        };

        shared.opening.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

struct SimulatedStream {
    device: Arc<DeviceShared>,
    stream: Arc<StreamShared>,
    sample_rate: u32,
    frames_per_burst: u32,
}

impl DeviceStream for SimulatedStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frames_per_burst(&self) -> u32 {
        self.frames_per_burst
    }

    fn set_buffer_size_in_frames(&mut self, frames: u32) -> Result<u32, AudioError> {
        self.device.last_buffer_size.store(frames, Ordering::SeqCst);
        Ok(frames)
    }

    fn request_start(&mut self) -> Result<(), AudioError> {
        if self.device.fail_start.load(Ordering::SeqCst) {
            return Err(AudioError::StreamStartFailed {
                reason: "simulated start failure".to_string(),
            });
        }
        self.stream.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn request_stop(&mut self) -> Result<(), AudioError> {
        self.stream.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioError> {
        if self.stream.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.stream.running.store(false, Ordering::SeqCst);
        self.device.closed.fetch_add(1, Ordering::SeqCst);
        self.device.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for SimulatedStream {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ramp(f32);

    impl RenderCallback for Ramp {
        fn render(&mut self, frames: &mut [f32], _channels: usize) -> CallbackResult {
            for sample in frames.iter_mut() {
                *sample = self.0;
                self.0 += 1.0;
            }
            CallbackResult::Continue
        }
    }

    struct CountFaults(AtomicUsize);

    impl ErrorCallback for CountFaults {
        fn on_stream_fault(&self, _fault: StreamFault) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn open(device: &SimulatedDevice, faults: Arc<CountFaults>) -> Box<dyn DeviceStream> {
        device
            .open_stream(&StreamRequest::default(), Box::new(Ramp(0.0)), faults)
            .unwrap()
    }

    #[test]
    fn test_pull_requires_started_stream() {
        let device = SimulatedDevice::default();
        let faults = Arc::new(CountFaults(AtomicUsize::new(0)));
        let mut stream = open(&device, faults);

        assert!(device.pull(4).is_none());
        stream.request_start().unwrap();
        assert_eq!(device.pull(4), Some(vec![0.0, 1.0, 2.0, 3.0]));
        assert_eq!(device.pull(2), Some(vec![4.0, 5.0]));
    }

    #[test]
    fn test_close_is_idempotent_and_counted() {
        let device = SimulatedDevice::default();
        let faults = Arc::new(CountFaults(AtomicUsize::new(0)));
        let mut stream = open(&device, faults);
        assert_eq!(device.stats().live, 1);

        stream.close().unwrap();
        stream.close().unwrap();
        drop(stream);

        let stats = device.stats();
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.live, 0);
    }

    #[test]
    fn test_disconnect_invokes_fault_callback_and_halts_stream() {
        let device = SimulatedDevice::default();
        let faults = Arc::new(CountFaults(AtomicUsize::new(0)));
        let mut stream = open(&device, Arc::clone(&faults));
        stream.request_start().unwrap();

        assert!(device.disconnect());
        assert_eq!(faults.0.load(Ordering::SeqCst), 1);
        assert!(!device.is_running());
        assert!(device.pull(4).is_none());
    }

    #[test]
    fn test_fault_stream_reaches_closed_streams() {
        let device = SimulatedDevice::default();
        let first = Arc::new(CountFaults(AtomicUsize::new(0)));
        let second = Arc::new(CountFaults(AtomicUsize::new(0)));

        let mut old = open(&device, Arc::clone(&first));
        old.close().unwrap();
        let mut current = open(&device, Arc::clone(&second));
        current.request_start().unwrap();

        assert!(device.fault_stream(0, StreamFault::Disconnected));
        assert_eq!(first.0.load(Ordering::SeqCst), 1);
        assert_eq!(second.0.load(Ordering::SeqCst), 0);
        assert!(device.is_running());
        assert!(!device.fault_stream(2, StreamFault::Disconnected));
    }

    #[test]
    fn test_injected_failures() {
        let device = SimulatedDevice::default();
        let faults = Arc::new(CountFaults(AtomicUsize::new(0)));

        device.set_fail_open(true);
        let result =
            device.open_stream(&StreamRequest::default(), Box::new(Ramp(0.0)), faults.clone());
        assert!(matches!(result, Err(AudioError::StreamOpenFailed { .. })));
        assert_eq!(device.stats().opened, 0);

        device.set_fail_open(false);
        device.set_fail_start(true);
        let mut stream = open(&device, faults);
        assert!(matches!(
            stream.request_start(),
            Err(AudioError::StreamStartFailed { .. })
        ));
    }
}
