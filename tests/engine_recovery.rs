//! Integration tests for stream lifecycle and device-loss recovery
//!
//! These tests drive the public engine API against the simulated device:
//! - restart storms never overlap stop/start sequences
//! - a disconnect burst while running recovers to exactly one live stream
//! - the tone flag survives recovery

use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

use wavemaker::audio::{EngineState, RecoveryExecutor, RestartOutcome, StreamEngine};
use wavemaker::backend::SimulatedDevice;
use wavemaker::config::AppConfig;

fn init_test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build test runtime")
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn engine_on(device: &SimulatedDevice, runtime: &tokio::runtime::Runtime) -> StreamEngine {
    StreamEngine::new(
        Arc::new(device.clone()),
        &AppConfig::default(),
        RecoveryExecutor::new(runtime.handle().clone()),
    )
}

#[test]
fn test_concurrent_restarts_never_overlap() {
    let runtime = init_test_runtime();
    let device = SimulatedDevice::default();
    device.set_open_latency(Duration::from_millis(20));
    let engine = engine_on(&device, &runtime);
    engine.start().unwrap();

    const CALLERS: usize = 8;
    let barrier = Arc::new(Barrier::new(CALLERS));
    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let engine = engine.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                engine.restart()
            })
        })
        .collect();

    let outcomes: Vec<RestartOutcome> = handles
        .into_iter()
        .map(|handle| handle.join().expect("restart thread panicked"))
        .collect();

    let restarted = outcomes
        .iter()
        .filter(|outcome| **outcome == RestartOutcome::Restarted)
        .count();
    let suppressed = outcomes
        .iter()
        .filter(|outcome| **outcome == RestartOutcome::Suppressed)
        .count();
    assert!(restarted >= 1);
    assert_eq!(restarted + suppressed, CALLERS);

    let stats = device.stats();
    assert_eq!(stats.max_concurrent_opens, 1);
    assert_eq!(stats.max_live, 1);
    assert_eq!(stats.live, 1);
    assert_eq!(stats.opened, 1 + restarted);
    assert_eq!(engine.state(), EngineState::Running);
}

#[test]
fn test_disconnect_burst_recovers_to_single_stream() {
    let runtime = init_test_runtime();
    let device = SimulatedDevice::default();
    device.set_open_latency(Duration::from_millis(10));
    let engine = engine_on(&device, &runtime);
    engine.start().unwrap();
    engine.set_tone_on(true);

    for _ in 0..5 {
        device.disconnect();
    }

    assert!(
        wait_until(|| engine.state() == EngineState::Running && device.is_running()),
        "engine did not recover"
    );
    // Let any straggling recovery tasks finish before inspecting counters.
    runtime.block_on(async { tokio::time::sleep(Duration::from_millis(100)).await });
    assert!(wait_until(|| engine.state() == EngineState::Running));

    let stats = device.stats();
    assert_eq!(stats.live, 1);
    assert_eq!(stats.max_live, 1);
    assert_eq!(stats.max_concurrent_opens, 1);
    assert!(stats.opened >= 2);
    assert!(engine.is_tone_on());

    let samples = device.pull(3).unwrap();
    assert_eq!(samples[0], 0.0);
    assert!(samples[1] > 0.0 && samples[2] > samples[1]);
}

#[test]
fn test_open_failure_then_manual_start_recovers() {
    let runtime = init_test_runtime();
    let device = SimulatedDevice::default();
    let engine = engine_on(&device, &runtime);
    engine.start().unwrap();

    device.set_fail_open(true);
    device.disconnect();
    assert!(wait_until(|| device.stats().closed == 1 && engine.state() == EngineState::Idle));

    device.set_fail_open(false);
    engine.start().unwrap();
    assert_eq!(engine.state(), EngineState::Running);
    assert_eq!(device.stats().live, 1);
}
