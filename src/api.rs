//! Control-layer API
//!
//! Process-wide entry points for the UI: one engine on the platform output
//! device, a lazily built runtime for its recovery tasks, and the touch
//! mapping that turns pointer events into tone on/off.

use std::sync::Mutex;

use once_cell::sync::{Lazy, OnceCell};
use tokio::runtime::Runtime;

use crate::audio::{RecoveryExecutor, StreamEngine};
use crate::backend::platform_device;
use crate::config::AppConfig;
use crate::error::{log_audio_error, AudioError};

/// `MotionEvent.ACTION_DOWN`
pub const ACTION_DOWN: i32 = 0;
/// `MotionEvent.ACTION_UP`
pub const ACTION_UP: i32 = 1;
/// `MotionEvent.ACTION_CANCEL`
pub const ACTION_CANCEL: i32 = 3;

static RUNTIME: OnceCell<Runtime> = OnceCell::new();
static ENGINE: Lazy<Mutex<Option<StreamEngine>>> = Lazy::new(|| Mutex::new(None));

/// Tone state requested by a touch action, `None` if the action is ignored
pub fn tone_for_touch_action(action: i32) -> Option<bool> {
    match action {
        ACTION_DOWN => Some(true),
        ACTION_UP | ACTION_CANCEL => Some(false),
        _ => None,
    }
}

/// Start the engine with the platform's default configuration
pub fn start_engine() -> Result<(), AudioError> {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "android")] {
            start_engine_with(AppConfig::load_android())
        } else {
            start_engine_with(AppConfig::load())
        }
    }
}

/// Start the engine, creating it on first use
///
/// The config only takes effect when the engine is created; later calls
/// restart the existing engine's stream.
pub fn start_engine_with(config: AppConfig) -> Result<(), AudioError> {
    let mut guard = lock_engine()?;
    if guard.is_none() {
        let executor = RecoveryExecutor::new(recovery_runtime()?.handle().clone());
        *guard = Some(StreamEngine::new(platform_device(), &config, executor));
    }

    match guard.as_ref() {
        Some(engine) => engine.start(),
        None => Err(AudioError::HardwareError {
            details: "engine missing after creation".to_string(),
        }),
    }
}

/// Stop the engine's stream. Safe to call when nothing is running.
pub fn stop_engine() -> Result<(), AudioError> {
    let guard = lock_engine()?;
    match guard.as_ref() {
        Some(engine) => engine.stop(),
        None => Ok(()),
    }
}

/// Switch the tone on or off; a no-op before the engine exists
pub fn set_tone_on(on: bool) -> Result<(), AudioError> {
    let guard = lock_engine()?;
    if let Some(engine) = guard.as_ref() {
        engine.set_tone_on(on);
    }
    Ok(())
}

/// Apply a `MotionEvent` action code
pub fn touch_event(action: i32) -> Result<(), AudioError> {
    match tone_for_touch_action(action) {
        Some(on) => set_tone_on(on),
        None => Ok(()),
    }
}

fn recovery_runtime() -> Result<&'static Runtime, AudioError> {
    RUNTIME.get_or_try_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(4)
            .thread_name("wavemaker-recovery")
            .enable_all()
            .build()
            .map_err(|e| AudioError::RuntimeUnavailable {
                reason: e.to_string(),
            })
    })
}

fn lock_engine() -> Result<std::sync::MutexGuard<'static, Option<StreamEngine>>, AudioError> {
    ENGINE.lock().map_err(|_| {
        let err = AudioError::LockPoisoned {
            component: "global_engine".to_string(),
        };
        log_audio_error(&err, "lock_engine");
        err
    })
}
