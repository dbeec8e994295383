// WaveMaker Core - Rust Audio Engine
// Low-latency sine tone output with click-free toggling and device-loss recovery

// Module declarations
pub mod api;
pub mod audio;
pub mod backend;
pub mod config;
pub mod error;

#[cfg(target_os = "android")]
mod jni_bridge;

pub use audio::{EngineEvent, EngineState, Oscillator, RestartOutcome, StreamEngine};
pub use error::{AudioError, ErrorCode};

/// Install the global tracing subscriber; `log` records are forwarded to it.
///
/// Safe to call more than once: later calls are ignored.
pub fn init_logging(level: tracing::Level) {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "android")] {
            use tracing_subscriber::filter::LevelFilter;
            use tracing_subscriber::prelude::*;

            match tracing_android::layer("WaveMaker") {
                Ok(layer) => {
                    let _ = tracing_subscriber::registry()
                        .with(layer)
                        .with(LevelFilter::from_level(level))
                        .try_init();
                }
                Err(err) => eprintln!("Failed to create Android log layer: {}", err),
            }
        } else {
            let _ = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_thread_names(true)
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(tracing::Level::DEBUG);
        init_logging(tracing::Level::INFO);
        log::info!("logging initialized twice without panicking");
    }
}
