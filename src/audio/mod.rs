// Audio module - tone rendering and output stream lifecycle

pub mod engine;
pub mod oscillator;
pub mod recovery;

// Re-export commonly used types for convenience
pub use engine::{EngineEvent, EngineState, RestartOutcome, StreamEngine};
pub use oscillator::{Oscillator, OscillatorHandle, DEFAULT_AMPLITUDE, DEFAULT_FREQUENCY_HZ};
pub use recovery::{RecoveryExecutor, RestartGuard};
