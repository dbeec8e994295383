// Error types for the wavemaker audio engine
//
// This module defines the engine's error type, providing structured error
// handling with error codes suitable for reporting across the JNI boundary.

mod audio;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the FFI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
