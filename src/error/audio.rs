// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes reported through logs and
/// engine events.
///
/// Error code range: 1001-1012
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Device stream could not be created with the requested configuration
    pub const STREAM_OPEN_FAILED: i32 = 1001;

    /// Stream opened but failed to begin running
    pub const STREAM_START_FAILED: i32 = 1002;

    /// Stop request on a stream failed
    pub const STREAM_STOP_FAILED: i32 = 1003;

    /// Closing a stream failed
    pub const STREAM_CLOSE_FAILED: i32 = 1004;

    /// Output device disconnected while the stream was active
    pub const DEVICE_DISCONNECTED: i32 = 1005;

    /// Engine already owns a running stream
    pub const ALREADY_RUNNING: i32 = 1006;

    /// Hardware or OS-level failure outside the stream lifecycle
    pub const HARDWARE_ERROR: i32 = 1007;

    /// Mutex was poisoned
    pub const LOCK_POISONED: i32 = 1008;

    /// Backend does not support the requested operation
    pub const UNSUPPORTED: i32 = 1009;

    /// Configuration values are out of range
    pub const INVALID_CONFIG: i32 = 1010;

    /// Recovery runtime could not be created
    pub const RUNTIME_UNAVAILABLE: i32 = 1011;

    /// JNI initialization failed on Android
    pub const JNI_INIT_FAILED: i32 = 1012;
}

/// Log an audio error with structured context
///
/// Logs the numeric code, the component, and the human-readable message
/// together with the call site that observed the error.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=StreamEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover stream lifecycle operations, device faults and the
/// ambient plumbing (config, runtime, JNI) around the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Device stream could not be created with the requested configuration
    StreamOpenFailed { reason: String },

    /// Stream opened but failed to begin running
    StreamStartFailed { reason: String },

    /// Stop request on a stream failed
    StreamStopFailed { reason: String },

    /// Closing a stream failed
    StreamCloseFailed { reason: String },

    /// Output device disconnected while the stream was active
    DeviceDisconnected,

    /// Engine already owns a running stream
    AlreadyRunning,

    /// Hardware or OS-level failure outside the stream lifecycle
    HardwareError { details: String },

    /// Mutex was poisoned
    LockPoisoned { component: String },

    /// Backend does not support the requested operation
    Unsupported { operation: String },

    /// Configuration values are out of range
    InvalidConfig { reason: String },

    /// Recovery runtime could not be created
    RuntimeUnavailable { reason: String },

    /// JNI initialization failed on Android
    JniInitFailed { reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::StreamStartFailed { .. } => AudioErrorCodes::STREAM_START_FAILED,
            AudioError::StreamStopFailed { .. } => AudioErrorCodes::STREAM_STOP_FAILED,
            AudioError::StreamCloseFailed { .. } => AudioErrorCodes::STREAM_CLOSE_FAILED,
            AudioError::DeviceDisconnected => AudioErrorCodes::DEVICE_DISCONNECTED,
            AudioError::AlreadyRunning => AudioErrorCodes::ALREADY_RUNNING,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            AudioError::Unsupported { .. } => AudioErrorCodes::UNSUPPORTED,
            AudioError::InvalidConfig { .. } => AudioErrorCodes::INVALID_CONFIG,
            AudioError::RuntimeUnavailable { .. } => AudioErrorCodes::RUNTIME_UNAVAILABLE,
            AudioError::JniInitFailed { .. } => AudioErrorCodes::JNI_INIT_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::StreamStartFailed { reason } => {
                format!("Failed to start audio stream: {}", reason)
            }
            AudioError::StreamStopFailed { reason } => {
                format!("Failed to stop audio stream: {}", reason)
            }
            AudioError::StreamCloseFailed { reason } => {
                format!("Failed to close audio stream: {}", reason)
            }
            AudioError::DeviceDisconnected => "Audio output device disconnected".to_string(),
            AudioError::AlreadyRunning => {
                "Stream engine already running. Call stop() first.".to_string()
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            AudioError::Unsupported { operation } => {
                format!("Operation not supported by this backend: {}", operation)
            }
            AudioError::InvalidConfig { reason } => {
                format!("Invalid configuration: {}", reason)
            }
            AudioError::RuntimeUnavailable { reason } => {
                format!("Recovery runtime unavailable: {}", reason)
            }
            AudioError::JniInitFailed { reason } => {
                format!("JNI initialization failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::StreamOpenFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::STREAM_OPEN_FAILED
        );
        assert_eq!(
            AudioError::StreamStartFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::STREAM_START_FAILED
        );
        assert_eq!(
            AudioError::DeviceDisconnected.code(),
            AudioErrorCodes::DEVICE_DISCONNECTED
        );
        assert_eq!(
            AudioError::AlreadyRunning.code(),
            AudioErrorCodes::ALREADY_RUNNING
        );
        assert_eq!(
            AudioError::LockPoisoned {
                component: "test".to_string()
            }
            .code(),
            AudioErrorCodes::LOCK_POISONED
        );
        assert_eq!(
            AudioError::Unsupported {
                operation: "test".to_string()
            }
            .code(),
            AudioErrorCodes::UNSUPPORTED
        );
        assert_eq!(
            AudioError::JniInitFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::JNI_INIT_FAILED
        );
    }

    #[test]
    fn test_codes_are_unique_and_in_range() {
        let codes = [
            AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioErrorCodes::STREAM_START_FAILED,
            AudioErrorCodes::STREAM_STOP_FAILED,
            AudioErrorCodes::STREAM_CLOSE_FAILED,
            AudioErrorCodes::DEVICE_DISCONNECTED,
            AudioErrorCodes::ALREADY_RUNNING,
            AudioErrorCodes::HARDWARE_ERROR,
            AudioErrorCodes::LOCK_POISONED,
            AudioErrorCodes::UNSUPPORTED,
            AudioErrorCodes::INVALID_CONFIG,
            AudioErrorCodes::RUNTIME_UNAVAILABLE,
            AudioErrorCodes::JNI_INIT_FAILED,
        ];
        for (i, code) in codes.iter().enumerate() {
            assert_eq!(*code, 1001 + i as i32);
        }
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::StreamOpenFailed {
            reason: "no device".to_string(),
        };
        assert_eq!(err.message(), "Failed to open audio stream: no device");

        let err = AudioError::AlreadyRunning;
        assert!(err.message().contains("already running"));

        let err = AudioError::DeviceDisconnected;
        assert!(err.message().contains("disconnected"));
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::StreamStartFailed {
            reason: "busy".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("AudioError"));
        assert!(display.contains(&err.code().to_string()));
        assert!(display.contains("busy"));
    }
}
