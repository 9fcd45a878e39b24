//! Error types shared across Altimeter crates.

use std::path::PathBuf;

/// Media kind a permission request was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionKind {
    Camera,
    Microphone,
}

impl std::fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionKind::Camera => write!(f, "camera"),
            PermissionKind::Microphone => write!(f, "microphone"),
        }
    }
}

/// Top-level error type for Altimeter operations.
///
/// Nothing on the real-time frame path returns one of these. Frame drops
/// are counted, not reported, and writer failures only surface when a
/// recording is finalized.
#[derive(Debug, thiserror::Error)]
pub enum AltimeterError {
    #[error("Permission denied: {media} access was not granted")]
    PermissionDenied { media: PermissionKind },

    #[error("Device unavailable: {message}")]
    DeviceUnavailable { message: String },

    #[error("Configuration failed: {message}")]
    Configuration { message: String },

    #[error("Writer error: {message}")]
    Writer { message: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Configuration file error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using AltimeterError.
pub type AltimeterResult<T> = Result<T, AltimeterError>;

impl AltimeterError {
    pub fn permission_denied(media: PermissionKind) -> Self {
        Self::PermissionDenied { media }
    }

    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: msg.into(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    pub fn writer(msg: impl Into<String>) -> Self {
        Self::Writer {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this failure leaves the caller's session usable.
    ///
    /// Only I/O and unexpected internal errors are treated as fatal; every
    /// member of the capture taxonomy degrades to a flag, a fallback, or a
    /// completion value.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Other(_))
    }
}
