//! Error types for the display appliance core.

use std::path::PathBuf;

/// Errors raised while talking to a market data provider.
///
/// The cache layer absorbs these; they never reach the render loop.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be sent, timed out, or its body failed to decode.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// The response decoded but did not contain what was asked for.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Errors raised while reading or writing the settings file.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The settings file holds JSON that is not an object.
    #[error("Settings file does not contain a JSON object")]
    NotAnObject,
}

/// Errors raised while building the frames of a mode.
///
/// The mode registry replaces a failed build with an error frame.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// An animation asset could not be opened.
    #[error("Failed to open {path}: {source}")]
    Asset {
        /// The asset path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An animation asset could not be decoded.
    #[error("Failed to decode animation: {0}")]
    Decode(#[from] image::ImageError),

    /// An animation decoded to zero frames.
    #[error("Animation {0} has no frames")]
    EmptyClip(String),

    /// A frame sequence was built with no frames.
    #[error("Frame sequence must not be empty")]
    EmptySequence,

    /// The QR code could not be encoded.
    #[error("QR encoding failed: {0}")]
    Qr(String),

    /// The data needed by the visual is missing.
    #[error("Not enough data: {0}")]
    MissingData(&'static str),
}

/// Errors raised by display, LED, button and platform actuators.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// An I/O error from a device node or a spawned command.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The device rejected the request.
    #[error("Device error: {0}")]
    Device(String),
}

/// Fatal errors that stop the render loop.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A display or actuator call failed.
    #[error("Hardware failure: {0}")]
    Hardware(#[from] HardwareError),

    /// The loop panicked.
    #[error("Render loop panicked: {0}")]
    Panicked(String),
}
