//! Error handling for datalog-rs
//!
//! This module defines the crate error type and a Result alias used by the
//! acquisition and playback pipelines.

use thiserror::Error;

/// Main error type for datalog-rs operations
#[derive(Error, Debug)]
pub enum DataLogError {
    /// Errors related to configuration loading/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors opening or talking to a serial transport
    #[error("Transport error on {port}: {message}")]
    Transport { port: String, message: String },

    /// The instrument did not answer in time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Malformed or unexpected response frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Errors appending rows to the durable log
    #[error("Persist error for {path}: {message}")]
    Persist { path: String, message: String },

    /// Errors loading a log for playback
    #[error("Load error: {0}")]
    Load(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding/decoding errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DataLogError>,
    },
}

impl DataLogError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DataLogError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a transport error for a port
    pub fn transport(port: impl Into<String>, message: impl ToString) -> Self {
        DataLogError::Transport {
            port: port.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error is a timeout, looking through any context wrappers
    pub fn is_timeout(&self) -> bool {
        match self {
            DataLogError::Timeout(_) => true,
            DataLogError::WithContext { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// Result type alias for datalog-rs operations
pub type Result<T> = std::result::Result<T, DataLogError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DataLogError::Config("no channels configured".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: no channels configured"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = DataLogError::Load("empty".to_string());
        let with_ctx = err.with_context("Failed to open log");
        assert!(with_ctx.to_string().contains("Failed to open log"));
    }

    #[test]
    fn test_transport_error() {
        let err = DataLogError::transport("/dev/ttyUSB0", "device busy");
        assert!(err.to_string().contains("/dev/ttyUSB0"));
        assert!(err.to_string().contains("device busy"));
    }

    #[test]
    fn test_timeout_through_context() {
        let err = DataLogError::Timeout("no reply".into()).with_context("unit 2");
        assert!(err.is_timeout());
        assert!(!DataLogError::Protocol("bad crc".into()).is_timeout());
    }
}
