use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the ambient plumbing around the decoder: ports, sockets, files.
/// The decoder and state model themselves never fail.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to open serial port {port}: {reason}")]
    SerialOpen { port: String, reason: String },
    #[error("failed to bind UDP socket: {0}")]
    Socket(#[source] io::Error),
    #[error("OSC encode failed: {0}")]
    OscEncode(String),
    #[error("session file {path:?}: {source}")]
    SessionFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
