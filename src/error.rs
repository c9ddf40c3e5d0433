use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::host::Characteristic;
use crate::types::Side;

/// Errors are `Clone` so a coalesced call can hand the same failure to
/// every caller that joined it.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[source] Arc<reqwest::Error>),

    #[error("unexpected HTTP status {status} from {path} (expected {expected})")]
    UnexpectedStatus {
        path: String,
        status: u16,
        expected: u16,
    },

    #[error("invalid device status for side {side}")]
    InvalidStatus { device_status: Value, side: Side },

    #[error("JSON error: {0}")]
    Json(#[source] Arc<serde_json::Error>),

    #[error("IO error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("characteristic {0} is not supported by this accessory")]
    UnsupportedCharacteristic(Characteristic),

    #[error("invalid value for {characteristic}: {value}")]
    InvalidValue {
        characteristic: Characteristic,
        value: String,
    },
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(Arc::new(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(Arc::new(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
