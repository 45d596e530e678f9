use std::path::PathBuf;

/// Core error type for the printer monitor.
///
/// Adapter crates map their library errors (nokhwa, image, teloxide) into this
/// type so the monitoring loop can handle every failure of a cycle the same way.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("camera error: {0}")]
    Device(String),

    #[error("archive error: {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("logging error: {0}")]
    Logging(String),
}

impl Error {
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
