use std::path::Path;

use async_trait::async_trait;

use crate::{domain::CapturedImage, Result};

/// Hexagonal port for the camera.
///
/// Implementations acquire the device for the duration of one call and release
/// it before returning; nothing stays open between cycles.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Grab a single still frame. Failures are `Error::Device`.
    async fn capture(&self) -> Result<CapturedImage>;
}

/// Hexagonal port for outbound messaging.
///
/// The destination is fixed when the implementation is built. Failures are
/// `Error::Delivery`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_photo(&self, path: &Path, caption: &str) -> Result<()>;

    /// Text-only message, used to report a failed cycle.
    async fn send_text(&self, text: &str) -> Result<()>;
}
