// src/core/services/screenshot.rs

use crate::core::models::ScreenshotArtifact;

/// Contract of the screenshot-capture collaborator (a browser driver owned
/// by the host application).
///
/// Capture is a pure side channel: the orchestrator runs it best-effort on a
/// blocking worker and joins it with a generous timeout, and its outcome is
/// reported beside the scan result without ever touching the score.
pub trait ScreenshotCapture: Send + Sync {
    /// Captures the target across the driver's configured devices. Expected
    /// to be total: failed captures come back as artifacts with
    /// `success = false`.
    fn capture(&self, url: &str) -> Vec<ScreenshotArtifact>;
}
