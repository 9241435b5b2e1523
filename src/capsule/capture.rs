use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::model::{PreviewImage, WindowId};
use crate::sys::geometry::Rect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub window: WindowId,
    /// Content region in desktop coordinates (below the titlebar).
    pub region: Rect,
    pub title: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no capture backend available")]
    Unavailable,
    #[error("capture failed: {0}")]
    Failed(String),
    #[error("capture task panicked")]
    Panicked,
}

pub type CaptureFuture = Pin<Box<dyn Future<Output = Result<PreviewImage, CaptureError>> + Send>>;

/// Renders a window's content region into an image. Implementations are shared
/// with the tokio tasks that run captures, hence `Send + Sync`.
pub trait CaptureBackend: Send + Sync {
    /// Forces content that is normally hidden (minimized windows) to render.
    fn set_content_visible(&self, window: WindowId, visible: bool);

    fn capture(&self, request: CaptureRequest) -> CaptureFuture;
}

/// Backend for hosts without screenshot support. Every capture fails, which
/// makes capsules fall back to the cached image or the placeholder.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCaptureBackend;

impl CaptureBackend for NullCaptureBackend {
    fn set_content_visible(&self, _window: WindowId, _visible: bool) {}

    fn capture(&self, _request: CaptureRequest) -> CaptureFuture {
        Box::pin(async { Err(CaptureError::Unavailable) })
    }
}

/// Headless backend that fills the region with a colour derived from the
/// title. Used by `shellwm replay`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticCaptureBackend;

impl CaptureBackend for SyntheticCaptureBackend {
    fn set_content_visible(&self, _window: WindowId, _visible: bool) {}

    fn capture(&self, request: CaptureRequest) -> CaptureFuture {
        Box::pin(async move {
            let width = u32::try_from(request.region.width.max(1)).unwrap_or(1).min(64);
            let height = u32::try_from(request.region.height.max(1)).unwrap_or(1).min(64);
            let seed = request.title.bytes().fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(u32::from(b)));
            let pixel = seed.to_be_bytes();
            let data = pixel.repeat((width * height) as usize);
            Ok(PreviewImage::Bitmap { width, height, data })
        })
    }
}

/// Keeps hidden content visible for as long as it lives. Dropping it (after
/// completion, on error, on panic unwinding, or when the task is aborted)
/// hides the content again.
pub struct VisibilityGuard {
    backend: Arc<dyn CaptureBackend>,
    window: WindowId,
}

impl VisibilityGuard {
    pub fn force(backend: Arc<dyn CaptureBackend>, window: WindowId) -> Self {
        trace!(?window, "forcing content visible for capture");
        backend.set_content_visible(window, true);
        Self { backend, window }
    }
}

impl Drop for VisibilityGuard {
    fn drop(&mut self) {
        trace!(window = ?self.window, "restoring content visibility");
        self.backend.set_content_visible(self.window, false);
    }
}

/// The body of a capture task.
pub async fn run_capture(
    backend: Arc<dyn CaptureBackend>,
    request: CaptureRequest,
    force_visible: bool,
) -> Result<PreviewImage, CaptureError> {
    let window = request.window;
    let _guard = force_visible.then(|| VisibilityGuard::force(backend.clone(), window));
    let result = backend.capture(request).await;
    if let Err(e) = &result {
        debug!(?window, %e, "capture failed");
    }
    result
}
