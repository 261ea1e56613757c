//! services/gallery/src/adapters/camera.rs
//!
//! A virtual camera implementing the `CaptureDevice` port. Every frame it
//! produces is the same still image, loaded from disk or supplied directly.
//! Like a real device it hands out at most one stream at a time.

use async_trait::async_trait;
use lecture_gallery_core::domain::{FacingMode, Frame, StreamConstraints};
use lecture_gallery_core::ports::{CaptureDevice, MediaStream, PortError, PortResult};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub struct StillFrameCamera {
    label: String,
    frame: Option<Frame>,
    streaming: Arc<AtomicBool>,
    acquisitions: Arc<AtomicUsize>,
}

impl StillFrameCamera {
    pub fn new(label: impl Into<String>, frame: Frame) -> Self {
        Self {
            label: label.into(),
            frame: Some(frame),
            streaming: Arc::new(AtomicBool::new(false)),
            acquisitions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A platform without any capture capability.
    pub fn unavailable() -> Self {
        Self {
            label: "none".to_string(),
            frame: None,
            streaming: Arc::new(AtomicBool::new(false)),
            acquisitions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Serves the image at `path` as the camera's view.
    pub fn from_file(path: &Path) -> PortResult<Self> {
        let image = image::open(path).map_err(|e| {
            PortError::DeviceError(format!("cannot load camera source {}: {}", path.display(), e))
        })?;
        let rgba = image.to_rgba8();
        let frame = Frame {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        };
        info!(
            "Virtual camera loaded {} ({}x{}).",
            path.display(),
            frame.width,
            frame.height
        );
        Ok(Self::new(path.display().to_string(), frame))
    }

    /// Whether a stream is currently held.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// How many streams have been handed out in total.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for StillFrameCamera {
    fn is_supported(&self) -> bool {
        self.frame.is_some()
    }

    async fn acquire(&self, constraints: StreamConstraints) -> PortResult<Box<dyn MediaStream>> {
        let frame = self.frame.clone().ok_or(PortError::DeviceUnavailable)?;
        if !constraints.video {
            return Err(PortError::DeviceError("a video track is required".to_string()));
        }
        if self.streaming.swap(true, Ordering::SeqCst) {
            return Err(PortError::DeviceBusy);
        }
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if constraints.facing != FacingMode::Environment {
            debug!("Virtual camera has a single lens; ignoring {:?}.", constraints.facing);
        }

        Ok(Box::new(StillFrameStream {
            label: self.label.clone(),
            frame,
            streaming: self.streaming.clone(),
            live: true,
        }))
    }
}

struct StillFrameStream {
    label: String,
    frame: Frame,
    streaming: Arc<AtomicBool>,
    live: bool,
}

impl MediaStream for StillFrameStream {
    fn label(&self) -> &str {
        &self.label
    }

    fn frame(&mut self) -> PortResult<Frame> {
        if !self.live {
            return Err(PortError::DeviceError("stream has been stopped".to_string()));
        }
        Ok(self.frame.clone())
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.streaming.store(false, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

impl Drop for StillFrameStream {
    fn drop(&mut self) {
        self.stop();
    }
}
