//! services/gallery/src/gallery/capture.rs
//!
//! The capture device controller. It owns at most one live camera stream,
//! shows it on a preview surface and turns the current frame into an
//! encoded still on demand.

use crate::gallery::encoder::Encoder;
use lecture_gallery_core::domain::{EncodedImage, StreamConstraints};
use lecture_gallery_core::ports::{CaptureDevice, MediaStream, PortError, PortResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Where a capture session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Requesting,
    Live,
    Capturing,
}

/// How a successful `open` call ended.
#[derive(Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The stream is attached to the preview surface.
    Live,
    /// The session was closed while the device was still being acquired; the
    /// stream was released as soon as it arrived.
    Abandoned,
}

/// The surface a live stream is rendered on.
#[derive(Debug, Default)]
pub struct PreviewSurface {
    source: Option<String>,
}

impl PreviewSurface {
    fn attach(&mut self, label: &str) {
        self.source = Some(label.to_string());
    }

    fn detach(&mut self) {
        self.source = None;
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

struct Session {
    state: CaptureState,
    stream: Option<Box<dyn MediaStream>>,
    preview: PreviewSurface,
    /// Bumped by every `open` and `close`; an acquisition that resolves under a
    /// different generation has been abandoned.
    generation: u64,
    acquiring: bool,
    last_error: Option<String>,
}

/// Exclusive owner of the camera stream.
pub struct CaptureController {
    device: Arc<dyn CaptureDevice>,
    encoder: Encoder,
    session: Mutex<Session>,
}

impl CaptureController {
    pub fn new(device: Arc<dyn CaptureDevice>, encoder: Encoder) -> Self {
        Self {
            device,
            encoder,
            session: Mutex::new(Session {
                state: CaptureState::Idle,
                stream: None,
                preview: PreviewSurface::default(),
                generation: 0,
                acquiring: false,
                last_error: None,
            }),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.session.lock().state
    }

    /// True while a hardware stream is held.
    pub fn is_active(&self) -> bool {
        self.session.lock().stream.is_some()
    }

    /// The label of the stream currently shown on the preview surface.
    pub fn preview_source(&self) -> Option<String> {
        self.session.lock().preview.source().map(str::to_string)
    }

    /// The last device or encoding failure, shown next to the capture control.
    pub fn last_error(&self) -> Option<String> {
        self.session.lock().last_error.clone()
    }

    /// Requests a rear-facing, video-only stream and attaches it to the preview.
    ///
    /// Fails fast with `DeviceBusy` while another session is open or still
    /// being acquired.
    pub async fn open(&self) -> PortResult<OpenOutcome> {
        let generation = {
            let mut session = self.session.lock();
            if session.state != CaptureState::Idle || session.acquiring {
                session.last_error = Some(PortError::DeviceBusy.to_string());
                return Err(PortError::DeviceBusy);
            }
            session.last_error = None;
            if !self.device.is_supported() {
                session.last_error = Some(PortError::DeviceUnavailable.to_string());
                return Err(PortError::DeviceUnavailable);
            }
            session.generation += 1;
            session.state = CaptureState::Requesting;
            session.acquiring = true;
            session.generation
        };

        let guard = AcquireGuard {
            session: &self.session,
            generation,
            armed: true,
        };
        let acquired = self.device.acquire(StreamConstraints::rear_camera()).await;

        let mut session = self.session.lock();
        guard.disarm();
        session.acquiring = false;
        let mut stream = match acquired {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Camera acquisition failed: {}", e);
                if session.generation == generation {
                    session.state = CaptureState::Idle;
                }
                session.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        if session.generation != generation {
            info!(
                "Capture session closed during acquisition; releasing '{}'.",
                stream.label()
            );
            stream.stop();
            return Ok(OpenOutcome::Abandoned);
        }

        session.preview.attach(stream.label());
        info!("Camera '{}' is live.", stream.label());
        session.stream = Some(stream);
        session.state = CaptureState::Live;
        Ok(OpenOutcome::Live)
    }

    /// Reads the current frame and encodes it. Valid only while `Live`; the
    /// session stays open.
    pub fn capture(&self) -> PortResult<EncodedImage> {
        let frame = {
            let mut session = self.session.lock();
            if session.state != CaptureState::Live {
                let err = PortError::DeviceError(format!(
                    "cannot capture while the camera is {:?}",
                    session.state
                ));
                session.last_error = Some(err.to_string());
                return Err(err);
            }
            session.state = CaptureState::Capturing;
            let frame = match session.stream.as_mut() {
                Some(stream) => stream.frame(),
                None => Err(PortError::DeviceError("no stream attached".to_string())),
            };
            session.state = CaptureState::Live;
            frame
        };

        let encoded = frame.and_then(|frame| self.encoder.encode_frame(frame));
        if let Err(e) = &encoded {
            self.session.lock().last_error = Some(e.to_string());
        }
        encoded
    }

    /// Captures a still and always ends the session, whatever the outcome.
    pub fn capture_and_close(&self) -> PortResult<EncodedImage> {
        let encoded = self.capture();
        self.close();
        encoded
    }

    /// Stops every track, detaches the preview and returns to `Idle`.
    /// Calling it on an idle controller does nothing.
    pub fn close(&self) {
        let mut session = self.session.lock();
        if session.state == CaptureState::Idle && session.stream.is_none() {
            return;
        }
        session.generation += 1;
        if let Some(mut stream) = session.stream.take() {
            stream.stop();
            info!("Camera '{}' released.", stream.label());
        }
        session.preview.detach();
        session.state = CaptureState::Idle;
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.close();
    }
}

/// Clears the in-flight marker even if the `open` future is dropped mid-acquisition.
struct AcquireGuard<'a> {
    session: &'a Mutex<Session>,
    generation: u64,
    armed: bool,
}

impl AcquireGuard<'_> {
    /// Called with the session lock already held.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AcquireGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut session = self.session.lock();
        session.acquiring = false;
        if session.generation == self.generation && session.state == CaptureState::Requesting {
            session.state = CaptureState::Idle;
        }
    }
}
