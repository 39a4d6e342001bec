use std::sync::Arc;

use super::{AcquireJob, AcquireOutcome, CameraDevice, CameraStatus, FacingMode, VideoStream};
use crate::error::FlowError;
use crate::frame::CapturedImage;

/// How an acquisition outcome was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartResolution {
    Ready,
    Unavailable,
    /// The session was stopped or restarted after the request went out. Any stream
    /// in the outcome has already been released.
    Stale,
}

/// Owns at most one live stream from a camera device.
///
/// Status machine: `Uninitialized -> Initializing -> {Ready | Unavailable}`;
/// `stop()` returns to `Uninitialized` from anywhere. Every `start()` and `stop()`
/// bumps the epoch so outcomes for older requests are recognised as stale.
///
/// The stream is released on `stop()` and on drop, whichever comes first.
pub struct CameraSession {
    device: Arc<dyn CameraDevice>,
    facing: FacingMode,
    jpeg_quality: u8,
    stream: Option<Box<dyn VideoStream>>,
    status: CameraStatus,
    epoch: u64,
    last_error: Option<String>,
}

impl CameraSession {
    pub fn new(device: Arc<dyn CameraDevice>, facing: FacingMode, jpeg_quality: u8) -> Self {
        Self {
            device,
            facing,
            jpeg_quality,
            stream: None,
            status: CameraStatus::Uninitialized,
            epoch: 0,
            last_error: None,
        }
    }

    /// Request a stream. Any stream still held is released first.
    pub fn start(&mut self) -> AcquireJob {
        self.release();
        self.epoch += 1;
        self.status = CameraStatus::Initializing;
        self.last_error = None;
        log::info!(
            "CameraSession: requesting {:?} stream from {} (epoch {})",
            self.facing,
            self.device.name(),
            self.epoch
        );
        AcquireJob::new(self.epoch, self.facing, Arc::clone(&self.device))
    }

    /// Apply the outcome of an earlier `start()`.
    pub fn complete_start(&mut self, outcome: AcquireOutcome) -> StartResolution {
        if outcome.epoch != self.epoch || self.status != CameraStatus::Initializing {
            if let Ok(mut stream) = outcome.result {
                stream.stop_tracks();
            }
            log::debug!(
                "CameraSession: discarding stale acquisition (epoch {}, current {})",
                outcome.epoch,
                self.epoch
            );
            return StartResolution::Stale;
        }
        match outcome.result {
            Ok(stream) => {
                let (width, height) = stream.resolution();
                self.stream = Some(stream);
                self.status = CameraStatus::Ready;
                log::info!(
                    "CameraSession: live preview bound ({}x{}, epoch {})",
                    width,
                    height,
                    self.epoch
                );
                StartResolution::Ready
            }
            Err(err) => {
                log::warn!("CameraSession: {} unavailable: {}", self.device.name(), err);
                self.last_error = Some(err.to_string());
                self.status = CameraStatus::Unavailable;
                StartResolution::Unavailable
            }
        }
    }

    /// Release the stream if one is held. Safe to call any number of times.
    pub fn stop(&mut self) {
        self.release();
        self.epoch += 1;
        self.status = CameraStatus::Uninitialized;
    }

    /// Freeze the current live frame into a `CapturedImage`.
    ///
    /// Does not stop the stream; the caller pairs this with `stop()`.
    pub fn capture_frame(&mut self) -> Result<CapturedImage, FlowError> {
        match self.status {
            CameraStatus::Ready => {}
            CameraStatus::Unavailable => return Err(FlowError::CameraUnavailable),
            CameraStatus::Uninitialized | CameraStatus::Initializing => {
                return Err(FlowError::CameraNotReady)
            }
        }
        let stream = self.stream.as_mut().ok_or(FlowError::CameraNotReady)?;
        let frame = stream
            .read_frame()
            .map_err(|err| FlowError::CaptureFailed(format!("{:#}", err)))?;
        CapturedImage::encode(&frame, self.jpeg_quality)
            .map_err(|err| FlowError::CaptureFailed(format!("{:#}", err)))
    }

    pub fn status(&self) -> CameraStatus {
        self.status
    }

    pub fn status_message(&self) -> &'static str {
        self.status.message()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Tracks held by the current stream (0 when no stream is held).
    pub fn held_tracks(&self) -> usize {
        self.stream.as_ref().map(|stream| stream.tracks()).unwrap_or(0)
    }

    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.stream.as_ref().map(|stream| stream.resolution())
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            log::info!(
                "CameraSession: released stream from {} (epoch {})",
                self.device.name(),
                self.epoch
            );
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
