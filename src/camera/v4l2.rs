//! V4L2 camera device.
//!
//! Kiosk tablets running Linux expose the rear camera as a local device node
//! (e.g. /dev/video0). This backend:
//! - Opens the node and negotiates an RGB3 format near the configured size
//! - Maps capture buffers for the lifetime of one stream
//! - Reads frames in-memory only
//!
//! Facing mode cannot be negotiated over V4L2; the configured node is assumed to be
//! the rear camera.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::io::ErrorKind;

use super::{CameraDevice, FacingMode, VideoStream};
use crate::error::AcquireError;
use crate::frame::LiveFrame;

/// Configuration for a V4L2 device.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 30,
            width: 1280,
            height: 720,
        }
    }
}

pub struct V4l2Camera {
    config: V4l2Config,
}

impl V4l2Camera {
    pub fn new(config: V4l2Config) -> Self {
        Self { config }
    }

    fn open(&self) -> Result<V4l2Stream, AcquireError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device).map_err(|err| {
            match err.kind() {
                ErrorKind::PermissionDenied => AcquireError::PermissionDenied,
                ErrorKind::NotFound => AcquireError::NoDevice(self.config.device.clone()),
                _ => AcquireError::Backend(format!(
                    "open v4l2 device {}: {}",
                    self.config.device, err
                )),
            }
        })?;
        let backend = |context: &str, err: std::io::Error| {
            AcquireError::Backend(format!("{} on {}: {}", context, self.config.device, err))
        };

        let mut format = device
            .format()
            .map_err(|err| backend("read v4l2 format", err))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Camera: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .map_err(|err| backend("read v4l2 format after set failure", err))?
            }
        };
        if format.fourcc != v4l::FourCC::new(b"RGB3") {
            return Err(AcquireError::Backend(format!(
                "{} does not support RGB3 capture",
                self.config.device
            )));
        }

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Camera: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        let state = V4l2StreamStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| backend("create v4l2 buffer stream", err))
            },
        }
        .try_build()?;

        log::info!(
            "V4l2Camera: streaming from {} ({}x{})",
            self.config.device,
            format.width,
            format.height
        );
        Ok(V4l2Stream {
            state: Some(state),
            width: format.width,
            height: format.height,
            device: self.config.device.clone(),
        })
    }
}

impl CameraDevice for V4l2Camera {
    fn name(&self) -> &str {
        &self.config.device
    }

    fn acquire(&self, facing: FacingMode) -> Result<Box<dyn VideoStream>, AcquireError> {
        if facing != FacingMode::Environment {
            log::debug!(
                "V4l2Camera: facing mode {:?} ignored for {}",
                facing,
                self.config.device
            );
        }
        Ok(Box::new(self.open()?))
    }
}

#[self_referencing]
struct V4l2StreamState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

struct V4l2Stream {
    state: Option<V4l2StreamState>,
    width: u32,
    height: u32,
    device: String,
}

impl VideoStream for V4l2Stream {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_frame(&mut self) -> Result<LiveFrame> {
        use v4l::io::traits::CaptureStream;

        let state = self
            .state
            .as_mut()
            .ok_or_else(|| anyhow!("v4l2 stream on {} already stopped", self.device))?;
        let pixels = state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .context("capture v4l2 frame")?;
        LiveFrame::new(pixels, self.width, self.height)
    }

    fn tracks(&self) -> usize {
        usize::from(self.state.is_some())
    }

    fn stop_tracks(&mut self) {
        if self.state.take().is_some() {
            log::info!("V4l2Camera: stream on {} stopped", self.device);
        }
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}
