//! Device camera access.
//!
//! This module provides the camera collaborator the kiosk flow talks to:
//! - `CameraDevice`: accepts a facing-mode preference and hands back a live stream
//!   or a denial
//! - `VideoStream`: an exclusively owned stream whose tracks can be enumerated and
//!   stopped
//! - `CameraSession`: the status machine wrapped around one device
//!
//! Backends:
//! - Synthetic source (`stub://...`, testing and demos)
//! - USB/V4L2 devices (feature: camera-v4l2)
//!
//! Acquisition may block on real hardware, so it is issued as an `AcquireJob` that the
//! runtime executes off the controller thread. The outcome comes back tagged with the
//! session epoch it was issued under; the session drops outcomes from older epochs.

mod session;
pub mod synthetic;
#[cfg(feature = "camera-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::CameraSettings;
use crate::error::AcquireError;
use crate::frame::LiveFrame;

pub use session::{CameraSession, StartResolution};
pub use synthetic::SyntheticCamera;
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Camera;

/// Which way the requested camera should face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointed away from the guest's screen.
    #[default]
    Environment,
    User,
}

impl FromStr for FacingMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "environment" | "rear" => Ok(FacingMode::Environment),
            "user" | "front" => Ok(FacingMode::User),
            other => Err(anyhow!("unknown facing mode '{}'", other)),
        }
    }
}

/// Camera status as shown next to the preview.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum CameraStatus {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Unavailable,
}

impl CameraStatus {
    pub fn message(&self) -> &'static str {
        match self {
            CameraStatus::Uninitialized => "Camera off.",
            CameraStatus::Initializing => "Camera initializing...",
            CameraStatus::Ready => "Camera ready. Frame the hair, then tap Capture.",
            CameraStatus::Unavailable => "Camera unavailable. Please check permissions.",
        }
    }
}

/// A live stream handed out by a `CameraDevice`.
///
/// Implementations must release their tracks in `stop_tracks` and again on drop.
pub trait VideoStream: Send {
    /// Native resolution of the stream.
    fn resolution(&self) -> (u32, u32);

    /// Read the frame currently shown in the live preview.
    fn read_frame(&mut self) -> Result<LiveFrame>;

    /// Number of tracks still held.
    fn tracks(&self) -> usize;

    /// Stop every held track. Calling this twice is a no-op.
    fn stop_tracks(&mut self);
}

/// Host camera API.
pub trait CameraDevice: Send + Sync {
    fn name(&self) -> &str;

    fn acquire(&self, facing: FacingMode) -> Result<Box<dyn VideoStream>, AcquireError>;
}

/// Pending acquisition request.
///
/// Produced by `CameraSession::start`; `run` performs the blocking device call and
/// may be executed on any thread.
pub struct AcquireJob {
    pub epoch: u64,
    pub facing: FacingMode,
    device: Arc<dyn CameraDevice>,
}

impl AcquireJob {
    pub(crate) fn new(epoch: u64, facing: FacingMode, device: Arc<dyn CameraDevice>) -> Self {
        Self {
            epoch,
            facing,
            device,
        }
    }

    pub fn run(self) -> AcquireOutcome {
        let result = self.device.acquire(self.facing);
        AcquireOutcome {
            epoch: self.epoch,
            result,
        }
    }
}

impl std::fmt::Debug for AcquireJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquireJob")
            .field("epoch", &self.epoch)
            .field("facing", &self.facing)
            .field("device", &self.device.name())
            .finish()
    }
}

/// Completed acquisition, delivered back to the owning `CameraSession`.
pub struct AcquireOutcome {
    pub epoch: u64,
    pub result: Result<Box<dyn VideoStream>, AcquireError>,
}

/// Open the configured camera device.
///
/// `stub://` URLs select the synthetic backend. Anything else is treated as a device
/// node and requires the camera-v4l2 feature.
pub fn open_device(settings: &CameraSettings) -> Result<Arc<dyn CameraDevice>> {
    if settings.device.starts_with("stub://") {
        return Ok(Arc::new(SyntheticCamera::new(
            &settings.device,
            settings.width,
            settings.height,
        )));
    }
    #[cfg(feature = "camera-v4l2")]
    {
        Ok(Arc::new(V4l2Camera::new(v4l2::V4l2Config {
            device: settings.device.clone(),
            target_fps: settings.target_fps,
            width: settings.width,
            height: settings.height,
        })))
    }
    #[cfg(not(feature = "camera-v4l2"))]
    {
        Err(anyhow!(
            "camera device {} requires the camera-v4l2 feature",
            settings.device
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_mode_parses_aliases() {
        assert_eq!("rear".parse::<FacingMode>().unwrap(), FacingMode::Environment);
        assert_eq!(" User ".parse::<FacingMode>().unwrap(), FacingMode::User);
        assert!("sideways".parse::<FacingMode>().is_err());
    }

    #[test]
    fn status_messages_match_preview_copy() {
        assert_eq!(CameraStatus::Initializing.message(), "Camera initializing...");
        assert_eq!(
            CameraStatus::Unavailable.message(),
            "Camera unavailable. Please check permissions."
        );
    }

    #[test]
    fn open_device_selects_synthetic_backend() -> Result<()> {
        let settings = CameraSettings {
            device: "stub://kiosk".to_string(),
            ..CameraSettings::default()
        };
        let device = open_device(&settings)?;
        assert_eq!(device.name(), "stub://kiosk");
        Ok(())
    }

    #[cfg(not(feature = "camera-v4l2"))]
    #[test]
    fn open_device_requires_feature_for_device_nodes() {
        let settings = CameraSettings {
            device: "/dev/video0".to_string(),
            ..CameraSettings::default()
        };
        assert!(open_device(&settings).is_err());
    }
}
