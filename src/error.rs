//! Guest-facing failure taxonomy.
//!
//! Nothing in here is fatal. Every `FlowError` maps to a notice the kiosk shows
//! while the session stays where it was. Infrastructure code (config, device I/O,
//! encoding) keeps using `anyhow::Result`.

use crate::session::Step;

/// Rejected transition or capture attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("consent is required before scanning")]
    ConsentRequired,
    #[error("camera unavailable")]
    CameraUnavailable,
    #[error("camera is not ready yet")]
    CameraNotReady,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("no captured image")]
    NoCapturedImage,
    #[error("{op} is not available on the {step:?} step")]
    InvalidStep { op: &'static str, step: Step },
}

impl FlowError {
    /// Message shown to the guest.
    pub fn notice(&self) -> String {
        match self {
            FlowError::ConsentRequired => "Please confirm consent first.".to_string(),
            FlowError::CameraUnavailable => {
                "Camera unavailable. Please check permissions.".to_string()
            }
            FlowError::CameraNotReady => "Camera is still starting. Please wait.".to_string(),
            FlowError::CaptureFailed(_) => "Capture failed. Please try again.".to_string(),
            FlowError::NoCapturedImage => "Capture a photo first.".to_string(),
            FlowError::InvalidStep { .. } => "That action is not available here.".to_string(),
        }
    }
}

/// Why a camera acquisition request did not produce a stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera device: {0}")]
    NoDevice(String),
    #[error("camera backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_notice_matches_prompt() {
        assert_eq!(
            FlowError::ConsentRequired.notice(),
            "Please confirm consent first."
        );
    }

    #[test]
    fn invalid_step_names_operation() {
        let err = FlowError::InvalidStep {
            op: "capture",
            step: Step::Results,
        };
        assert_eq!(err.to_string(), "capture is not available on the Results step");
    }
}
