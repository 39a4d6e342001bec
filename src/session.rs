//! Session state for one guest's pass through the kiosk.
//!
//! `Session` is plain data owned by `SessionController`; it is only mutated by the
//! controller's transition operations. Rendering layers get a `SessionView` snapshot.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::camera::CameraStatus;
use crate::catalog::ResultPayload;
use crate::frame::CapturedImage;

/// Kiosk stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    #[default]
    Consent,
    Capture,
    Results,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Consent, Step::Capture, Step::Results];

    /// 1-based position in the sidebar.
    pub fn number(&self) -> u8 {
        match self {
            Step::Consent => 1,
            Step::Capture => 2,
            Step::Results => 3,
        }
    }

    pub fn from_number(number: u8) -> Option<Step> {
        Step::ALL.into_iter().find(|step| step.number() == number)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Step::Consent => "Welcome & Consent",
            Step::Capture => "Capture Hair Images",
            Step::Results => "AI Results & Products",
        }
    }

    pub fn subtitle(&self) -> &'static str {
        match self {
            Step::Consent => "Explain scan & privacy",
            Step::Capture => "Use tablet camera",
            Step::Results => "Show Ulta matches",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum AnalysisState {
    #[default]
    Idle,
    Running,
    Complete,
}

/// Mutable state of the current guest.
#[derive(Debug, Default)]
pub struct Session {
    pub(crate) step: Step,
    pub(crate) consent_given: bool,
    pub(crate) captured_image: Option<CapturedImage>,
    pub(crate) analysis: AnalysisState,
    pub(crate) result: Option<Arc<ResultPayload>>,
    pub(crate) notice: Option<String>,
    /// Bumped on every reset; async completions carry the value they were issued under.
    pub(crate) generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn consent_given(&self) -> bool {
        self.consent_given
    }

    pub fn captured_image(&self) -> Option<&CapturedImage> {
        self.captured_image.as_ref()
    }

    pub fn analysis(&self) -> AnalysisState {
        self.analysis
    }

    pub fn result(&self) -> Option<&ResultPayload> {
        self.result.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Restore defaults for the next guest, keeping the generation moving forward.
    pub(crate) fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = Session {
            generation,
            ..Session::default()
        };
    }

    /// Returns a description of the first broken session invariant, if any.
    pub fn invariant_violation(&self) -> Option<&'static str> {
        if self.captured_image.is_some() && self.step == Step::Consent {
            return Some("captured image held on the consent step");
        }
        if self.step == Step::Results && self.captured_image.is_none() {
            return Some("results step without a captured image");
        }
        match (self.analysis, self.result.is_some()) {
            (AnalysisState::Complete, false) => Some("analysis complete without a result"),
            (AnalysisState::Idle | AnalysisState::Running, true) => {
                Some("result present before analysis completed")
            }
            _ => None,
        }
    }
}

/// What the preview area shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PreviewMode {
    /// Live video bound to the active stream.
    Live,
    /// The frozen captured still.
    Frozen,
    Off,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CapturedMeta {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

impl From<&CapturedImage> for CapturedMeta {
    fn from(image: &CapturedImage) -> Self {
        Self {
            id: image.short_id(),
            width: image.width(),
            height: image.height(),
            bytes: image.byte_len(),
        }
    }
}

/// Read-only snapshot handed to rendering layers and subscribers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionView {
    pub step: Step,
    pub consent_given: bool,
    pub camera_status: CameraStatus,
    pub camera_message: String,
    pub preview: PreviewMode,
    pub captured: Option<CapturedMeta>,
    pub analysis: AnalysisState,
    pub result: Option<ResultPayload>,
    pub notice: Option<String>,
    pub generation: u64,
}

impl SessionView {
    pub(crate) fn build(session: &Session, camera_status: CameraStatus) -> Self {
        let preview = if session.captured_image.is_some() {
            PreviewMode::Frozen
        } else if session.step == Step::Capture && camera_status == CameraStatus::Ready {
            PreviewMode::Live
        } else {
            PreviewMode::Off
        };
        Self {
            step: session.step,
            consent_given: session.consent_given,
            camera_status,
            camera_message: camera_status.message().to_string(),
            preview,
            captured: session.captured_image.as_ref().map(CapturedMeta::from),
            analysis: session.analysis,
            result: session.result.as_deref().cloned(),
            notice: session.notice.clone(),
            generation: session.generation,
        }
    }
}
