//! Kiosk flow state machine.
//!
//! `SessionController` owns the `Session` and the `CameraSession` and is the only
//! place either is mutated. Steps run `Consent -> Capture -> Results`, with
//! `Results -> Capture` (back to camera) and `Results -> Consent` (new guest).
//!
//! Two operations suspend: camera acquisition and the simulated analysis. Both hand
//! back a job for the runtime to execute, and both come back through a `complete_*`
//! method that drops the outcome when the session has moved on since the request:
//! - camera outcomes carry the camera epoch (bumped by every start/stop)
//! - analysis outcomes carry the session generation and the analysis ticket
//!
//! Every rejected operation leaves the session unchanged apart from the notice.

use std::str::FromStr;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::camera::{AcquireJob, AcquireOutcome, CameraSession, CameraStatus, StartResolution};
use crate::catalog::RecommendationSource;
use crate::error::FlowError;
use crate::session::{AnalysisState, Session, SessionView, Step};

/// Identifies one analysis request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisTicket {
    pub generation: u64,
    pub ticket: u64,
}

/// Pending simulated analysis. Fire `complete_analysis(job.ticket)` after `delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisJob {
    pub ticket: AnalysisTicket,
    pub delay: Duration,
}

/// Work the runtime must schedule after an operation.
#[derive(Debug)]
pub enum Effect {
    AcquireCamera(AcquireJob),
    ScheduleAnalysis(AnalysisJob),
}

/// Guest-facing controls. Each maps to exactly one controller operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KioskCommand {
    Consent(bool),
    StartScan,
    Goto(Step),
    Capture,
    Retake,
    Analyze,
    Back,
    NewGuest,
}

impl FromStr for KioskCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| anyhow!("empty command"))?
            .to_lowercase();
        let arg = parts.next().map(|arg| arg.to_lowercase());
        match (verb.as_str(), arg.as_deref()) {
            ("consent", None | Some("yes" | "on" | "true")) => Ok(KioskCommand::Consent(true)),
            ("consent", Some("no" | "off" | "false")) => Ok(KioskCommand::Consent(false)),
            ("start", None) => Ok(KioskCommand::StartScan),
            ("goto", Some(step)) => {
                let number: u8 = step
                    .parse()
                    .map_err(|_| anyhow!("goto expects a step number 1-3"))?;
                Step::from_number(number)
                    .map(KioskCommand::Goto)
                    .ok_or_else(|| anyhow!("goto expects a step number 1-3"))
            }
            ("capture", None) => Ok(KioskCommand::Capture),
            ("retake", None) => Ok(KioskCommand::Retake),
            ("analyze", None) => Ok(KioskCommand::Analyze),
            ("back", None) => Ok(KioskCommand::Back),
            ("new", None) => Ok(KioskCommand::NewGuest),
            _ => Err(anyhow!("unknown command '{}'", line.trim())),
        }
    }
}

pub struct SessionController {
    session: Session,
    camera: CameraSession,
    catalog: Box<dyn RecommendationSource>,
    analysis_delay: Duration,
    analysis_ticket: u64,
    subscribers: Vec<mpsc::Sender<SessionView>>,
}

impl SessionController {
    pub fn new(
        camera: CameraSession,
        catalog: Box<dyn RecommendationSource>,
        analysis_delay: Duration,
    ) -> Self {
        Self {
            session: Session::new(),
            camera,
            catalog,
            analysis_delay,
            analysis_ticket: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn camera(&self) -> &CameraSession {
        &self.camera
    }

    pub fn view(&self) -> SessionView {
        SessionView::build(&self.session, self.camera.status())
    }

    /// Receive a fresh `SessionView` after every state change.
    pub fn subscribe(&mut self) -> mpsc::Receiver<SessionView> {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(self.view());
        self.subscribers.push(tx);
        rx
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    pub fn give_consent(&mut self, granted: bool) {
        self.session.consent_given = granted;
        self.session.notice = None;
        log::info!("consent {}", if granted { "given" } else { "withdrawn" });
        self.publish();
    }

    /// Primary "Start hair scan" path. Requires consent.
    pub fn advance_to_capture(&mut self) -> Result<AcquireJob, FlowError> {
        if !self.session.consent_given {
            return Err(self.reject(FlowError::ConsentRequired));
        }
        if self.session.step != Step::Consent {
            return Err(self.reject(FlowError::InvalidStep {
                op: "start scan",
                step: self.session.step,
            }));
        }
        self.session.notice = None;
        Ok(self.enter_capture())
    }

    /// Sidebar navigation. Does not check consent.
    pub fn enter_step_directly(&mut self, step: Step) -> Result<Option<AcquireJob>, FlowError> {
        if step == Step::Results && self.session.captured_image.is_none() {
            return Err(self.reject(FlowError::NoCapturedImage));
        }
        self.session.notice = None;
        log::info!("sidebar navigation {:?} -> {:?}", self.session.step, step);
        match step {
            Step::Capture => Ok(Some(self.enter_capture())),
            Step::Consent => {
                self.camera.stop();
                self.cancel_analysis();
                self.session.captured_image = None;
                self.session.step = Step::Consent;
                self.publish();
                Ok(None)
            }
            Step::Results => {
                self.camera.stop();
                self.session.step = Step::Results;
                self.publish();
                Ok(None)
            }
        }
    }

    /// Freeze the live preview into a still and release the camera.
    pub fn capture(&mut self) -> Result<(), FlowError> {
        if self.session.step != Step::Capture {
            return Err(self.reject(FlowError::InvalidStep {
                op: "capture",
                step: self.session.step,
            }));
        }
        let image = match self.camera.capture_frame() {
            Ok(image) => image,
            Err(err) => return Err(self.reject(err)),
        };
        self.camera.stop();
        log::info!(
            "captured image {} ({}x{}, {} bytes)",
            image.short_id(),
            image.width(),
            image.height(),
            image.byte_len()
        );
        self.session.captured_image = Some(image);
        self.session.notice = None;
        self.publish();
        Ok(())
    }

    /// Drop the captured still and go back to the live preview.
    pub fn retake(&mut self) -> Result<AcquireJob, FlowError> {
        if self.session.captured_image.is_none() {
            return Err(self.reject(FlowError::NoCapturedImage));
        }
        if self.session.step != Step::Capture {
            return Err(self.reject(FlowError::InvalidStep {
                op: "retake",
                step: self.session.step,
            }));
        }
        self.session.notice = None;
        Ok(self.enter_capture())
    }

    /// Move to results and start the simulated analysis.
    pub fn run_analysis(&mut self) -> Result<AnalysisJob, FlowError> {
        if self.session.captured_image.is_none() {
            return Err(self.reject(FlowError::NoCapturedImage));
        }
        self.camera.stop();
        self.analysis_ticket += 1;
        self.session.step = Step::Results;
        self.session.analysis = AnalysisState::Running;
        self.session.result = None;
        self.session.notice = None;
        let job = AnalysisJob {
            ticket: AnalysisTicket {
                generation: self.session.generation,
                ticket: self.analysis_ticket,
            },
            delay: self.analysis_delay,
        };
        log::info!(
            "analysis started (generation {}, ticket {}, delay {:?})",
            job.ticket.generation,
            job.ticket.ticket,
            job.delay
        );
        self.publish();
        Ok(job)
    }

    /// "Back to camera" from the results step.
    pub fn back_to_capture(&mut self) -> Result<Option<AcquireJob>, FlowError> {
        if self.session.step != Step::Results {
            return Err(self.reject(FlowError::InvalidStep {
                op: "back",
                step: self.session.step,
            }));
        }
        // a finished result stays available for the sidebar; only pending work is dropped
        if self.session.analysis == AnalysisState::Running {
            self.cancel_analysis();
        }
        self.session.notice = None;
        if self.session.captured_image.is_some() {
            self.session.step = Step::Capture;
            self.publish();
            Ok(None)
        } else {
            Ok(Some(self.enter_capture()))
        }
    }

    /// "New Guest": release the camera, drop pending work and restore defaults.
    pub fn reset_session(&mut self) {
        self.camera.stop();
        self.analysis_ticket += 1;
        self.session.reset();
        log::info!("session reset (generation {})", self.session.generation);
        self.publish();
    }

    // ------------------------------------------------------------------------
    // Async completions
    // ------------------------------------------------------------------------

    pub fn complete_camera_start(&mut self, outcome: AcquireOutcome) -> StartResolution {
        let resolution = self.camera.complete_start(outcome);
        if resolution != StartResolution::Stale {
            self.publish();
        }
        resolution
    }

    /// Returns true when the result was applied, false for a stale completion.
    pub fn complete_analysis(&mut self, ticket: AnalysisTicket) -> bool {
        let current = ticket.generation == self.session.generation
            && ticket.ticket == self.analysis_ticket
            && self.session.analysis == AnalysisState::Running
            && self.session.step == Step::Results;
        if !current {
            log::debug!(
                "discarding stale analysis completion (generation {}, ticket {})",
                ticket.generation,
                ticket.ticket
            );
            return false;
        }
        self.session.result = Some(self.catalog.payload());
        self.session.analysis = AnalysisState::Complete;
        log::info!(
            "analysis complete (ticket {}, catalog {})",
            ticket.ticket,
            self.catalog.name()
        );
        self.publish();
        true
    }

    /// Route a guest control to its operation.
    pub fn dispatch(&mut self, command: KioskCommand) -> Result<Option<Effect>, FlowError> {
        match command {
            KioskCommand::Consent(granted) => {
                self.give_consent(granted);
                Ok(None)
            }
            KioskCommand::StartScan => {
                let job = self.advance_to_capture()?;
                Ok(Some(Effect::AcquireCamera(job)))
            }
            KioskCommand::Goto(step) => {
                Ok(self.enter_step_directly(step)?.map(Effect::AcquireCamera))
            }
            KioskCommand::Capture => {
                self.capture()?;
                Ok(None)
            }
            KioskCommand::Retake => {
                let job = self.retake()?;
                Ok(Some(Effect::AcquireCamera(job)))
            }
            KioskCommand::Analyze => {
                let job = self.run_analysis()?;
                Ok(Some(Effect::ScheduleAnalysis(job)))
            }
            KioskCommand::Back => Ok(self.back_to_capture()?.map(Effect::AcquireCamera)),
            KioskCommand::NewGuest => {
                self.reset_session();
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn enter_capture(&mut self) -> AcquireJob {
        self.cancel_analysis();
        self.session.captured_image = None;
        self.session.step = Step::Capture;
        let job = self.camera.start();
        self.publish();
        job
    }

    fn cancel_analysis(&mut self) {
        if self.session.analysis == AnalysisState::Running {
            log::info!("analysis cancelled (ticket {})", self.analysis_ticket);
        }
        self.analysis_ticket += 1;
        self.session.analysis = AnalysisState::Idle;
        self.session.result = None;
    }

    fn reject(&mut self, err: FlowError) -> FlowError {
        log::warn!("rejected on {:?} step: {}", self.session.step, err);
        self.session.notice = Some(err.notice());
        self.publish();
        err
    }

    fn publish(&mut self) {
        debug_assert!(
            self.session.invariant_violation().is_none(),
            "session invariant broken: {:?}",
            self.session.invariant_violation()
        );
        let view = self.view();
        self.subscribers.retain(|tx| tx.send(view.clone()).is_ok());
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if self.camera.status() != CameraStatus::Uninitialized {
            log::info!("controller teardown: releasing camera");
        }
        self.camera.stop();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{FacingMode, SyntheticCamera};
    use crate::catalog::StaticCatalog;
    use std::sync::Arc;

    fn controller_with(url: &str) -> (SessionController, Arc<SyntheticCamera>) {
        let device = Arc::new(SyntheticCamera::new(url, 32, 24));
        let camera = CameraSession::new(device.clone(), FacingMode::Environment, 85);
        let controller = SessionController::new(
            camera,
            Box::new(StaticCatalog::builtin()),
            Duration::from_millis(1500),
        );
        (controller, device)
    }

    fn ready_for_capture(controller: &mut SessionController) {
        controller.give_consent(true);
        let job = controller.advance_to_capture().expect("advance");
        assert_eq!(
            controller.complete_camera_start(job.run()),
            StartResolution::Ready
        );
    }

    #[test]
    fn parses_kiosk_commands() {
        assert_eq!("consent".parse::<KioskCommand>().unwrap(), KioskCommand::Consent(true));
        assert_eq!("consent off".parse::<KioskCommand>().unwrap(), KioskCommand::Consent(false));
        assert_eq!("goto 2".parse::<KioskCommand>().unwrap(), KioskCommand::Goto(Step::Capture));
        assert_eq!("NEW".parse::<KioskCommand>().unwrap(), KioskCommand::NewGuest);
        assert!("goto 7".parse::<KioskCommand>().is_err());
        assert!("dance".parse::<KioskCommand>().is_err());
    }

    #[test]
    fn advance_without_consent_changes_nothing() {
        let (mut controller, device) = controller_with("stub://test");
        let err = controller.advance_to_capture().unwrap_err();

        assert_eq!(err, FlowError::ConsentRequired);
        assert_eq!(controller.session().step(), Step::Consent);
        assert_eq!(controller.session().notice(), Some("Please confirm consent first."));
        assert_eq!(controller.camera().status(), CameraStatus::Uninitialized);
        assert_eq!(device.acquisitions(), 0);
    }

    #[test]
    fn capture_freezes_and_releases_camera() {
        let (mut controller, device) = controller_with("stub://test");
        ready_for_capture(&mut controller);

        controller.capture().expect("capture");
        assert!(controller.session().captured_image().is_some());
        assert_eq!(controller.session().step(), Step::Capture);
        assert_eq!(controller.camera().status(), CameraStatus::Uninitialized);
        assert_eq!(device.active_tracks(), 0);
        assert_eq!(controller.view().preview, crate::session::PreviewMode::Frozen);
    }

    #[test]
    fn capture_outside_capture_step_is_rejected() {
        let (mut controller, _device) = controller_with("stub://test");
        let err = controller.capture().unwrap_err();
        assert!(matches!(err, FlowError::InvalidStep { op: "capture", .. }));
    }

    #[test]
    fn retake_clears_image_and_restarts_camera() {
        let (mut controller, device) = controller_with("stub://test");
        ready_for_capture(&mut controller);
        controller.capture().expect("capture");

        let job = controller.retake().expect("retake");
        assert!(controller.session().captured_image().is_none());
        assert_eq!(controller.camera().status(), CameraStatus::Initializing);
        controller.complete_camera_start(job.run());
        assert_eq!(device.active_tracks(), 1);
    }

    #[test]
    fn analysis_completes_with_catalog_payload() {
        let (mut controller, _device) = controller_with("stub://test");
        ready_for_capture(&mut controller);
        controller.capture().expect("capture");

        let job = controller.run_analysis().expect("analyze");
        assert_eq!(job.delay, Duration::from_millis(1500));
        assert_eq!(controller.session().step(), Step::Results);
        assert_eq!(controller.session().analysis(), AnalysisState::Running);
        assert!(controller.session().result().is_none());

        assert!(controller.complete_analysis(job.ticket));
        assert_eq!(controller.session().analysis(), AnalysisState::Complete);
        assert_eq!(
            controller.session().result(),
            Some(&*StaticCatalog::builtin().payload())
        );
        // a duplicate completion is ignored
        assert!(!controller.complete_analysis(job.ticket));
    }

    #[test]
    fn back_cancels_pending_analysis_and_shows_frozen_image() {
        let (mut controller, device) = controller_with("stub://test");
        ready_for_capture(&mut controller);
        controller.capture().expect("capture");
        let job = controller.run_analysis().expect("analyze");

        let restart = controller.back_to_capture().expect("back");
        assert!(restart.is_none());
        assert_eq!(controller.session().step(), Step::Capture);
        assert!(controller.session().captured_image().is_some());
        assert!(!controller.complete_analysis(job.ticket));
        assert_eq!(controller.session().analysis(), AnalysisState::Idle);
        assert_eq!(device.active_tracks(), 0);
    }

    #[test]
    fn back_after_completed_analysis_keeps_result() {
        let (mut controller, device) = controller_with("stub://test");
        ready_for_capture(&mut controller);
        controller.capture().expect("capture");
        let job = controller.run_analysis().expect("analyze");
        assert!(controller.complete_analysis(job.ticket));

        assert!(controller.back_to_capture().expect("back").is_none());
        assert_eq!(controller.session().step(), Step::Capture);
        assert_eq!(controller.session().analysis(), AnalysisState::Complete);
        assert!(controller.session().result().is_some());
        assert_eq!(controller.session().invariant_violation(), None);
        assert_eq!(device.active_tracks(), 0);

        // the sidebar brings the same result back without a new analysis
        assert!(controller
            .enter_step_directly(Step::Results)
            .expect("navigate")
            .is_none());
        assert_eq!(controller.session().step(), Step::Results);
        assert_eq!(controller.session().analysis(), AnalysisState::Complete);
        assert!(controller.view().result.is_some());
    }

    #[test]
    fn sidebar_results_requires_capture() {
        let (mut controller, _device) = controller_with("stub://test");
        assert_eq!(
            controller.enter_step_directly(Step::Results).unwrap_err(),
            FlowError::NoCapturedImage
        );
        assert_eq!(controller.session().step(), Step::Consent);
    }

    #[test]
    fn sidebar_capture_bypasses_consent() {
        let (mut controller, _device) = controller_with("stub://test");
        let job = controller
            .enter_step_directly(Step::Capture)
            .expect("navigate")
            .expect("camera start");
        assert_eq!(controller.session().step(), Step::Capture);
        assert!(!controller.session().consent_given());
        assert_eq!(
            controller.complete_camera_start(job.run()),
            StartResolution::Ready
        );
    }

    #[test]
    fn sidebar_consent_releases_camera_and_image() {
        let (mut controller, device) = controller_with("stub://test");
        ready_for_capture(&mut controller);
        assert_eq!(device.active_tracks(), 1);

        controller.enter_step_directly(Step::Consent).expect("navigate");
        assert_eq!(device.active_tracks(), 0);
        assert!(controller.session().captured_image().is_none());
        assert!(controller.session().consent_given());
    }

    #[test]
    fn subscribers_receive_views() {
        let (mut controller, _device) = controller_with("stub://test");
        let rx = controller.subscribe();
        assert_eq!(rx.recv().unwrap().step, Step::Consent);

        controller.give_consent(true);
        let view = rx.recv().unwrap();
        assert!(view.consent_given);

        drop(rx);
        controller.give_consent(false);
        assert!(controller.subscribers.is_empty());
    }

    #[test]
    fn dispatch_maps_commands_to_effects() {
        let (mut controller, _device) = controller_with("stub://test");
        assert!(controller.dispatch(KioskCommand::Consent(true)).unwrap().is_none());
        let effect = controller.dispatch(KioskCommand::StartScan).unwrap();
        assert!(matches!(effect, Some(Effect::AcquireCamera(_))));
        assert!(matches!(
            controller.dispatch(KioskCommand::Analyze),
            Err(FlowError::NoCapturedImage)
        ));
    }
}
