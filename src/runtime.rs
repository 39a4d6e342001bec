//! Single-threaded kiosk event loop.
//!
//! The controller lives on the thread that calls `run`. Guest commands, camera
//! acquisition outcomes and analysis timers all arrive as `KioskEvent`s over one
//! mpsc channel and are applied in order. Blocking work (opening the camera,
//! waiting out the analysis delay) runs on short-lived worker threads that only
//! send an event back; they never touch the session.

use anyhow::Result;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::camera::{AcquireOutcome, StartResolution};
use crate::controller::{AnalysisTicket, Effect, KioskCommand, SessionController};

pub enum KioskEvent {
    Command(KioskCommand),
    CameraOutcome(AcquireOutcome),
    AnalysisDue(AnalysisTicket),
    Shutdown,
}

pub struct KioskRuntime {
    controller: SessionController,
    tx: Sender<KioskEvent>,
    rx: Receiver<KioskEvent>,
}

impl KioskRuntime {
    pub fn new(controller: SessionController) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { controller, tx, rx }
    }

    /// Handle for input threads and signal handlers.
    pub fn sender(&self) -> Sender<KioskEvent> {
        self.tx.clone()
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Apply one event. Returns false once shutdown was requested.
    pub fn handle(&mut self, event: KioskEvent) -> bool {
        match event {
            KioskEvent::Command(command) => match self.controller.dispatch(command) {
                Ok(Some(effect)) => self.schedule(effect),
                Ok(None) => {}
                Err(err) => log::debug!("command {:?} rejected: {}", command, err),
            },
            KioskEvent::CameraOutcome(outcome) => {
                if self.controller.complete_camera_start(outcome) == StartResolution::Stale {
                    log::debug!("stale camera outcome released");
                }
            }
            KioskEvent::AnalysisDue(ticket) => {
                self.controller.complete_analysis(ticket);
            }
            KioskEvent::Shutdown => return false,
        }
        true
    }

    /// Wait up to `timeout` for the next queued event.
    pub fn next_event(&self, timeout: Duration) -> Option<KioskEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Process events until `KioskEvent::Shutdown`. Dropping the runtime afterwards
    /// tears down the controller, which releases the camera.
    pub fn run(mut self) -> Result<()> {
        log::info!("kiosk runtime started");
        while let Ok(event) = self.rx.recv() {
            if !self.handle(event) {
                break;
            }
        }
        log::info!("kiosk runtime stopping");
        Ok(())
    }

    fn schedule(&self, effect: Effect) {
        let tx = self.tx.clone();
        match effect {
            Effect::AcquireCamera(job) => {
                log::debug!("scheduling {:?}", job);
                std::thread::spawn(move || {
                    let outcome = job.run();
                    let _ = tx.send(KioskEvent::CameraOutcome(outcome));
                });
            }
            Effect::ScheduleAnalysis(job) => {
                std::thread::spawn(move || {
                    std::thread::sleep(job.delay);
                    let _ = tx.send(KioskEvent::AnalysisDue(job.ticket));
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraSession, CameraStatus, FacingMode, SyntheticCamera};
    use crate::catalog::StaticCatalog;
    use crate::session::{AnalysisState, Step};
    use std::sync::Arc;

    const WAIT: Duration = Duration::from_secs(5);

    fn runtime_with(url: &str, delay: Duration) -> (KioskRuntime, Arc<SyntheticCamera>) {
        let device = Arc::new(SyntheticCamera::new(url, 16, 16));
        let camera = CameraSession::new(device.clone(), FacingMode::Environment, 85);
        let controller =
            SessionController::new(camera, Box::new(StaticCatalog::builtin()), delay);
        (KioskRuntime::new(controller), device)
    }

    fn pump_one(runtime: &mut KioskRuntime) {
        let event = runtime.next_event(WAIT).expect("event within timeout");
        assert!(runtime.handle(event));
    }

    #[test]
    fn full_guest_pass_through_worker_threads() {
        let (mut runtime, device) = runtime_with("stub://test", Duration::from_millis(10));

        runtime.handle(KioskEvent::Command(KioskCommand::Consent(true)));
        runtime.handle(KioskEvent::Command(KioskCommand::StartScan));
        pump_one(&mut runtime);
        assert_eq!(runtime.controller().camera().status(), CameraStatus::Ready);

        runtime.handle(KioskEvent::Command(KioskCommand::Capture));
        runtime.handle(KioskEvent::Command(KioskCommand::Analyze));
        pump_one(&mut runtime);

        let session = runtime.controller().session();
        assert_eq!(session.step(), Step::Results);
        assert_eq!(session.analysis(), AnalysisState::Complete);
        assert_eq!(device.active_tracks(), 0);
    }

    #[test]
    fn late_analysis_timer_after_new_guest_is_ignored() {
        let (mut runtime, _device) = runtime_with("stub://test", Duration::from_millis(10));

        runtime.handle(KioskEvent::Command(KioskCommand::Consent(true)));
        runtime.handle(KioskEvent::Command(KioskCommand::StartScan));
        pump_one(&mut runtime);
        runtime.handle(KioskEvent::Command(KioskCommand::Capture));
        runtime.handle(KioskEvent::Command(KioskCommand::Analyze));
        runtime.handle(KioskEvent::Command(KioskCommand::NewGuest));
        pump_one(&mut runtime);

        let session = runtime.controller().session();
        assert_eq!(session.step(), Step::Consent);
        assert_eq!(session.analysis(), AnalysisState::Idle);
        assert!(session.result().is_none());
    }

    #[test]
    fn shutdown_stops_handling() {
        let (mut runtime, _device) = runtime_with("stub://test", Duration::from_millis(10));
        assert!(!runtime.handle(KioskEvent::Shutdown));
    }

    #[test]
    fn run_exits_on_shutdown_and_releases_camera() {
        let (runtime, device) = runtime_with("stub://test", Duration::from_millis(10));
        let tx = runtime.sender();
        tx.send(KioskEvent::Command(KioskCommand::Consent(true))).unwrap();
        tx.send(KioskEvent::Command(KioskCommand::StartScan)).unwrap();
        let handle = std::thread::spawn(move || runtime.run());

        // wait for the stream to be granted before shutting down
        let deadline = std::time::Instant::now() + WAIT;
        while device.acquisitions() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        tx.send(KioskEvent::Shutdown).unwrap();
        handle.join().expect("runtime thread").expect("runtime result");

        // an outcome still in flight is dropped with the channel
        let deadline = std::time::Instant::now() + WAIT;
        while device.active_tracks() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(device.active_tracks(), 0);
    }
}
