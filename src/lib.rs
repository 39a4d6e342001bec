//! Hair Analysis Lab kiosk core
//!
//! This crate implements the session flow behind the in-store hair scan kiosk:
//! consent, camera capture and result presentation for one guest at a time.
//!
//! # Architecture
//!
//! - `controller`: `SessionController`, the state machine and the only writer of
//!   session state
//! - `camera`: device access (`CameraDevice`, `VideoStream`) and `CameraSession`,
//!   which guarantees the stream is released on every exit path
//! - `frame`: live frames and the frozen `CapturedImage`
//! - `catalog`: the static metrics and product recommendations shown as results
//! - `runtime`: the event loop that executes camera and analysis jobs off-thread
//!   and feeds their outcomes back in order
//! - `ui`, `config`: terminal rendering and configuration loading
//!
//! The analysis is simulated. The result payload never depends on the captured
//! image, and nothing is persisted beyond the current session.

pub mod camera;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod runtime;
pub mod session;
pub mod ui;

use anyhow::Result;

pub use camera::{
    open_device, AcquireJob, AcquireOutcome, CameraDevice, CameraSession, CameraStatus,
    FacingMode, StartResolution, SyntheticCamera, VideoStream,
};
pub use catalog::{
    MetricSummary, ProductRecommendation, RecommendationSource, ResultPayload, StaticCatalog,
};
pub use config::{CameraSettings, KioskConfig};
pub use controller::{AnalysisJob, AnalysisTicket, Effect, KioskCommand, SessionController};
pub use error::{AcquireError, FlowError};
pub use frame::{CapturedImage, LiveFrame, DEFAULT_JPEG_QUALITY, MAX_FRAME_DIMENSION};
pub use runtime::{KioskEvent, KioskRuntime};
pub use session::{AnalysisState, CapturedMeta, PreviewMode, Session, SessionView, Step};

/// Build a controller from configuration: open the camera device and load the catalog.
pub fn build_controller(config: &KioskConfig) -> Result<SessionController> {
    let device = open_device(&config.camera)?;
    let catalog: Box<dyn RecommendationSource> = match &config.catalog_path {
        Some(path) => Box::new(StaticCatalog::load(path)?),
        None => Box::new(StaticCatalog::builtin()),
    };
    let camera = CameraSession::new(device, config.camera.facing, config.jpeg_quality);
    log::info!(
        "kiosk configured: camera={} facing={:?} analysis_delay={:?} catalog={}",
        config.camera.device,
        config.camera.facing,
        config.analysis_delay,
        catalog.name()
    );
    Ok(SessionController::new(camera, catalog, config.analysis_delay))
}
