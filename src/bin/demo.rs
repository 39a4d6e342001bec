//! demo - scripted guest pass against the synthetic camera

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use hairlab_kiosk::{
    CameraSession, FacingMode, FlowError, RecommendationSource, SessionController,
    StartResolution, StaticCatalog, SyntheticCamera, MAX_FRAME_DIMENSION,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Synthetic camera URL (stub://denied and stub://absent simulate failures).
    #[arg(long, default_value = "stub://demo")]
    device: String,
    #[arg(long, default_value_t = 640, value_parser = parse_dimension)]
    width: u32,
    #[arg(long, default_value_t = 480, value_parser = parse_dimension)]
    height: u32,
    /// JPEG quality for the captured still.
    #[arg(long, default_value_t = 85)]
    quality: u8,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    if !args.device.starts_with("stub://") {
        return Err(anyhow!("demo only drives synthetic stub:// cameras"));
    }

    let device = Arc::new(SyntheticCamera::new(&args.device, args.width, args.height));
    let catalog = StaticCatalog::builtin();
    let expected = catalog.payload();
    let camera = CameraSession::new(device.clone(), FacingMode::Environment, args.quality);
    let mut controller = SessionController::new(camera, Box::new(catalog), Duration::ZERO);

    stage("start scan without consent");
    match controller.advance_to_capture() {
        Err(FlowError::ConsentRequired) => {}
        other => return Err(anyhow!("expected consent prompt, got {:?}", other.map(|_| ()))),
    }

    stage("consent + camera start");
    controller.give_consent(true);
    let job = controller
        .advance_to_capture()
        .map_err(|e| anyhow!("advance: {}", e))?;
    let resolution = controller.complete_camera_start(job.run());
    println!("  camera: {}", controller.camera().status_message());
    if resolution != StartResolution::Ready {
        let capture = controller.capture();
        println!("  capture attempt: {:?}", capture.err());
        controller.reset_session();
        println!("demo summary: camera unavailable, session reset");
        return Ok(());
    }

    stage("capture + retake + capture");
    controller.capture().map_err(|e| anyhow!("capture: {}", e))?;
    let first = controller
        .session()
        .captured_image()
        .map(|image| image.short_id());
    let job = controller.retake().map_err(|e| anyhow!("retake: {}", e))?;
    controller.complete_camera_start(job.run());
    controller.capture().map_err(|e| anyhow!("capture: {}", e))?;

    stage("analyze");
    let job = controller
        .run_analysis()
        .map_err(|e| anyhow!("analyze: {}", e))?;
    std::thread::sleep(job.delay);
    controller.complete_analysis(job.ticket);

    let view = controller.view();
    let matches_catalog = view.result.as_ref() == Some(&*expected);
    println!("demo summary:");
    println!("  step: {:?}", view.step);
    println!("  first capture: {}", first.unwrap_or_default());
    if let Some(meta) = &view.captured {
        println!(
            "  final capture: {} ({}x{}, {} bytes)",
            meta.id, meta.width, meta.height, meta.bytes
        );
    }
    println!("  analysis: {:?}", view.analysis);
    println!("  result matches catalog: {}", matches_catalog);
    println!("  camera tracks held: {}", device.active_tracks());

    stage("new guest");
    controller.reset_session();
    println!("  step after reset: {:?}", controller.session().step());

    if !matches_catalog || device.active_tracks() != 0 {
        return Err(anyhow!("demo flow did not finish cleanly"));
    }
    Ok(())
}

fn parse_dimension(raw: &str) -> Result<u32, String> {
    let value: u32 = raw.parse().map_err(|_| format!("`{}` is not a pixel count", raw))?;
    if value == 0 || value > MAX_FRAME_DIMENSION {
        return Err(format!("must be within 1..={}", MAX_FRAME_DIMENSION));
    }
    Ok(value)
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}
