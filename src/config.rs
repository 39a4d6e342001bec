use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::FacingMode;
use crate::frame::{DEFAULT_JPEG_QUALITY, MAX_FRAME_DIMENSION};

const DEFAULT_CAMERA_DEVICE: &str = "stub://kiosk_camera";
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_CAMERA_WIDTH: u32 = 1280;
const DEFAULT_CAMERA_HEIGHT: u32 = 720;
const DEFAULT_ANALYSIS_DELAY_MS: u64 = 1500;

#[derive(Debug, Deserialize, Default)]
struct KioskConfigFile {
    camera: Option<CameraConfigFile>,
    capture: Option<CaptureConfigFile>,
    analysis: Option<AnalysisConfigFile>,
    catalog_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    facing: Option<FacingMode>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct AnalysisConfigFile {
    delay_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct KioskConfig {
    pub camera: CameraSettings,
    pub jpeg_quality: u8,
    /// Simulated processing time before results appear.
    pub analysis_delay: Duration,
    /// Optional TOML catalog replacing the built-in recommendations.
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub facing: FacingMode,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: DEFAULT_CAMERA_DEVICE.to_string(),
            facing: FacingMode::Environment,
            target_fps: DEFAULT_CAMERA_FPS,
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
        }
    }
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            analysis_delay: Duration::from_millis(DEFAULT_ANALYSIS_DELAY_MS),
            catalog_path: None,
        }
    }
}

impl KioskConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HAIRLAB_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: KioskConfigFile) -> Self {
        let defaults = CameraSettings::default();
        let camera = match file.camera {
            Some(camera) => CameraSettings {
                device: camera.device.unwrap_or(defaults.device),
                facing: camera.facing.unwrap_or(defaults.facing),
                target_fps: camera.target_fps.unwrap_or(defaults.target_fps),
                width: camera.width.unwrap_or(defaults.width),
                height: camera.height.unwrap_or(defaults.height),
            },
            None => defaults,
        };
        let jpeg_quality = file
            .capture
            .and_then(|capture| capture.jpeg_quality)
            .unwrap_or(DEFAULT_JPEG_QUALITY);
        let analysis_delay = Duration::from_millis(
            file.analysis
                .and_then(|analysis| analysis.delay_ms)
                .unwrap_or(DEFAULT_ANALYSIS_DELAY_MS),
        );
        Self {
            camera,
            jpeg_quality,
            analysis_delay,
            catalog_path: file.catalog_path,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("HAIRLAB_CAMERA_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(facing) = std::env::var("HAIRLAB_CAMERA_FACING") {
            if !facing.trim().is_empty() {
                self.camera.facing = facing.parse()?;
            }
        }
        if let Ok(delay) = std::env::var("HAIRLAB_ANALYSIS_DELAY_MS") {
            let millis: u64 = delay.parse().map_err(|_| {
                anyhow!("HAIRLAB_ANALYSIS_DELAY_MS must be an integer number of milliseconds")
            })?;
            self.analysis_delay = Duration::from_millis(millis);
        }
        if let Ok(path) = std::env::var("HAIRLAB_CATALOG") {
            if !path.trim().is_empty() {
                self.catalog_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        if self.camera.width > MAX_FRAME_DIMENSION || self.camera.height > MAX_FRAME_DIMENSION {
            return Err(anyhow!(
                "camera resolution {}x{} exceeds {}px per edge",
                self.camera.width,
                self.camera.height,
                MAX_FRAME_DIMENSION
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(anyhow!("jpeg_quality must be within 1..=100"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<KioskConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
