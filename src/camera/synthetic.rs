//! Synthetic camera (`stub://`) for tests and demos.
//!
//! - `stub://<name>` always grants a stream
//! - `stub://denied` refuses, as a browser does when the guest blocks the permission
//! - `stub://absent` reports that no camera is attached
//!
//! Every stream shares a track counter with its camera, so callers can check that no
//! track outlives the step that requested it.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{CameraDevice, FacingMode, VideoStream};
use crate::error::AcquireError;
use crate::frame::{rgb_buffer_len, LiveFrame};

/// Synthetic camera device.
pub struct SyntheticCamera {
    url: String,
    width: u32,
    height: u32,
    behavior: Behavior,
    active_tracks: Arc<AtomicUsize>,
    acquisitions: AtomicU64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Behavior {
    Grant,
    Deny,
    Absent,
}

impl SyntheticCamera {
    pub fn new(url: &str, width: u32, height: u32) -> Self {
        let behavior = match url {
            "stub://denied" => Behavior::Deny,
            "stub://absent" => Behavior::Absent,
            _ => Behavior::Grant,
        };
        Self {
            url: url.to_string(),
            width,
            height,
            behavior,
            active_tracks: Arc::new(AtomicUsize::new(0)),
            acquisitions: AtomicU64::new(0),
        }
    }

    /// Tracks currently held by streams from this camera.
    pub fn active_tracks(&self) -> usize {
        self.active_tracks.load(Ordering::SeqCst)
    }

    /// Number of acquisition requests served, granted or not.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl CameraDevice for SyntheticCamera {
    fn name(&self) -> &str {
        &self.url
    }

    fn acquire(&self, facing: FacingMode) -> Result<Box<dyn VideoStream>, AcquireError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Deny => Err(AcquireError::PermissionDenied),
            Behavior::Absent => Err(AcquireError::NoDevice(self.url.clone())),
            Behavior::Grant => {
                self.active_tracks.fetch_add(1, Ordering::SeqCst);
                log::info!(
                    "SyntheticCamera: stream granted on {} ({:?}, {}x{})",
                    self.url,
                    facing,
                    self.width,
                    self.height
                );
                Ok(Box::new(SyntheticStream {
                    width: self.width,
                    height: self.height,
                    frame_count: 0,
                    scene_state: 0,
                    live: true,
                    tracks: Arc::clone(&self.active_tracks),
                }))
            }
        }
    }
}

struct SyntheticStream {
    width: u32,
    height: u32,
    frame_count: u64,
    /// Simulated scene drift so consecutive frames differ.
    scene_state: u8,
    live: bool,
    tracks: Arc<AtomicUsize>,
}

impl SyntheticStream {
    fn generate_synthetic_pixels(&mut self) -> Result<Vec<u8>> {
        let pixel_count = rgb_buffer_len(self.width, self.height)?;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let noise: u8 = rand::random::<u8>() % 8;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64 + noise as u64)
                % 256) as u8;
        }
        Ok(pixels)
    }
}

impl VideoStream for SyntheticStream {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_frame(&mut self) -> Result<LiveFrame> {
        if !self.live {
            return Err(anyhow!("synthetic stream already stopped"));
        }
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels()?;
        LiveFrame::new(pixels, self.width, self.height)
    }

    fn tracks(&self) -> usize {
        usize::from(self.live)
    }

    fn stop_tracks(&mut self) {
        if self.live {
            self.live = false;
            self.tracks.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_stream_produces_native_frames() -> Result<()> {
        let camera = SyntheticCamera::new("stub://test", 32, 24);
        let mut stream = camera.acquire(FacingMode::Environment)?;

        assert_eq!(stream.resolution(), (32, 24));
        let frame = stream.read_frame()?;
        assert_eq!(frame.width, 32);
        assert_eq!(frame.height, 24);
        Ok(())
    }

    #[test]
    fn tracks_are_released_on_stop_and_drop() -> Result<()> {
        let camera = SyntheticCamera::new("stub://test", 8, 8);
        let mut first = camera.acquire(FacingMode::Environment)?;
        let second = camera.acquire(FacingMode::User)?;
        assert_eq!(camera.active_tracks(), 2);

        first.stop_tracks();
        first.stop_tracks();
        assert_eq!(first.tracks(), 0);
        assert_eq!(camera.active_tracks(), 1);
        assert!(first.read_frame().is_err());

        drop(second);
        assert_eq!(camera.active_tracks(), 0);
        drop(first);
        assert_eq!(camera.active_tracks(), 0);
        Ok(())
    }

    #[test]
    fn oversized_stream_fails_frame_read_without_panicking() -> Result<()> {
        let camera = SyntheticCamera::new("stub://huge", 70_000, 70_000);
        let mut stream = camera.acquire(FacingMode::Environment)?;

        assert!(stream.read_frame().is_err());
        assert_eq!(stream.tracks(), 1);
        Ok(())
    }

    #[test]
    fn denied_and_absent_urls_refuse_streams() {
        let denied = SyntheticCamera::new("stub://denied", 8, 8);
        assert_eq!(
            denied.acquire(FacingMode::Environment).err(),
            Some(AcquireError::PermissionDenied)
        );

        let absent = SyntheticCamera::new("stub://absent", 8, 8);
        assert!(matches!(
            absent.acquire(FacingMode::Environment),
            Err(AcquireError::NoDevice(_))
        ));
        assert_eq!(absent.acquisitions(), 1);
        assert_eq!(absent.active_tracks(), 0);
    }
}
