//! Terminal rendering of the kiosk screen.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use crate::session::{AnalysisState, PreviewMode, SessionView, Step};

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    analysis_stage: Option<StageGuard>,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self {
            mode,
            is_tty,
            analysis_stage: None,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty | UiMode::Auto => true,
                UiMode::Plain => false,
            }
    }

    /// Draw one snapshot. A spinner runs while the analysis is in flight.
    pub fn render(&mut self, view: &SessionView) {
        let running = view.analysis == AnalysisState::Running;
        if running && self.analysis_stage.is_none() {
            self.analysis_stage = Some(self.stage("Processing AI Model..."));
        } else if !running {
            // dropping the guard finishes the spinner
            self.analysis_stage = None;
        }
        println!("{}", format_view(view));
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(name.to_string());
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Plain-text screen: sidebar, then the panel for the active step.
pub fn format_view(view: &SessionView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Visit Flow");
    for step in Step::ALL {
        let marker = if step == view.step { ">" } else { " " };
        let _ = writeln!(
            out,
            "{} {}. {} - {}",
            marker,
            step.number(),
            step.title(),
            step.subtitle()
        );
    }
    let _ = writeln!(out);

    match view.step {
        Step::Consent => {
            let _ = writeln!(out, "Step 1 · Welcome to your personalized hair check-in");
            let _ = writeln!(
                out,
                "[{}] I agree to have close-up images of my hair captured for a one-time in-store analysis.",
                if view.consent_given { "x" } else { " " }
            );
            let _ = writeln!(out, "Commands: consent [yes|no], start");
        }
        Step::Capture => {
            let _ = writeln!(out, "Step 2 · Capture a few quick angles");
            match (&view.preview, &view.captured) {
                (PreviewMode::Frozen, Some(meta)) => {
                    let _ = writeln!(
                        out,
                        "Preview: captured {} ({}x{}, {} bytes)",
                        meta.id, meta.width, meta.height, meta.bytes
                    );
                    let _ = writeln!(out, "Commands: retake, analyze");
                }
                (PreviewMode::Live, _) => {
                    let _ = writeln!(out, "Preview: live");
                    let _ = writeln!(out, "Commands: capture");
                }
                _ => {
                    let _ = writeln!(out, "Preview: off");
                    let _ = writeln!(out, "Commands: capture");
                }
            }
            let _ = writeln!(out, "Status: {}", view.camera_message);
        }
        Step::Results => {
            let _ = writeln!(out, "Step 3 · Your hair snapshot & Ulta matches");
            match (&view.analysis, &view.result) {
                (AnalysisState::Running, _) => {
                    let _ = writeln!(
                        out,
                        "Analyzing image… reading texture, shine, and scalp clues."
                    );
                }
                (AnalysisState::Complete, Some(result)) => {
                    let _ = writeln!(out, "Hair health at a glance");
                    for metric in &result.metrics {
                        let _ = writeln!(
                            out,
                            "  {}: {} ({})",
                            metric.label, metric.value, metric.note
                        );
                    }
                    let _ = writeln!(out, "Top picks in this store");
                    for product in &result.products {
                        let _ = writeln!(
                            out,
                            "  {} - {} [{}] {} · {}",
                            product.name,
                            product.price,
                            product.tags.join(", "),
                            product.location,
                            product.description
                        );
                    }
                }
                _ => {
                    let _ = writeln!(out, "No analysis yet.");
                }
            }
            let _ = writeln!(out, "Commands: back, new");
        }
    }

    if let Some(notice) = &view.notice {
        let _ = writeln!(out, "! {}", notice);
    }
    out
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraStatus;
    use crate::catalog::{RecommendationSource, StaticCatalog};

    fn view(step: Step) -> SessionView {
        SessionView {
            step,
            consent_given: false,
            camera_status: CameraStatus::Uninitialized,
            camera_message: CameraStatus::Uninitialized.message().to_string(),
            preview: PreviewMode::Off,
            captured: None,
            analysis: AnalysisState::Idle,
            result: None,
            notice: None,
            generation: 0,
        }
    }

    #[test]
    fn consent_screen_shows_notice() {
        let mut consent = view(Step::Consent);
        consent.notice = Some("Please confirm consent first.".to_string());
        let text = format_view(&consent);

        assert!(text.contains("> 1. Welcome & Consent"));
        assert!(text.contains("[ ] I agree"));
        assert!(text.contains("! Please confirm consent first."));
    }

    #[test]
    fn results_screen_lists_products() {
        let mut results = view(Step::Results);
        results.analysis = AnalysisState::Complete;
        results.result = Some((*StaticCatalog::builtin().payload()).clone());
        let text = format_view(&results);

        assert!(text.contains("Scalp hydration: Slightly dry"));
        assert!(text.contains("GlowWave Lightweight Hair Oil - $20"));
    }

    #[test]
    fn running_analysis_shows_progress_copy() {
        let mut results = view(Step::Results);
        results.analysis = AnalysisState::Running;
        assert!(format_view(&results).contains("Analyzing image"));
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
