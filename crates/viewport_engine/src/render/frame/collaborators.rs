//! Outward-facing collaborators of the orchestrator: failure notification and
//! debug image dumps

use crate::render::{RenderError, RenderResult};
use image::RgbaImage;
use std::fs;
use std::path::PathBuf;

/// Receives failures that put the orchestrator into a failed state
pub trait ErrorNotifier {
    /// Report `error`. Must not block the GPU thread.
    fn show_error(&mut self, title: &str, error: &RenderError);
}

/// Reports failures through the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorNotifier;

impl ErrorNotifier for LogErrorNotifier {
    fn show_error(&mut self, title: &str, error: &RenderError) {
        log::error!("{title}: {error}");
    }
}

/// Persists debug images
pub trait DebugImageWriter {
    /// Write `image` under a name derived from `name`, returning where it went
    fn dump_texture(&mut self, image: &RgbaImage, name: &str) -> RenderResult<PathBuf>;
}

/// Writes `<directory>/<name>-<timestamp>.png`
#[derive(Debug, Clone)]
pub struct PngImageWriter {
    directory: PathBuf,
}

impl PngImageWriter {
    /// Writer into `directory`, created on first dump
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl DebugImageWriter for PngImageWriter {
    fn dump_texture(&mut self, image: &RgbaImage, name: &str) -> RenderResult<PathBuf> {
        fs::create_dir_all(&self.directory)?;
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
        let path = self.directory.join(format!("{name}-{timestamp}.png"));
        image.save(&path)?;
        log::info!("dumped {name} to {}", path.display());
        Ok(path)
    }
}
