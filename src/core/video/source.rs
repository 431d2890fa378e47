//! 帧输入源

use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::core::config::InputConfig;
use crate::core::error::PipelineError;
use crate::core::video::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// 帧源：只在流水线工作线程上打开、读取、关闭
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<(), PipelineError>;

    /// Blocks until the next frame is available.
    fn read(&mut self) -> Result<Frame, PipelineError>;

    /// Releases the source. Calling it again is a no-op.
    fn close(&mut self);
}

/// 图像序列输入 - 读到末尾后从头循环
pub struct ImageSequenceSource {
    dir: PathBuf,
    frame_interval: Option<Duration>,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_number: u64,
    started: Option<Instant>,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            frame_interval: None,
            files: Vec::new(),
            cursor: 0,
            frame_number: 0,
            started: None,
        }
    }

    pub fn from_config(config: &InputConfig) -> Self {
        let source = Self::new(config.path.clone());
        match config.frame_rate {
            Some(rate) => source.with_frame_rate(rate),
            None => source,
        }
    }

    /// Paces reads to `frame_rate`; non-finite or non-positive rates are
    /// ignored and reads run unpaced.
    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        match Duration::try_from_secs_f64(1.0 / frame_rate) {
            Ok(interval) if frame_rate.is_finite() && frame_rate > 0.0 => {
                self.frame_interval = Some(interval);
            }
            _ => warn!("⚠️ Ignoring invalid frame rate {}", frame_rate),
        }
        self
    }

    pub fn is_open(&self) -> bool {
        self.started.is_some()
    }

    fn list_images(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<(), PipelineError> {
        let files = Self::list_images(&self.dir)?;
        if files.is_empty() {
            return Err(PipelineError::NoFrames(self.dir.clone()));
        }

        info!("🎞️ Opened image sequence {:?} ({} frames)", self.dir, files.len());
        self.files = files;
        self.cursor = 0;
        self.frame_number = 0;
        self.started = Some(Instant::now());
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, PipelineError> {
        let started = self.started.ok_or(PipelineError::NotOpen)?;

        if let Some(interval) = self.frame_interval {
            std::thread::sleep(interval);
        }

        if self.cursor >= self.files.len() {
            debug!("Restarting image sequence {:?}", self.dir);
            self.cursor = 0;
        }

        let path = &self.files[self.cursor];
        let image = image::open(path).map_err(|e| {
            warn!("❌ Failed to decode {:?}: {}", path, e);
            e
        })?;
        self.cursor += 1;
        self.frame_number += 1;

        let timestamp_ms = started.elapsed().as_millis() as u64;
        Ok(Frame::from_image(image, timestamp_ms, self.frame_number))
    }

    fn close(&mut self) {
        if self.started.take().is_some() {
            info!("🗑️ Closed image sequence {:?}", self.dir);
        }
        self.files.clear();
        self.cursor = 0;
    }
}
