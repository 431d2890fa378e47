//! 追踪会话 - 配置 → 帧源 → 追踪器 → 识别器 → 流水线

use log::info;
use std::path::Path;
use std::sync::Arc;

use crate::core::config::{IdentificationConfig, PipelineConfig, SharedConfig};
use crate::core::error::{ConfigError, PipelineError};
use crate::core::video::source::{FrameSource, ImageSequenceSource};
use crate::core::video::tracker::{ObjectTracker, RegionTracker};
use crate::identification::pipeline::{LatestFrame, Pipeline};
use crate::identification::processor::{IdentificationProcessor, IdentifyRequests, ProcessedFrame};

/// 会话统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub processed_frames: u64,
    pub tracked_objects: usize,
    pub detected_objects: usize,
}

/// 追踪会话
///
/// ```no_run
/// use blink_tracker::api::tracking::TrackingSession;
///
/// let mut session = TrackingSession::load("tracking.json5".as_ref())?;
/// session.start()?;
/// for (track_id, id) in session.identifiers() {
///     println!("object {} -> {}", track_id, id);
/// }
/// session.stop()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct TrackingSession {
    pipeline: Pipeline<IdentificationProcessor>,
    config: SharedConfig,
    requests: IdentifyRequests,
}

impl TrackingSession {
    /// 从配置文件创建会话
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::create(PipelineConfig::load(path)?)
    }

    pub fn create(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let source = ImageSequenceSource::from_config(&config.input);
        let tracker = RegionTracker::new(config.regions.clone());
        Self::with_parts(Box::new(source), Box::new(tracker), config.identification)
    }

    /// Builds a session around caller-provided acquisition and tracking.
    pub fn with_parts(
        source: Box<dyn FrameSource>,
        tracker: Box<dyn ObjectTracker>,
        identification: IdentificationConfig,
    ) -> Result<Self, ConfigError> {
        identification.validate()?;
        let config = SharedConfig::new(identification);
        let processor = IdentificationProcessor::new(tracker, config.clone());
        let requests = processor.requests();

        info!("🎬 TrackingSession: created");
        Ok(Self {
            pipeline: Pipeline::new(source, processor),
            config,
            requests,
        })
    }

    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.pipeline.start()
    }

    pub fn stop(&mut self) -> Result<(), PipelineError> {
        self.pipeline.stop()
    }

    pub fn is_running(&self) -> bool {
        self.pipeline.is_running()
    }

    pub fn latest(&self) -> Option<Arc<ProcessedFrame>> {
        self.pipeline.latest()
    }

    pub fn latest_handle(&self) -> LatestFrame<ProcessedFrame> {
        self.pipeline.latest_handle()
    }

    /// (track id, identifier) pairs from the latest processed frame.
    pub fn identifiers(&self) -> Vec<(u32, u32)> {
        self.latest()
            .map(|frame| frame.detected())
            .unwrap_or_default()
    }

    /// 重新识别某个物体（下一帧生效）
    pub fn request_identification(&self, track_id: u32) {
        self.requests.request(track_id);
    }

    pub fn request_all(&self) {
        self.requests.request_all();
    }

    /// Takes effect for objects entering Sampling from now on.
    pub fn update_identification_config(
        &self,
        config: IdentificationConfig,
    ) -> Result<(), ConfigError> {
        self.config.update(config)?;
        info!("🔧 TrackingSession: identification config updated");
        Ok(())
    }

    pub fn identification_config(&self) -> IdentificationConfig {
        self.config.snapshot()
    }

    pub fn stats(&self) -> SessionStats {
        let latest = self.latest();
        SessionStats {
            processed_frames: self.pipeline.processed_frames(),
            tracked_objects: latest.as_ref().map(|f| f.objects.len()).unwrap_or(0),
            detected_objects: latest.as_ref().map(|f| f.detected().len()).unwrap_or(0),
        }
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        info!("🗑️ TrackingSession: released");
    }
}
