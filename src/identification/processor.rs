use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::core::config::SharedConfig;
use crate::core::video::frame::{Frame, FrameInfo};
use crate::core::video::tracker::ObjectTracker;
use crate::identification::identifier::{Identify, ObjectIdentifier};
use crate::identification::model::TactileObject;
use crate::identification::pipeline::FrameProcessor;
use crate::identification::state_machine::IdentifierPhase;

/// 单个物体在某一帧的状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSnapshot {
    pub track_id: u32,
    pub identifier: Option<u32>,
    pub phase: IdentifierPhase,
    pub intensity: f64,
    pub attempts: u32,
}

impl ObjectSnapshot {
    fn from_object(object: &TactileObject) -> Self {
        Self {
            track_id: object.track_id,
            identifier: object.identifier,
            phase: object.identification.phase(),
            intensity: object.intensity,
            attempts: object.identification.attempts(),
        }
    }
}

/// Output of one pipeline tick, published as the latest frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedFrame {
    pub info: FrameInfo,
    pub objects: Vec<ObjectSnapshot>,
}

impl ProcessedFrame {
    pub fn identifier_of(&self, track_id: u32) -> Option<u32> {
        self.objects
            .iter()
            .find(|o| o.track_id == track_id)
            .and_then(|o| o.identifier)
    }

    /// (track id, identifier) pairs of all Detected objects.
    pub fn detected(&self) -> Vec<(u32, u32)> {
        self.objects
            .iter()
            .filter(|o| o.phase == IdentifierPhase::Detected)
            .filter_map(|o| o.identifier.map(|id| (o.track_id, id)))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Default)]
struct PendingRequests {
    all: bool,
    track_ids: Vec<u32>,
}

/// 重新识别请求 - 其他线程提交，工作线程在下一帧开始时应用
#[derive(Debug, Clone, Default)]
pub struct IdentifyRequests {
    pending: Arc<Mutex<PendingRequests>>,
}

impl IdentifyRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, track_id: u32) {
        let mut pending = self.pending.lock();
        if !pending.track_ids.contains(&track_id) {
            pending.track_ids.push(track_id);
        }
    }

    pub fn request_all(&self) {
        self.pending.lock().all = true;
    }

    fn apply(&self, objects: &mut [TactileObject]) {
        let pending = std::mem::take(&mut *self.pending.lock());
        if !pending.all && pending.track_ids.is_empty() {
            return;
        }

        for object in objects
            .iter_mut()
            .filter(|o| pending.all || pending.track_ids.contains(&o.track_id))
        {
            object.identification.request();
        }
    }
}

/// 每帧：追踪器更新 → 应用重识别请求 → 识别器推进 → 生成快照
pub struct IdentificationProcessor {
    tracker: Box<dyn ObjectTracker>,
    identifier: ObjectIdentifier,
    config: SharedConfig,
    requests: IdentifyRequests,
    objects: Vec<TactileObject>,
}

impl IdentificationProcessor {
    pub fn new(tracker: Box<dyn ObjectTracker>, config: SharedConfig) -> Self {
        let identifier = ObjectIdentifier::from_kind(config.snapshot().kind);
        Self {
            tracker,
            identifier,
            config,
            requests: IdentifyRequests::new(),
            objects: Vec::new(),
        }
    }

    pub fn requests(&self) -> IdentifyRequests {
        self.requests.clone()
    }

    pub fn objects(&self) -> &[TactileObject] {
        &self.objects
    }

    pub fn process_at(&mut self, frame: Frame, now: Instant) -> ProcessedFrame {
        self.tracker.update(&frame, &mut self.objects);
        self.requests.apply(&mut self.objects);

        let config = self.config.snapshot();
        self.identifier
            .recognize_object_ids(&mut self.objects, &config, now);

        ProcessedFrame {
            info: FrameInfo::from_frame(&frame),
            objects: self.objects.iter().map(ObjectSnapshot::from_object).collect(),
        }
    }
}

impl FrameProcessor for IdentificationProcessor {
    type Output = ProcessedFrame;

    fn process(&mut self, frame: Frame) -> ProcessedFrame {
        self.process_at(frame, Instant::now())
    }
}
