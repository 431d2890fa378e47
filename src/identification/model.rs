use serde::{Deserialize, Serialize};

use crate::core::timer::ElapsedTimer;
use crate::identification::state_machine::{IdentifierPhase, PhaseEvent};

/// 单次亮度采样
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensitySample {
    pub intensity: f64,
    pub timestamp_ms: u64,
}

impl IntensitySample {
    pub fn new(intensity: f64, timestamp_ms: u64) -> Self {
        Self {
            intensity,
            timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlankType {
    Low,
    High,
    Stop,
    OutOfRange,
}

impl FlankType {
    pub fn symbol(&self) -> char {
        match self {
            FlankType::Low => 'L',
            FlankType::High => 'H',
            FlankType::Stop => 'S',
            FlankType::OutOfRange => 'O',
        }
    }
}

/// 电平跳变（新电平段的第一个采样）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flank {
    pub flank_type: FlankType,
    pub timestamp_ms: u64,
}

impl Flank {
    pub fn new(flank_type: FlankType, timestamp_ms: u64) -> Self {
        Self {
            flank_type,
            timestamp_ms,
        }
    }
}

/// Renders flanks as `S H L ...` for diagnostics.
pub fn flank_pattern(flanks: &[Flank]) -> String {
    flanks.iter().map(|f| f.flank_type.symbol()).collect()
}

/// 单个物体的识别状态
#[derive(Debug, Clone)]
pub struct Identification {
    pub(crate) phase: IdentifierPhase,
    pub(crate) samples: Vec<IntensitySample>,
    pub(crate) sampling_timer: ElapsedTimer,
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub stop_bit_threshold: f64,
    pub threshold_margin: f64,
    pub(crate) attempts: u32,
}

impl Identification {
    pub fn new() -> Self {
        Self {
            phase: IdentifierPhase::Requested,
            samples: Vec::new(),
            sampling_timer: ElapsedTimer::default(),
            low_threshold: 0.0,
            high_threshold: 0.0,
            stop_bit_threshold: 0.0,
            threshold_margin: 0.0,
            attempts: 0,
        }
    }

    pub fn phase(&self) -> IdentifierPhase {
        self.phase
    }

    pub fn samples(&self) -> &[IntensitySample] {
        &self.samples
    }

    /// Failed decode attempts since the last request. Retry is unbounded,
    /// so callers wanting a timeout watch this counter.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Restarts identification from scratch, also for Detected objects.
    pub fn request(&mut self) {
        self.apply(PhaseEvent::ResetRequested);
        self.attempts = 0;
    }

    pub(crate) fn apply(&mut self, event: PhaseEvent) {
        self.phase = self.phase.transition(event);
    }

    pub fn classify(&self, sample: &IntensitySample) -> Flank {
        let within = |threshold: f64| (sample.intensity - threshold).abs() <= self.threshold_margin;

        let flank_type = if within(self.low_threshold) {
            FlankType::Low
        } else if within(self.high_threshold) {
            FlankType::High
        } else if within(self.stop_bit_threshold) {
            FlankType::Stop
        } else {
            FlankType::OutOfRange
        };

        Flank::new(flank_type, sample.timestamp_ms)
    }
}

impl Default for Identification {
    fn default() -> Self {
        Self::new()
    }
}

/// 被追踪的实体（由上游追踪器创建和销毁）
#[derive(Debug, Clone)]
pub struct TactileObject {
    pub track_id: u32,
    pub identifier: Option<u32>,
    pub intensity: f64,
    pub timestamp_ms: u64,
    pub identification: Identification,
}

impl TactileObject {
    pub fn new(track_id: u32) -> Self {
        Self {
            track_id,
            identifier: None,
            intensity: 0.0,
            timestamp_ms: 0,
            identification: Identification::new(),
        }
    }

    pub fn observe(&mut self, intensity: f64, timestamp_ms: u64) {
        self.intensity = intensity;
        self.timestamp_ms = timestamp_ms;
    }

    pub fn is_detected(&self) -> bool {
        self.identification.phase.is_terminal()
    }
}
