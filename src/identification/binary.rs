//! 二进制闪烁编码识别
//!
//! 每个物体按帧推进：Requested → Sampling → Identifying → Detected。
//! 解码只在 Identifying 那一帧同步执行：
//! 1. 自适应阈值 - 亮度分箱取最多的三箱，得到低/高/停止位电平
//! 2. 跳变检测 - 按电平分类，每段电平的第一个采样记为一个 flank
//! 3. 帧选择 + 插值 - 取相距最远的两个停止位之间的序列，按最小间隔补齐欠采样丢失的位
//! 4. 解码 - 取最后 8 位，高电平为 1

use std::time::Instant;

use log::{debug, info};
use thiserror::Error;

use crate::core::config::IdentificationConfig;
use crate::identification::model::{
    flank_pattern, Flank, FlankType, Identification, IntensitySample, TactileObject,
};
use crate::identification::state_machine::{IdentifierPhase, PhaseEvent};

/// Bins used for threshold discovery (three levels, two bins each).
const THRESHOLD_BINS: usize = 6;
const LEVEL_COUNT: usize = 3;
const MIN_STOP_FLANKS: usize = 2;
const MIN_BIT_FLANKS: usize = 7;
const ID_BITS: usize = 8;
const GAP_MARGIN_FACTOR: f64 = 1.5;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IdentificationError {
    #[error("No samples buffered")]
    NoSamples,
    #[error("Too few amplitude bins: {found} (need 3)")]
    TooFewBins { found: usize },
    #[error("Too few stop flanks: {found} (need 2)")]
    TooFewStopFlanks { found: usize },
    #[error("Too few bits read: {found} (need 7)")]
    TooFewBits { found: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub low: f64,
    pub high: f64,
    pub stop: f64,
    pub margin: f64,
}

#[derive(Debug, Clone, Default)]
pub struct BinaryObjectIdentifier;

impl BinaryObjectIdentifier {
    pub fn new() -> Self {
        Self
    }

    pub fn recognize_object_ids(
        &mut self,
        objects: &mut [TactileObject],
        config: &IdentificationConfig,
    ) {
        self.recognize_object_ids_at(objects, config, Instant::now());
    }

    pub fn recognize_object_ids_at(
        &mut self,
        objects: &mut [TactileObject],
        config: &IdentificationConfig,
        now: Instant,
    ) {
        for object in objects.iter_mut() {
            match object.identification.phase() {
                IdentifierPhase::Requested => Self::start(object, config, now),
                IdentifierPhase::Sampling => Self::sample(object, now),
                IdentifierPhase::Identifying => Self::identify(object, config),
                IdentifierPhase::Detected => {}
            }
        }
    }

    fn start(object: &mut TactileObject, config: &IdentificationConfig, now: Instant) {
        let identification = &mut object.identification;
        identification.samples.clear();

        // 采样时长只在进入 Sampling 时锁定
        identification
            .sampling_timer
            .set_duration(config.sampling_time());
        identification.sampling_timer.reset_at(now);

        identification.apply(PhaseEvent::Started);
    }

    fn sample(object: &mut TactileObject, now: Instant) {
        let intensity = object.intensity;
        let timestamp_ms = object.timestamp_ms;
        let identification = &mut object.identification;

        if intensity.is_finite() {
            identification
                .samples
                .push(IntensitySample::new(intensity, timestamp_ms));
        }
        identification.apply(PhaseEvent::Sampled);

        if identification.sampling_timer.is_elapsed_at(now) {
            debug!(
                "📈 Object {}: sampled {} intensities",
                object.track_id,
                identification.samples.len()
            );
            identification.apply(PhaseEvent::WindowElapsed);
        }
    }

    fn identify(object: &mut TactileObject, config: &IdentificationConfig) {
        match decode(&mut object.identification, config.threshold_margin_factor) {
            Ok(id) => {
                info!("✅ Object {} identified as {}", object.track_id, id);
                object.identifier = Some(id);
                object.identification.samples.clear();
                object.identification.apply(PhaseEvent::Decoded);
            }
            Err(e) => {
                debug!(
                    "🔁 Object {}: {} -> restarting identification",
                    object.track_id, e
                );
                object.identification.attempts = object.identification.attempts.saturating_add(1);
                object.identification.apply(PhaseEvent::Rejected);
            }
        }
    }
}

/// Runs the full decode over the buffered samples and stores the discovered
/// thresholds on `identification`.
pub fn decode(
    identification: &mut Identification,
    margin_factor: f64,
) -> Result<u32, IdentificationError> {
    let thresholds = detect_thresholds(&identification.samples, margin_factor)?;
    identification.low_threshold = thresholds.low;
    identification.high_threshold = thresholds.high;
    identification.stop_bit_threshold = thresholds.stop;
    identification.threshold_margin = thresholds.margin;
    debug!(
        "Thresholds low={:.3} high={:.3} stop={:.3} margin={:.3}",
        thresholds.low, thresholds.high, thresholds.stop, thresholds.margin
    );

    let flanks = detect_flanks(identification);
    debug!("Found {} flanks: {}", flanks.len(), flank_pattern(&flanks));

    let interpolated = interpolate_flanks(&flanks)?;
    debug!(
        "Interpolated ({}): {}",
        interpolated.len(),
        flank_pattern(&interpolated)
    );

    if interpolated.len() < MIN_BIT_FLANKS {
        return Err(IdentificationError::TooFewBits {
            found: interpolated.len(),
        });
    }

    Ok(decode_bits(&interpolated))
}

pub fn detect_thresholds(
    samples: &[IntensitySample],
    margin_factor: f64,
) -> Result<Thresholds, IdentificationError> {
    if samples.is_empty() {
        return Err(IdentificationError::NoSamples);
    }

    let (min, max) = samples.iter().fold((f64::MAX, f64::MIN), |(lo, hi), s| {
        (lo.min(s.intensity), hi.max(s.intensity))
    });
    let range = max - min;
    if range <= 0.0 {
        return Err(IdentificationError::TooFewBins { found: 1 });
    }
    let bin_width = range / THRESHOLD_BINS as f64;

    let mut counts = [0usize; THRESHOLD_BINS];
    let mut sums = [0.0f64; THRESHOLD_BINS];
    for sample in samples {
        // 最大值落在最后一个箱
        let idx = (((sample.intensity - min) / bin_width).floor() as usize).min(THRESHOLD_BINS - 1);
        counts[idx] += 1;
        sums[idx] += sample.intensity;
    }

    let mut bins: Vec<usize> = (0..THRESHOLD_BINS).filter(|&i| counts[i] > 0).collect();
    bins.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));
    bins.truncate(LEVEL_COUNT);

    if bins.len() < LEVEL_COUNT {
        return Err(IdentificationError::TooFewBins { found: bins.len() });
    }

    let mut averages: Vec<f64> = bins.iter().map(|&i| sums[i] / counts[i] as f64).collect();
    averages.sort_by(|a, b| a.total_cmp(b));

    let min_distance = averages
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(f64::MAX, f64::min);

    Ok(Thresholds {
        low: averages[0],
        high: averages[1],
        stop: averages[2],
        margin: min_distance / 2.0 * margin_factor,
    })
}

/// Emits a flank at the first sample of every run of a new level.
/// Out-of-range samples are skipped without ending the current run.
pub fn detect_flanks(identification: &Identification) -> Vec<Flank> {
    let mut flanks = Vec::new();
    let mut last: Option<FlankType> = None;

    for sample in &identification.samples {
        let flank = identification.classify(sample);
        if flank.flank_type == FlankType::OutOfRange {
            continue;
        }
        if last != Some(flank.flank_type) {
            flanks.push(flank);
            last = Some(flank.flank_type);
        }
    }

    flanks
}

/// Picks the widest frame between two consecutive stop flanks and fills in
/// the bits lost to under-sampling.
pub fn interpolate_flanks(flanks: &[Flank]) -> Result<Vec<Flank>, IdentificationError> {
    let stops: Vec<usize> = flanks
        .iter()
        .enumerate()
        .filter(|(_, f)| f.flank_type == FlankType::Stop)
        .map(|(i, _)| i)
        .collect();

    if stops.len() < MIN_STOP_FLANKS {
        return Err(IdentificationError::TooFewStopFlanks { found: stops.len() });
    }

    // 间隔相同时取最早的一帧
    let mut best = (stops[0], stops[1]);
    for pair in stops.windows(2) {
        if pair[1] - pair[0] > best.1 - best.0 {
            best = (pair[0], pair[1]);
        }
    }
    let pattern = &flanks[best.0..=best.1];
    debug!("Longest frame: {}", flank_pattern(pattern));

    // 不计第一个停止位之后的间隔
    let gaps: Vec<u64> = pattern[1..]
        .windows(2)
        .map(|w| w[1].timestamp_ms.saturating_sub(w[0].timestamp_ms))
        .collect();
    let unit = gaps.iter().copied().min().unwrap_or(0);
    let margin_gap = (unit as f64 * GAP_MARGIN_FACTOR).round() as u64;

    let mut result = Vec::with_capacity(pattern.len() * 2);
    for (i, flank) in pattern.iter().enumerate().take(pattern.len() - 1).skip(1) {
        result.push(*flank);

        if margin_gap == 0 {
            continue;
        }
        let mut remaining = gaps[i - 1];
        let mut offset = 0;
        while remaining > margin_gap {
            remaining -= margin_gap;
            offset += margin_gap;
            result.push(Flank::new(flank.flank_type, flank.timestamp_ms + offset));
        }
    }

    Ok(result)
}

/// 取最后 8 位：倒序后第 i 位为高电平则置 1
pub fn decode_bits(flanks: &[Flank]) -> u32 {
    flanks
        .iter()
        .rev()
        .take(ID_BITS)
        .enumerate()
        .filter(|(_, f)| f.flank_type == FlankType::High)
        .fold(0u32, |id, (i, _)| id | (1 << i))
}
