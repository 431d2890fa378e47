use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::config::RegionConfig;

/// 帧数据结构（单通道亮度）
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // Luma8 格式
    pub timestamp: Duration,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Self {
        Self {
            width,
            height,
            data,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
        }
    }

    pub fn from_image(image: DynamicImage, timestamp_ms: u64, frame_number: u64) -> Self {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        Self::new(width, height, gray.into_raw(), timestamp_ms, frame_number)
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp.as_millis() as u64
    }

    /// Mean luma of `region` scaled to `[0, 1]`; the region is clipped to the
    /// frame and `None` is returned when nothing of it remains.
    pub fn region_intensity(&self, region: &RegionConfig) -> Option<f64> {
        let x_end = region.x.saturating_add(region.width).min(self.width);
        let y_end = region.y.saturating_add(region.height).min(self.height);
        if region.x >= x_end || region.y >= y_end || self.data.len() < self.pixel_count() {
            return None;
        }

        let w = self.width as usize;
        let mut sum = 0u64;
        for y in region.y as usize..y_end as usize {
            let row = &self.data[y * w + region.x as usize..y * w + x_end as usize];
            sum += row.iter().map(|&v| v as u64).sum::<u64>();
        }

        let count = ((x_end - region.x) * (y_end - region.y)) as f64;
        Some(sum as f64 / count / 255.0)
    }
}

/// 帧元数据（轻量级，用于传递信息）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: u64,
    pub frame_number: u64,
}

impl FrameInfo {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            timestamp_ms: frame.timestamp_ms(),
            frame_number: frame.frame_number,
        }
    }
}
