//! 物体追踪接口 + 固定区域追踪器

use log::{debug, warn};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::core::config::RegionConfig;
use crate::core::video::frame::Frame;
use crate::identification::model::TactileObject;

/// 上游追踪器：每帧更新物体列表的亮度与时间戳
pub trait ObjectTracker: Send {
    fn update(&mut self, frame: &Frame, objects: &mut Vec<TactileObject>);
}

/// Tracks objects at fixed pixel regions; one object per region.
pub struct RegionTracker {
    regions: Vec<RegionConfig>,
    pool: Option<ThreadPool>,
}

impl RegionTracker {
    pub fn new(regions: Vec<RegionConfig>) -> Self {
        let num_threads = num_cpus::get().min(4);
        debug!("Using {} threads for region sampling", num_threads);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("region-sampler-{}", i))
            .build()
            .map_err(|e| warn!("Falling back to the global rayon pool: {}", e))
            .ok();

        Self { regions, pool }
    }

    pub fn regions(&self) -> &[RegionConfig] {
        &self.regions
    }

    fn measure(&self, frame: &Frame) -> Vec<Option<f64>> {
        let run = || -> Vec<Option<f64>> {
            self.regions
                .par_iter()
                .map(|region| frame.region_intensity(region))
                .collect()
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}

impl ObjectTracker for RegionTracker {
    fn update(&mut self, frame: &Frame, objects: &mut Vec<TactileObject>) {
        if objects.len() != self.regions.len()
            || objects
                .iter()
                .zip(&self.regions)
                .any(|(o, r)| o.track_id != r.id)
        {
            // 区域集合变化时重建物体列表，保留已有物体的识别状态
            let mut previous = std::mem::take(objects);
            for region in &self.regions {
                let object = previous
                    .iter()
                    .position(|o| o.track_id == region.id)
                    .map(|i| previous.swap_remove(i))
                    .unwrap_or_else(|| TactileObject::new(region.id));
                objects.push(object);
            }
        }

        let timestamp_ms = frame.timestamp_ms();
        for (object, intensity) in objects.iter_mut().zip(self.measure(frame)) {
            // 区域不在画面内时记为 NaN，识别器会丢弃该采样
            object.observe(intensity.unwrap_or(f64::NAN), timestamp_ms);
        }
    }
}
