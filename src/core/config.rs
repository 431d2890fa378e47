//! 流水线配置 - JSON5 文件加载 + 识别参数热更新

use crate::core::error::ConfigError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// 可用的识别策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// 三电平（低/高/停止位）二进制闪烁编码
    #[default]
    Binary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentificationConfig {
    pub kind: IdentifierKind,
    /// Length of the sampling window, latched when an object enters Sampling.
    pub sampling_time_ms: u64,
    /// Scales the hysteresis radius around each discovered level.
    pub threshold_margin_factor: f64,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            kind: IdentifierKind::Binary,
            sampling_time_ms: 3000,
            threshold_margin_factor: 0.8,
        }
    }
}

impl IdentificationConfig {
    pub fn for_fast_blink() -> Self {
        Self {
            sampling_time_ms: 1500,
            threshold_margin_factor: 0.7,
            ..Default::default()
        }
    }

    pub fn for_slow_blink() -> Self {
        Self {
            sampling_time_ms: 6000,
            threshold_margin_factor: 0.9,
            ..Default::default()
        }
    }

    pub fn sampling_time(&self) -> Duration {
        Duration::from_millis(self.sampling_time_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling_time_ms == 0 {
            return Err(ConfigError::Invalid(
                "sampling_time_ms must be greater than zero".into(),
            ));
        }
        if !self.threshold_margin_factor.is_finite() || self.threshold_margin_factor <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "threshold_margin_factor must be positive, got {}",
                self.threshold_margin_factor
            )));
        }
        Ok(())
    }
}

/// 图像序列输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub path: PathBuf,
    /// Paces reads to this rate when set; otherwise frames are read as fast as
    /// they decode.
    pub frame_rate: Option<f64>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("frames"),
            frame_rate: None,
        }
    }
}

/// 固定采样区域（像素坐标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub id: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub identification: IdentificationConfig,
    pub input: InputConfig,
    pub regions: Vec<RegionConfig>,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json5_str(&data)
    }

    pub fn from_json5_str(data: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig =
            json5::from_str(data).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.identification.validate()?;

        for (i, region) in self.regions.iter().enumerate() {
            if region.width == 0 || region.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "region {} has an empty area",
                    region.id
                )));
            }
            if self.regions[..i].iter().any(|r| r.id == region.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate region id {}",
                    region.id
                )));
            }
        }
        Ok(())
    }
}

/// 可热更新的识别参数句柄
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<IdentificationConfig>>,
}

impl SharedConfig {
    pub fn new(config: IdentificationConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn snapshot(&self) -> IdentificationConfig {
        self.inner.read().clone()
    }

    pub fn update(&self, config: IdentificationConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.inner.write() = config;
        Ok(())
    }
}
