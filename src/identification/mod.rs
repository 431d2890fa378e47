//! 物体身份识别 - 通过闪烁亮度脉冲解码物体 ID
//!
//! 核心流程：
//! 1. 追踪器每帧提供物体亮度与时间戳
//! 2. 状态机驱动 - Requested → Sampling → Identifying → Detected，失败后从头重试
//! 3. 自适应三电平阈值 + 跳变检测 + 欠采样插值 + 8 位解码
//! 4. 流水线宿主在单个工作线程上读取、处理并发布最新结果

pub mod binary;
pub mod identifier;
pub mod model;
pub mod pipeline;
pub mod processor;
pub mod state_machine;

pub use binary::{BinaryObjectIdentifier, IdentificationError, Thresholds};
pub use identifier::{Identify, ObjectIdentifier};
pub use model::{Flank, FlankType, Identification, IntensitySample, TactileObject};
pub use pipeline::{CancellationToken, FrameProcessor, LatestFrame, Pipeline};
pub use processor::{IdentificationProcessor, IdentifyRequests, ObjectSnapshot, ProcessedFrame};
pub use state_machine::{IdentifierPhase, PhaseEvent};
