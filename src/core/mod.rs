pub mod config;
pub mod error;
pub mod timer;
pub mod video;

pub use config::{IdentificationConfig, IdentifierKind, InputConfig, PipelineConfig, RegionConfig, SharedConfig};
pub use error::{ConfigError, PipelineError};
pub use timer::ElapsedTimer;
