pub mod frame;
pub mod source;
pub mod tracker;

pub use frame::{Frame, FrameInfo};
pub use source::{FrameSource, ImageSequenceSource};
pub use tracker::{ObjectTracker, RegionTracker};
