pub mod enhance;
pub mod frame;
pub mod region;
pub mod sampler;
pub mod source;

pub use enhance::FrameEnhancer;
pub use frame::{SampledFrame, VideoMetadata};
pub use region::{RegionBounds, RegionExtractor};
pub use sampler::{sampling_interval, FrameSampler};
pub use source::{FfmpegSource, MemorySource, VideoSource};
