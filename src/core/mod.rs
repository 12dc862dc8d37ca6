pub mod aggregate;
pub mod classifier;
pub mod config;
pub mod error;
pub mod labels;
pub mod observer;
pub mod pipeline;
pub mod video;

pub use aggregate::{AggregateResult, Aggregator};
pub use config::PipelineConfig;
pub use error::{ClassificationFailure, PipelineError, VideoError};
pub use labels::{ClassDistribution, XRayClass};
pub use observer::{FrameObserver, LogObserver, NoopObserver, ObserverControl};
pub use pipeline::{VideoAnalysis, VideoPipeline};
