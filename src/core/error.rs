use crate::core::labels::XRayClass;
use thiserror::Error;

/// 视频源错误
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("Cannot open video {path}: {reason}")]
    SourceUnavailable { path: String, reason: String },
    #[error("Frame decode error: {0}")]
    Decode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Probe output parse error: {0}")]
    Probe(#[from] serde_json::Error),
}

/// 单帧分类失败（只跳过该帧，不中断整段视频）
#[derive(Debug, Error)]
pub enum ClassificationFailure {
    #[error("Classification model not loaded")]
    NotLoaded,
    #[error("Unknown class label: {0}")]
    UnknownLabel(String),
    #[error("Confidence out of range: {0}")]
    InvalidConfidence(f32),
    #[error("Reported class {reported} is not the most probable class {top}")]
    InconsistentPrediction {
        reported: XRayClass,
        top: XRayClass,
    },
    #[error("Model error: {0}")]
    Model(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Image encode error: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Video(#[from] VideoError),
    #[error("Classification model not loaded")]
    ModelNotLoaded,
    #[error("No frame was classified successfully")]
    NoClassifiableFrames,
    #[error("Unsupported video format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}
