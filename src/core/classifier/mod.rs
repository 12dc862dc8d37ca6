//! 外部图像分类模型的适配层
//!
//! 模型本身是黑盒：输入一张图，输出类别、置信度和四类概率。
//! 失败只影响当前帧，由流水线跳过。

pub mod adapter;
pub mod http;
pub mod input;
pub mod mock;

pub use adapter::{ClassifierAdapter, FrameResult};
pub use http::HttpClassifier;
pub use input::{prepare_model_input, resize_for_model};
pub use mock::MockClassifier;

use crate::core::error::ClassificationFailure;
use image::RgbImage;
use serde::Deserialize;
use std::collections::HashMap;

/// 模型原始输出，尚未校验
#[derive(Debug, Clone, Deserialize)]
pub struct RawPrediction {
    pub class_name: String,
    pub confidence: f32,
    #[serde(rename = "all_probabilities")]
    pub probabilities: HashMap<String, f32>,
}

/// 需保证可并发只读调用；流水线本身不会并发调用
pub trait XRayClassifier: Send + Sync {
    fn classify(&self, image: &RgbImage) -> Result<RawPrediction, ClassificationFailure>;

    fn is_loaded(&self) -> bool {
        true
    }
}

impl<C: XRayClassifier + ?Sized> XRayClassifier for Box<C> {
    fn classify(&self, image: &RgbImage) -> Result<RawPrediction, ClassificationFailure> {
        (**self).classify(image)
    }

    fn is_loaded(&self) -> bool {
        (**self).is_loaded()
    }
}

impl<C: XRayClassifier + ?Sized> XRayClassifier for std::sync::Arc<C> {
    fn classify(&self, image: &RgbImage) -> Result<RawPrediction, ClassificationFailure> {
        (**self).classify(image)
    }

    fn is_loaded(&self) -> bool {
        (**self).is_loaded()
    }
}
