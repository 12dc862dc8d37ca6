use super::{RawPrediction, XRayClassifier};
use crate::core::error::ClassificationFailure;
use crate::core::labels::XRayClass;
use image::RgbImage;
use std::sync::atomic::{AtomicUsize, Ordering};

type Pattern = Box<dyn Fn(&RgbImage) -> Option<(XRayClass, f32)> + Send + Sync>;

/// 测试/演示用分类器：按图像内容决定输出
///
/// 命中类别拿到 `confidence`，其余三类平分剩下的概率；
/// 模式返回 `None` 时报告分类失败。
pub struct MockClassifier {
    pattern: Pattern,
    loaded: bool,
    calls: AtomicUsize,
}

impl MockClassifier {
    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(&RgbImage) -> Option<(XRayClass, f32)> + Send + Sync + 'static,
    {
        Self {
            pattern: Box::new(pattern),
            loaded: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fixed(class: XRayClass, confidence: f32) -> Self {
        Self::with_pattern(move |_| Some((class, confidence)))
    }

    /// 模拟模型文件缺失
    pub fn unloaded() -> Self {
        Self {
            loaded: false,
            ..Self::with_pattern(|_| None)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl XRayClassifier for MockClassifier {
    fn classify(&self, image: &RgbImage) -> Result<RawPrediction, ClassificationFailure> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let (class, confidence) = (self.pattern)(image)
            .ok_or_else(|| ClassificationFailure::Model("mock failure".into()))?;

        let rest = ((1.0 - confidence) / 3.0).max(0.0);
        let probabilities = XRayClass::ALL
            .iter()
            .map(|&c| {
                let p = if c == class { confidence } else { rest };
                (c.name().to_string(), p)
            })
            .collect();

        Ok(RawPrediction {
            class_name: class.name().to_string(),
            confidence,
            probabilities,
        })
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}
