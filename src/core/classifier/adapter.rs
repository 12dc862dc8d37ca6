use super::{RawPrediction, XRayClassifier};
use crate::core::error::ClassificationFailure;
use crate::core::labels::{ClassDistribution, XRayClass};
use image::RgbImage;
use serde::Serialize;
use std::collections::HashMap;

/// 模型输出允许的浮点误差
const PROBABILITY_EPSILON: f32 = 1e-4;

/// 单帧分类结果，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameResult {
    #[serde(rename = "frame_number")]
    pub frame_index: u64,
    #[serde(rename = "class_name")]
    pub class: XRayClass,
    pub confidence: f32,
    #[serde(rename = "all_probabilities")]
    pub distribution: ClassDistribution,
}

/// 把黑盒模型的输出校验并规整成 `FrameResult`
pub struct ClassifierAdapter<'a, C: XRayClassifier + ?Sized> {
    classifier: &'a C,
}

impl<'a, C: XRayClassifier + ?Sized> ClassifierAdapter<'a, C> {
    pub fn new(classifier: &'a C) -> Self {
        Self { classifier }
    }

    pub fn is_loaded(&self) -> bool {
        self.classifier.is_loaded()
    }

    pub fn classify(
        &self,
        frame_index: u64,
        image: &RgbImage,
    ) -> Result<FrameResult, ClassificationFailure> {
        if !self.classifier.is_loaded() {
            return Err(ClassificationFailure::NotLoaded);
        }
        let raw = self.classifier.classify(image)?;
        validate(frame_index, raw)
    }
}

fn unit_interval(value: f32) -> Result<f32, ClassificationFailure> {
    if value.is_finite() && (-PROBABILITY_EPSILON..=1.0 + PROBABILITY_EPSILON).contains(&value) {
        Ok(value.clamp(0.0, 1.0))
    } else {
        Err(ClassificationFailure::InvalidConfidence(value))
    }
}

fn validate(frame_index: u64, raw: RawPrediction) -> Result<FrameResult, ClassificationFailure> {
    let class = XRayClass::from_name(&raw.class_name)
        .ok_or_else(|| ClassificationFailure::UnknownLabel(raw.class_name.clone()))?;
    let confidence = unit_interval(raw.confidence)?;

    let named: HashMap<String, f32> = raw
        .probabilities
        .iter()
        .map(|(name, &p)| unit_interval(p).map(|p| (name.clone(), p)))
        .collect::<Result<_, _>>()?;
    let distribution =
        ClassDistribution::from_named(&named).map_err(ClassificationFailure::UnknownLabel)?;

    // 报告的类别必须是分布中概率最高的（允许并列）
    let (top, top_p) = distribution.argmax();
    if distribution.get(class) + PROBABILITY_EPSILON < top_p {
        return Err(ClassificationFailure::InconsistentPrediction {
            reported: class,
            top,
        });
    }

    Ok(FrameResult {
        frame_index,
        class,
        confidence,
        distribution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::MockClassifier;

    fn raw(class_name: &str, confidence: f32, probs: &[(&str, f32)]) -> RawPrediction {
        RawPrediction {
            class_name: class_name.to_string(),
            confidence,
            probabilities: probs
                .iter()
                .map(|(n, p)| (n.to_string(), *p))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_valid_prediction() {
        let result = validate(
            15,
            raw("Normal", 0.9, &[("Normal", 0.9), ("Covid-19", 0.1)]),
        )
        .unwrap();
        assert_eq!(result.frame_index, 15);
        assert_eq!(result.class, XRayClass::Normal);
        assert!((result.confidence - 0.9).abs() < 1e-6);
        assert_eq!(result.distribution.get(XRayClass::PneumoniaViral), 0.0);
    }

    #[test]
    fn test_unknown_label_fails() {
        let err = validate(0, raw("Fracture", 0.9, &[])).unwrap_err();
        assert!(matches!(err, ClassificationFailure::UnknownLabel(ref l) if l == "Fracture"));

        let err = validate(0, raw("Normal", 0.9, &[("Fracture", 0.1)])).unwrap_err();
        assert!(matches!(err, ClassificationFailure::UnknownLabel(_)));
    }

    #[test]
    fn test_out_of_range_confidence_fails() {
        assert!(matches!(
            validate(0, raw("Normal", 1.5, &[])),
            Err(ClassificationFailure::InvalidConfidence(_))
        ));
        assert!(validate(0, raw("Normal", f32::NAN, &[])).is_err());
        assert!(validate(0, raw("Normal", 0.5, &[("Normal", -0.2)])).is_err());
    }

    #[test]
    fn test_rounding_noise_is_clamped() {
        let result = validate(0, raw("Normal", 1.00001, &[("Normal", 1.00001)])).unwrap();
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_class_must_match_distribution() {
        let err = validate(
            0,
            raw(
                "Normal",
                0.9,
                &[("Covid-19", 0.7), ("Normal", 0.1), ("Pneumonia Viral", 0.1), ("Pneumonia Bacteriana", 0.1)],
            ),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ClassificationFailure::InconsistentPrediction {
                reported: XRayClass::Normal,
                top: XRayClass::Covid19,
            }
        ));

        // 并列第一时任一类别都可接受
        let tied = validate(
            0,
            raw("Pneumonia Bacteriana", 0.5, &[("Pneumonia Viral", 0.5), ("Pneumonia Bacteriana", 0.5)]),
        )
        .unwrap();
        assert_eq!(tied.class, XRayClass::PneumoniaBacterial);
    }

    #[test]
    fn test_inconsistent_frames_are_skipped_by_pipeline() {
        use crate::core::pipeline::VideoPipeline;
        use crate::core::video::source::MemorySource;

        struct Contradicting;
        impl XRayClassifier for Contradicting {
            fn classify(&self, _image: &RgbImage) -> Result<RawPrediction, ClassificationFailure> {
                Ok(RawPrediction {
                    class_name: "Normal".into(),
                    confidence: 0.9,
                    probabilities: [("Covid-19".to_string(), 0.9), ("Normal".to_string(), 0.1)]
                        .into_iter()
                        .collect(),
                })
            }
        }

        let pipeline = VideoPipeline::new(Contradicting);
        let source = MemorySource::from_fn(30, 30.0, |_| RgbImage::new(8, 8));
        assert!(matches!(
            pipeline.analyze(source),
            Err(crate::core::error::PipelineError::NoClassifiableFrames)
        ));
    }

    #[test]
    fn test_unloaded_model_reports_failure() {
        let classifier = MockClassifier::unloaded();
        let adapter = ClassifierAdapter::new(&classifier);
        assert!(!adapter.is_loaded());
        assert!(matches!(
            adapter.classify(0, &RgbImage::new(2, 2)),
            Err(ClassificationFailure::NotLoaded)
        ));
    }

    #[test]
    fn test_serialized_field_names() {
        let classifier = MockClassifier::fixed(XRayClass::PneumoniaViral, 0.8);
        let result = ClassifierAdapter::new(&classifier)
            .classify(30, &RgbImage::new(2, 2))
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["frame_number"], 30);
        assert_eq!(json["class_name"], "Pneumonia Viral");
        assert!(json["all_probabilities"]["Normal"].is_number());
    }
}
