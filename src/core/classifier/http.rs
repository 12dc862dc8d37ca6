//! 通过 HTTP 调用远端推理服务
//!
//! 请求体为 PNG 编码的帧，响应体形如
//! `{"success": true, "class_name": "...", "confidence": 0.9, "all_probabilities": {...}}`，
//! 失败时 `{"success": false, "error": "..."}`。

use super::input::resize_for_model;
use super::{RawPrediction, XRayClassifier};
use crate::core::config::ModelInputConfig;
use crate::core::error::ClassificationFailure;
use image::{ImageOutputFormat, RgbImage};
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ClassifierResponse {
    success: bool,
    class_name: Option<String>,
    confidence: Option<f32>,
    all_probabilities: Option<HashMap<String, f32>>,
    error: Option<String>,
}

impl ClassifierResponse {
    fn into_prediction(self) -> Result<RawPrediction, ClassificationFailure> {
        if !self.success {
            return Err(ClassificationFailure::Model(
                self.error.unwrap_or_else(|| "classifier reported failure".into()),
            ));
        }
        match (self.class_name, self.confidence, self.all_probabilities) {
            (Some(class_name), Some(confidence), Some(probabilities)) => Ok(RawPrediction {
                class_name,
                confidence,
                probabilities,
            }),
            _ => Err(ClassificationFailure::Model(
                "incomplete classifier response".into(),
            )),
        }
    }
}

/// 帧先缩放到模型输入尺寸再上传
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
    input_size: ModelInputConfig,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ClassificationFailure> {
        Self::with_timeout(endpoint, Duration::from_secs(30))
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClassificationFailure> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            input_size: ModelInputConfig::default(),
        })
    }

    pub fn with_input_size(mut self, input_size: ModelInputConfig) -> Self {
        self.input_size = input_size;
        self
    }

    /// 实际上传的图像
    fn request_image(&self, image: &RgbImage) -> RgbImage {
        resize_for_model(image, &self.input_size)
    }

    fn encode_png(image: &RgbImage) -> Result<Vec<u8>, ClassificationFailure> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageOutputFormat::Png)?;
        Ok(buffer.into_inner())
    }
}

impl XRayClassifier for HttpClassifier {
    fn classify(&self, image: &RgbImage) -> Result<RawPrediction, ClassificationFailure> {
        let body = Self::encode_png(&self.request_image(image))?;
        debug!("POST {} ({} bytes)", self.endpoint, body.len());

        let response: ClassifierResponse = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(body)
            .send()?
            .error_for_status()?
            .json()?;

        response.into_prediction()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<RawPrediction, ClassificationFailure> {
        serde_json::from_str::<ClassifierResponse>(json)
            .unwrap()
            .into_prediction()
    }

    #[test]
    fn test_success_response() {
        let raw = parse(
            r#"{"success": true, "class_name": "Normal", "class_id": 1, "confidence": 0.93,
                "all_probabilities": {"Covid-19": 0.01, "Normal": 0.93,
                "Pneumonia Viral": 0.04, "Pneumonia Bacteriana": 0.02}}"#,
        )
        .unwrap();
        assert_eq!(raw.class_name, "Normal");
        assert_eq!(raw.probabilities.len(), 4);
    }

    #[test]
    fn test_failure_response_carries_message() {
        let err = parse(r#"{"success": false, "error": "Modelo nao carregado"}"#).unwrap_err();
        assert!(matches!(err, ClassificationFailure::Model(ref m) if m == "Modelo nao carregado"));
    }

    #[test]
    fn test_incomplete_response() {
        assert!(parse(r#"{"success": true, "class_name": "Normal"}"#).is_err());
    }

    #[test]
    fn test_frames_resized_to_model_input() {
        let classifier = HttpClassifier::new("http://127.0.0.1:9/predict").unwrap();
        let sent = classifier.request_image(&RgbImage::new(640, 360));
        assert_eq!(sent.dimensions(), (256, 256));

        let classifier = classifier.with_input_size(ModelInputConfig {
            width: 224,
            height: 224,
        });
        let png = HttpClassifier::encode_png(&classifier.request_image(&RgbImage::new(90, 70))).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (224, 224));
    }

    #[test]
    fn test_png_encoding() {
        let png = HttpClassifier::encode_png(&RgbImage::new(8, 8)).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
}
