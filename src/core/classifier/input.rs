use crate::core::config::ModelInputConfig;
use image::imageops::FilterType;
use image::RgbImage;

/// CNN 输入：HWC 排列，像素归一化到 [0, 1]
#[derive(Debug, Clone)]
pub struct ModelInput {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ModelInput {
    /// (batch, height, width, channels)
    pub fn shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, 3]
    }
}

/// 缩放到模型输入尺寸，尺寸已一致时直接复制
pub fn resize_for_model(image: &RgbImage, config: &ModelInputConfig) -> RgbImage {
    if image.dimensions() == (config.width, config.height) {
        image.clone()
    } else {
        image::imageops::resize(image, config.width, config.height, FilterType::Triangle)
    }
}

/// 缩放到模型输入尺寸并归一化，供进程内模型的 `XRayClassifier` 实现使用
pub fn prepare_model_input(image: &RgbImage, config: &ModelInputConfig) -> ModelInput {
    let data = resize_for_model(image, config)
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect();

    ModelInput {
        width: config.width,
        height: config.height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resized_and_normalized() {
        let img = RgbImage::from_pixel(100, 60, image::Rgb([255, 0, 51]));
        let input = prepare_model_input(&img, &ModelInputConfig::default());

        assert_eq!(input.shape(), [1, 256, 256, 3]);
        assert_eq!(input.data.len(), 256 * 256 * 3);
        assert!((input.data[0] - 1.0).abs() < 0.01);
        assert!(input.data[1].abs() < 0.01);
        assert!((input.data[2] - 0.2).abs() < 0.01);
        assert!(input.data.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
