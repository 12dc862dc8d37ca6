use image::{GrayImage, RgbImage};

/// 抽中的一帧（解码后的 RGB 图像 + 在源视频中的 0 基序号）
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub frame_index: u64,
    pub image: RgbImage,
}

impl SampledFrame {
    pub fn new(frame_index: u64, image: RgbImage) -> Self {
        Self { frame_index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_count(&self) -> usize {
        (self.width() as usize) * (self.height() as usize)
    }
}

/// 视频元数据（打开视频源时读取）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    /// 读不到时为 0
    pub fps: f64,
    /// 容器报告的总帧数，未知时为 0
    pub total_frames: u64,
    pub width: u32,
    pub height: u32,
}

impl VideoMetadata {
    pub fn frame_bytes(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 3
    }
}

/// ITU-R BT.601 灰度，与 OpenCV `COLOR_RGB2GRAY` 的权重一致
pub fn to_gray(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y).0;
        let val = (p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114 + 500) / 1000;
        image::Luma([val as u8])
    })
}

/// 灰度转回三通道
pub fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        image::Rgb([v, v, v])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampled_frame_dimensions() {
        let frame = SampledFrame::new(30, RgbImage::new(100, 50));
        assert_eq!(frame.frame_index, 30);
        assert_eq!(frame.width(), 100);
        assert_eq!(frame.height(), 50);
        assert_eq!(frame.pixel_count(), 5000);
    }

    #[test]
    fn test_gray_conversion_weights() {
        let mut img = RgbImage::new(3, 1);
        img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        img.put_pixel(1, 0, image::Rgb([0, 255, 0]));
        img.put_pixel(2, 0, image::Rgb([128, 128, 128]));

        let gray = to_gray(&img);
        assert_eq!(gray.get_pixel(0, 0).0[0], 76);
        assert_eq!(gray.get_pixel(1, 0).0[0], 150);
        assert_eq!(gray.get_pixel(2, 0).0[0], 128);

        let back = gray_to_rgb(&gray);
        assert_eq!(back.get_pixel(2, 0).0, [128, 128, 128]);
    }

    #[test]
    fn test_frame_bytes() {
        let meta = VideoMetadata {
            fps: 30.0,
            total_frames: 90,
            width: 64,
            height: 48,
        };
        assert_eq!(meta.frame_bytes(), 64 * 48 * 3);
    }
}
