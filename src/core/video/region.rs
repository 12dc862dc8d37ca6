//! 从录屏画面中定位 X 光片区域
//!
//! 核心策略：
//! 1. 灰度 + 高斯模糊去噪
//! 2. Otsu 全局阈值二值化，无需按视频调参
//! 3. 先闭运算合并相邻区域，再开运算去掉小噪点
//! 4. 取最外层轮廓，面积过小的丢弃，剩下取最大者
//! 5. 几乎覆盖整帧的区域视为误检，返回原帧

use super::frame::to_gray;
use crate::core::config::RegionConfig;
use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use log::debug;

/// 裁剪框（像素坐标，已夹在画面范围内）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub struct RegionExtractor {
    config: RegionConfig,
}

impl RegionExtractor {
    pub fn new() -> Self {
        Self::with_config(RegionConfig::default())
    }

    pub fn with_config(config: RegionConfig) -> Self {
        Self { config }
    }

    /// 裁出候选区域；找不到可信区域时原样返回整帧
    pub fn extract(&self, frame: &RgbImage) -> RgbImage {
        match self.locate(frame) {
            Some(b) => image::imageops::crop_imm(frame, b.x, b.y, b.width, b.height).to_image(),
            None => frame.clone(),
        }
    }

    /// 返回带外扩边距的裁剪框；没有可信区域时返回 `None`
    pub fn locate(&self, frame: &RgbImage) -> Option<RegionBounds> {
        let (w, h) = frame.dimensions();
        if w == 0 || h == 0 {
            return None;
        }
        let frame_area = w as f64 * h as f64;

        let mask = self.binary_mask(&to_gray(frame));

        let min_area = frame_area * self.config.min_area_ratio;
        let largest = find_contours::<i32>(&mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| (contour_area(&c), c))
            .filter(|(area, _)| *area >= min_area)
            .max_by(|a, b| a.0.total_cmp(&b.0));

        let Some((area, contour)) = largest else {
            debug!("no region above {:.0} px², keeping full frame", min_area);
            return None;
        };

        let (x, y, rw, rh) = bounding_rect(&contour)?;
        if (rw as f64) * (rh as f64) > frame_area * self.config.max_area_ratio {
            debug!("region covers almost the whole frame, keeping full frame");
            return None;
        }

        let margin = self.config.margin;
        let x0 = x.saturating_sub(margin);
        let y0 = y.saturating_sub(margin);
        let pad = margin.saturating_mul(2);
        let width = rw.saturating_add(pad).min(w - x0);
        let height = rh.saturating_add(pad).min(h - y0);

        debug!(
            "region at ({}, {}) {}x{}, contour area {:.0}",
            x0, y0, width, height, area
        );
        Some(RegionBounds {
            x: x0,
            y: y0,
            width,
            height,
        })
    }

    fn binary_mask(&self, gray: &GrayImage) -> GrayImage {
        let blurred = imageproc::filter::gaussian_blur_f32(gray, kernel_sigma(self.config.blur_kernel));
        let level = imageproc::contrast::otsu_level(&blurred);
        let binary = imageproc::contrast::threshold(&blurred, level);

        // 方形结构元素重复 n 次等价于 L∞ 半径 (k/2)*n
        let radius = self.config.morph_kernel / 2;
        let close_k = radius.saturating_mul(self.config.close_iterations).min(u8::MAX as u32) as u8;
        let open_k = radius.saturating_mul(self.config.open_iterations).min(u8::MAX as u32) as u8;

        let closed = if close_k > 0 {
            imageproc::morphology::close(&binary, Norm::LInf, close_k)
        } else {
            binary
        };
        if open_k > 0 {
            imageproc::morphology::open(&closed, Norm::LInf, open_k)
        } else {
            closed
        }
    }
}

impl Default for RegionExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// 与 OpenCV 对 `sigma = 0` 的处理一致
fn kernel_sigma(kernel: u32) -> f32 {
    let k = kernel.max(1) as f32;
    (0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8).max(0.1)
}

/// 鞋带公式
fn contour_area(contour: &Contour<i32>) -> f64 {
    let pts = &contour.points;
    if pts.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for i in 0..pts.len() {
        let a = pts[i];
        let b = pts[(i + 1) % pts.len()];
        twice_area += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    (twice_area.abs() as f64) / 2.0
}

/// (x, y, width, height)，边界像素包含在内
fn bounding_rect(contour: &Contour<i32>) -> Option<(u32, u32, u32, u32)> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some((
        min_x.max(0) as u32,
        min_y.max(0) as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}
