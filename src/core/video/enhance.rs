//! 对比度归一化（CLAHE）
//!
//! 灰度 -> 分块限幅直方图均衡 -> 双线性插值拼接 -> 转回三通道。
//! 输出尺寸与输入一致。

use super::frame::{gray_to_rgb, to_gray};
use crate::core::config::EnhanceConfig;
use image::{GrayImage, RgbImage};
use rayon::prelude::*;

pub struct FrameEnhancer {
    config: EnhanceConfig,
}

impl FrameEnhancer {
    pub fn new() -> Self {
        Self::with_config(EnhanceConfig::default())
    }

    pub fn with_config(config: EnhanceConfig) -> Self {
        Self { config }
    }

    pub fn enhance(&self, image: &RgbImage) -> RgbImage {
        gray_to_rgb(&self.clahe(&to_gray(image)))
    }

    pub fn clahe(&self, gray: &GrayImage) -> GrayImage {
        let (w, h) = gray.dimensions();
        if w == 0 || h == 0 {
            return gray.clone();
        }

        let grid = self.config.tile_grid.max(1);
        let cols = TileAxis::new(w, grid.min(w));
        let rows = TileAxis::new(h, grid.min(h));

        let tiles: Vec<(usize, usize)> = (0..rows.count())
            .flat_map(|ty| (0..cols.count()).map(move |tx| (tx, ty)))
            .collect();

        let luts: Vec<[u8; 256]> = tiles
            .par_iter()
            .map(|&(tx, ty)| {
                let hist = tile_histogram(gray, cols.span(tx), rows.span(ty));
                clipped_lut(hist, self.config.clip_limit)
            })
            .collect();

        let src = gray.as_raw();
        let stride = w as usize;
        let mut out = vec![0u8; src.len()];

        out.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
            let (ty0, ty1, wy) = rows.neighbors(y as u32);
            for (x, dst) in row.iter_mut().enumerate() {
                let (tx0, tx1, wx) = cols.neighbors(x as u32);
                let v = src[y * stride + x] as usize;

                let lut = |tx: usize, ty: usize| luts[ty * cols.count() + tx][v] as f32;
                let top = lut(tx0, ty0) * (1.0 - wx) + lut(tx1, ty0) * wx;
                let bottom = lut(tx0, ty1) * (1.0 - wx) + lut(tx1, ty1) * wx;
                *dst = (top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8;
            }
        });

        // 长度与输入一致，from_raw 不会失败
        GrayImage::from_raw(w, h, out).unwrap_or_else(|| gray.clone())
    }
}

impl Default for FrameEnhancer {
    fn default() -> Self {
        Self::new()
    }
}

/// 一个方向上的 tile 划分
struct TileAxis {
    len: u32,
    tiles: u32,
}

impl TileAxis {
    fn new(len: u32, tiles: u32) -> Self {
        Self {
            len,
            tiles: tiles.max(1),
        }
    }

    fn count(&self) -> usize {
        self.tiles as usize
    }

    /// [start, end)，tiles <= len 时每块非空
    fn span(&self, t: usize) -> (u32, u32) {
        let t = t as u64;
        let start = t * self.len as u64 / self.tiles as u64;
        let end = (t + 1) * self.len as u64 / self.tiles as u64;
        (start as u32, end as u32)
    }

    fn center(&self, t: usize) -> f32 {
        let (start, end) = self.span(t);
        (start + end) as f32 / 2.0 - 0.5
    }

    /// 相邻两个 tile 及第二个的插值权重
    fn neighbors(&self, p: u32) -> (usize, usize, f32) {
        let p = p as f32;
        let last = self.count() - 1;
        if p <= self.center(0) {
            return (0, 0, 0.0);
        }
        if p >= self.center(last) {
            return (last, last, 0.0);
        }
        let mut t0 = 0;
        while t0 + 1 < last && self.center(t0 + 1) <= p {
            t0 += 1;
        }
        let (c0, c1) = (self.center(t0), self.center(t0 + 1));
        (t0, t0 + 1, ((p - c0) / (c1 - c0)).clamp(0.0, 1.0))
    }
}

fn tile_histogram(gray: &GrayImage, xs: (u32, u32), ys: (u32, u32)) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for y in ys.0..ys.1 {
        for x in xs.0..xs.1 {
            hist[gray.get_pixel(x, y).0[0] as usize] += 1;
        }
    }
    hist
}

/// 限幅后多出的计数均摊回所有 bin，再按 CDF 建映射表
fn clipped_lut(mut hist: [u32; 256], clip_limit: f32) -> [u8; 256] {
    let area: u32 = hist.iter().sum();
    let mut lut = [0u8; 256];
    if area == 0 {
        return lut;
    }

    let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    let batch = excess / 256;
    let mut residual = excess % 256;
    for bin in hist.iter_mut() {
        *bin += batch;
    }
    if residual > 0 {
        let step = (256 / residual).max(1) as usize;
        for bin in hist.iter_mut().step_by(step) {
            if residual == 0 {
                break;
            }
            *bin += 1;
            residual -= 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut cdf = 0u32;
    for (value, &count) in lut.iter_mut().zip(hist.iter()) {
        cdf += count;
        *value = (cdf as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn value_range(gray: &GrayImage) -> (u8, u8) {
        let min = gray.pixels().map(|p| p.0[0]).min().unwrap_or(0);
        let max = gray.pixels().map(|p| p.0[0]).max().unwrap_or(0);
        (min, max)
    }

    #[test]
    fn test_output_keeps_dimensions_and_is_gray() {
        let enhancer = FrameEnhancer::new();
        let img = RgbImage::from_fn(97, 53, |x, y| Rgb([(x * 2) as u8, (y * 3) as u8, 40]));

        let out = enhancer.enhance(&img);
        assert_eq!(out.dimensions(), (97, 53));
        for p in out.pixels() {
            assert_eq!(p.0[0], p.0[1]);
            assert_eq!(p.0[1], p.0[2]);
        }
    }

    #[test]
    fn test_uniform_image_stays_uniform() {
        let enhancer = FrameEnhancer::new();
        let gray = GrayImage::from_pixel(64, 64, Luma([128]));
        let out = enhancer.clahe(&gray);
        let (min, max) = value_range(&out);
        assert_eq!(min, max);
    }

    #[test]
    fn test_low_contrast_is_stretched() {
        let enhancer = FrameEnhancer::with_config(EnhanceConfig {
            clip_limit: 40.0,
            tile_grid: 8,
        });
        let gray = GrayImage::from_fn(128, 128, |x, _| Luma([100 + (x / 8) as u8]));

        let (in_min, in_max) = value_range(&gray);
        let (out_min, out_max) = value_range(&enhancer.clahe(&gray));
        assert!(out_max - out_min > in_max - in_min);
    }

    #[test]
    fn test_brightness_order_preserved_for_uniform_frames() {
        let enhancer = FrameEnhancer::new();
        let dark = enhancer.clahe(&GrayImage::from_pixel(32, 32, Luma([50])));
        let bright = enhancer.clahe(&GrayImage::from_pixel(32, 32, Luma([200])));
        assert!(dark.get_pixel(0, 0).0[0] + 100 < bright.get_pixel(0, 0).0[0]);
    }

    #[test]
    fn test_tiny_images() {
        let enhancer = FrameEnhancer::new();
        let out = enhancer.clahe(&GrayImage::from_pixel(3, 2, Luma([77])));
        assert_eq!(out.dimensions(), (3, 2));

        let empty = enhancer.clahe(&GrayImage::new(0, 0));
        assert_eq!(empty.dimensions(), (0, 0));
    }

    #[test]
    fn test_deterministic() {
        let enhancer = FrameEnhancer::new();
        let gray = GrayImage::from_fn(80, 60, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]));
        assert_eq!(enhancer.clahe(&gray), enhancer.clahe(&gray));
    }

    #[test]
    fn test_clipped_lut_is_monotonic() {
        let mut hist = [0u32; 256];
        hist[10] = 500;
        hist[200] = 300;
        hist[120] = 24;
        let lut = clipped_lut(hist, 2.0);
        for pair in lut.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(lut[255], 255);
    }

    #[test]
    fn test_tile_spans_cover_axis() {
        let axis = TileAxis::new(9, 8);
        let mut covered = 0;
        for t in 0..axis.count() {
            let (s, e) = axis.span(t);
            assert!(e > s);
            covered += e - s;
        }
        assert_eq!(covered, 9);
    }
}
