//! 流水线参数
//!
//! 所有阈值都有默认值；JSON 配置文件只需写出要覆盖的字段。

use crate::core::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 抽帧频率
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// 每秒目标分类次数
    pub target_classifications_per_second: f64,
    /// 两次分类之间最少间隔的帧数
    pub min_classify_interval: u64,
    /// 读不到 FPS 时使用的固定间隔
    pub fallback_interval: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            target_classifications_per_second: 2.0,
            min_classify_interval: 3,
            fallback_interval: 10,
        }
    }
}

/// 录屏画面中定位 X 光片区域的参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub min_area_ratio: f64,
    pub max_area_ratio: f64,
    /// 裁剪框四周外扩的像素
    pub margin: u32,
    pub blur_kernel: u32,
    pub morph_kernel: u32,
    pub close_iterations: u32,
    pub open_iterations: u32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            min_area_ratio: 0.15,
            max_area_ratio: 0.90,
            margin: 5,
            blur_kernel: 5,
            morph_kernel: 5,
            close_iterations: 3,
            open_iterations: 1,
        }
    }
}

/// CLAHE 参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    pub clip_limit: f32,
    /// 每个方向的 tile 数
    pub tile_grid: u32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_grid: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub min_confidence_threshold: f32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            min_confidence_threshold: 0.4,
        }
    }
}

/// CNN 输入尺寸
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelInputConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ModelInputConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
        }
    }
}

const MAX_KERNEL: u32 = 255;
const MAX_MORPH_ITERATIONS: u32 = 32;
const MAX_MARGIN: u32 = 4096;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sampling: SamplingConfig,
    pub region: RegionConfig,
    pub enhance: EnhanceConfig,
    pub aggregation: AggregationConfig,
    pub model_input: ModelInputConfig,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig =
            serde_json::from_str(json).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let s = &self.sampling;
        if !(s.target_classifications_per_second > 0.0) {
            return Err(PipelineError::Config(
                "target_classifications_per_second must be positive".into(),
            ));
        }
        if s.min_classify_interval == 0 || s.fallback_interval == 0 {
            return Err(PipelineError::Config("sampling intervals must be >= 1".into()));
        }

        let r = &self.region;
        let ratio_ok = |v: f64| (0.0..=1.0).contains(&v);
        if !ratio_ok(r.min_area_ratio) || !ratio_ok(r.max_area_ratio) {
            return Err(PipelineError::Config("area ratios must lie in [0, 1]".into()));
        }
        if r.min_area_ratio >= r.max_area_ratio {
            return Err(PipelineError::Config(
                "min_area_ratio must be below max_area_ratio".into(),
            ));
        }
        if r.blur_kernel == 0 || r.morph_kernel == 0 {
            return Err(PipelineError::Config("kernel sizes must be >= 1".into()));
        }
        if r.blur_kernel > MAX_KERNEL || r.morph_kernel > MAX_KERNEL {
            return Err(PipelineError::Config(format!(
                "kernel sizes must be <= {}",
                MAX_KERNEL
            )));
        }
        if r.close_iterations > MAX_MORPH_ITERATIONS || r.open_iterations > MAX_MORPH_ITERATIONS {
            return Err(PipelineError::Config(format!(
                "morphology iterations must be <= {}",
                MAX_MORPH_ITERATIONS
            )));
        }
        if r.margin > MAX_MARGIN {
            return Err(PipelineError::Config(format!("margin must be <= {}", MAX_MARGIN)));
        }

        if self.enhance.tile_grid == 0 || !(self.enhance.clip_limit > 0.0) {
            return Err(PipelineError::Config(
                "tile_grid and clip_limit must be positive".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.aggregation.min_confidence_threshold) {
            return Err(PipelineError::Config(
                "min_confidence_threshold must lie in [0, 1]".into(),
            ));
        }

        if self.model_input.width == 0 || self.model_input.height == 0 {
            return Err(PipelineError::Config("model input size must be non-zero".into()));
        }
        Ok(())
    }
}
