//! 加权投票
//!
//! 先按置信度过滤不可靠帧（全部不可靠时退回使用全部帧），
//! 再逐类累加各帧概率，总分最高的类别胜出。

use crate::core::classifier::FrameResult;
use crate::core::config::AggregationConfig;
use crate::core::error::PipelineError;
use crate::core::labels::{ClassDistribution, XRayClass};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;

/// 整段视频的最终结论
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub dominant_class: XRayClass,
    /// 胜出类别在可靠帧上的平均概率，不是任何单帧的置信度
    pub confidence: f32,
    /// 可靠帧上的平均分布
    pub distribution: ClassDistribution,
    pub total_frames_analyzed: usize,
    pub total_frames_reliable: usize,
    pub total_frames_in_video: u64,
    pub frame_rate: f64,
    /// 可靠帧中各帧自身预测类别的计数，可能与 `dominant_class` 不一致
    pub per_class_raw_counts: BTreeMap<XRayClass, usize>,
}

pub struct Aggregator {
    config: AggregationConfig,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::with_config(AggregationConfig::default())
    }

    pub fn with_config(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn aggregate(
        &self,
        results: &[FrameResult],
        total_frames_in_video: u64,
        frame_rate: f64,
    ) -> Result<AggregateResult, PipelineError> {
        if results.is_empty() {
            return Err(PipelineError::NoClassifiableFrames);
        }

        let threshold = self.config.min_confidence_threshold;
        let mut reliable: Vec<&FrameResult> =
            results.iter().filter(|r| r.confidence >= threshold).collect();
        if reliable.is_empty() {
            // 宁可给出低置信度结论，也不返回空结果
            reliable = results.iter().collect();
        }

        let filtered = results.len() - reliable.len();
        if filtered > 0 {
            info!(
                "🧹 Filtered {} frames with confidence below {:.0}%",
                filtered,
                threshold * 100.0
            );
        }

        let mut scores = ClassDistribution::default();
        let mut counts: BTreeMap<XRayClass, usize> =
            XRayClass::ALL.iter().map(|&c| (c, 0)).collect();
        for r in &reliable {
            scores.add_assign(&r.distribution);
            *counts.entry(r.class).or_insert(0) += 1;
        }

        let (dominant_class, score) = scores.argmax();
        let n = reliable.len() as f32;
        let confidence = score / n;

        info!(
            "🗳️ Weighted vote: {} (average confidence {:.1}%)",
            dominant_class,
            confidence * 100.0
        );

        Ok(AggregateResult {
            dominant_class,
            confidence,
            distribution: scores.scaled(1.0 / n),
            total_frames_analyzed: results.len(),
            total_frames_reliable: reliable.len(),
            total_frames_in_video,
            frame_rate,
            per_class_raw_counts: counts,
        })
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}
