use crate::core::classifier::FrameResult;
use crate::core::error::PipelineError;
use crate::core::labels::{ClassDistribution, XRayClass};
use crate::core::pipeline::VideoAnalysis;
use serde::Serialize;
use std::collections::BTreeMap;

/// 整段视频的诊断结论
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalClassification {
    pub class_name: XRayClass,
    pub confidence: f32,
    pub all_probabilities: ClassDistribution,
}

/// 对外输出的分析报告，失败时只有 `success` 和 `error`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoAnalysisReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_classification: Option<FinalClassification>,
    pub total_frames_analyzed: usize,
    pub total_frames_reliable: usize,
    pub total_frames_video: u64,
    pub total_frames_skipped: usize,
    pub fps: f64,
    pub sampling_interval: u64,
    /// 被观察者中途终止，结论只覆盖已处理的部分
    pub stopped_early: bool,
    pub frame_results: Vec<FrameResult>,
    pub classification_counts: BTreeMap<XRayClass, usize>,
}

impl VideoAnalysisReport {
    pub fn from_analysis(analysis: &VideoAnalysis) -> Self {
        let agg = &analysis.aggregate;
        Self {
            success: true,
            error: None,
            final_classification: Some(FinalClassification {
                class_name: agg.dominant_class,
                confidence: agg.confidence,
                all_probabilities: agg.distribution,
            }),
            total_frames_analyzed: agg.total_frames_analyzed,
            total_frames_reliable: agg.total_frames_reliable,
            total_frames_video: agg.total_frames_in_video,
            total_frames_skipped: analysis.frames_skipped,
            fps: agg.frame_rate,
            sampling_interval: analysis.sampling_interval,
            stopped_early: analysis.stopped_early,
            frame_results: analysis.frame_results.clone(),
            classification_counts: agg.per_class_raw_counts.clone(),
        }
    }

    pub fn from_error(error: &PipelineError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            final_classification: None,
            total_frames_analyzed: 0,
            total_frames_reliable: 0,
            total_frames_video: 0,
            total_frames_skipped: 0,
            fps: 0.0,
            sampling_interval: 0,
            stopped_early: false,
            frame_results: Vec::new(),
            classification_counts: BTreeMap::new(),
        }
    }

    pub fn from_result(result: &Result<VideoAnalysis, PipelineError>) -> Self {
        match result {
            Ok(analysis) => Self::from_analysis(analysis),
            Err(e) => Self::from_error(e),
        }
    }
}
