//! X 光录屏视频诊断

use crate::api::models::analysis::VideoAnalysisReport;
use crate::core::classifier::{HttpClassifier, XRayClassifier};
use crate::core::config::PipelineConfig;
use crate::core::error::PipelineError;
use crate::core::observer::FrameObserver;
use crate::core::pipeline::{VideoAnalysis, VideoPipeline};
use crate::core::video::source::VideoSource;
use log::info;
use std::path::Path;

/// 允许上传的视频扩展名
pub const ALLOWED_VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "avi", "mov", "mkv", "wmv", "webm"];

pub fn is_allowed_video_file(name: impl AsRef<Path>) -> bool {
    name.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ALLOWED_VIDEO_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// 视频诊断入口：抽帧 + 区域裁剪 + 分类 + 加权投票
///
/// ```ignore
/// let analyzer = XRayVideoAnalyzer::connect("http://127.0.0.1:5000/predict")?;
/// let report = analyzer.report("exame.mp4");
/// println!("{}", serde_json::to_string_pretty(&report)?);
/// ```
pub struct XRayVideoAnalyzer {
    pipeline: VideoPipeline<Box<dyn XRayClassifier>>,
}

impl XRayVideoAnalyzer {
    pub fn create(classifier: impl XRayClassifier + 'static) -> Self {
        info!("🎬 XRayVideoAnalyzer: created");
        Self {
            pipeline: VideoPipeline::new(Box::new(classifier)),
        }
    }

    pub fn with_config(
        classifier: impl XRayClassifier + 'static,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        info!("🎬 XRayVideoAnalyzer: created with custom config");
        Ok(Self {
            pipeline: VideoPipeline::with_config(Box::new(classifier) as Box<dyn XRayClassifier>, config)?,
        })
    }

    /// 使用远程推理服务
    pub fn connect(endpoint: &str) -> Result<Self, PipelineError> {
        Self::connect_with_config(endpoint, PipelineConfig::default())
    }

    pub fn connect_with_config(
        endpoint: &str,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let classifier = HttpClassifier::new(endpoint)
            .map_err(|e| PipelineError::Config(format!("classifier client: {}", e)))?
            .with_input_size(config.model_input.clone());
        Self::with_config(classifier, config)
    }

    pub fn config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    pub fn analyze_file(&self, path: impl AsRef<Path>) -> Result<VideoAnalysis, PipelineError> {
        let path = path.as_ref();
        check_format(path)?;
        self.pipeline.analyze_path(path)
    }

    pub fn analyze_file_with_observer<O: FrameObserver + ?Sized>(
        &self,
        path: impl AsRef<Path>,
        observer: &mut O,
    ) -> Result<VideoAnalysis, PipelineError> {
        let path = path.as_ref();
        check_format(path)?;
        self.pipeline.analyze_path_with_observer(path, observer)
    }

    /// 已打开的视频源，不做扩展名检查
    pub fn analyze_source<S: VideoSource>(&self, source: S) -> Result<VideoAnalysis, PipelineError> {
        self.pipeline.analyze(source)
    }

    pub fn analyze_source_with_observer<S: VideoSource, O: FrameObserver + ?Sized>(
        &self,
        source: S,
        observer: &mut O,
    ) -> Result<VideoAnalysis, PipelineError> {
        self.pipeline.analyze_with_observer(source, observer)
    }

    /// 分析并打包成报告，失败也返回报告
    pub fn report(&self, path: impl AsRef<Path>) -> VideoAnalysisReport {
        VideoAnalysisReport::from_result(&self.analyze_file(path))
    }
}

impl Drop for XRayVideoAnalyzer {
    fn drop(&mut self) {
        info!("🗑️ XRayVideoAnalyzer: released");
    }
}

fn check_format(path: &Path) -> Result<(), PipelineError> {
    if is_allowed_video_file(path) {
        Ok(())
    } else {
        Err(PipelineError::UnsupportedFormat(path.display().to_string()))
    }
}
