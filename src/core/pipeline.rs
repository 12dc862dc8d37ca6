//! 视频 -> 抽帧 -> 区域裁剪 -> 对比度归一化 -> 分类 -> 加权投票
//!
//! 单线程顺序执行。视频源由抽帧器持有，任何退出路径上都随之释放。

use crate::core::aggregate::{AggregateResult, Aggregator};
use crate::core::classifier::{ClassifierAdapter, FrameResult, XRayClassifier};
use crate::core::config::PipelineConfig;
use crate::core::error::{ClassificationFailure, PipelineError};
use crate::core::observer::{FrameObserver, NoopObserver, ObserverControl};
use crate::core::video::enhance::FrameEnhancer;
use crate::core::video::frame::SampledFrame;
use crate::core::video::region::RegionExtractor;
use crate::core::video::sampler::FrameSampler;
use crate::core::video::source::{FfmpegSource, VideoSource};
use log::{debug, info, warn};
use std::path::Path;

/// 一次完整分析的结果
#[derive(Debug, Clone)]
pub struct VideoAnalysis {
    pub aggregate: AggregateResult,
    pub frame_results: Vec<FrameResult>,
    /// 分类失败被跳过的抽样帧数
    pub frames_skipped: usize,
    pub sampling_interval: u64,
    /// 观察者要求提前结束
    pub stopped_early: bool,
}

pub struct VideoPipeline<C: XRayClassifier> {
    classifier: C,
    config: PipelineConfig,
    region: RegionExtractor,
    enhancer: FrameEnhancer,
    aggregator: Aggregator,
}

impl<C: XRayClassifier> VideoPipeline<C> {
    pub fn new(classifier: C) -> Self {
        Self::build(classifier, PipelineConfig::default())
    }

    pub fn with_config(classifier: C, config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self::build(classifier, config))
    }

    fn build(classifier: C, config: PipelineConfig) -> Self {
        Self {
            region: RegionExtractor::with_config(config.region.clone()),
            enhancer: FrameEnhancer::with_config(config.enhance.clone()),
            aggregator: Aggregator::with_config(config.aggregation.clone()),
            classifier,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// 打开本地视频文件并分析
    pub fn analyze_path(&self, path: impl AsRef<Path>) -> Result<VideoAnalysis, PipelineError> {
        self.analyze_path_with_observer(path, &mut NoopObserver)
    }

    pub fn analyze_path_with_observer<O: FrameObserver + ?Sized>(
        &self,
        path: impl AsRef<Path>,
        observer: &mut O,
    ) -> Result<VideoAnalysis, PipelineError> {
        self.ensure_loaded()?;
        let source = FfmpegSource::open(path)?;
        self.analyze_with_observer(source, observer)
    }

    pub fn analyze<S: VideoSource>(&self, source: S) -> Result<VideoAnalysis, PipelineError> {
        self.analyze_with_observer(source, &mut NoopObserver)
    }

    pub fn analyze_with_observer<S: VideoSource, O: FrameObserver + ?Sized>(
        &self,
        source: S,
        observer: &mut O,
    ) -> Result<VideoAnalysis, PipelineError> {
        self.ensure_loaded()?;

        let mut sampler = FrameSampler::new(source, &self.config.sampling);
        let metadata = sampler.metadata();
        let interval = sampler.interval();

        info!(
            "🎬 Video: {:.0} FPS, {} frames, classifying every {} frames (~{:.1}/s)",
            metadata.fps,
            metadata.total_frames,
            interval,
            metadata.fps / interval as f64
        );

        let mut frame_results = Vec::new();
        let mut frames_skipped = 0usize;
        let mut stopped_early = false;

        for frame in sampler.by_ref() {
            let frame = frame?;
            let control = match self.process_frame(&frame) {
                Ok(result) => {
                    debug!(
                        "Frame {}: {} ({:.1}%)",
                        result.frame_index,
                        result.class,
                        result.confidence * 100.0
                    );
                    let control = observer.on_frame_classified(&result);
                    frame_results.push(result);
                    control
                }
                Err(failure) => {
                    frames_skipped += 1;
                    debug!("Frame {} skipped: {}", frame.frame_index, failure);
                    observer.on_frame_skipped(frame.frame_index, &failure)
                }
            };

            if control == ObserverControl::Stop {
                info!("⏹️ Stopped by observer at frame {}", frame.frame_index);
                stopped_early = true;
                break;
            }
        }

        let total_frames_in_video = metadata.total_frames.max(sampler.frames_read());
        // 到这里视频源已不再需要
        drop(sampler);

        if frames_skipped > 0 {
            warn!("⚠️ {} sampled frames failed classification", frames_skipped);
        }

        let aggregate =
            self.aggregator
                .aggregate(&frame_results, total_frames_in_video, metadata.fps)?;

        Ok(VideoAnalysis {
            aggregate,
            frame_results,
            frames_skipped,
            sampling_interval: interval,
            stopped_early,
        })
    }

    /// 单帧：区域裁剪 -> 对比度归一化 -> 分类
    pub fn process_frame(&self, frame: &SampledFrame) -> Result<FrameResult, ClassificationFailure> {
        let region = self.region.extract(&frame.image);
        let enhanced = self.enhancer.enhance(&region);
        ClassifierAdapter::new(&self.classifier).classify(frame.frame_index, &enhanced)
    }

    fn ensure_loaded(&self) -> Result<(), PipelineError> {
        if self.classifier.is_loaded() {
            Ok(())
        } else {
            Err(PipelineError::ModelNotLoaded)
        }
    }
}
