//! 自适应抽帧
//!
//! 按视频真实 FPS 计算分类间隔，使每秒分类次数大致固定。
//! 未抽中的帧照常解码后丢弃；昂贵的是推理，不是解码。

use super::frame::{SampledFrame, VideoMetadata};
use super::source::VideoSource;
use crate::core::config::SamplingConfig;
use crate::core::error::VideoError;

/// 分类间隔（帧数）
///
/// `max(min_classify_interval, round(fps / target_rate))`，FPS 不可用时取固定间隔。
pub fn sampling_interval(fps: f64, config: &SamplingConfig) -> u64 {
    if !(fps.is_finite() && fps > 0.0) {
        return config.fallback_interval.max(1);
    }
    let adaptive = (fps / config.target_classifications_per_second).round();
    let adaptive = if adaptive.is_finite() && adaptive > 0.0 {
        adaptive as u64
    } else {
        0
    };
    adaptive.max(config.min_classify_interval).max(1)
}

/// 只向前的抽帧迭代器，持有视频源；迭代器被丢弃时视频源随之释放
pub struct FrameSampler<S: VideoSource> {
    source: S,
    metadata: VideoMetadata,
    interval: u64,
    next_index: u64,
    finished: bool,
}

impl<S: VideoSource> FrameSampler<S> {
    pub fn new(source: S, config: &SamplingConfig) -> Self {
        let metadata = source.metadata();
        let interval = sampling_interval(metadata.fps, config);
        Self {
            source,
            metadata,
            interval,
            next_index: 0,
            finished: false,
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    /// 目前已从视频源读出的帧数（含丢弃的帧）
    pub fn frames_read(&self) -> u64 {
        self.next_index
    }
}

impl<S: VideoSource> Iterator for FrameSampler<S> {
    type Item = Result<SampledFrame, VideoError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let image = match self.source.read_frame() {
                Ok(Some(image)) => image,
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };

            let index = self.next_index;
            self.next_index += 1;

            if index % self.interval == 0 {
                return Some(Ok(SampledFrame::new(index, image)));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::source::MemorySource;
    use image::RgbImage;

    #[test]
    fn test_interval_examples() {
        let config = SamplingConfig::default();
        assert_eq!(sampling_interval(30.0, &config), 15);
        assert_eq!(sampling_interval(600.0, &config), 300);
        assert_eq!(sampling_interval(6.0, &config), 3);
        assert_eq!(sampling_interval(1.0, &config), 3);
        assert_eq!(sampling_interval(25.0, &config), 13);
    }

    #[test]
    fn test_interval_monotonic_and_bounded() {
        let config = SamplingConfig::default();
        let fps_values = [15.0, 30.0, 60.0, 120.0];
        let intervals: Vec<u64> = fps_values
            .iter()
            .map(|&fps| sampling_interval(fps, &config))
            .collect();

        for interval in &intervals {
            assert!(*interval >= config.min_classify_interval);
        }
        // 间隔随 FPS 单调不减，每秒分类次数不随 FPS 增长
        for pair in intervals.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        for (fps, interval) in fps_values.iter().zip(&intervals) {
            assert!(fps / *interval as f64 <= config.target_classifications_per_second + 0.5);
        }
    }

    #[test]
    fn test_missing_fps_falls_back() {
        let config = SamplingConfig::default();
        assert_eq!(sampling_interval(0.0, &config), 10);
        assert_eq!(sampling_interval(f64::NAN, &config), 10);
        assert_eq!(sampling_interval(-5.0, &config), 10);
    }

    #[test]
    fn test_sampler_yields_every_interval() {
        let source = MemorySource::from_fn(90, 30.0, |_| RgbImage::new(4, 4));
        let mut sampler = FrameSampler::new(source, &SamplingConfig::default());
        assert_eq!(sampler.interval(), 15);

        let indices: Vec<u64> = sampler
            .by_ref()
            .map(|f| f.unwrap().frame_index)
            .collect();
        assert_eq!(indices, vec![0, 15, 30, 45, 60, 75]);
        assert_eq!(sampler.frames_read(), 90);
    }

    #[test]
    fn test_sampler_empty_source() {
        let source = MemorySource::new(30.0, Vec::new());
        let mut sampler = FrameSampler::new(source, &SamplingConfig::default());
        assert!(sampler.next().is_none());
        assert!(sampler.next().is_none());
        assert_eq!(sampler.frames_read(), 0);
    }

    struct FailingSource {
        remaining_ok: u32,
    }

    impl VideoSource for FailingSource {
        fn metadata(&self) -> VideoMetadata {
            VideoMetadata {
                fps: 6.0,
                total_frames: 10,
                width: 2,
                height: 2,
            }
        }

        fn read_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
            if self.remaining_ok == 0 {
                return Err(VideoError::Decode("corrupt packet".into()));
            }
            self.remaining_ok -= 1;
            Ok(Some(RgbImage::new(2, 2)))
        }
    }

    #[test]
    fn test_decode_error_surfaces_once() {
        let mut sampler = FrameSampler::new(
            FailingSource { remaining_ok: 4 },
            &SamplingConfig::default(),
        );
        assert_eq!(sampler.next().unwrap().unwrap().frame_index, 0);
        assert_eq!(sampler.next().unwrap().unwrap().frame_index, 3);
        assert!(matches!(sampler.next(), Some(Err(VideoError::Decode(_)))));
        assert!(sampler.next().is_none());
    }
}
