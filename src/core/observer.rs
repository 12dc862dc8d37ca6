//! 预览/渲染旁路
//!
//! 流水线把每帧结果推给观察者，自身不关心是否有界面在看；
//! 观察者返回 `Stop` 即可中途终止（交互式预览里的“按 q 退出”）。

use crate::core::classifier::FrameResult;
use crate::core::error::ClassificationFailure;
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverControl {
    Continue,
    Stop,
}

pub trait FrameObserver {
    fn on_frame_classified(&mut self, _result: &FrameResult) -> ObserverControl {
        ObserverControl::Continue
    }

    fn on_frame_skipped(
        &mut self,
        _frame_index: u64,
        _failure: &ClassificationFailure,
    ) -> ObserverControl {
        ObserverControl::Continue
    }
}

pub struct NoopObserver;

impl FrameObserver for NoopObserver {}

/// 逐帧打印分类结果
pub struct LogObserver {
    total_frames: u64,
}

impl LogObserver {
    pub fn new(total_frames: u64) -> Self {
        Self { total_frames }
    }
}

impl FrameObserver for LogObserver {
    fn on_frame_classified(&mut self, result: &FrameResult) -> ObserverControl {
        let probs: Vec<String> = result
            .distribution
            .iter()
            .map(|(class, p)| format!("{}: {:.1}%", class, p * 100.0))
            .collect();
        info!(
            "🩻 Frame {}/{}: {} ({:.1}%) [{}]",
            result.frame_index,
            self.total_frames,
            result.class,
            result.confidence * 100.0,
            probs.join(", ")
        );
        ObserverControl::Continue
    }

    fn on_frame_skipped(
        &mut self,
        frame_index: u64,
        failure: &ClassificationFailure,
    ) -> ObserverControl {
        warn!("⚠️ Frame {}: skipped ({})", frame_index, failure);
        ObserverControl::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::labels::{ClassDistribution, XRayClass};

    #[test]
    fn test_default_observers_continue() {
        let result = FrameResult {
            frame_index: 0,
            class: XRayClass::Normal,
            confidence: 0.9,
            distribution: ClassDistribution::new([0.05, 0.9, 0.03, 0.02]),
        };
        let failure = ClassificationFailure::Model("boom".into());

        let mut noop = NoopObserver;
        assert_eq!(noop.on_frame_classified(&result), ObserverControl::Continue);
        assert_eq!(noop.on_frame_skipped(3, &failure), ObserverControl::Continue);

        let mut log = LogObserver::new(90);
        assert_eq!(log.on_frame_classified(&result), ObserverControl::Continue);
        assert_eq!(log.on_frame_skipped(3, &failure), ObserverControl::Continue);
    }
}
