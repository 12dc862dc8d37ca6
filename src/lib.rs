pub mod api;
pub mod core;

pub use api::models::analysis::VideoAnalysisReport;
pub use api::video::{is_allowed_video_file, XRayVideoAnalyzer};

use std::sync::Once;

static LOGGER: Once = Once::new();

/// 初始化日志，重复调用无副作用；默认 info，可用 RUST_LOG 覆盖
pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .format_timestamp_millis()
        .try_init();
    });
}
