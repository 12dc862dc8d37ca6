//! 视频源
//!
//! `FfmpegSource` 用 ffprobe 读取元数据，再从 ffmpeg 子进程的 stdout
//! 逐帧读取 rgb24 原始数据。子进程在 `Drop` 中回收，
//! 非零退出码视为解码失败。

use super::frame::VideoMetadata;
use crate::core::error::VideoError;
use image::RgbImage;
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::VecDeque;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

pub trait VideoSource {
    fn metadata(&self) -> VideoMetadata;

    /// 读下一帧，流结束时返回 `Ok(None)`
    fn read_frame(&mut self) -> Result<Option<RgbImage>, VideoError>;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn metadata(&self) -> VideoMetadata {
        (**self).metadata()
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        (**self).read_frame()
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// "30000/1001" -> 29.97，"0/0" 或无法解析时为 0
fn parse_frame_rate(rate: &str) -> f64 {
    let mut parts = rate.splitn(2, '/');
    let num = parts.next().and_then(|n| n.trim().parse::<f64>().ok());
    let den = match parts.next() {
        Some(d) => d.trim().parse::<f64>().ok(),
        None => Some(1.0),
    };
    match (num, den) {
        (Some(n), Some(d)) if d > 0.0 && n.is_finite() => (n / d).max(0.0),
        _ => 0.0,
    }
}

fn metadata_from_probe(json: &str) -> Result<Option<VideoMetadata>, VideoError> {
    let probe: ProbeOutput = serde_json::from_str(json)?;
    let Some(stream) = probe.streams.into_iter().next() else {
        return Ok(None);
    };

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Ok(None),
    };

    let mut fps = stream
        .avg_frame_rate
        .as_deref()
        .map(parse_frame_rate)
        .unwrap_or(0.0);
    if fps <= 0.0 {
        fps = stream
            .r_frame_rate
            .as_deref()
            .map(parse_frame_rate)
            .unwrap_or(0.0);
    }

    let total_frames = match stream.nb_frames.as_deref().and_then(|n| n.parse::<u64>().ok()) {
        Some(n) => n,
        None => stream
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .map(|d| (d * fps).round().max(0.0) as u64)
            .unwrap_or(0),
    };

    Ok(Some(VideoMetadata {
        fps,
        total_frames,
        width,
        height,
    }))
}

/// ffprobe / ffmpeg 可执行文件，默认从 PATH 查找
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self {
            ffprobe: PathBuf::from("ffprobe"),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

/// 基于 ffmpeg 子进程的视频源
///
/// stdout 读到尽头后回收子进程：只有退出码为 0 才算正常结束，
/// 否则连同 stderr 一起报 `VideoError::Decode`。
pub struct FfmpegSource {
    path: PathBuf,
    metadata: VideoMetadata,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
}

impl FfmpegSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VideoError> {
        Self::open_with(path, &FfmpegTools::default())
    }

    pub fn open_with(path: impl AsRef<Path>, tools: &FfmpegTools) -> Result<Self, VideoError> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |reason: String| VideoError::SourceUnavailable {
            path: path.display().to_string(),
            reason,
        };

        if !path.is_file() {
            return Err(unavailable("file not found".into()));
        }

        let probe = Command::new(&tools.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0", "-show_entries"])
            .arg("stream=width,height,r_frame_rate,avg_frame_rate,nb_frames,duration")
            .args(["-of", "json"])
            .arg(&path)
            .output()
            .map_err(|e| unavailable(format!("failed to run ffprobe: {}", e)))?;

        if !probe.status.success() {
            let stderr = String::from_utf8_lossy(&probe.stderr);
            return Err(unavailable(format!("ffprobe failed: {}", stderr.trim())));
        }

        let metadata = metadata_from_probe(&String::from_utf8_lossy(&probe.stdout))?
            .ok_or_else(|| unavailable("no video stream".into()))?;

        let mut child = Command::new(&tools.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(&path)
            .args(["-map", "0:v:0", "-vsync", "0"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| unavailable(format!("failed to spawn ffmpeg: {}", e)))?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(unavailable("ffmpeg pipes unavailable".into()));
            }
        };

        // 单独线程收集 stderr，避免管道写满后 ffmpeg 阻塞
        let stderr = thread::spawn(move || {
            let mut text = String::new();
            let _ = BufReader::new(stderr).read_to_string(&mut text);
            text
        });

        info!(
            "🎬 Opened {}: {}x{}, {:.2} fps, {} frames",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.total_frames
        );

        Ok(Self {
            path,
            metadata,
            child,
            stdout: BufReader::new(stdout),
            stderr: Some(stderr),
        })
    }

    /// stdout 已读尽，按子进程退出码区分正常结束和解码失败
    fn finish(&mut self) -> Result<Option<RgbImage>, VideoError> {
        let status = self.child.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            debug!("ffmpeg finished {}", self.path.display());
            return Ok(None);
        }
        Err(VideoError::Decode(format!(
            "ffmpeg {} for {}: {}",
            status,
            self.path.display(),
            stderr.trim()
        )))
    }
}

impl VideoSource for FfmpegSource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        let mut buf = vec![0u8; self.metadata.frame_bytes()];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => {}
            // 末尾不完整的帧：ffmpeg 正常退出时按流结束处理
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return self.finish(),
            Err(e) => return Err(VideoError::Io(e)),
        }

        RgbImage::from_raw(self.metadata.width, self.metadata.height, buf)
            .map(Some)
            .ok_or_else(|| VideoError::Decode("frame buffer size mismatch".into()))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        match self.child.try_wait() {
            Ok(Some(_)) => {}
            _ => {
                if let Err(e) = self.child.kill() {
                    warn!("⚠️ failed to kill ffmpeg for {}: {}", self.path.display(), e);
                }
                let _ = self.child.wait();
            }
        }
        debug!("🗑️ FfmpegSource: released {}", self.path.display());
    }
}

/// 内存中的已解码帧序列
pub struct MemorySource {
    metadata: VideoMetadata,
    frames: VecDeque<RgbImage>,
}

impl MemorySource {
    pub fn new(fps: f64, frames: Vec<RgbImage>) -> Self {
        let (width, height) = frames
            .first()
            .map(|f| (f.width(), f.height()))
            .unwrap_or((0, 0));
        Self {
            metadata: VideoMetadata {
                fps,
                total_frames: frames.len() as u64,
                width,
                height,
            },
            frames: frames.into(),
        }
    }

    pub fn from_fn<F>(frame_count: u64, fps: f64, mut make_frame: F) -> Self
    where
        F: FnMut(u64) -> RgbImage,
    {
        Self::new(fps, (0..frame_count).map(&mut make_frame).collect())
    }

    /// 模拟容器报告的帧数与实际不一致（或未知，传 0）
    pub fn with_reported_total(mut self, total_frames: u64) -> Self {
        self.metadata.total_frames = total_frames;
        self
    }
}

impl VideoSource for MemorySource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>, VideoError> {
        Ok(self.frames.pop_front())
    }
}
