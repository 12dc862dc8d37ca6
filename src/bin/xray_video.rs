//! 命令行：对一段胸部 X 光录屏做整体诊断
//!
//! Usage:
//!   xray-video exame.mp4 --classifier-url http://127.0.0.1:5000/predict [--config cfg.json] [--json]

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use xray_video::core::config::PipelineConfig;
use xray_video::core::observer::LogObserver;
use xray_video::core::pipeline::VideoAnalysis;
use xray_video::core::video::source::{FfmpegSource, VideoSource};
use xray_video::{init_logging, is_allowed_video_file, VideoAnalysisReport, XRayVideoAnalyzer};

#[derive(Parser, Debug)]
#[command(name = "xray-video", version, about = "Classify a chest X-ray screen recording")]
struct Args {
    /// Video file (mp4, avi, mov, mkv, wmv, webm)
    video: PathBuf,

    /// Inference endpoint that accepts a PNG frame
    #[arg(long)]
    classifier_url: String,

    /// JSON file overriding pipeline parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the full JSON report instead of a summary
    #[arg(long)]
    json: bool,

    /// Log every classified frame
    #[arg(long)]
    preview: bool,
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match run(&args) {
        Ok(analysis) => {
            let report = VideoAnalysisReport::from_analysis(&analysis);
            if args.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("❌ {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print_summary(&analysis);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            if args.json {
                let report = serde_json::json!({ "success": false, "error": format!("{:#}", e) });
                println!("{}", report);
            }
            error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<VideoAnalysis> {
    if !is_allowed_video_file(&args.video) {
        bail!("unsupported video format: {}", args.video.display());
    }

    let config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    let analyzer = XRayVideoAnalyzer::connect_with_config(&args.classifier_url, config)?;

    let source = FfmpegSource::open(&args.video)
        .with_context(|| format!("opening {}", args.video.display()))?;

    let analysis = if args.preview {
        let mut observer = LogObserver::new(source.metadata().total_frames);
        analyzer.analyze_source_with_observer(source, &mut observer)?
    } else {
        analyzer.analyze_source(source)?
    };
    Ok(analysis)
}

fn print_summary(analysis: &VideoAnalysis) {
    let agg = &analysis.aggregate;
    println!("Diagnosis: {} ({:.1}%)", agg.dominant_class, agg.confidence * 100.0);
    for (class, p) in agg.distribution.iter() {
        println!("  {:<22} {:>5.1}%", class.name(), p * 100.0);
    }
    println!(
        "Frames: {} analyzed, {} reliable, {} skipped, {} in video ({:.1} FPS, every {} frames)",
        agg.total_frames_analyzed,
        agg.total_frames_reliable,
        analysis.frames_skipped,
        agg.total_frames_in_video,
        agg.frame_rate,
        analysis.sampling_interval
    );
    let counts: Vec<String> = agg
        .per_class_raw_counts
        .iter()
        .map(|(class, n)| format!("{}: {}", class, n))
        .collect();
    println!("Per-frame votes: {}", counts.join(", "));
}
