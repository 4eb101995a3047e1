//! 記録済みランドマークをプランク判定に流して再生する
//!
//! 入力はJSON Lines（1行1フレーム）:
//! `{"timestamp_ms": 1200, "poses": [{"left_hip": {"x": .., "y": .., "z": .., "visibility": ..}, ..}]}`
//!
//! 使い方: `plank_replay <recording.jsonl> [config.toml]`

use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use plank_coach::config::Config;
use plank_coach::pose::Pose;
use plank_coach::PlankDetector;

const CONFIG_PATH: &str = "plank.toml";

#[derive(Debug, Deserialize)]
struct FrameRecord {
    timestamp_ms: u64,
    #[serde(default)]
    poses: Vec<Pose>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let recording = args
        .next()
        .context("usage: plank_replay <recording.jsonl> [config.toml]")?;
    let config_path = args.next().unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path);

    tracing::info!(
        version = env!("GIT_VERSION"),
        model = %config.detector.model_path.display(),
        "plank replay starting"
    );

    let mut detector = PlankDetector::new(config.detector);
    detector
        .initialize()
        .context("Failed to initialize plank detector")?;

    let file = File::open(&recording).with_context(|| format!("Failed to open {}", recording))?;
    let mut frames = 0usize;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FrameRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed frame", recording, line_no + 1))?;

        let result = detector.detect(&record.poses, Bytes::new(), record.timestamp_ms);
        println!(
            "{:>8} {:<10} {:.3}{}",
            record.timestamp_ms,
            result.stage.label(),
            result.probability,
            if result.has_error { "  <- error" } else { "" }
        );
        frames += 1;
    }

    println!();
    println!("Frames: {}", frames);
    println!("Error events: {}", detector.error_log().len());
    for event in detector.error_log() {
        println!("  {:>8} {}", event.timestamp, event.stage);
    }

    detector.dispose();
    Ok(())
}
