use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::InitializationError;
use crate::pose::Normalization;
use crate::stage::{ClassTable, DEFAULT_CONFIDENCE_THRESHOLD};

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub detector: DetectorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// ONNX分類モデル
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// 推論前に特徴量へ適用する `{mean, scale}` JSON（省略可）
    #[serde(default)]
    pub scaler_path: Option<PathBuf>,
    #[serde(default)]
    pub normalization: Normalization,
    /// stageを確定させる最小スコア (0.0..=1.0)
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// この可視度未満のキーポイントは欠損扱い
    #[serde(default)]
    pub min_visibility: f32,
    /// モデル出力indexごとのstageラベル
    #[serde(default = "default_class_labels")]
    pub class_labels: Vec<String>,
}

fn default_model_path() -> PathBuf { PathBuf::from("models/plank_model.onnx") }
fn default_confidence_threshold() -> f32 { DEFAULT_CONFIDENCE_THRESHOLD }
fn default_class_labels() -> Vec<String> {
    ["correct", "low back", "high back"].iter().map(|s| s.to_string()).collect()
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            scaler_path: None,
            normalization: Normalization::default(),
            confidence_threshold: default_confidence_threshold(),
            min_visibility: 0.0,
            class_labels: default_class_labels(),
        }
    }
}

impl DetectorConfig {
    /// 値域を検証してクラステーブルを作る
    pub fn validate(&self) -> Result<ClassTable, InitializationError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(InitializationError::config(format!(
                "confidence_threshold {} outside 0..=1",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.min_visibility) {
            return Err(InitializationError::config(format!(
                "min_visibility {} outside 0..=1",
                self.min_visibility
            )));
        }
        ClassTable::from_labels(&self.class_labels)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// ファイルがない・壊れている場合はデフォルトを使う
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "using default config");
                Self::default()
            }
        }
    }
}
