//! 判定パイプラインのエラー型

use std::path::PathBuf;

use thiserror::Error;

/// 1フレームの推論中の失敗
/// detectorが `"error"` stageの結果に変換するので `PlankDetector::detect` の外には出ない
#[derive(Error, Debug)]
pub enum InferenceError {
    /// `initialize` 成功前、または `dispose` 後に `detect` が呼ばれた
    #[error("inference engine is not initialized")]
    NotInitialized,

    /// エンジンが想定外の形状のテンソルを返した
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// 特徴量ベクトルまたはscalerの幅がモデル入力と合わない
    #[error("feature width mismatch: expected {expected}, got {actual}")]
    FeatureWidth { expected: usize, actual: usize },

    /// backend固有の失敗
    #[error("backend failure: {0}")]
    Backend(String),

    #[cfg(feature = "onnx")]
    #[error("ONNX Runtime error: {0}")]
    Onnx(#[from] ort::Error),
}

impl InferenceError {
    pub fn shape_mismatch(expected: Vec<usize>, actual: Vec<usize>) -> Self {
        InferenceError::ShapeMismatch { expected, actual }
    }

    pub fn backend<S: Into<String>>(msg: S) -> Self {
        InferenceError::Backend(msg.into())
    }
}

/// モデル・scaler・クラステーブルのロード失敗
/// `initialize` の呼び出し側に返し、detectorは未初期化のまま残る
#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("failed to load model {path:?}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("failed to read scaler {path:?}")]
    ScalerRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scaler: {0}")]
    ScalerParse(#[from] serde_json::Error),

    #[error("scaler width mismatch: expected {expected}, got {actual}")]
    ScalerWidth { expected: usize, actual: usize },

    #[error("invalid class table: {0}")]
    ClassTable(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// ロード直後のwarm-up推論が失敗した
    #[error("model warm-up failed: {0}")]
    WarmUp(#[from] InferenceError),
}

impl InitializationError {
    pub fn class_table<S: Into<String>>(msg: S) -> Self {
        InitializationError::ClassTable(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        InitializationError::Config(msg.into())
    }
}
