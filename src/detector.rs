//! フレーム単位のプランク姿勢判定
//!
//! `PlankDetector` がパイプライン全体をまとめる:
//! pose -> 特徴量 -> (scaler) -> classifier -> stage評価。
//! 失敗を吸収するのはここだけで、`detect` は推論失敗を `"error"` stageの
//! `DetectionResult` に変換して常に結果を返す。
//!
//! 呼び出しの直列化は呼び出し側の責任。`detect` は `&mut self` で1フレームずつ処理する。

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::classifier::{Classifier, InferenceBackend};
use crate::config::DetectorConfig;
use crate::error::{InferenceError, InitializationError};
use crate::pose::{FeatureExtractor, Pose, StandardScaler};
use crate::stage::{DetectionResult, ErrorEvent, EvaluatorState, StageEvaluator};

/// ロード済みの推論リソース（detectorの生存期間中所有）
struct Engine {
    classifier: Classifier,
    scaler: Option<StandardScaler>,
}

pub struct PlankDetector {
    config: DetectorConfig,
    extractor: FeatureExtractor,
    evaluator: StageEvaluator,
    state: EvaluatorState,
    engine: Option<Engine>,
}

impl PlankDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let extractor = FeatureExtractor::new(config.normalization)
            .with_min_visibility(config.min_visibility);
        Self {
            config,
            extractor,
            evaluator: StageEvaluator::default(),
            state: EvaluatorState::default(),
            engine: None,
        }
    }

    /// configのONNXモデルをロードする。初期化済みなら何もしない
    #[cfg(feature = "onnx")]
    pub fn initialize(&mut self) -> Result<(), InitializationError> {
        if self.engine.is_some() {
            return Ok(());
        }
        self.config.validate()?;
        let backend = crate::classifier::OnnxBackend::from_file(&self.config.model_path)?;
        self.initialize_with_backend(Box::new(backend))
    }

    /// `initialize` と同じだが、推論エンジンを呼び出し側から渡す
    /// 全ステップが成功した場合のみ保持し、途中で失敗したらエラーを返す前にdropする
    pub fn initialize_with_backend(
        &mut self,
        backend: Box<dyn InferenceBackend>,
    ) -> Result<(), InitializationError> {
        if self.engine.is_some() {
            return Ok(());
        }

        let classes = self.config.validate()?;
        let scaler = self
            .config
            .scaler_path
            .as_ref()
            .map(StandardScaler::load)
            .transpose()?;
        let classifier = Classifier::new(backend, &classes)?;

        info!(
            backend = classifier.backend_name(),
            normalization = ?self.config.normalization,
            scaled = scaler.is_some(),
            threshold = self.config.confidence_threshold,
            "plank detector initialized"
        );

        self.evaluator = StageEvaluator::new(classes, self.config.confidence_threshold);
        self.engine = Some(Engine { classifier, scaler });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// フレームの先頭poseを判定する
    pub fn detect(&mut self, poses: &[Pose], frame: Bytes, timestamp: u64) -> DetectionResult {
        match self.try_detect(poses, frame, timestamp) {
            Ok(result) => result,
            Err(e) => {
                warn!(timestamp, error = %e, "detection failed");
                DetectionResult::failed(e.to_string(), Arc::clone(&self.state.error_log))
            }
        }
    }

    fn try_detect(
        &mut self,
        poses: &[Pose],
        frame: Bytes,
        timestamp: u64,
    ) -> Result<DetectionResult, InferenceError> {
        let Some(pose) = poses.first() else {
            return Ok(DetectionResult::unknown(Arc::clone(&self.state.error_log)));
        };
        let Some(features) = self.extractor.extract(pose) else {
            debug!(timestamp, "insufficient pose");
            return Ok(DetectionResult::unknown(Arc::clone(&self.state.error_log)));
        };

        let engine = self.engine.as_mut().ok_or(InferenceError::NotInitialized)?;
        let features = match &engine.scaler {
            Some(scaler) => scaler.transform(&features),
            None => features,
        };
        let scores = engine.classifier.classify(&features)?;

        let state = std::mem::take(&mut self.state);
        let (result, state) = self.evaluator.evaluate(&scores, frame, timestamp, state);
        self.state = state;
        Ok(result)
    }

    /// stage履歴とエラーログをリセット
    pub fn clear_results(&mut self) {
        info!(events = self.state.error_log.len(), "clearing results");
        self.state = EvaluatorState::default();
    }

    /// 推論エンジンを解放する。何も保持していなければ `false`
    pub fn dispose(&mut self) -> bool {
        match self.engine.take() {
            Some(engine) => {
                info!(backend = engine.classifier.backend_name(), "plank detector disposed");
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> &EvaluatorState {
        &self.state
    }

    pub fn error_log(&self) -> &[ErrorEvent] {
        self.state.error_log.as_slice()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}
