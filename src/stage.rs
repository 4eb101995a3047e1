//! スコア→stageの対応付けと、エッジトリガのエラーログ
//!
//! `StageEvaluator::evaluate` は純関数。前の `EvaluatorState` を値で受け取り次の状態を返すので、
//! 遷移ロジックはモデルなしでテストできる

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::ScoreVector;
use crate::error::InitializationError;

/// stageを確定させる最小クラススコアのデフォルト
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// プランクの姿勢stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "correct")]
    Correct,
    #[serde(rename = "low back")]
    LowBack,
    #[serde(rename = "high back")]
    HighBack,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
    /// このフレームでパイプラインが失敗した
    #[serde(rename = "error")]
    Error,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Correct => "correct",
            Stage::LowBack => "low back",
            Stage::HighBack => "high back",
            Stage::Unknown => "unknown",
            Stage::Error => "error",
        }
    }

    /// 修正フィードバックの対象になるstage
    pub fn is_error(&self) -> bool {
        matches!(self, Stage::LowBack | Stage::HighBack)
    }

    /// モデルのクラスに割り当て可能なstage
    pub fn is_classifiable(&self) -> bool {
        matches!(self, Stage::Correct | Stage::LowBack | Stage::HighBack)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "correct" => Ok(Stage::Correct),
            "low back" => Ok(Stage::LowBack),
            "high back" => Ok(Stage::HighBack),
            "unknown" => Ok(Stage::Unknown),
            "error" => Ok(Stage::Error),
            other => Err(format!("unknown stage label {:?}", other)),
        }
    }
}

/// モデル出力index -> stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTable {
    stages: Vec<Stage>,
}

impl ClassTable {
    pub fn new(stages: Vec<Stage>) -> Result<Self, InitializationError> {
        if stages.is_empty() {
            return Err(InitializationError::class_table("no classes configured"));
        }
        for (i, stage) in stages.iter().enumerate() {
            if !stage.is_classifiable() {
                return Err(InitializationError::class_table(format!(
                    "class {} maps to non-model stage {:?}",
                    i,
                    stage.label()
                )));
            }
            if stages[..i].contains(stage) {
                return Err(InitializationError::class_table(format!(
                    "stage {:?} listed more than once",
                    stage.label()
                )));
            }
        }
        Ok(Self { stages })
    }

    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self, InitializationError> {
        let stages = labels
            .iter()
            .map(|l| l.as_ref().parse::<Stage>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(InitializationError::class_table)?;
        Self::new(stages)
    }

    pub fn stage(&self, index: usize) -> Option<Stage> {
        self.stages.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// モデルの出力幅とテーブルを照合
    pub fn check_width(&self, output_width: usize) -> Result<(), InitializationError> {
        if output_width != self.len() {
            return Err(InitializationError::class_table(format!(
                "model emits {} classes, table has {}",
                output_width,
                self.len()
            )));
        }
        Ok(())
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self {
            stages: vec![Stage::Correct, Stage::LowBack, Stage::HighBack],
        }
    }
}

/// 蓄積されたエラーイベント。状態と各結果で共有する
/// 結果はコピーではなく参照を持ち、結果が共有中にイベントが追加された時だけ複製される
pub type ErrorLog = Arc<Vec<ErrorEvent>>;

/// エラーstageへの遷移
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEvent {
    pub stage: Stage,
    /// 遷移が検出されたフレーム（画像バイト列、中身は解釈しない）
    #[serde(skip)]
    pub frame: Bytes,
    /// ミリ秒
    pub timestamp: u64,
}

/// フレームごとの出力
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub stage: Stage,
    pub probability: f32,
    pub has_error: bool,
    pub error_log: ErrorLog,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionResult {
    /// 入力不足: poseなし、または正規化に必要なランドマークが足りない
    pub fn unknown(error_log: ErrorLog) -> Self {
        Self {
            stage: Stage::Unknown,
            probability: 0.0,
            has_error: false,
            error_log,
            error: None,
        }
    }

    pub fn failed(message: String, error_log: ErrorLog) -> Self {
        Self {
            stage: Stage::Error,
            probability: 0.0,
            has_error: false,
            error_log,
            error: Some(message),
        }
    }
}

/// 連続する `evaluate` 呼び出しに引き継ぐ状態
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluatorState {
    pub previous_stage: Stage,
    pub error_log: ErrorLog,
    pub has_error: bool,
}

#[derive(Debug, Clone)]
pub struct StageEvaluator {
    classes: ClassTable,
    threshold: f32,
}

impl StageEvaluator {
    pub fn new(classes: ClassTable, threshold: f32) -> Self {
        Self { classes, threshold }
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// 履歴を無視したスコアベクトルのstage
    pub fn classify(&self, scores: &ScoreVector) -> (Stage, f32) {
        match scores.best() {
            Some((index, prob)) if prob >= self.threshold => {
                (self.classes.stage(index).unwrap_or(Stage::Unknown), prob)
            }
            Some((_, prob)) => (Stage::Unknown, prob),
            None => (Stage::Unknown, 0.0),
        }
    }

    pub fn evaluate(
        &self,
        scores: &ScoreVector,
        frame: Bytes,
        timestamp: u64,
        mut state: EvaluatorState,
    ) -> (DetectionResult, EvaluatorState) {
        let (stage, probability) = self.classify(scores);

        // エッジトリガ: エラーstageに入ったフレームだけ記録する
        let has_error = stage.is_error() && stage != state.previous_stage;
        if has_error {
            Arc::make_mut(&mut state.error_log).push(ErrorEvent {
                stage,
                frame,
                timestamp,
            });
        }
        debug!(
            stage = stage.label(),
            probability,
            has_error,
            previous = state.previous_stage.label(),
            "stage evaluated"
        );

        state.previous_stage = stage;
        state.has_error = has_error;

        let result = DetectionResult {
            stage,
            probability,
            has_error,
            error_log: Arc::clone(&state.error_log),
            error: None,
        };
        (result, state)
    }
}

impl Default for StageEvaluator {
    fn default() -> Self {
        Self::new(ClassTable::default(), DEFAULT_CONFIDENCE_THRESHOLD)
    }
}
