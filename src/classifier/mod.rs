pub mod backend;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use backend::InferenceBackend;
#[cfg(feature = "onnx")]
pub use onnx::OnnxBackend;

use ndarray::Array2;
use tracing::info;

use crate::error::{InferenceError, InitializationError};
use crate::pose::{FeatureVector, FEATURE_LEN};
use crate::stage::ClassTable;

/// 1フレーム分のクラススコア（モデルのクラス順、正規化されているとは限らない）
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVector {
    scores: Vec<f32>,
}

impl ScoreVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self { scores }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.scores
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// 最大スコアのindexと値
    /// 同点は小さいindexを優先、NaNは選ばれない
    pub fn best(&self) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &s) in self.scores.iter().enumerate() {
            if s.is_nan() {
                continue;
            }
            match best {
                Some((_, b)) if s <= b => {}
                _ => best = Some((i, s)),
            }
        }
        best
    }
}

/// 特徴量ベクトルを推論backendに流す
pub struct Classifier {
    backend: Box<dyn InferenceBackend>,
    classes: usize,
}

impl Classifier {
    /// `backend` をラップし、ゼロ入力のwarm-upで出力幅を `table` と照合する
    pub fn new(
        backend: Box<dyn InferenceBackend>,
        table: &ClassTable,
    ) -> Result<Self, InitializationError> {
        let mut classifier = Self {
            backend,
            classes: table.len(),
        };
        let width = classifier.warm_up()?;
        table.check_width(width)?;
        info!(
            backend = classifier.backend.name(),
            classes = width,
            "classifier ready"
        );
        Ok(classifier)
    }

    fn warm_up(&mut self) -> Result<usize, InferenceError> {
        let output = self.backend.run(Array2::zeros((1, FEATURE_LEN)))?;
        if output.nrows() != 1 {
            return Err(InferenceError::shape_mismatch(
                vec![1, self.classes],
                output.shape().to_vec(),
            ));
        }
        Ok(output.ncols())
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn classify(&mut self, features: &FeatureVector) -> Result<ScoreVector, InferenceError> {
        let input = Array2::from_shape_vec((1, FEATURE_LEN), features.as_slice().to_vec())
            .map_err(|_| InferenceError::FeatureWidth {
                expected: FEATURE_LEN,
                actual: features.len(),
            })?;

        let output = self.backend.run(input)?;
        if output.shape() != [1, self.classes] {
            return Err(InferenceError::shape_mismatch(
                vec![1, self.classes],
                output.shape().to_vec(),
            ));
        }

        Ok(ScoreVector::new(output.row(0).to_vec()))
    }
}
