use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::features::{FeatureVector, FEATURE_LEN};
use crate::error::InitializationError;

/// モデルと一緒に出力される特徴量ごとの標準化パラメータ
/// JSON形式: `{"mean": [..], "scale": [..]}`（特徴量ごとに1要素）
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f32>, scale: Vec<f32>) -> Result<Self, InitializationError> {
        let scaler = Self { mean, scale };
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InitializationError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| InitializationError::ScalerRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, InitializationError> {
        let scaler: StandardScaler = serde_json::from_str(json)?;
        scaler.validate()?;
        Ok(scaler)
    }

    fn validate(&self) -> Result<(), InitializationError> {
        for len in [self.mean.len(), self.scale.len()] {
            if len != FEATURE_LEN {
                return Err(InitializationError::ScalerWidth {
                    expected: FEATURE_LEN,
                    actual: len,
                });
            }
        }
        Ok(())
    }

    /// `(x - mean) / scale`。`scale == 0` の要素は除算しない
    pub fn transform(&self, features: &FeatureVector) -> FeatureVector {
        let mut out = features.clone();
        for ((x, mean), scale) in out
            .as_mut_slice()
            .iter_mut()
            .zip(&self.mean)
            .zip(&self.scale)
        {
            *x -= mean;
            if *scale != 0.0 {
                *x /= scale;
            }
        }
        out
    }
}
