use std::path::Path;

use ndarray::{Array2, Ix2};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;

use super::backend::InferenceBackend;
use crate::error::{InferenceError, InitializationError};

/// 1つのモデルファイルに紐づくONNX Runtimeセッション
pub struct OnnxBackend {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OnnxBackend {
    pub fn from_file<P: AsRef<Path>>(model_path: P) -> Result<Self, InitializationError> {
        let path = model_path.as_ref();
        let load_err = |e: ort::Error| InitializationError::ModelLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let session = Session::builder()
            .map_err(load_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_err)?
            .commit_from_file(path)
            .map_err(load_err)?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| InitializationError::ModelLoad {
                path: path.to_path_buf(),
                message: "model declares no inputs".to_string(),
            })?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| InitializationError::ModelLoad {
                path: path.to_path_buf(),
                message: "model declares no outputs".to_string(),
            })?;

        Ok(Self {
            session,
            input_name,
            output_name,
        })
    }
}

impl InferenceBackend for OnnxBackend {
    fn name(&self) -> &str {
        "onnx"
    }

    fn run(&mut self, input: Array2<f32>) -> Result<Array2<f32>, InferenceError> {
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        let output: ndarray::ArrayViewD<f32> =
            outputs[self.output_name.as_str()].try_extract_array()?;
        let shape = output.shape().to_vec();
        output
            .into_dimensionality::<Ix2>()
            .map(|view| view.to_owned())
            .map_err(|_| InferenceError::backend(format!("expected 2-D output, got {:?}", shape)))
    }
}
