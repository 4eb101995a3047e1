use ndarray::Array2;

use crate::error::InferenceError;

/// classifierの裏の推論エンジン
/// `[batch, features]` 行列を受け取り `[batch, classes]` のスコアを返す
pub trait InferenceBackend: Send {
    fn name(&self) -> &str;

    fn run(&mut self, input: Array2<f32>) -> Result<Array2<f32>, InferenceError>;
}

/// 固定のスコア行を1呼び出しごとに返すbackend
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use ndarray::Array2;

    use super::InferenceBackend;
    use crate::error::InferenceError;

    pub(crate) struct ScriptedBackend {
        width: usize,
        rows: VecDeque<Vec<f32>>,
        fail: bool,
        fail_warm_up: bool,
        calls: usize,
        inputs: Arc<Mutex<Vec<Vec<f32>>>>,
        drops: Arc<AtomicUsize>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(width: usize) -> Self {
            Self {
                width,
                rows: VecDeque::new(),
                fail: false,
                fail_warm_up: false,
                calls: 0,
                inputs: Arc::new(Mutex::new(Vec::new())),
                drops: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// スコア行を積む。空ならゼロを返す
        pub(crate) fn with_row(mut self, row: &[f32]) -> Self {
            self.rows.push_back(row.to_vec());
            self
        }

        pub(crate) fn with_rows(mut self, rows: &[[f32; 3]]) -> Self {
            self.rows.extend(rows.iter().map(|r| r.to_vec()));
            self
        }

        /// warm-upには応答し、以降のフレームはすべて失敗させる
        pub(crate) fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        pub(crate) fn failing_warm_up(mut self) -> Self {
            self.fail_warm_up = true;
            self
        }

        pub(crate) fn drop_counter(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.drops)
        }

        /// warm-up以降に受け取った入力行（受信順）
        pub(crate) fn input_log(&self) -> Arc<Mutex<Vec<Vec<f32>>>> {
            Arc::clone(&self.inputs)
        }
    }

    impl InferenceBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn run(&mut self, input: Array2<f32>) -> Result<Array2<f32>, InferenceError> {
            // 最初の呼び出しはclassifierのwarm-upで、スコア行を消費しない
            self.calls += 1;
            if self.calls == 1 {
                if self.fail_warm_up {
                    return Err(InferenceError::backend("scripted warm-up failure"));
                }
                return Ok(Array2::zeros((input.nrows(), self.width)));
            }
            if let Ok(mut inputs) = self.inputs.lock() {
                inputs.extend(input.rows().into_iter().map(|r| r.to_vec()));
            }
            if self.fail {
                return Err(InferenceError::backend("scripted failure"));
            }
            let row = self
                .rows
                .pop_front()
                .unwrap_or_else(|| vec![0.0; self.width]);
            Array2::from_shape_vec((1, row.len()), row)
                .map_err(|e| InferenceError::backend(e.to_string()))
        }
    }

    impl Drop for ScriptedBackend {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }
}
