pub mod features;
pub mod keypoint;
pub mod scaler;

pub use features::{FeatureExtractor, FeatureVector, JointAngles, Normalization, FEATURE_LEN};
pub use keypoint::{Keypoint, Landmark, Pose};
pub use scaler::StandardScaler;
