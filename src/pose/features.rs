use serde::{Deserialize, Serialize};

use super::keypoint::{Landmark, Pose};
use crate::geometry::{self, Vec3};

/// 座標の後ろに付く関節角の数
pub const ANGLE_COUNT: usize = 9;

/// 特徴量ベクトル長: 17関節 x (x, y, z) + 関節角9
pub const FEATURE_LEN: usize = Landmark::COUNT * 3 + ANGLE_COUNT;

/// これ未満の胴体サイズは退化とみなす
const MIN_TORSO_SIZE: f32 = 1e-6;

/// 特徴量を組み立てる前の座標正規化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// pose入力のフレーム相対座標をそのまま使う
    PixelRelative,
    /// hip中点を原点、肩中点までの距離を1にする
    #[default]
    TorsoRelative,
}

/// 関節角（度）、特徴量の並び順
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct JointAngles {
    pub left_elbow: f32,
    pub right_elbow: f32,
    pub left_shoulder: f32,
    pub right_shoulder: f32,
    pub left_hip: f32,
    pub right_hip: f32,
    pub left_knee: f32,
    pub right_knee: f32,
    pub back: f32,
}

impl JointAngles {
    pub fn to_array(&self) -> [f32; ANGLE_COUNT] {
        [
            self.left_elbow,
            self.right_elbow,
            self.left_shoulder,
            self.right_shoulder,
            self.left_hip,
            self.right_hip,
            self.left_knee,
            self.right_knee,
            self.back,
        ]
    }

    fn from_slice(values: &[f32]) -> Self {
        Self {
            left_elbow: values[0],
            right_elbow: values[1],
            left_shoulder: values[2],
            right_shoulder: values[3],
            left_hip: values[4],
            right_hip: values[5],
            left_knee: values[6],
            right_knee: values[7],
            back: values[8],
        }
    }
}

/// 1つのposeから作る固定長のclassifier入力
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f32; FEATURE_LEN],
}

impl FeatureVector {
    pub fn from_values(values: [f32; FEATURE_LEN]) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn len(&self) -> usize {
        FEATURE_LEN
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// 1関節の正規化座標（欠損ならゼロ）
    pub fn coords(&self, landmark: Landmark) -> [f32; 3] {
        let i = landmark.index() * 3;
        [self.values[i], self.values[i + 1], self.values[i + 2]]
    }

    pub fn angles(&self) -> JointAngles {
        JointAngles::from_slice(&self.values[Landmark::COUNT * 3..])
    }
}

/// 検出poseを `FeatureVector` に変換する
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    normalization: Normalization,
    min_visibility: f32,
}

impl FeatureExtractor {
    pub fn new(normalization: Normalization) -> Self {
        Self {
            normalization,
            min_visibility: 0.0,
        }
    }

    /// この可視度未満のキーポイントは欠損扱い
    pub fn with_min_visibility(mut self, min_visibility: f32) -> Self {
        self.min_visibility = min_visibility;
        self
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// 胴体ランドマークが欠けている、または胴体が小さすぎて正規化できない場合は `None`
    /// 座標が非有限値のキーポイントは欠損として扱う
    pub fn extract(&self, pose: &Pose) -> Option<FeatureVector> {
        let points = self.normalized_points(pose)?;

        let mut values = [0.0f32; FEATURE_LEN];
        for (i, point) in points.iter().enumerate() {
            if let Some(p) = point {
                values[i * 3] = p.x;
                values[i * 3 + 1] = p.y;
                values[i * 3 + 2] = p.z;
            }
        }

        let angles = compute_angles(&points).to_array();
        values[Landmark::COUNT * 3..].copy_from_slice(&angles);

        Some(FeatureVector::from_values(values))
    }

    fn position(&self, pose: &Pose, landmark: Landmark) -> Option<Vec3> {
        pose.get(landmark)
            .filter(|kp| kp.is_valid(self.min_visibility))
            .map(|kp| kp.position())
    }

    fn normalized_points(&self, pose: &Pose) -> Option<[Option<Vec3>; Landmark::COUNT]> {
        let left_hip = self.position(pose, Landmark::LeftHip)?;
        let right_hip = self.position(pose, Landmark::RightHip)?;
        let left_shoulder = self.position(pose, Landmark::LeftShoulder)?;
        let right_shoulder = self.position(pose, Landmark::RightShoulder)?;

        let raw: [Option<Vec3>; Landmark::COUNT] =
            std::array::from_fn(|i| self.position(pose, Landmark::ALL[i]));

        match self.normalization {
            Normalization::PixelRelative => Some(raw),
            Normalization::TorsoRelative => {
                let origin = geometry::midpoint(&left_hip, &right_hip);
                // 平行移動後の肩中点
                let shoulder_mid = geometry::subtract(
                    &geometry::midpoint(&left_shoulder, &right_shoulder),
                    &origin,
                );
                let torso_size = geometry::norm(&shoulder_mid);
                if !torso_size.is_finite() || torso_size < MIN_TORSO_SIZE {
                    return None;
                }
                Some(raw.map(|p| {
                    p.map(|p| geometry::scale_divide(&geometry::subtract(&p, &origin), torso_size))
                }))
            }
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(Normalization::default())
    }
}

fn angle_of(
    points: &[Option<Vec3>; Landmark::COUNT],
    a: Landmark,
    b: Landmark,
    c: Landmark,
) -> f32 {
    match (points[a.index()], points[b.index()], points[c.index()]) {
        (Some(a), Some(b), Some(c)) => geometry::angle(&a, &b, &c),
        _ => 0.0,
    }
}

fn compute_angles(points: &[Option<Vec3>; Landmark::COUNT]) -> JointAngles {
    use Landmark::*;
    JointAngles {
        left_elbow: angle_of(points, LeftShoulder, LeftElbow, LeftWrist),
        right_elbow: angle_of(points, RightShoulder, RightElbow, RightWrist),
        left_shoulder: angle_of(points, LeftHip, LeftShoulder, LeftElbow),
        right_shoulder: angle_of(points, RightHip, RightShoulder, RightElbow),
        left_hip: angle_of(points, LeftShoulder, LeftHip, LeftKnee),
        right_hip: angle_of(points, RightShoulder, RightHip, RightKnee),
        left_knee: angle_of(points, LeftHip, LeftKnee, LeftAnkle),
        right_knee: angle_of(points, RightHip, RightKnee, RightAnkle),
        back: angle_of(points, LeftShoulder, LeftHip, LeftAnkle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Keypoint;

    fn approx_eq_f32(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    fn kp(x: f32, y: f32) -> Keypoint {
        Keypoint::new(x, y, 0.0, 0.9)
    }

    /// 真横から見たプランク: 肩x=0.3, 腰x=0.5, 足首x=0.8, すべてy=0.5
    fn make_plank_pose() -> Pose {
        use Landmark::*;
        Pose::default()
            .with(LeftShoulder, kp(0.3, 0.5))
            .with(RightShoulder, kp(0.3, 0.5))
            .with(LeftHip, kp(0.5, 0.5))
            .with(RightHip, kp(0.5, 0.5))
            .with(LeftElbow, kp(0.3, 0.7))
            .with(RightElbow, kp(0.3, 0.7))
            .with(LeftWrist, kp(0.2, 0.7))
            .with(RightWrist, kp(0.2, 0.7))
            .with(LeftKnee, kp(0.65, 0.5))
            .with(RightKnee, kp(0.65, 0.5))
            .with(LeftAnkle, kp(0.8, 0.5))
            .with(RightAnkle, kp(0.8, 0.5))
    }

    fn torso_pose() -> Pose {
        use Landmark::*;
        Pose::default()
            .with(LeftShoulder, kp(0.3, 0.5))
            .with(RightShoulder, kp(0.3, 0.5))
            .with(LeftHip, kp(0.5, 0.5))
            .with(RightHip, kp(0.5, 0.5))
    }

    #[test]
    fn test_missing_torso_landmark_returns_none() {
        let extractor = FeatureExtractor::default();
        for missing in [
            Landmark::LeftHip,
            Landmark::RightHip,
            Landmark::LeftShoulder,
            Landmark::RightShoulder,
        ] {
            let mut pose = make_plank_pose();
            pose.keypoints[missing.index()] = None;
            assert!(extractor.extract(&pose).is_none(), "{:?}", missing);
        }
    }

    #[test]
    fn test_missing_torso_landmark_pixel_relative_returns_none() {
        let extractor = FeatureExtractor::new(Normalization::PixelRelative);
        let mut pose = make_plank_pose();
        pose.keypoints[Landmark::RightHip.index()] = None;
        assert!(extractor.extract(&pose).is_none());
    }

    #[test]
    fn test_degenerate_torso_returns_none() {
        use Landmark::*;
        let pose = Pose::default()
            .with(LeftShoulder, kp(0.5, 0.5))
            .with(RightShoulder, kp(0.5, 0.5))
            .with(LeftHip, kp(0.5, 0.5))
            .with(RightHip, kp(0.5, 0.5));
        assert!(FeatureExtractor::default().extract(&pose).is_none());
    }

    #[test]
    fn test_non_finite_torso_landmark_returns_none() {
        for normalization in [Normalization::TorsoRelative, Normalization::PixelRelative] {
            let extractor = FeatureExtractor::new(normalization);
            let mut pose = make_plank_pose();
            pose.keypoints[Landmark::LeftHip.index()] = Some(kp(f32::NAN, 0.5));
            assert!(extractor.extract(&pose).is_none(), "{:?}", normalization);
        }
    }

    #[test]
    fn test_overflowing_torso_returns_none() {
        let mut pose = torso_pose();
        pose.keypoints[Landmark::LeftShoulder.index()] = Some(kp(-f32::MAX, 0.5));
        pose.keypoints[Landmark::RightShoulder.index()] = Some(kp(-f32::MAX, 0.5));
        assert!(FeatureExtractor::default().extract(&pose).is_none());
    }

    #[test]
    fn test_non_finite_joint_zero_filled() {
        let mut pose = make_plank_pose();
        pose.keypoints[Landmark::LeftElbow.index()] = Some(kp(f32::NAN, 0.7));
        let features = FeatureExtractor::default().extract(&pose).unwrap();
        assert_eq!(features.coords(Landmark::LeftElbow), [0.0, 0.0, 0.0]);
        assert_eq!(features.angles().left_elbow, 0.0);
        assert_eq!(features.angles().left_shoulder, 0.0);
        assert!(features.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_feature_length_constant() {
        let extractor = FeatureExtractor::default();
        let full = extractor.extract(&make_plank_pose()).unwrap();
        let minimal = extractor.extract(&torso_pose()).unwrap();
        assert_eq!(full.as_slice().len(), 60);
        assert_eq!(minimal.as_slice().len(), 60);
        assert_eq!(FEATURE_LEN, 60);
    }

    #[test]
    fn test_torso_normalization() {
        let features = FeatureExtractor::default()
            .extract(&make_plank_pose())
            .unwrap();
        // hip中点が原点、肩中点までの距離が1
        assert_eq!(features.coords(Landmark::LeftHip), [0.0, 0.0, 0.0]);
        let [sx, sy, sz] = features.coords(Landmark::LeftShoulder);
        assert!(approx_eq_f32(sx, -1.0, 1e-5));
        assert!(approx_eq_f32(sy, 0.0, 1e-5));
        assert!(approx_eq_f32(sz, 0.0, 1e-5));
        let [ax, _, _] = features.coords(Landmark::LeftAnkle);
        assert!(approx_eq_f32(ax, 1.5, 1e-5));
    }

    #[test]
    fn test_missing_joint_zero_filled() {
        let features = FeatureExtractor::default().extract(&torso_pose()).unwrap();
        assert_eq!(features.coords(Landmark::Nose), [0.0, 0.0, 0.0]);
        assert_eq!(features.coords(Landmark::RightFootIndex), [0.0, 0.0, 0.0]);
        // どの関節角も胴体以外の関節が必要
        assert_eq!(features.angles(), JointAngles::default());
    }

    #[test]
    fn test_translation_and_scale_invariant() {
        let extractor = FeatureExtractor::default();
        let base = extractor.extract(&make_plank_pose()).unwrap();

        let mut moved = make_plank_pose();
        for kp in moved.keypoints.iter_mut().flatten() {
            kp.x = kp.x * 0.5 + 0.1;
            kp.y = kp.y * 0.5 - 0.05;
        }
        let moved = extractor.extract(&moved).unwrap();

        for (a, b) in base.as_slice().iter().zip(moved.as_slice()) {
            assert!(approx_eq_f32(*a, *b, 0.05), "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_angles() {
        let angles = FeatureExtractor::default()
            .extract(&make_plank_pose())
            .unwrap()
            .angles();
        // 体幹が一直線
        assert!(approx_eq_f32(angles.back, 180.0, 0.05));
        assert!(approx_eq_f32(angles.left_hip, 180.0, 0.05));
        assert!(approx_eq_f32(angles.right_knee, 180.0, 0.05));
        // 腕は肩から真下
        assert!(approx_eq_f32(angles.left_shoulder, 90.0, 1e-2));
        // 前腕は肘で前方に曲がる
        assert!(approx_eq_f32(angles.left_elbow, 90.0, 1e-2));
    }

    #[test]
    fn test_angles_same_for_both_normalizations() {
        let torso = FeatureExtractor::new(Normalization::TorsoRelative)
            .extract(&make_plank_pose())
            .unwrap();
        let pixel = FeatureExtractor::new(Normalization::PixelRelative)
            .extract(&make_plank_pose())
            .unwrap();
        for (a, b) in torso.angles().to_array().iter().zip(pixel.angles().to_array()) {
            assert!(approx_eq_f32(*a, b, 0.05));
        }
    }

    #[test]
    fn test_pixel_relative_keeps_coordinates() {
        let features = FeatureExtractor::new(Normalization::PixelRelative)
            .extract(&make_plank_pose())
            .unwrap();
        assert_eq!(features.coords(Landmark::LeftAnkle), [0.8, 0.5, 0.0]);
    }

    #[test]
    fn test_min_visibility_treats_keypoint_as_missing() {
        let mut pose = make_plank_pose();
        pose.keypoints[Landmark::LeftAnkle.index()] = Some(Keypoint::new(0.8, 0.5, 0.0, 0.1));
        let features = FeatureExtractor::default()
            .with_min_visibility(0.5)
            .extract(&pose)
            .unwrap();
        assert_eq!(features.coords(Landmark::LeftAnkle), [0.0, 0.0, 0.0]);
        assert_eq!(features.angles().back, 0.0);
        assert_eq!(features.angles().left_knee, 0.0);
    }
}
