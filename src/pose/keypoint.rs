use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;

/// 追跡する関節（特徴量の並び順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum Landmark {
    Nose = 0,
    LeftShoulder = 1,
    RightShoulder = 2,
    LeftElbow = 3,
    RightElbow = 4,
    LeftWrist = 5,
    RightWrist = 6,
    LeftHip = 7,
    RightHip = 8,
    LeftKnee = 9,
    RightKnee = 10,
    LeftAnkle = 11,
    RightAnkle = 12,
    LeftHeel = 13,
    RightHeel = 14,
    LeftFootIndex = 15,
    RightFootIndex = 16,
}

impl Landmark {
    pub const COUNT: usize = 17;

    pub const ALL: [Landmark; Landmark::COUNT] = [
        Self::Nose,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// 検出された1関節
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// フレーム相対X
    pub x: f32,
    /// フレーム相対Y
    pub y: f32,
    /// 相対奥行き
    #[serde(default)]
    pub z: f32,
    /// 可視度・尤度 (0.0..=1.0)
    #[serde(default = "default_visibility")]
    pub visibility: f32,
}

fn default_visibility() -> f32 {
    1.0
}

impl Keypoint {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    /// 可視度が閾値以上で、座標がすべて有限値か
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.visibility >= threshold
            && self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// 1フレーム内の1人分のランドマーク
/// pose入力が報告しなかった関節は `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<Landmark, Keypoint>",
    into = "BTreeMap<Landmark, Keypoint>"
)]
pub struct Pose {
    pub keypoints: [Option<Keypoint>; Landmark::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Option<Keypoint>; Landmark::COUNT]) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, landmark: Landmark) -> Option<&Keypoint> {
        self.keypoints[landmark.index()].as_ref()
    }

    pub fn set(&mut self, landmark: Landmark, keypoint: Keypoint) {
        self.keypoints[landmark.index()] = Some(keypoint);
    }

    pub fn with(mut self, landmark: Landmark, keypoint: Keypoint) -> Self {
        self.set(landmark, keypoint);
        self
    }

    /// 報告された関節の数
    pub fn len(&self) -> usize {
        self.keypoints.iter().filter(|k| k.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(Landmark, Keypoint)> for Pose {
    fn from_iter<I: IntoIterator<Item = (Landmark, Keypoint)>>(iter: I) -> Self {
        let mut pose = Pose::default();
        for (landmark, keypoint) in iter {
            pose.set(landmark, keypoint);
        }
        pose
    }
}

impl From<BTreeMap<Landmark, Keypoint>> for Pose {
    fn from(map: BTreeMap<Landmark, Keypoint>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Pose> for BTreeMap<Landmark, Keypoint> {
    fn from(pose: Pose) -> Self {
        Landmark::ALL
            .iter()
            .filter_map(|&lm| pose.get(lm).map(|kp| (lm, *kp)))
            .collect()
    }
}
