// Data models for body-pose snapshots and pose comparison

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ==============================================================================
// Joint Names (19 canonical body landmarks)
// ==============================================================================

/// Canonical body landmark identifiers.
///
/// The serialized form (`left_eye_1`, `root`, ...) is the identity used as a
/// JSON key and when matching joints across snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JointName {
    #[serde(rename = "nose_1")]
    Nose,
    #[serde(rename = "left_eye_1")]
    LeftEye,
    #[serde(rename = "right_eye_1")]
    RightEye,
    #[serde(rename = "left_ear_1")]
    LeftEar,
    #[serde(rename = "right_ear_1")]
    RightEar,
    #[serde(rename = "left_shoulder_1")]
    LeftShoulder,
    #[serde(rename = "right_shoulder_1")]
    RightShoulder,
    #[serde(rename = "left_elbow_1")]
    LeftElbow,
    #[serde(rename = "right_elbow_1")]
    RightElbow,
    #[serde(rename = "left_wrist_1")]
    LeftWrist,
    #[serde(rename = "right_wrist_1")]
    RightWrist,
    #[serde(rename = "left_hip_1")]
    LeftHip,
    #[serde(rename = "right_hip_1")]
    RightHip,
    #[serde(rename = "left_knee_1")]
    LeftKnee,
    #[serde(rename = "right_knee_1")]
    RightKnee,
    #[serde(rename = "left_ankle_1")]
    LeftAnkle,
    #[serde(rename = "right_ankle_1")]
    RightAnkle,
    #[serde(rename = "neck_1")]
    Neck,
    #[serde(rename = "root")]
    Root,
}

impl JointName {
    /// All canonical joints, in extraction order
    pub const ALL: [JointName; 19] = [
        JointName::Nose,
        JointName::LeftEye,
        JointName::RightEye,
        JointName::LeftEar,
        JointName::RightEar,
        JointName::LeftShoulder,
        JointName::RightShoulder,
        JointName::LeftElbow,
        JointName::RightElbow,
        JointName::LeftWrist,
        JointName::RightWrist,
        JointName::LeftHip,
        JointName::RightHip,
        JointName::LeftKnee,
        JointName::RightKnee,
        JointName::LeftAnkle,
        JointName::RightAnkle,
        JointName::Neck,
        JointName::Root,
    ];

    /// Upper-body subset (shoulders, elbows, eyes, ears) used by the first
    /// generation of the comparator
    pub const LEGACY_KEY_JOINTS: [JointName; 8] = [
        JointName::LeftShoulder,
        JointName::RightShoulder,
        JointName::LeftElbow,
        JointName::RightElbow,
        JointName::LeftEye,
        JointName::RightEye,
        JointName::LeftEar,
        JointName::RightEar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JointName::Nose => "nose_1",
            JointName::LeftEye => "left_eye_1",
            JointName::RightEye => "right_eye_1",
            JointName::LeftEar => "left_ear_1",
            JointName::RightEar => "right_ear_1",
            JointName::LeftShoulder => "left_shoulder_1",
            JointName::RightShoulder => "right_shoulder_1",
            JointName::LeftElbow => "left_elbow_1",
            JointName::RightElbow => "right_elbow_1",
            JointName::LeftWrist => "left_wrist_1",
            JointName::RightWrist => "right_wrist_1",
            JointName::LeftHip => "left_hip_1",
            JointName::RightHip => "right_hip_1",
            JointName::LeftKnee => "left_knee_1",
            JointName::RightKnee => "right_knee_1",
            JointName::LeftAnkle => "left_ankle_1",
            JointName::RightAnkle => "right_ankle_1",
            JointName::Neck => "neck_1",
            JointName::Root => "root",
        }
    }
}

impl fmt::Display for JointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JointName {
    type Err = PoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JointName::ALL
            .iter()
            .copied()
            .find(|joint| joint.as_str() == s)
            .ok_or_else(|| PoseError::UnknownJoint(s.to_string()))
    }
}

// ==============================================================================
// Joint
// ==============================================================================

/// A detected landmark in the detector's normalized image space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub x: f64,          // Normalized [0, 1]
    pub y: f64,          // Normalized [0, 1]
    pub confidence: f64, // Detection confidence [0, 1]
}

impl Joint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }

    pub fn distance(&self, other: &Joint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.confidence.is_finite()
    }
}

// ==============================================================================
// Pose Snapshot
// ==============================================================================

/// All joints detected in one frame, plus the wall-clock time of assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSnapshot {
    #[serde(deserialize_with = "deserialize_joints")]
    pub joints: BTreeMap<JointName, Joint>,
    pub timestamp: f64, // Seconds since the Unix epoch
}

impl PoseSnapshot {
    pub fn new(joints: BTreeMap<JointName, Joint>, timestamp: f64) -> Self {
        Self { joints, timestamp }
    }

    /// Snapshot with no joints, stamped now. Represents "no person visible".
    pub fn empty() -> Self {
        Self::new(BTreeMap::new(), now_seconds())
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn joint(&self, name: JointName) -> Option<&Joint> {
        self.joints.get(&name)
    }

    /// Serialize to the stored record format. JSON has no NaN or infinity,
    /// so non-finite values are rejected instead of being written as `null`.
    pub fn to_json(&self) -> PoseResult<String> {
        if !self.timestamp.is_finite() {
            return Err(PoseError::SerializationError(format!(
                "Non-finite timestamp: {}",
                self.timestamp
            )));
        }

        if let Some((name, joint)) = self.joints.iter().find(|(_, joint)| !joint.is_finite()) {
            return Err(PoseError::SerializationError(format!(
                "Non-finite value in joint {}: {:?}",
                name, joint
            )));
        }

        serde_json::to_string(self).map_err(|e| PoseError::SerializationError(e.to_string()))
    }

    pub fn from_json(json: &str) -> PoseResult<Self> {
        serde_json::from_str(json).map_err(|e| PoseError::DeserializationError(e.to_string()))
    }
}

/// Current wall-clock time as fractional seconds since the epoch
pub fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

// Joint keys that are not canonical names are skipped, not rejected.
fn deserialize_joints<'de, D>(deserializer: D) -> Result<BTreeMap<JointName, Joint>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Joint>::deserialize(deserializer)?;
    let mut joints = BTreeMap::new();

    for (key, joint) in raw {
        match key.parse::<JointName>() {
            Ok(name) => {
                joints.insert(name, joint);
            }
            Err(_) => tracing::debug!(joint = %key, "Skipping unknown joint key"),
        }
    }

    Ok(joints)
}

// ==============================================================================
// Comparison Result
// ==============================================================================

/// Outcome of comparing a live pose against a reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseMatch {
    pub similarity: f64,       // [0, 1], 1.0 = identical
    pub matched_joints: usize, // Joints present in both snapshots
    pub average_distance: Option<f64>,
}

impl PoseMatch {
    pub fn no_overlap() -> Self {
        Self {
            similarity: 0.0,
            matched_joints: 0,
            average_distance: None,
        }
    }

    /// Whether the live pose is close enough to count as "in position"
    pub fn is_in_position(&self, threshold: f64) -> bool {
        self.matched_joints > 0 && self.similarity >= threshold
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Required component not initialized")]
    NotInitialized,

    #[error("Stream is not running")]
    NotStreaming,

    #[error("Stream already running")]
    AlreadyRunning,

    #[error("Frame source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Detection failed: {0}")]
    DetectionFailed(String),

    #[error("Extraction timed out after {0:?}")]
    ExtractionTimeout(Duration),

    #[error("Request superseded: stream stopped before the result was delivered")]
    Superseded,

    #[error("No frame available")]
    NoFrame,

    #[error("Unknown joint: {0}")]
    UnknownJoint(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type PoseResult<T> = Result<T, PoseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_name_round_trip_through_strings() {
        for joint in JointName::ALL {
            assert_eq!(joint.as_str().parse::<JointName>().unwrap(), joint);
            let json = serde_json::to_string(&joint).unwrap();
            assert_eq!(json, format!("\"{}\"", joint.as_str()));
        }
        assert!("left_foot_1".parse::<JointName>().is_err());
    }

    #[test]
    fn test_joint_distance() {
        let a = Joint::new(0.3, 0.4, 0.9);
        let b = Joint::new(0.31, 0.41, 0.85);
        assert!((a.distance(&b) - 0.014142).abs() < 1e-5);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_snapshot_json_layout() {
        let mut joints = BTreeMap::new();
        joints.insert(JointName::Nose, Joint::new(0.5, 0.25, 0.75));
        let snapshot = PoseSnapshot::new(joints, 1_700_000_000.5);

        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(value["joints"]["nose_1"]["x"], 0.5);
        assert_eq!(value["joints"]["nose_1"]["y"], 0.25);
        assert_eq!(value["joints"]["nose_1"]["confidence"], 0.75);
        assert_eq!(value["timestamp"], 1_700_000_000.5);
    }

    #[test]
    fn test_snapshot_skips_unknown_joint_keys() {
        let json = r#"{
            "joints": {
                "left_eye_1": {"x": 0.3, "y": 0.4, "confidence": 0.9},
                "left_foot_1": {"x": 0.1, "y": 0.9, "confidence": 0.5}
            },
            "timestamp": 12.0
        }"#;

        let snapshot = PoseSnapshot::from_json(json).unwrap();
        assert_eq!(snapshot.joints.len(), 1);
        assert!(snapshot.joint(JointName::LeftEye).is_some());
    }

    #[test]
    fn test_snapshot_rejects_malformed_json() {
        let err = PoseSnapshot::from_json("{\"joints\": 3}").unwrap_err();
        assert!(matches!(err, PoseError::DeserializationError(_)));
    }

    #[test]
    fn test_non_finite_values_refuse_to_serialize() {
        let mut joints = BTreeMap::new();
        joints.insert(JointName::Nose, Joint::new(0.5, 0.3, f64::NAN));
        let err = PoseSnapshot::new(joints, 1.0).to_json().unwrap_err();
        assert!(matches!(err, PoseError::SerializationError(_)));

        let mut joints = BTreeMap::new();
        joints.insert(JointName::Neck, Joint::new(f64::INFINITY, 0.3, 0.9));
        assert!(PoseSnapshot::new(joints, 1.0).to_json().is_err());

        let err = PoseSnapshot::new(BTreeMap::new(), f64::NAN).to_json().unwrap_err();
        assert!(matches!(err, PoseError::SerializationError(_)));

        assert!(!Joint::new(0.5, 0.5, f64::NEG_INFINITY).is_finite());
        assert!(Joint::new(0.5, 0.5, 0.0).is_finite());
    }

    #[test]
    fn test_empty_snapshot_is_stamped() {
        let snapshot = PoseSnapshot::empty();
        assert!(snapshot.is_empty());
        assert!(snapshot.timestamp > 0.0);
    }

    #[test]
    fn test_pose_match_position_threshold() {
        let close = PoseMatch {
            similarity: 0.92,
            matched_joints: 4,
            average_distance: Some(0.04),
        };
        assert!(close.is_in_position(0.8));
        assert!(!close.is_in_position(0.95));
        assert!(!PoseMatch::no_overlap().is_in_position(0.0));
    }
}
