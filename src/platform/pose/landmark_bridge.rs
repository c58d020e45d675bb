// Landmark model bridge
// Abstraction over the external body-pose detector. The core never looks at
// pixels itself: a model turns a frame into body observations, and the
// extractor queries each observation for the canonical joints.

use crate::models::capture::RawFrame;
use crate::models::pose::{JointName, PoseError, PoseResult};
use serde_json::Value;
use std::collections::HashMap;

/// A landmark as reported by the detector, before any policy is applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecognizedPoint {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

impl RecognizedPoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self { x, y, confidence }
    }
}

/// One detected person
pub trait BodyObservation: Send + Sync {
    /// Look up a single landmark. An error means the detector could not
    /// resolve this joint (occluded, out of frame); it is not fatal.
    fn recognized_point(&self, joint: JointName) -> PoseResult<RecognizedPoint>;
}

/// External body-pose model
pub trait LandmarkModel: Send + Sync {
    /// Run the model once on a frame. An empty vector means nobody is visible.
    fn detect_bodies(&self, frame: &RawFrame) -> PoseResult<Vec<Box<dyn BodyObservation>>>;

    /// Get model info
    fn model_info(&self) -> String;
}

// ==============================================================================
// Detected Body (map-backed observation)
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedBody {
    points: HashMap<JointName, RecognizedPoint>,
}

impl DetectedBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_point(mut self, joint: JointName, point: RecognizedPoint) -> Self {
        self.points.insert(joint, point);
        self
    }

    pub fn insert(&mut self, joint: JointName, point: RecognizedPoint) {
        self.points.insert(joint, point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Parse one body from detector JSON:
    /// `{"points": {"nose_1": {"x": .., "y": .., "confidence": ..}, ...}}`
    ///
    /// Unknown joint names and points without coordinates are skipped. A
    /// missing confidence reads as 0.0.
    pub fn from_json(data: &Value) -> PoseResult<Self> {
        let points = data
            .get("points")
            .and_then(|p| p.as_object())
            .ok_or_else(|| PoseError::DetectionFailed("Missing body points".to_string()))?;

        let mut body = DetectedBody::new();
        for (key, point) in points {
            let joint = match key.parse::<JointName>() {
                Ok(joint) => joint,
                Err(_) => {
                    tracing::debug!(joint = %key, "Ignoring landmark outside the canonical set");
                    continue;
                }
            };

            let x = point.get("x").and_then(|v| v.as_f64());
            let y = point.get("y").and_then(|v| v.as_f64());
            let confidence = point.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0);

            if let (Some(x), Some(y)) = (x, y) {
                body.insert(joint, RecognizedPoint::new(x, y, confidence));
            }
        }

        Ok(body)
    }
}

impl BodyObservation for DetectedBody {
    fn recognized_point(&self, joint: JointName) -> PoseResult<RecognizedPoint> {
        self.points
            .get(&joint)
            .copied()
            .ok_or_else(|| PoseError::DetectionFailed(format!("Landmark {} not resolved", joint)))
    }
}

/// Parse a detector response of the form `{"bodies": [<body>, ...]}`
pub fn parse_bodies(json: &str) -> PoseResult<Vec<DetectedBody>> {
    let result: Value = serde_json::from_str(json)
        .map_err(|e| PoseError::DetectionFailed(format!("Failed to parse detector output: {}", e)))?;

    match result.get("bodies") {
        Some(Value::Array(bodies)) => bodies.iter().map(DetectedBody::from_json).collect(),
        Some(Value::Null) | None => Ok(vec![]),
        Some(other) => Err(PoseError::DetectionFailed(format!(
            "Expected an array of bodies, got {}",
            other
        ))),
    }
}

// ==============================================================================
// JSON Bridge (detector running out of process or behind FFI)
// ==============================================================================

type DetectorFn = dyn Fn(&RawFrame) -> Result<String, String> + Send + Sync;

/// Model backed by an external detector that answers with JSON
pub struct JsonBridgeModel {
    name: String,
    detector: Box<DetectorFn>,
}

impl JsonBridgeModel {
    pub fn new<F>(name: impl Into<String>, detector: F) -> Self
    where
        F: Fn(&RawFrame) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            detector: Box::new(detector),
        }
    }
}

impl LandmarkModel for JsonBridgeModel {
    fn detect_bodies(&self, frame: &RawFrame) -> PoseResult<Vec<Box<dyn BodyObservation>>> {
        let output = (self.detector)(frame)
            .map_err(|e| PoseError::DetectionFailed(format!("{} inference failed: {}", self.name, e)))?;

        let bodies = parse_bodies(&output)?;
        Ok(bodies
            .into_iter()
            .map(|body| Box::new(body) as Box<dyn BodyObservation>)
            .collect())
    }

    fn model_info(&self) -> String {
        format!("JSON landmark bridge ({})", self.name)
    }
}

// ==============================================================================
// Dummy Implementation (no detector attached)
// ==============================================================================

/// Reports nobody in every frame
#[derive(Debug, Clone, Default)]
pub struct DummyLandmarkModel;

impl LandmarkModel for DummyLandmarkModel {
    fn detect_bodies(&self, _frame: &RawFrame) -> PoseResult<Vec<Box<dyn BodyObservation>>> {
        Ok(vec![])
    }

    fn model_info(&self) -> String {
        "Dummy landmark model (no inference)".to_string()
    }
}
