// Landmark extraction - turns one frame into a normalized joint map

use crate::models::capture::RawFrame;
use crate::models::pose::{now_seconds, Joint, JointName, PoseError, PoseResult, PoseSnapshot};
use crate::platform::pose::LandmarkModel;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Runs the external landmark model and normalizes its output
#[derive(Clone)]
pub struct LandmarkExtractor {
    model: Arc<dyn LandmarkModel>,
    min_confidence: f64,
}

impl LandmarkExtractor {
    /// Create an extractor that keeps every landmark the model reports
    pub fn new(model: Arc<dyn LandmarkModel>) -> Self {
        Self {
            model,
            min_confidence: 0.0,
        }
    }

    /// Only keep joints with `confidence >= min_confidence`.
    /// 0.0 disables filtering.
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    pub fn model_info(&self) -> String {
        self.model.model_info()
    }

    /// Extract a pose snapshot from a frame.
    ///
    /// A frame with nobody in it yields an empty snapshot, not an error.
    /// Errors are reserved for frames the model cannot accept and for model
    /// failures.
    pub fn extract(&self, frame: &RawFrame) -> PoseResult<PoseSnapshot> {
        frame.validate().map_err(PoseError::InvalidFrame)?;

        let bodies = self
            .model
            .detect_bodies(frame)
            .map_err(|e| match e {
                PoseError::DetectionFailed(_) => e,
                other => PoseError::DetectionFailed(other.to_string()),
            })?;

        let body = match bodies.first() {
            Some(body) => body,
            None => {
                tracing::debug!(frame_ts = frame.timestamp, "No person detected");
                return Ok(PoseSnapshot::empty());
            }
        };

        let mut joints = BTreeMap::new();
        for name in JointName::ALL {
            let point = match body.recognized_point(name) {
                Ok(point) => point,
                Err(_) => continue,
            };

            let joint = Joint::new(point.x, point.y, point.confidence);
            if !joint.is_finite() {
                tracing::debug!(joint = %name, "Dropping landmark with non-finite values");
                continue;
            }
            if joint.confidence < self.min_confidence {
                continue;
            }

            joints.insert(name, joint);
        }

        Ok(PoseSnapshot::new(joints, now_seconds()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capture::PixelFormat;
    use crate::platform::pose::{
        BodyObservation, DetectedBody, DummyLandmarkModel, RecognizedPoint,
    };

    struct FixedModel {
        bodies: Vec<DetectedBody>,
    }

    impl LandmarkModel for FixedModel {
        fn detect_bodies(&self, _frame: &RawFrame) -> PoseResult<Vec<Box<dyn BodyObservation>>> {
            Ok(self
                .bodies
                .iter()
                .cloned()
                .map(|body| Box::new(body) as Box<dyn BodyObservation>)
                .collect())
        }

        fn model_info(&self) -> String {
            "fixed".to_string()
        }
    }

    struct FailingModel;

    impl LandmarkModel for FailingModel {
        fn detect_bodies(&self, _frame: &RawFrame) -> PoseResult<Vec<Box<dyn BodyObservation>>> {
            Err(PoseError::InvalidConfig("model file missing".to_string()))
        }

        fn model_info(&self) -> String {
            "failing".to_string()
        }
    }

    fn frame() -> RawFrame {
        RawFrame::new(4, 4, vec![0u8; 64], PixelFormat::BGRA8)
    }

    fn extractor(bodies: Vec<DetectedBody>) -> LandmarkExtractor {
        LandmarkExtractor::new(Arc::new(FixedModel { bodies }))
    }

    #[test]
    fn test_no_person_yields_empty_snapshot() {
        let snapshot = LandmarkExtractor::new(Arc::new(DummyLandmarkModel))
            .extract(&frame())
            .expect("No person is not a failure");

        assert!(snapshot.is_empty());
        assert!(snapshot.timestamp > 0.0);
    }

    #[test]
    fn test_unresolved_joints_are_omitted() {
        let body = DetectedBody::new()
            .with_point(JointName::Nose, RecognizedPoint::new(0.5, 0.3, 0.9))
            .with_point(JointName::LeftShoulder, RecognizedPoint::new(0.4, 0.6, 0.8));

        let snapshot = extractor(vec![body]).extract(&frame()).unwrap();

        assert_eq!(snapshot.joints.len(), 2);
        assert_eq!(snapshot.joint(JointName::Nose), Some(&Joint::new(0.5, 0.3, 0.9)));
        assert!(snapshot.joint(JointName::RightShoulder).is_none());
    }

    #[test]
    fn test_low_confidence_kept_by_default() {
        let body = DetectedBody::new()
            .with_point(JointName::LeftEar, RecognizedPoint::new(0.2, 0.2, 0.05));

        let snapshot = extractor(vec![body]).extract(&frame()).unwrap();
        assert_eq!(snapshot.joint(JointName::LeftEar).unwrap().confidence, 0.05);
    }

    #[test]
    fn test_confidence_threshold_filters() {
        let body = DetectedBody::new()
            .with_point(JointName::LeftEar, RecognizedPoint::new(0.2, 0.2, 0.05))
            .with_point(JointName::RightEar, RecognizedPoint::new(0.3, 0.2, 0.6));

        let snapshot = extractor(vec![body])
            .with_min_confidence(0.1)
            .extract(&frame())
            .unwrap();

        assert!(snapshot.joint(JointName::LeftEar).is_none());
        assert!(snapshot.joint(JointName::RightEar).is_some());
    }

    #[test]
    fn test_only_first_body_is_used() {
        let first = DetectedBody::new().with_point(JointName::Neck, RecognizedPoint::new(0.5, 0.5, 1.0));
        let second = DetectedBody::new().with_point(JointName::Root, RecognizedPoint::new(0.5, 0.8, 1.0));

        let snapshot = extractor(vec![first, second]).extract(&frame()).unwrap();
        assert!(snapshot.joint(JointName::Neck).is_some());
        assert!(snapshot.joint(JointName::Root).is_none());
    }

    #[test]
    fn test_non_finite_points_are_dropped() {
        let body = DetectedBody::new()
            .with_point(JointName::Nose, RecognizedPoint::new(f64::NAN, 0.3, 0.9))
            .with_point(JointName::Neck, RecognizedPoint::new(0.5, 0.5, 0.9));

        let snapshot = extractor(vec![body]).extract(&frame()).unwrap();
        assert_eq!(snapshot.joints.keys().copied().collect::<Vec<_>>(), vec![JointName::Neck]);
    }

    #[test]
    fn test_non_finite_confidence_is_dropped() {
        let body = DetectedBody::new()
            .with_point(JointName::Nose, RecognizedPoint::new(0.5, 0.3, f64::NAN))
            .with_point(JointName::LeftEye, RecognizedPoint::new(0.48, 0.28, f64::INFINITY))
            .with_point(JointName::Neck, RecognizedPoint::new(0.5, 0.5, 0.9));

        let snapshot = extractor(vec![body]).extract(&frame()).unwrap();
        assert_eq!(snapshot.joints.keys().copied().collect::<Vec<_>>(), vec![JointName::Neck]);
        assert!(snapshot.to_json().is_ok());
    }

    #[test]
    fn test_invalid_frame_is_a_failure() {
        let bad = RawFrame::new(4, 4, vec![0u8; 3], PixelFormat::BGRA8);
        let err = extractor(vec![]).extract(&bad).unwrap_err();
        assert!(matches!(err, PoseError::InvalidFrame(_)));
    }

    #[test]
    fn test_model_error_is_a_detection_failure() {
        let err = LandmarkExtractor::new(Arc::new(FailingModel))
            .extract(&frame())
            .unwrap_err();
        assert!(matches!(err, PoseError::DetectionFailed(msg) if msg.contains("model file missing")));
    }
}
