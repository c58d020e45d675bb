// Pose estimation platform integration
// Provides the landmark model bridge and helper types

pub mod landmark_bridge;

pub use landmark_bridge::{
    parse_bodies, BodyObservation, DetectedBody, DummyLandmarkModel, JsonBridgeModel,
    LandmarkModel, RecognizedPoint,
};
