pub mod core;
pub mod models;
pub mod platform;
pub mod telemetry;

pub use crate::core::blink_counter::{BlinkCounter, BlinkDetector};
pub use crate::core::config::{Config, ConfigError};
pub use crate::core::database::Database;
pub use crate::core::landmark_extractor::LandmarkExtractor;
pub use crate::core::pose_comparator::PoseComparator;
pub use crate::core::pose_store::{KeyValueStore, MemoryStore, PoseStore, StoreError};
pub use crate::core::stream_controller::{StreamController, StreamToken};
pub use crate::models::capture::{PixelFormat, RawFrame};
pub use crate::models::pose::{Joint, JointName, PoseError, PoseMatch, PoseResult, PoseSnapshot};
pub use crate::platform::camera::{FrameFeeder, FrameSource, HostFrameSource};
pub use crate::platform::pose::{JsonBridgeModel, LandmarkModel};
