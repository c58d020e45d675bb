pub mod blink_counter;
pub mod config;
pub mod database;
pub mod frame_slot;
pub mod landmark_extractor;
pub mod pose_comparator;
pub mod pose_store;
pub mod snapshot;

// Session orchestration
pub mod stream_controller;
