// Data models for camera frames, pose snapshots and comparison results

pub mod capture;
pub mod pose;
