// Integration seams for host-owned devices and models

pub mod camera;
pub mod pose;
