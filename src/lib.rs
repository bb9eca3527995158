// Pitchside: HOT-post ranking and sports-media mirroring for a community board
//
// This is the library root. Each module corresponds to one subsystem of the
// two batch pipelines.

pub mod config;
pub mod db;
pub mod hot;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod status;

#[cfg(feature = "web")]
pub mod web;
