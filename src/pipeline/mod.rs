// Batch jobs that drive the HOT engine and the media pipeline end to end.
//
//   hot_posts: collect, score, rank, dedup, dispatch (one run)
//   mirror: single-entity mirror, origin backfill, read-path resolver
//   convert: bulk conversion of legacy originals already in storage
//   batch: bounded-concurrency helper shared by all of the above

pub mod batch;
pub mod convert;
pub mod hot_posts;
pub mod mirror;
