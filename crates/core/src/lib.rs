//! Real-time fish detection and tracking over a stream of RGB frames.
//!
//! A processing cycle runs `Frame -> preprocess -> segment -> score` (or a
//! model backend) `-> NMS -> track -> classify -> emit`. See
//! [`pipeline::detection_session::DetectionSession`] for the loop that drives it.

pub mod classification;
pub mod detection;
pub mod events;
pub mod pipeline;
pub mod shared;
pub mod tracking;
pub mod video;
