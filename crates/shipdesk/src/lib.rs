//! Core orchestration library for the shipment operations console.
//!
//! The interesting machinery lives in [`workflows::booking`]: the bulk
//! rate-shopping and carrier-booking pipeline that takes a batch of pending
//! orders through quote retrieval, carrier assignment, and final submission.
//! Everything else here is service plumbing shared with the API binary.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
