//! Wardline: inpatient ward management
//!
//! Tracks admitted patients through their one-way Active -> Discharged
//! lifecycle, builds the daily census (active patients plus those discharged
//! within a visibility window), and exports it as a PDF report. Storage is
//! either an in-memory table set with a JSON snapshot or a PostgREST backend.
//!
//! `ward::WardService` carries the operations. Two front ends sit on top:
//! the stateful screen controllers in `screens`, for an interactive client,
//! and the warp HTTP service in `api`, which the `wardline` binary serves.

pub mod api;
pub mod config;
pub mod error;
pub mod query;
pub mod report;
pub mod screens;
pub mod storage;
pub mod ward;

pub use error::WardError;
