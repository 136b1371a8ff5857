//! Owner-facing services
//!
//! The authoring surface (CLI today, anything else tomorrow) goes through
//! these services rather than touching the store directly, so the status
//! rules and the media-before-record ordering hold everywhere.

pub mod draft;

pub use draft::{DraftService, MediaUpload};
