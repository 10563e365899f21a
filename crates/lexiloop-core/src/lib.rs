//! lexiloop-core: Spaced-repetition review engine, traits, and daily-content guard.
//!
//! This crate defines the data model, collaborator traits, and scheduling
//! logic that the rest of lexiloop builds on. Storage, content generation
//! and the clock are injected through the traits in [`traits`].

pub mod activity;
pub mod cache;
pub mod daily;
pub mod error;
pub mod executor;
pub mod grading;
pub mod model;
pub mod queue;
pub mod review;
pub mod sampling;
pub mod traits;

pub use error::{ErrorKind, ReviewError, StoreError};
