//! State management for release runs.
//!
//! A run records its progress after every externally visible step so an
//! interrupted release can be resumed without repeating work.

mod manager;
mod release_state;

pub use manager::{LoadStateResult, StateManager};
pub use release_state::{
    AssetRecord, Checkpoint, FailedPlatform, PipelineState, RecordedError, ReleaseState,
    STATE_FORMAT_VERSION,
};
