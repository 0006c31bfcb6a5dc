//! Version-control access for release workflows.
//!
//! The release only needs a handful of git commands: tag listing, status,
//! signed tagging and pushing. They are defined by [`GitOperations`] and run
//! against the system `git` by [`SystemGitOperations`].

mod operations;
mod system;

pub use operations::GitOperations;
pub use system::SystemGitOperations;
