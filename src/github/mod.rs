//! Release hosting.
//!
//! [`ReleaseHost`] is the boundary the pipeline publishes through;
//! [`GitHubReleaseHost`] implements it with the GitHub REST API.

mod release_host;

pub use release_host::{GitHubReleaseHost, HostedRelease, NewRelease, ReleaseHost, UploadedAsset};
