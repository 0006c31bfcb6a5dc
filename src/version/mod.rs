//! Version tags: parsing, ordering, suggestions and operator selection.

mod planner;
mod tag;

pub use planner::{OTHER_CHOICE, TagPlanner, highest_tag};
pub use tag::{INITIAL_TAG, PRERELEASE_MARKERS, ReleaseTag, classify_prerelease, suggest_next};
