//! Release tag labels and their version ordering.

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Substrings that mark a tag as a pre-release
pub const PRERELEASE_MARKERS: &[&str] = &["-alpha", "-beta", "-pre", "-rc"];

/// Tag used when the repository has no tags yet
pub const INITIAL_TAG: &str = "v0.0.0";

/// Number of version components considered for ordering and suggestions
const COMPONENTS: usize = 3;

/// Whether a tag label looks like a pre-release
pub fn classify_prerelease(label: &str) -> bool {
    PRERELEASE_MARKERS.iter().any(|marker| label.contains(marker))
}

/// A version tag label such as `v1.5.3` or `v2.0.0-rc1`.
///
/// Labels are kept verbatim. Ordering compares the three leading numeric
/// components (missing components count as `0`), then ranks a pre-release
/// below the matching final release, then falls back to the label itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseTag(String);

impl ReleaseTag {
    /// Validate and wrap a tag label
    pub fn parse(label: &str) -> Result<Self> {
        let label = label.trim();
        if label.is_empty() || label.chars().any(char::is_whitespace) {
            return Err(CliError::InvalidArguments {
                reason: format!("'{}' is not a valid tag name", label),
            }
            .into());
        }
        Ok(Self(label.to_string()))
    }

    /// The `v0.0.0` placeholder for untagged repositories
    pub fn initial() -> Self {
        Self(INITIAL_TAG.to_string())
    }

    /// Tag label
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this tag is a pre-release
    pub fn is_prerelease(&self) -> bool {
        classify_prerelease(&self.0)
    }

    /// Release title: the label without its leading `v`
    pub fn display_name(&self) -> &str {
        self.0.strip_prefix('v').unwrap_or(&self.0)
    }

    /// The first three dot-separated fields, right-padded with `0`
    pub(crate) fn fields(&self) -> [&str; COMPONENTS] {
        let mut fields = ["0"; COMPONENTS];
        for (slot, part) in fields
            .iter_mut()
            .zip(self.0.trim_start_matches('v').split('.'))
        {
            *slot = part;
        }
        fields
    }

    /// Strictly numeric components; `None` where a field is not a number
    pub fn numeric_parts(&self) -> [Option<u64>; COMPONENTS] {
        self.fields().map(|field| field.parse().ok())
    }

    /// `(major, minor, patch)` using each field's leading digits
    pub fn version(&self) -> (u64, u64, u64) {
        let [major, minor, patch] = self.fields().map(leading_number);
        (major, minor, patch)
    }
}

fn leading_number(field: &str) -> u64 {
    let digits: String = field.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

impl Ord for ReleaseTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version()
            .cmp(&other.version())
            .then_with(|| other.is_prerelease().cmp(&self.is_prerelease()))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for ReleaseTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Candidate next tags, patch bump first.
///
/// Each candidate increments one component and zeroes the less significant
/// ones. A zero patch is left off the rendered label (`v1.6`, not `v1.6.0`).
/// Non-numeric components, and components already at `u64::MAX`, produce
/// no candidate.
pub fn suggest_next(current: &ReleaseTag) -> Vec<ReleaseTag> {
    let fields = current.fields();
    let prefix = if current.as_str().starts_with('v') { "v" } else { "" };

    (0..COMPONENTS)
        .rev()
        .filter_map(|position| {
            let value: u64 = fields[position].parse().ok()?;
            let mut next: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
            next[position] = value.checked_add(1)?.to_string();
            for field in next.iter_mut().skip(position + 1) {
                *field = "0".to_string();
            }
            if next[COMPONENTS - 1] == "0" {
                next.truncate(COMPONENTS - 1);
            }
            Some(ReleaseTag(format!("{}{}", prefix, next.join("."))))
        })
        .collect()
}
