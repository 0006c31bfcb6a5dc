//! Target platform matrix for release builds.
//!
//! The matrix is the static set of targets the builder knows about, minus an
//! exclusion list. Exclusions are patterns: empty fields match anything, so
//! `{ os: "netbsd" }` drops every NetBSD target and `{ arm: "5" }` drops every
//! ARMv5 target.

mod matrix;

pub use matrix::{DEFAULT_EXCLUSIONS, SUPPORTED, UNSUPPORTED};

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single build target
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system (`linux`, `darwin`, `windows`, ...)
    pub os: String,
    /// CPU architecture (`amd64`, `arm`, `arm64`, ...)
    pub arch: String,
    /// ARM variant (`5`, `6`, `7`), empty for non-ARM targets
    #[serde(default)]
    pub arm: String,
}

impl Platform {
    /// Create a platform
    pub fn new(os: &str, arch: &str, arm: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
            arm: arm.to_string(),
        }
    }

    /// Archive extension the builder produces for this target
    pub fn archive_extension(&self) -> &'static str {
        match self.os.as_str() {
            "windows" | "darwin" => "zip",
            _ => "tar.gz",
        }
    }

    /// Platform-qualified asset name, unique within a release
    pub fn artifact_name(&self, product: &str, tag: &str) -> String {
        let arch = if self.arm.is_empty() {
            self.arch.clone()
        } else {
            format!("{}{}", self.arch, self.arm)
        };
        format!(
            "{}_{}_{}_{}.{}",
            product,
            tag,
            self.os,
            arch,
            self.archive_extension()
        )
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arm.is_empty() {
            write!(f, "{}/{}", self.os, self.arch)
        } else {
            write!(f, "{}/{}{}", self.os, self.arch, self.arm)
        }
    }
}

/// Exclusion pattern. Empty fields are wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlatformPattern<'a> {
    /// OS to match, empty for any
    pub os: &'a str,
    /// Architecture to match, empty for any
    pub arch: &'a str,
    /// ARM variant to match, empty for any
    pub arm: &'a str,
}

impl<'a> PlatformPattern<'a> {
    /// Pattern matching one OS
    pub const fn os(os: &'a str) -> Self {
        Self { os, arch: "", arm: "" }
    }

    /// Pattern matching one architecture on any OS
    pub const fn arch(arch: &'a str) -> Self {
        Self { os: "", arch, arm: "" }
    }

    /// Pattern matching one ARM variant on any OS
    pub const fn arm(arm: &'a str) -> Self {
        Self { os: "", arch: "", arm }
    }

    /// Pattern matching one OS/architecture pair
    pub const fn os_arch(os: &'a str, arch: &'a str) -> Self {
        Self { os, arch, arm: "" }
    }

    /// Parse `os/arch/arm`; any segment may be empty or omitted
    pub fn parse(raw: &'a str) -> Result<Self> {
        let mut parts = raw.trim().split('/');
        let pattern = Self {
            os: parts.next().unwrap_or("").trim(),
            arch: parts.next().unwrap_or("").trim(),
            arm: parts.next().unwrap_or("").trim(),
        };
        if parts.next().is_some() || pattern.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "RELEASE_SKIP_PLATFORMS",
                reason: format!("'{}' is not an os/arch/arm pattern", raw),
            }
            .into());
        }
        Ok(pattern)
    }

    /// True when every field is a wildcard
    pub fn is_empty(&self) -> bool {
        self.os.is_empty() && self.arch.is_empty() && self.arm.is_empty()
    }

    /// Whether this pattern selects the platform
    pub fn matches(&self, platform: &Platform) -> bool {
        (self.os.is_empty() || self.os == platform.os)
            && (self.arch.is_empty() || self.arch == platform.arch)
            && (self.arm.is_empty() || self.arm == platform.arm)
    }
}

/// The full target matrix with an exclusion list applied
#[derive(Debug, Clone)]
pub struct PlatformMatrix {
    all: Vec<Platform>,
    excluded: Vec<(String, String, String)>,
}

impl PlatformMatrix {
    /// Matrix over the built-in supported targets
    pub fn supported() -> Self {
        Self::from_platforms(
            SUPPORTED
                .iter()
                .map(|(os, arch, arm)| Platform::new(os, arch, arm))
                .collect(),
        )
    }

    /// Matrix over an explicit target list
    pub fn from_platforms(all: Vec<Platform>) -> Self {
        Self {
            all,
            excluded: Vec::new(),
        }
    }

    /// Add exclusion patterns
    pub fn exclude<'a>(mut self, patterns: impl IntoIterator<Item = PlatformPattern<'a>>) -> Self {
        self.excluded.extend(
            patterns
                .into_iter()
                .map(|p| (p.os.to_string(), p.arch.to_string(), p.arm.to_string())),
        );
        self
    }

    /// Size of the unfiltered matrix
    pub fn total(&self) -> usize {
        self.all.len()
    }

    /// Platforms left after exclusions, in matrix order
    pub fn platforms(&self) -> Vec<Platform> {
        self.all
            .iter()
            .filter(|platform| {
                !self.excluded.iter().any(|(os, arch, arm)| {
                    PlatformPattern {
                        os: os.as_str(),
                        arch: arch.as_str(),
                        arm: arm.as_str(),
                    }
                    .matches(platform)
                })
            })
            .cloned()
            .collect()
    }
}

/// Supported targets minus the built-in and extra exclusions
pub fn release_platforms(extra_exclusions: &[String]) -> Result<Vec<Platform>> {
    let extra = extra_exclusions
        .iter()
        .map(|raw| PlatformPattern::parse(raw))
        .collect::<Result<Vec<_>>>()?;

    Ok(PlatformMatrix::supported()
        .exclude(UNSUPPORTED.iter().copied())
        .exclude(DEFAULT_EXCLUSIONS.iter().copied())
        .exclude(extra)
        .platforms())
}
