//! Static target tables.

use super::PlatformPattern;

/// Every `(os, arch, arm)` target the builder can cross-compile
pub const SUPPORTED: &[(&str, &str, &str)] = &[
    ("android", "arm", "7"),
    ("darwin", "386", ""),
    ("darwin", "amd64", ""),
    ("darwin", "arm", "7"),
    ("darwin", "arm64", ""),
    ("dragonfly", "amd64", ""),
    ("freebsd", "386", ""),
    ("freebsd", "amd64", ""),
    ("freebsd", "arm", "5"),
    ("freebsd", "arm", "6"),
    ("freebsd", "arm", "7"),
    ("linux", "386", ""),
    ("linux", "amd64", ""),
    ("linux", "arm", "5"),
    ("linux", "arm", "6"),
    ("linux", "arm", "7"),
    ("linux", "arm64", ""),
    ("linux", "mips", ""),
    ("linux", "mipsle", ""),
    ("linux", "mips64", ""),
    ("linux", "mips64le", ""),
    ("linux", "ppc64", ""),
    ("linux", "ppc64le", ""),
    ("linux", "s390x", ""),
    ("nacl", "amd64p32", ""),
    ("netbsd", "386", ""),
    ("netbsd", "amd64", ""),
    ("netbsd", "arm", "5"),
    ("netbsd", "arm", "6"),
    ("netbsd", "arm", "7"),
    ("openbsd", "386", ""),
    ("openbsd", "amd64", ""),
    ("openbsd", "arm", "5"),
    ("openbsd", "arm", "6"),
    ("openbsd", "arm", "7"),
    ("plan9", "386", ""),
    ("plan9", "amd64", ""),
    ("solaris", "amd64", ""),
    ("windows", "386", ""),
    ("windows", "amd64", ""),
];

/// Targets the builder lists but cannot produce a release for
pub const UNSUPPORTED: &[PlatformPattern<'static>] = &[
    PlatformPattern::os("android"),
    PlatformPattern::os("nacl"),
    PlatformPattern::os("plan9"),
    PlatformPattern::os_arch("darwin", "arm"),
];

/// Low-demand, CPU-expensive targets skipped for releases
pub const DEFAULT_EXCLUSIONS: &[PlatformPattern<'static>] = &[
    PlatformPattern::os("dragonfly"),
    PlatformPattern::os("solaris"),
    PlatformPattern::os("netbsd"),
    PlatformPattern::arm("5"),
    PlatformPattern::arm("6"),
    PlatformPattern::os_arch("darwin", "386"),
    PlatformPattern::os_arch("darwin", "arm64"),
    PlatformPattern::arch("mips64"),
    PlatformPattern::arch("mips64le"),
    PlatformPattern::arch("ppc64"),
    PlatformPattern::arch("ppc64le"),
    PlatformPattern::os_arch("openbsd", "386"),
    PlatformPattern::os_arch("openbsd", "arm"),
    PlatformPattern::os_arch("freebsd", "386"),
    PlatformPattern::os_arch("freebsd", "arm"),
];
