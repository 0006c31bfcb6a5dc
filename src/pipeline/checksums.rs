//! The `SHA256SUMS` release asset.
//!
//! One `<hex>  <asset name>` line per platform archive, sorted by name, in the
//! format `sha256sum -c` reads.

use crate::state::AssetRecord;
use std::collections::HashMap;

/// Asset listing the SHA-256 of every uploaded archive
pub const CHECKSUMS_ASSET: &str = "SHA256SUMS";

/// Render the list for `assets`
pub(crate) fn render<'a>(assets: impl IntoIterator<Item = &'a AssetRecord>) -> String {
    let mut lines: Vec<String> = assets.into_iter().map(AssetRecord::checksum_line).collect();
    lines.sort_by(|a, b| line_name(a).cmp(line_name(b)));
    lines.iter().map(|line| format!("{}\n", line)).collect()
}

/// Asset name to hash, from a published list. Malformed lines are skipped.
pub(crate) fn parse(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .filter_map(|line| {
            let (sha256, name) = line.split_once("  ")?;
            let sha256 = sha256.trim();
            let name = name.trim().trim_start_matches('*');
            let is_hex = sha256.len() == 64 && sha256.chars().all(|c| c.is_ascii_hexdigit());
            (is_hex && !name.is_empty()).then(|| (name.to_string(), sha256.to_ascii_lowercase()))
        })
        .collect()
}

fn line_name(line: &str) -> &str {
    line.split_once("  ").map_or(line, |(_, name)| name)
}
