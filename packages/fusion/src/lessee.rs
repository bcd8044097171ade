//! Lessee extraction from formatted `activity_info` blocks.

use std::sync::LazyLock;

use regex::Regex;

/// Lease status values (lowercase) that count as an active lease.
pub const ACTIVE_LEASE_STATUSES: &[&str] = &[
    "active",
    "y",
    "20 years term",
    "20 + 20 term",
    "a",
    "ab",
    "ac",
    "apd",
    "c",
    "continuous",
    "drl",
    "issued",
    "la",
    "new",
    "p",
    "producing",
    "pr",
    "identified gravel pit",
    "moderate potential for sand and gravel resources",
];

const BLOCK_PREFIX: &str = "layer_index:";

static LEASE_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)lease_status:[ \t]*(.*?)(?:[ \t]+lessee:|$)").unwrap_or_else(|_| unreachable!())
});

static LESSEE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\blessee:[ \t]*([^\n]*)").unwrap_or_else(|_| unreachable!())
});

/// Active lessees named in an `activity_info` field.
///
/// The field holds one block per matched activity, each starting with
/// `layer_index:`. Lessees of blocks whose lease status is active are split
/// on `;`, upper-cased and joined with `"; "`.
#[must_use]
pub fn parse_lessee(activity_info: &str) -> String {
    let mut lessees: Vec<String> = Vec::new();

    for block in info_blocks(activity_info.trim()) {
        let (Some(status), Some(lessee)) = (LEASE_STATUS.captures(&block), LESSEE.captures(&block))
        else {
            continue;
        };
        let status = status.get(1).map_or("", |m| m.as_str()).trim().to_lowercase();
        if !ACTIVE_LEASE_STATUSES.contains(&status.as_str()) {
            continue;
        }

        let lessee = lessee.get(1).map_or("", |m| m.as_str());
        lessees.extend(
            lessee
                .split(';')
                .map(str::trim)
                .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case("none"))
                .map(str::to_uppercase),
        );
    }

    lessees.join("; ")
}

/// Joins a primary and a secondary info field, trimming both.
#[must_use]
pub fn concatenate_activity_info(primary: &str, secondary: &str) -> String {
    match (primary.trim(), secondary.trim()) {
        ("", "") => String::new(),
        (only, "") | ("", only) => only.to_string(),
        (first, second) => format!("{first}\n{second}"),
    }
}

fn info_blocks(text: &str) -> Vec<String> {
    let mut blocks: Vec<String> = Vec::new();

    for line in text.split('\n') {
        match blocks.last_mut() {
            Some(current) if !line.starts_with(BLOCK_PREFIX) => {
                current.push('\n');
                current.push_str(line);
            }
            _ => blocks.push(line.to_string()),
        }
    }

    blocks
}
