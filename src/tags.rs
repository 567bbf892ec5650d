use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("valid regex"));

/// Extract `#word` tokens from free text, in order of first appearance and
/// without duplicates. Tags keep their leading `#`.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    HASHTAG_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// Number of distinct tags two tag lists have in common.
pub fn shared_tag_count(a: &[String], b: &[String]) -> usize {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a.intersection(&b).count()
}

/// Normalize a tag to #tag format
pub fn normalize_tag(t: &str) -> String {
    let trimmed = t.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with('#') {
        trimmed.to_string()
    } else {
        format!("#{trimmed}")
    }
}

/// Hash a tag for deterministic color selection
pub fn hash_tag(tag: &str) -> u64 {
    let mut h: u64 = 5381;
    for b in tag.bytes() {
        h = (h.wrapping_shl(5)).wrapping_add(h) ^ u64::from(b);
    }
    h
}

pub fn color_for_tag(tag: &str) -> (u8, u8, u8) {
    const PALETTE: &[(u8, u8, u8)] = &[
        (137, 180, 250),
        (166, 227, 161),
        (249, 226, 175),
        (245, 194, 231),
        (148, 226, 213),
        (198, 160, 246),
        (181, 232, 224),
        (183, 189, 248),
        (255, 214, 165),
        (186, 225, 255),
        (214, 182, 255),
        (204, 246, 221),
    ];
    PALETTE[(hash_tag(tag) as usize) % PALETTE.len()]
}
