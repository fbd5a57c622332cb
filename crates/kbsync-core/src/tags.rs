//! Tag extraction from markdown content.
//!
//! Tags come from two places, unioned into one set:
//!
//! 1. A YAML front-matter block delimited by `---` lines at the very start
//!    of the content. Its `tags` key may be a single string or a list.
//! 2. Inline `#tag` markers anywhere in the content, including inside the
//!    front matter. Tags may contain Unicode letters, digits, `_`, `-`
//!    and `/` (so `#project/ai` stays `project/ai`).
//!
//! A front-matter block that is not valid YAML is ignored; inline markers
//! are still collected.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_yaml::Value;

const FRONT_MATTER_DELIMITER: &str = "---";

fn inline_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"#([\p{L}\p{M}\p{N}_/\-]+)").expect("valid tag pattern"))
}

/// Extract the deduplicated tag set of `content`.
///
/// ```rust
/// use kbsync_core::tags::extract_tags;
///
/// let tags = extract_tags("---\ntags: [x, y]\n---\nbody #z");
/// assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["x", "y", "z"]);
/// ```
pub fn extract_tags(content: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();

    if let Some(block) = front_matter(content) {
        front_matter_tags(block, &mut tags);
    }

    for cap in inline_tag_pattern().captures_iter(content) {
        tags.insert(cap[1].to_string());
    }

    tags
}

/// Return the raw front-matter block, without its delimiter lines.
fn front_matter(content: &str) -> Option<&str> {
    let rest = content.strip_prefix(FRONT_MATTER_DELIMITER)?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == FRONT_MATTER_DELIMITER {
            return Some(&rest[..offset]);
        }
        offset += line.len();
    }
    None
}

fn front_matter_tags(block: &str, tags: &mut BTreeSet<String>) {
    let value: Value = match serde_yaml::from_str(block) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed front matter");
            return;
        }
    };

    match value.get("tags") {
        Some(Value::Sequence(items)) => {
            for item in items {
                if let Some(tag) = scalar_tag(item) {
                    tags.insert(tag);
                }
            }
        }
        Some(other) => {
            if let Some(tag) = scalar_tag(other) {
                tags.insert(tag);
            }
        }
        None => {}
    }
}

fn scalar_tag(value: &Value) -> Option<String> {
    let tag = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}
