// src/utils.rs

/// Byte budget for a record stem, leaving room for a `_NNNN.json` suffix
/// under the common 255-byte file name limit
pub const MAX_STEM_BYTES: usize = 200;

/// Derive a filesystem-safe record stem from a posting's publish date and title.
/// Every non-alphanumeric character becomes `_`; the result is cut to
/// `MAX_STEM_BYTES` on a char boundary.
pub fn record_stem(published: &str, title: &str) -> String {
    let mut stem = String::new();
    for c in format!("{}_{}", published, title).chars() {
        let c = if c.is_alphanumeric() { c } else { '_' };
        if stem.len() + c.len_utf8() > MAX_STEM_BYTES {
            break;
        }
        stem.push(c);
    }
    stem
}

/// Drop the one-line header and trailer the model wraps around its payload
/// (e.g. a ```json fence). Payloads of two lines or fewer are returned as is.
pub fn strip_header_trailer(content: &str) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    if lines.len() > 2 {
        lines[1..lines.len() - 1].join("\n")
    } else {
        content.to_string()
    }
}

/// Collapse all runs of whitespace (including newlines) into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
