//! Hierarchical address helpers.

/// Join a child name onto a group address.
pub fn join_address(parent: &str, name: &str) -> String {
    if parent.is_empty() || parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Parent group of an address; `/` for top-level objects.
pub fn parent_address(address: &str) -> &str {
    let trimmed = address.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/",
        Some(pos) => &trimmed[..pos],
    }
}

/// Last segment of an address (or of a file path).
pub fn basename(address: &str) -> &str {
    let trimmed = address.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Short name used to refer to an object in expressions.
///
/// Dots become underscores, and a trailing `value` segment takes its
/// parent's name (`/entry/sample/temp/value` -> `temp`).
pub fn address_name(address: &str) -> String {
    let cleaned = address.replace('.', "_");
    let name = basename(&cleaned);
    if name == "value" {
        let parent = basename(parent_address(&cleaned));
        if !parent.is_empty() {
            return parent.to_string();
        }
    }
    name.to_string()
}
