//! Struct tag parsing for the `proteus` key.

/// Extract the comma-separated values of a `proteus:"..."` struct tag.
/// Returns an empty vector when the tag is absent.
pub fn find_proteus_tags(tag: &str) -> Vec<String> {
    let Some(start) = tag.find("proteus:\"") else {
        return Vec::new();
    };
    let rest = &tag[start + "proteus:\"".len()..];
    let Some(end) = rest.find('"') else {
        return Vec::new();
    };

    rest[..end]
        .split(',')
        .map(|t| t.trim().to_string())
        .collect()
}

/// Whether the tag values mark the field as excluded.
pub fn is_ignored(tags: &[String]) -> bool {
    tags.first().is_some_and(|t| t == "-")
}
