//! Naming conversions between Go, protobuf and generated identifiers.

use heck::{ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Go field name to protobuf field name: `IntList` becomes `int_list`.
pub fn to_lower_snake_case(s: &str) -> String {
    s.to_snake_case()
}

/// Go constant name to protobuf enum value casing.
pub fn to_upper_snake_case(s: &str) -> String {
    s.to_shouty_snake_case()
}

/// Inverse of [`to_lower_snake_case`] for names it produced. Used to
/// decide whether the generated Go code needs a custom-name option.
pub fn to_camel_case(s: &str) -> String {
    s.to_upper_camel_case()
}

/// Derive a protobuf package name from a Go import path.
///
/// Separators (`/` and `.`) map to `.`, combining marks are stripped
/// after NFD decomposition, every other non-alphanumeric rune (hyphens
/// included) is dropped, and the result is lowercased.
pub fn to_protobuf_pkg(path: &str) -> String {
    path.nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter_map(|c| {
            if c == '/' || c == '.' {
                Some('.')
            } else if c.is_alphanumeric() {
                Some(c)
            } else {
                None
            }
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Service name for a protobuf package name: the last segment,
/// UpperCamelCased, suffixed `Service`.
pub fn service_name(proto_pkg: &str) -> String {
    let last = proto_pkg.rsplit('.').next().unwrap_or(proto_pkg);
    format!("{}Service", to_camel_case(last))
}
