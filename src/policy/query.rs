//! Raw query-string helpers.
//!
//! Parameters are decoded with `application/x-www-form-urlencoded` rules
//! for lookups. Rewrites only touch the segments of the parameter being
//! replaced; every other segment is kept byte for byte.

use url::form_urlencoded;

/// First value of `name` in `query`, decoded.
pub fn first_value(query: &str, name: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Replace every occurrence of `name` with a single `name=value` pair at the
/// position of the first occurrence, or append it when absent.
pub fn replace_param(query: &str, name: &str, value: &str) -> String {
    let encoded: String = form_urlencoded::Serializer::new(String::new())
        .append_pair(name, value)
        .finish();

    let mut segments: Vec<&str> = Vec::new();
    let mut replaced = false;
    for segment in query.split('&').filter(|s| !s.is_empty()) {
        if segment_key(segment).as_deref() == Some(name) {
            if !replaced {
                segments.push(&encoded);
                replaced = true;
            }
            continue;
        }
        segments.push(segment);
    }
    if !replaced {
        segments.push(&encoded);
    }
    segments.join("&")
}

fn segment_key(segment: &str) -> Option<String> {
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value() {
        assert_eq!(first_value("all=1&all=0", "all").as_deref(), Some("1"));
        assert_eq!(first_value("a=x%20y&b=+", "a").as_deref(), Some("x y"));
        assert_eq!(first_value("a=1", "b"), None);
        assert_eq!(first_value("", "a"), None);
        assert_eq!(first_value("all=", "all").as_deref(), Some(""));
    }

    #[test]
    fn test_replace_keeps_other_segments() {
        let query = "all=1&filters=%7B%7D&size=%74rue";
        assert_eq!(
            replace_param(query, "filters", r#"{"label":["a"]}"#),
            "all=1&filters=%7B%22label%22%3A%5B%22a%22%5D%7D&size=%74rue"
        );
    }

    #[test]
    fn test_replace_appends_when_missing() {
        assert_eq!(replace_param("", "filters", "{}"), "filters=%7B%7D");
        assert_eq!(replace_param("all=1", "filters", "{}"), "all=1&filters=%7B%7D");
    }

    #[test]
    fn test_replace_collapses_duplicates() {
        assert_eq!(replace_param("filters=a&x=1&filters=b", "filters", "c"), "filters=c&x=1");
    }
}
