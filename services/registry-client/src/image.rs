//! Repositories with their tags, ordered for display.

use std::cmp::Ordering;

use serde::Serialize;

/// A repository and its tags.
///
/// Tags are kept in display order, see [`compare_tags`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    /// Repository name, e.g. `library/nginx`
    pub name: String,
    /// Tags, newest-looking first
    pub tags: Vec<String>,
}

impl Image {
    /// Create an image, sorting `tags` for display.
    pub fn new(name: impl Into<String>, mut tags: Vec<String>) -> Self {
        sort_tags(&mut tags);
        Self {
            name: name.into(),
            tags,
        }
    }
}

fn numeric(tag: &str) -> Option<f64> {
    tag.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Display order for tags.
///
/// Tags which are not numbers come first in descending lexicographic order
/// (so `latest` and `v2` lead), followed by numeric tags in descending
/// numeric order. Keeping the two groups apart makes this a total order.
pub fn compare_tags(a: &str, b: &str) -> Ordering {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| b.cmp(a)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => b.cmp(a),
    }
}

/// Sort tags into display order.
pub fn sort_tags(tags: &mut [String]) {
    tags.sort_by(|a, b| compare_tags(a, b));
}

#[cfg(test)]
mod test {
    use super::*;

    fn sorted(tags: &[&str]) -> Vec<String> {
        Image::new("app", tags.iter().map(|t| t.to_string()).collect()).tags
    }

    #[test]
    fn numeric_tags_descend_by_value() {
        assert_eq!(sorted(&["1", "10", "2", "1.5"]), ["10", "2", "1.5", "1"]);
    }

    #[test]
    fn other_tags_descend_lexicographically() {
        assert_eq!(sorted(&["alpha", "v1", "latest", "v2"]), ["v2", "v1", "latest", "alpha"]);
    }

    #[test]
    fn mixed_tags_group_words_before_numbers() {
        assert_eq!(sorted(&["1", "latest", "10", "1a", "9"]), ["latest", "1a", "10", "9", "1"]);
    }

    #[test]
    fn equal_values_fall_back_to_text() {
        assert_eq!(sorted(&["1.0", "1", "01"]), ["1.0", "1", "01"]);
    }

    #[test]
    fn nan_and_infinity_are_words() {
        assert_eq!(sorted(&["2", "NaN", "inf"]), ["inf", "NaN", "2"]);
    }
}
