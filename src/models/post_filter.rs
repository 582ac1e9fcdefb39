//! Post search filter
//!
//! Turns the query string of the search page into a set of ANDed
//! constraints over posts. Unknown parameters are ignored and blank values
//! count as absent. A value that cannot be parsed (a bad date, an unknown
//! post type) constrains nothing and is reported in `errors` so the form can
//! show it.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::{PostType, RecordRef};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Query parameters the search page understands, in form order
pub const FILTER_FIELDS: [&str; 7] = [
    "title",
    "content",
    "author",
    "category",
    "post_type",
    "created_after",
    "created_before",
];

/// A filter value that was ignored because it could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterError {
    pub field: String,
    pub message: String,
}

/// Parsed search filter
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostFilter {
    /// Case-insensitive substring of the title
    pub title: Option<String>,
    /// Case-insensitive substring of the content
    pub content: Option<String>,
    pub author: Option<RecordRef>,
    pub category: Option<RecordRef>,
    pub post_type: Option<PostType>,
    /// Inclusive lower day bound on the creation date
    pub created_after: Option<NaiveDate>,
    /// Inclusive upper day bound on the creation date
    pub created_before: Option<NaiveDate>,
    /// Raw non-blank values of the recognized parameters, for refilling the form
    pub values: BTreeMap<String, String>,
    pub errors: Vec<FilterError>,
}

impl PostFilter {
    /// Build a filter from query-string parameters
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let mut filter = Self::default();

        for field in FILTER_FIELDS {
            let Some(raw) = params.get(field).map(|v| v.trim()) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            filter.values.insert(field.to_string(), raw.to_string());

            match field {
                "title" => filter.title = Some(raw.to_string()),
                "content" => filter.content = Some(raw.to_string()),
                "author" => filter.author = RecordRef::parse(raw),
                "category" => filter.category = RecordRef::parse(raw),
                "post_type" => match PostType::from_str(raw) {
                    Some(post_type) => filter.post_type = Some(post_type),
                    None => filter.reject(field, format!("Unknown post type '{}'", raw)),
                },
                "created_after" | "created_before" => {
                    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
                        Ok(date) if field == "created_after" => filter.created_after = Some(date),
                        Ok(date) => filter.created_before = Some(date),
                        Err(_) => filter.reject(
                            field,
                            format!("'{}' is not a date in YYYY-MM-DD form", raw),
                        ),
                    }
                }
                _ => {}
            }
        }

        filter
    }

    fn reject(&mut self, field: &str, message: String) {
        self.errors.push(FilterError {
            field: field.to_string(),
            message,
        });
    }

    /// Whether any constraint is in effect
    pub fn is_active(&self) -> bool {
        self.title.is_some()
            || self.content.is_some()
            || self.author.is_some()
            || self.category.is_some()
            || self.post_type.is_some()
            || self.created_after.is_some()
            || self.created_before.is_some()
    }

    /// Encoded query string of the recognized values, without `page`.
    ///
    /// Used to keep the filter when following pagination links.
    pub fn query_string(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Lower bound on `created_at` (inclusive)
    pub fn created_from(&self) -> Option<DateTime<Utc>> {
        self.created_after.and_then(start_of_day)
    }

    /// Upper bound on `created_at` (exclusive): the start of the day after
    /// `created_before`
    pub fn created_until(&self) -> Option<DateTime<Utc>> {
        self.created_before
            .and_then(|d| d.succ_opt())
            .and_then(start_of_day)
    }
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Storage-level post query with author and category already resolved to ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostQuery {
    pub title_contains: Option<String>,
    pub content_contains: Option<String>,
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
    pub post_type: Option<PostType>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_until: Option<DateTime<Utc>>,
}

impl PostQuery {
    /// Query matching every post
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_title(mut self, needle: impl Into<String>) -> Self {
        self.title_contains = Some(needle.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_query_is_inactive() {
        let filter = PostFilter::from_query(&HashMap::new());
        assert!(!filter.is_active());
        assert!(filter.errors.is_empty());
        assert_eq!(filter.query_string(), "");
    }

    #[test]
    fn test_blank_and_unknown_params_ignored() {
        let filter = PostFilter::from_query(&params(&[
            ("title", "  "),
            ("page", "2"),
            ("sort", "asc"),
        ]));
        assert!(!filter.is_active());
        assert!(filter.values.is_empty());
    }

    #[test]
    fn test_all_fields_parsed() {
        let filter = PostFilter::from_query(&params(&[
            ("title", "Rust"),
            ("content", "async"),
            ("author", "alice"),
            ("category", "7"),
            ("post_type", "news"),
            ("created_after", "2024-01-01"),
            ("created_before", "2024-01-31"),
        ]));

        assert_eq!(filter.title.as_deref(), Some("Rust"));
        assert_eq!(filter.content.as_deref(), Some("async"));
        assert_eq!(filter.author, Some(RecordRef::Name("alice".into())));
        assert_eq!(filter.category, Some(RecordRef::Id(7)));
        assert_eq!(filter.post_type, Some(PostType::News));
        assert_eq!(filter.created_after, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(filter.created_before, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert!(filter.errors.is_empty());
    }

    #[test]
    fn test_malformed_values_recorded_not_applied() {
        let filter = PostFilter::from_query(&params(&[
            ("post_type", "poem"),
            ("created_after", "yesterday"),
            ("title", "Rust"),
        ]));

        assert!(filter.post_type.is_none());
        assert!(filter.created_after.is_none());
        assert_eq!(filter.title.as_deref(), Some("Rust"));
        let fields: Vec<_> = filter.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["post_type", "created_after"]);
    }

    #[test]
    fn test_day_bounds_are_inclusive() {
        let filter = PostFilter::from_query(&params(&[
            ("created_after", "2024-03-10"),
            ("created_before", "2024-03-10"),
        ]));

        let from = filter.created_from().unwrap();
        let until = filter.created_until().unwrap();
        assert_eq!(from.to_rfc3339(), "2024-03-10T00:00:00+00:00");
        assert_eq!(until.to_rfc3339(), "2024-03-11T00:00:00+00:00");
    }

    #[test]
    fn test_query_string_encodes_values() {
        let filter = PostFilter::from_query(&params(&[("title", "a b&c"), ("author", "bob")]));
        assert_eq!(filter.query_string(), "author=bob&title=a%20b%26c");
    }
}
