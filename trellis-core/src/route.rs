// Route records and path templates

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name used when a route declaration has none.
pub const DEFAULT_ROUTE_NAME: &str = "default";

/// One discovered mapping from a path template to a controller method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    /// Controller class identifier
    pub class: String,
    pub method: String,
    /// Parameter name to declared type, typed parameters only, in
    /// declaration order
    pub arguments: IndexMap<String, String>,
    /// Path template, e.g. `/users/{id}`
    pub path: String,
    pub name: String,
}

impl RouteRecord {
    /// Template segments, empty segments ignored.
    pub fn segments(&self) -> Vec<&str> {
        segments(&self.path)
    }

    /// Placeholder names in template order.
    pub fn placeholders(&self) -> Vec<&str> {
        self.segments()
            .into_iter()
            .filter_map(placeholder_name)
            .collect()
    }
}

/// Split a path on `/`, dropping empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Canonical form of a path: its segments under a single leading `/`.
///
/// Two templates that normalize equally match exactly the same requests.
pub fn normalize(path: &str) -> String {
    format!("/{}", segments(path).join("/"))
}

/// `{id}` yields `id`; literal segments yield nothing.
pub fn placeholder_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
}

/// Compare a template against a request path.
///
/// Returns the URL segments captured by placeholders, in order, or `None`
/// when the segment counts differ or a literal segment does not match.
pub fn match_template<'a>(template: &str, path: &'a str) -> Option<Vec<&'a str>> {
    let template = segments(template);
    let path = segments(path);

    if template.len() != path.len() {
        return None;
    }

    let mut captured = Vec::new();
    for (expected, actual) in template.iter().zip(path.iter()) {
        if placeholder_name(expected).is_some() {
            captured.push(*actual);
        } else if expected != actual {
            return None;
        }
    }

    Some(captured)
}

/// A route that matched a request, with its extracted parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub route: RouteRecord,
    /// Captured segments in template order
    pub values: Vec<String>,
    /// Captured segments by placeholder name
    pub params: HashMap<String, String>,
}

impl RouteMatch {
    pub fn new(route: RouteRecord, values: Vec<String>) -> Self {
        let params = route
            .placeholders()
            .into_iter()
            .map(str::to_string)
            .zip(values.iter().cloned())
            .collect();
        Self {
            route,
            values,
            params,
        }
    }

    pub fn param(&self, name: &str) -> Option<&String> {
        self.params.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str) -> RouteRecord {
        RouteRecord {
            class: "app::UserController".into(),
            method: "show".into(),
            arguments: IndexMap::from([("id".to_string(), "int".to_string())]),
            path: path.into(),
            name: "users_show".into(),
        }
    }

    #[test]
    fn test_match_placeholder() {
        assert_eq!(match_template("/users/{id}", "/users/123"), Some(vec!["123"]));
    }

    #[test]
    fn test_match_segment_count_mismatch() {
        assert_eq!(match_template("/users/{id}", "/users/123/extra"), None);
        assert_eq!(match_template("/users/{id}", "/users"), None);
    }

    #[test]
    fn test_match_literal_mismatch() {
        assert_eq!(match_template("/users/{id}", "/orders/123"), None);
        assert_eq!(match_template("/users/{id}", "/Users/123"), None);
    }

    #[test]
    fn test_match_root_and_trailing_slash() {
        assert_eq!(match_template("/", "/"), Some(vec![]));
        assert_eq!(match_template("/users", "/users/"), Some(vec![]));
    }

    #[test]
    fn test_normalize_collapses_slashes() {
        assert_eq!(normalize("/users/{id}"), "/users/{id}");
        assert_eq!(normalize("/users//{id}/"), "/users/{id}");
        assert_eq!(normalize("users{id}"), "/users{id}");
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn test_placeholders_are_unconstrained() {
        assert_eq!(
            match_template("/users/{id}/posts/{post}", "/users/abc/posts/x-1"),
            Some(vec!["abc", "x-1"])
        );
    }

    #[test]
    fn test_route_match_names_params() {
        let m = RouteMatch::new(record("/users/{id}"), vec!["123".into()]);
        assert_eq!(m.param("id").map(String::as_str), Some("123"));
        assert_eq!(m.values, vec!["123"]);
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(record("/users/{id}")).unwrap();
        assert_eq!(json["arguments"]["id"], "int");
        assert_eq!(json["path"], "/users/{id}");
    }
}
