use std::collections::BTreeMap;

use crate::element::Component;

/// Named segments bound by a match, e.g. `{"id": "42"}` for `/users/:id`.
pub type RouteParams = BTreeMap<String, String>;

/// Patterns that mark the not-found entry instead of matching paths.
pub const FALLBACK_PATTERNS: [&str; 2] = ["*", "/404"];

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Matches `path` against `pattern` segment by segment. `:name` segments bind
/// the path segment under `name`; every other segment must be equal. Paths
/// with a different segment count never match.
pub fn match_route(pattern: &str, path: &str) -> Option<RouteParams> {
    let expected: Vec<&str> = segments(pattern).collect();
    let actual: Vec<&str> = segments(path).collect();
    if expected.len() != actual.len() {
        return None;
    }

    let mut params = RouteParams::new();
    for (expected, actual) in expected.iter().zip(&actual) {
        match expected.strip_prefix(':') {
            Some(name) => {
                params.insert(name.to_string(), (*actual).to_string());
            }
            None if expected == actual => {}
            None => return None,
        }
    }
    Some(params)
}

/// One routing table entry.
#[derive(Debug, Clone)]
pub struct Route {
    pattern: String,
    component: Component,
}

impl Route {
    pub fn new(pattern: impl Into<String>, component: impl Into<Component>) -> Self {
        Self {
            pattern: pattern.into(),
            component: component.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn is_fallback(&self) -> bool {
        FALLBACK_PATTERNS.contains(&self.pattern.as_str())
    }
}

#[derive(Debug)]
pub enum RouteMatch<'a> {
    Matched { route: &'a Route, params: RouteParams },
    Fallback(&'a Route),
    NotFound,
}

/// First concrete route matching `path`, in table order. Fallback entries are
/// collected during the scan (the last one wins) and only used when nothing
/// concrete matched.
pub fn select_route<'a>(routes: &'a [Route], path: &str) -> RouteMatch<'a> {
    let mut fallback = None;
    for route in routes {
        if route.is_fallback() {
            fallback = Some(route);
            continue;
        }
        if let Some(params) = match_route(&route.pattern, path) {
            return RouteMatch::Matched { route, params };
        }
    }
    fallback.map_or(RouteMatch::NotFound, RouteMatch::Fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Child, Props};

    fn view(_: Props) -> Child {
        Child::Empty
    }

    fn params(pairs: &[(&str, &str)]) -> RouteParams {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn named_segments_bind_values() {
        assert_eq!(match_route("/users/:id", "/users/42"), Some(params(&[("id", "42")])));
        assert_eq!(
            match_route("/teams/:team/users/:id", "/teams/red/users/7"),
            Some(params(&[("team", "red"), ("id", "7")]))
        );
    }

    #[test]
    fn segment_count_mismatch_fails() {
        assert_eq!(match_route("/users/:id", "/users/42/extra"), None);
        assert_eq!(match_route("/users/:id", "/users"), None);
    }

    #[test]
    fn literal_routes_yield_empty_params() {
        assert_eq!(match_route("/a/b", "/a/b"), Some(RouteParams::new()));
        assert_eq!(match_route("/a/b", "/a/c"), None);
        assert_eq!(match_route("/", "/"), Some(RouteParams::new()));
    }

    #[test]
    fn empty_segments_are_ignored() {
        assert_eq!(match_route("/a/b/", "//a//b"), Some(RouteParams::new()));
    }

    #[test]
    fn duplicate_names_keep_last_value() {
        assert_eq!(match_route("/:x/:x", "/1/2"), Some(params(&[("x", "2")])));
    }

    #[test]
    fn fallback_is_collected_not_matched() {
        let routes = vec![
            Route::new("*", view),
            Route::new("/about", view),
            Route::new("/404", view),
        ];

        match select_route(&routes, "/about") {
            RouteMatch::Matched { route, params } => {
                assert_eq!(route.pattern(), "/about");
                assert!(params.is_empty());
            }
            other => panic!("expected match, got {other:?}"),
        }
        match select_route(&routes, "/missing") {
            RouteMatch::Fallback(route) => assert_eq!(route.pattern(), "/404"),
            other => panic!("expected fallback, got {other:?}"),
        }
        assert!(matches!(
            select_route(&routes[1..2], "/missing"),
            RouteMatch::NotFound
        ));
    }

    #[test]
    fn first_matching_route_wins() {
        let routes = vec![Route::new("/users/:id", view), Route::new("/users/me", view)];
        match select_route(&routes, "/users/me") {
            RouteMatch::Matched { route, params } => {
                assert_eq!(route.pattern(), "/users/:id");
                assert_eq!(params.get("id").map(String::as_str), Some("me"));
            }
            other => panic!("expected match, got {other:?}"),
        }
    }
}
