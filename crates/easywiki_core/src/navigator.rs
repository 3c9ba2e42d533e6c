//! Key lookup over decoded API responses.
//!
//! Action API payloads nest the interesting value at a depth that varies by
//! module (`parse.wikitext`, `query.tokens.csrftoken`, `query.pages[0]...`).
//! These helpers search the whole tree for a key instead of hard-coding
//! each path.

use serde_json::Value;

/// Every value stored under `needle`, at any depth, in traversal order.
///
/// Objects are walked in document order. A matching value is collected
/// before its own children are searched. Arrays are descended into but
/// their indices never match as keys.
pub fn find_all<'a>(needle: &str, haystack: &'a Value) -> Vec<&'a Value> {
    let mut matches = Vec::new();
    collect(needle, haystack, &mut matches);
    matches
}

fn collect<'a>(needle: &str, node: &'a Value, matches: &mut Vec<&'a Value>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                if key == needle {
                    matches.push(value);
                }
                collect(needle, value, matches);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(needle, item, matches);
            }
        }
        _ => {}
    }
}

/// First value stored under `needle`, if any.
pub fn find_first<'a>(needle: &str, haystack: &'a Value) -> Option<&'a Value> {
    match haystack {
        Value::Object(map) => map.iter().find_map(|(key, value)| {
            if key == needle {
                Some(value)
            } else {
                find_first(needle, value)
            }
        }),
        Value::Array(items) => items.iter().find_map(|item| find_first(needle, item)),
        _ => None,
    }
}

/// Auto-unwrapping lookup used by the client's `needle` arguments.
///
/// - empty `needle`: the haystack itself, untouched
/// - no match: `None`
/// - one match: that value
/// - several: an array of all matches, in [`find_all`] order
pub fn find(needle: &str, haystack: &Value) -> Option<Value> {
    if needle.is_empty() {
        return Some(haystack.clone());
    }
    let mut matches = find_all(needle, haystack);
    match matches.len() {
        0 => None,
        1 => matches.pop().cloned(),
        _ => Some(Value::Array(matches.into_iter().cloned().collect())),
    }
}

/// First page object of a `query` response.
///
/// `formatversion=2` returns `pages` as an array; the legacy format keys it
/// by page id, so the first member of either shape is taken.
pub fn first_page(response: &Value) -> Option<&Value> {
    match find_first("pages", response)? {
        Value::Array(pages) => pages.first(),
        Value::Object(pages) => pages.values().next(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_needle_returns_root() {
        let root = json!({"a": 1, "b": [1, 2]});
        assert_eq!(find("", &root), Some(root.clone()));
        assert_eq!(find("", &json!("scalar")), Some(json!("scalar")));
    }

    #[test]
    fn missing_key_returns_none_even_inside_arrays() {
        let root = json!({"a": [{"b": 1}, {"c": [{"d": 2}]}], "e": "z"});
        assert_eq!(find("z", &root), None);
        assert!(find_all("z", &root).is_empty());
        assert_eq!(find_first("z", &root), None);
    }

    #[test]
    fn single_match_is_unwrapped() {
        let root = json!({"parse": {"title": "Sandbox", "wikitext": "hello"}});
        assert_eq!(find("wikitext", &root), Some(json!("hello")));
    }

    #[test]
    fn multiple_matches_are_flattened_in_traversal_order() {
        let root = json!({"a": 1, "b": {"a": 2, "c": [{"a": 3}]}});
        assert_eq!(find("a", &root), Some(json!([1, 2, 3])));
        assert_eq!(find_first("a", &root), Some(&json!(1)));
    }

    #[test]
    fn matched_container_is_also_searched() {
        let root = json!({"x": {"x": 5}});
        assert_eq!(find_all("x", &root), vec![&json!({"x": 5}), &json!(5)]);
    }

    #[test]
    fn numeric_keys_match_objects_but_not_array_indices() {
        let legacy = json!({"query": {"pages": {"0": {"title": "Zero"}}}});
        assert_eq!(find("0", &legacy), Some(json!({"title": "Zero"})));

        let modern = json!({"query": {"pages": [{"title": "Zero"}]}});
        assert_eq!(find("0", &modern), None);
    }

    #[test]
    fn document_order_is_preserved() {
        let root: Value = serde_json::from_str(r#"{"z": {"k": 1}, "a": {"k": 2}}"#)
            .expect("parse fixture");
        assert_eq!(find("k", &root), Some(json!([1, 2])));
    }

    #[test]
    fn first_page_handles_both_page_shapes() {
        let modern = json!({"query": {"pages": [{"pageid": 7}, {"pageid": 8}]}});
        assert_eq!(first_page(&modern), Some(&json!({"pageid": 7})));

        let legacy = json!({"query": {"pages": {"7": {"pageid": 7}}}});
        assert_eq!(first_page(&legacy), Some(&json!({"pageid": 7})));

        assert_eq!(first_page(&json!({"query": {}})), None);
    }
}
