use http::HeaderMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// A single value, or every value of a key that occurred more than once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlatValue<V> {
    One(V),
    Many(Vec<V>),
}

impl<V> FlatValue<V> {
    /// All values carried by this entry, in their original order
    pub fn values(&self) -> &[V] {
        match self {
            FlatValue::One(value) => std::slice::from_ref(value),
            FlatValue::Many(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    /// The first value, which is what single-valued lookups (`?to=`, `?permanent=`) use
    pub fn first(&self) -> Option<&V> {
        self.values().first()
    }

    fn from_values(mut values: Vec<V>) -> Self {
        if values.len() == 1 {
            FlatValue::One(values.remove(0))
        } else {
            FlatValue::Many(values)
        }
    }
}

impl<V: Serialize> Serialize for FlatValue<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FlatValue::One(value) => value.serialize(serializer),
            FlatValue::Many(values) => values.serialize(serializer),
        }
    }
}

/// Multi-valued key/value collection reduced to one scalar or one array per key
///
/// Keys keep the order of their first occurrence, and serialize as a JSON
/// object in that order.
///
/// # Examples
///
/// ```
/// use echobin::echo::FlattenedMap;
///
/// let map = FlattenedMap::from_query(Some("a=1&b=2&a=3"));
/// assert_eq!(
///     serde_json::to_string(&map).unwrap(),
///     r#"{"a":["1","3"],"b":"2"}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedMap<V = String> {
    entries: Vec<(String, FlatValue<V>)>,
}

impl<V> Default for FlattenedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> FlattenedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups `(key, value)` pairs by key, keeping every value
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
    {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut grouped: Vec<(String, Vec<V>)> = Vec::new();

        for (key, value) in pairs {
            let key = key.into();
            match index.get(&key) {
                Some(&slot) => grouped[slot].1.push(value),
                None => {
                    index.insert(key.clone(), grouped.len());
                    grouped.push((key, vec![value]));
                }
            }
        }

        Self {
            entries: grouped
                .into_iter()
                .map(|(key, values)| (key, FlatValue::from_values(values)))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FlatValue<V>> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlatValue<V>)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FlattenedMap<String> {
    /// Flattens a URL query string. Empty values are kept.
    pub fn from_query(query: Option<&str>) -> Self {
        match query {
            Some(query) => Self::from_pairs(
                url::form_urlencoded::parse(query.as_bytes())
                    .map(|(key, value)| (key.into_owned(), value.into_owned())),
            ),
            None => Self::new(),
        }
    }

    /// Flattens request headers.
    ///
    /// A header whose first value is empty is left out entirely, unlike query
    /// parameters. Names come out lowercase.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut entries = Vec::with_capacity(headers.keys_len());

        for name in headers.keys() {
            let values: Vec<String> = headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect();

            if values.first().is_none_or(|first| first.is_empty()) {
                continue;
            }

            entries.push((name.as_str().to_string(), FlatValue::from_values(values)));
        }

        Self { entries }
    }
}

impl<V: Serialize> Serialize for FlattenedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_single_and_repeated_keys() {
        let map = FlattenedMap::from_pairs(vec![("a", "1"), ("b", "2"), ("a", "3")]);

        assert_eq!(map.get("a"), Some(&FlatValue::Many(vec!["1", "3"])));
        assert_eq!(map.get("b"), Some(&FlatValue::One("2")));
        assert_eq!(map.get("c"), None);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_first_value() {
        let map = FlattenedMap::from_query(Some("to=a&to=b&one=x"));
        assert_eq!(map.get("to").and_then(FlatValue::first).map(String::as_str), Some("a"));
        assert_eq!(map.get("one").and_then(FlatValue::first).map(String::as_str), Some("x"));
        assert_eq!(FlatValue::<String>::Many(Vec::new()).first(), None);
    }

    #[test]
    fn test_empty_input() {
        let map: FlattenedMap = FlattenedMap::from_query(None);
        assert!(map.is_empty());
        assert_eq!(serde_json::to_value(&map).unwrap(), json!({}));
    }

    #[test]
    fn test_query_keeps_empty_values() {
        let map = FlattenedMap::from_query(Some("empty=&name=hello%20world&flag"));
        assert_eq!(
            serde_json::to_value(&map).unwrap(),
            json!({"empty": "", "name": "hello world", "flag": ""})
        );
    }

    #[test]
    fn test_serializes_in_first_occurrence_order() {
        let map = FlattenedMap::from_query(Some("z=1&a=2&z=3"));
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"z":["1","3"],"a":"2"}"#);
    }

    #[test]
    fn test_headers_flatten_and_lowercase() {
        let mut headers = HeaderMap::new();
        headers.append("X-Custom", HeaderValue::from_static("one"));
        headers.append("Accept", HeaderValue::from_static("*/*"));
        headers.append("x-custom", HeaderValue::from_static("two"));

        let map = FlattenedMap::from_headers(&headers);
        assert_eq!(
            serde_json::to_value(&map).unwrap(),
            json!({"x-custom": ["one", "two"], "accept": "*/*"})
        );
    }

    #[test]
    fn test_headers_drop_empty_first_value() {
        // Query parameters keep empty values, headers do not.
        let mut headers = HeaderMap::new();
        headers.append("x-empty", HeaderValue::from_static(""));
        headers.append("x-present", HeaderValue::from_static("yes"));

        let map = FlattenedMap::from_headers(&headers);
        assert!(map.get("x-empty").is_none());
        assert_eq!(map.get("x-present"), Some(&FlatValue::One("yes".to_string())));
    }
}
