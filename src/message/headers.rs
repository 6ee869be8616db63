//! Ordered, case-insensitive header list.

use http::header::{HeaderMap, HeaderName, HeaderValue};

/// Header list that keeps insertion order and allows repeated names.
///
/// Lookups compare names ASCII case-insensitively; stored names keep the
/// casing they were inserted with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every value for `name` with a single value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// All values for `name`, in insertion order.
    pub fn get_all<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a str> + 'n
    where
        'a: 'n,
    {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove every value for `name`. Returns true if anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Convert to a `HeaderMap`, skipping entries that are not valid HTTP.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.append(name, value);
                }
                _ => tracing::debug!(header = %name, "Dropping invalid header"),
            }
        }
        map
    }
}

/// Values with non-UTF-8 (obs-text) bytes are decoded lossily, and repeated
/// names come out grouped under their first occurrence, as `HeaderMap`
/// iterates them, rather than in wire order.
impl From<&HeaderMap> for Headers {
    fn from(map: &HeaderMap) -> Self {
        let entries = map
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Self { entries }
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.append("Content-Type", "text/plain");

        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert!(!headers.contains("content-length"));
    }

    #[test]
    fn repeated_names_keep_order() {
        let headers: Headers = [
            ("Accept", "text/html"),
            ("Host", "example.com"),
            ("accept", "application/json"),
        ]
        .into_iter()
        .collect();

        let accept: Vec<_> = headers.get_all("Accept").collect();
        assert_eq!(accept, vec!["text/html", "application/json"]);

        let names: Vec<_> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Accept", "Host", "accept"]);
    }

    #[test]
    fn insert_replaces_all_values() {
        let mut headers = Headers::new();
        headers.append("X-Trace", "a");
        headers.append("x-trace", "b");
        headers.insert("X-TRACE", "c");

        assert_eq!(headers.get_all("x-trace").collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn header_map_conversion_skips_invalid() {
        let mut headers = Headers::new();
        headers.append("x-ok", "1");
        headers.append("bad name", "2");

        let map = headers.to_header_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("x-ok").unwrap(), "1");
    }

    #[test]
    fn from_header_map_groups_names_and_decodes_lossily() {
        let mut map = HeaderMap::new();
        map.append("x-a", HeaderValue::from_static("1"));
        map.append("x-b", HeaderValue::from_static("2"));
        map.append("x-a", HeaderValue::from_static("3"));
        map.append("x-raw", HeaderValue::from_bytes(b"caf\xe9").unwrap());

        let headers = Headers::from(&map);
        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(
            pairs,
            vec![("x-a", "1"), ("x-a", "3"), ("x-b", "2"), ("x-raw", "caf\u{fffd}")]
        );
    }
}
