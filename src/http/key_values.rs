//! Ordered list of key/value pairs, deduplicated by key.

use url::form_urlencoded::byte_serialize;

/// Ordered key/value pairs where setting an existing key replaces its value
/// in place. Used for query parameters and request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValues {
    entries: Vec<(String, String)>,
}

impl KeyValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value for `key`, keeping the original position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key_ignore_case(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a query string (`?k=v&k2=v2`) with form-escaped keys and values.
    /// An empty list yields an empty string.
    pub fn to_query_string(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        let pairs: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    byte_serialize(k.as_bytes()).collect::<String>(),
                    byte_serialize(v.as_bytes()).collect::<String>()
                )
            })
            .collect();
        format!("?{}", pairs.join("&"))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = KeyValues::new();
        for (k, v) in iter {
            values.set(k, v);
        }
        values
    }
}
