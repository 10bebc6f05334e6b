//! Namespace Map
//!
//! Translates between short names (`cm:name`) and fully qualified names
//! (`{http://www.alfresco.org/model/content/1.0}name`). Session operations
//! resolve every property, aspect, type and association name through this map
//! before touching node state, so callers may use either form.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

const STANDARD_NAMESPACES: &[(&str, &str)] = &[
    ("sys", "http://www.alfresco.org/model/system/1.0"),
    ("cm", "http://www.alfresco.org/model/content/1.0"),
    ("app", "http://www.alfresco.org/model/application/1.0"),
    ("d", "http://www.alfresco.org/model/dictionary/1.0"),
    ("usr", "http://www.alfresco.org/model/user/1.0"),
    ("ver", "http://www.alfresco.org/model/versionstore/1.0"),
    ("act", "http://www.alfresco.org/model/action/1.0"),
    ("rule", "http://www.alfresco.org/model/rule/1.0"),
    ("wf", "http://www.alfresco.org/model/workflow/1.0"),
    ("wcm", "http://www.alfresco.org/model/wcmmodel/1.0"),
    ("wca", "http://www.alfresco.org/model/wcmappmodel/1.0"),
];

fn full_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\{([^}]+)\}(.+)$").expect("static regex is valid"))
}

fn short_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z][A-Za-z0-9_-]*):([^:{}/]+)$").expect("static regex is valid")
    })
}

/// Prefix ↔ namespace URI lookup
#[derive(Debug, Clone)]
pub struct NamespaceMap {
    by_prefix: HashMap<String, String>,
    by_uri: HashMap<String, String>,
}

impl Default for NamespaceMap {
    fn default() -> Self {
        let mut map = Self::empty();
        for (prefix, uri) in STANDARD_NAMESPACES {
            map.register(*prefix, *uri);
        }
        map
    }
}

impl NamespaceMap {
    /// Map preloaded with the standard repository prefixes
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            by_prefix: HashMap::new(),
            by_uri: HashMap::new(),
        }
    }

    /// Add or replace a prefix
    pub fn register(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        let prefix = prefix.into();
        let uri = uri.into();
        if let Some(previous) = self.by_prefix.insert(prefix.clone(), uri.clone()) {
            self.by_uri.remove(&previous);
        }
        self.by_uri.insert(uri, prefix);
    }

    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.by_prefix.get(prefix).map(String::as_str)
    }

    pub fn is_short_name(&self, name: &str) -> bool {
        short_name_pattern()
            .captures(name)
            .map(|caps| self.by_prefix.contains_key(&caps[1]))
            .unwrap_or(false)
    }

    /// `cm:name` → `{uri}name`; qualified or unknown names pass through
    pub fn get_full_name(&self, name: &str) -> String {
        match short_name_pattern().captures(name) {
            Some(caps) => match self.by_prefix.get(&caps[1]) {
                Some(uri) => format!("{{{}}}{}", uri, &caps[2]),
                None => name.to_string(),
            },
            None => name.to_string(),
        }
    }

    /// `{uri}name` → `cm:name`; short or unknown names pass through
    pub fn get_short_name(&self, name: &str) -> String {
        match full_name_pattern().captures(name) {
            Some(caps) => match self.by_uri.get(&caps[1]) {
                Some(prefix) => format!("{}:{}", prefix, &caps[2]),
                None => name.to_string(),
            },
            None => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        let map = NamespaceMap::new();
        assert_eq!(
            map.get_full_name("cm:name"),
            "{http://www.alfresco.org/model/content/1.0}name"
        );
        assert_eq!(
            map.get_full_name("sys:node-uuid"),
            "{http://www.alfresco.org/model/system/1.0}node-uuid"
        );
    }

    #[test]
    fn test_passthrough() {
        let map = NamespaceMap::new();
        let full = "{http://www.alfresco.org/model/content/1.0}title";
        assert_eq!(map.get_full_name(full), full);
        assert_eq!(map.get_full_name("zz:unknown"), "zz:unknown");
        assert_eq!(map.get_full_name("plain"), "plain");
        assert_eq!(map.get_short_name("cm:title"), "cm:title");
    }

    #[test]
    fn test_short_name() {
        let map = NamespaceMap::new();
        assert_eq!(
            map.get_short_name("{http://www.alfresco.org/model/content/1.0}title"),
            "cm:title"
        );
        assert_eq!(map.get_short_name("{urn:unknown}x"), "{urn:unknown}x");
    }

    #[test]
    fn test_register_custom_prefix() {
        let mut map = NamespaceMap::new();
        map.register("my", "http://example.com/model/my/1.0");
        assert!(map.is_short_name("my:thing"));
        assert_eq!(map.get_full_name("my:thing"), "{http://example.com/model/my/1.0}thing");
        assert_eq!(map.get_short_name("{http://example.com/model/my/1.0}thing"), "my:thing");
    }

    #[test]
    fn test_reregister_replaces_reverse_entry() {
        let mut map = NamespaceMap::empty();
        map.register("a", "urn:one");
        map.register("a", "urn:two");
        assert_eq!(map.get_short_name("{urn:one}x"), "{urn:one}x");
        assert_eq!(map.get_short_name("{urn:two}x"), "a:x");
    }
}
