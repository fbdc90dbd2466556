//! Reference-counted inventory of windows by class and by instance,
//! concurrently written by the window-event subscriber and read by the
//! composer's `exists` queries.

use std::collections::HashMap;
use std::sync::RwLock;

use regex::Regex;
use tracing::warn;

/// Counts of currently-open windows keyed by WM_CLASS class and instance.
///
/// A key is present iff its count is positive; a removal with no matching
/// prior appearance is a no-op. Both maps are single-key-update only, so a
/// plain `RwLock<HashMap>` gives the required concurrent read/write safety.
#[derive(Debug, Default)]
pub struct WindowCounts {
    classes: RwLock<HashMap<String, u64>>,
    instances: RwLock<HashMap<String, u64>>,
}

impl WindowCounts {
    pub fn new() -> Self {
        WindowCounts::default()
    }

    /// Records one window opening.
    pub fn appeared(&self, class: &str, instance: &str) {
        increment(&self.classes, class);
        increment(&self.instances, instance);
    }

    /// Records one window closing. Keys drop out when their count reaches
    /// zero; unknown keys are ignored.
    pub fn removed(&self, class: &str, instance: &str) {
        decrement(&self.classes, class);
        decrement(&self.instances, instance);
    }

    /// Whether any tracked window matches the given patterns.
    ///
    /// Both patterns given: both must independently match at least one
    /// tracked key. One pattern given: that one decides. Neither: false.
    /// A pattern that fails to compile is logged and treated as no match.
    pub fn exists(&self, class_pattern: &str, instance_pattern: &str) -> bool {
        match (class_pattern.is_empty(), instance_pattern.is_empty()) {
            (false, false) => {
                matches_any(&self.classes, class_pattern)
                    && matches_any(&self.instances, instance_pattern)
            }
            (false, true) => matches_any(&self.classes, class_pattern),
            (true, false) => matches_any(&self.instances, instance_pattern),
            (true, true) => false,
        }
    }

    /// Drops every tracked key; used before a full re-enumeration so a
    /// reconnect cannot double-count surviving windows.
    pub fn clear(&self) {
        if let Ok(mut map) = self.classes.write() {
            map.clear();
        }
        if let Ok(mut map) = self.instances.write() {
            map.clear();
        }
    }

    /// Current count for a class key; absent means zero.
    pub fn class_count(&self, class: &str) -> u64 {
        self.classes
            .read()
            .map(|map| map.get(class).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Current count for an instance key; absent means zero.
    pub fn instance_count(&self, instance: &str) -> u64 {
        self.instances
            .read()
            .map(|map| map.get(instance).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

fn increment(map: &RwLock<HashMap<String, u64>>, key: &str) {
    if key.is_empty() {
        return;
    }
    if let Ok(mut map) = map.write() {
        *map.entry(key.to_string()).or_insert(0) += 1;
    }
}

fn decrement(map: &RwLock<HashMap<String, u64>>, key: &str) {
    if key.is_empty() {
        return;
    }
    if let Ok(mut map) = map.write() {
        if let Some(count) = map.get_mut(key) {
            if *count > 1 {
                *count -= 1;
            } else {
                map.remove(key);
            }
        }
    }
}

fn matches_any(map: &RwLock<HashMap<String, u64>>, pattern: &str) -> bool {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => {
            warn!(event = "window_pattern_invalid", pattern, error = %err);
            return false;
        }
    };
    map.read()
        .map(|map| map.keys().any(|key| re.is_match(key)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_track_appear_and_remove() {
        let counts = WindowCounts::new();
        counts.appeared("Firefox", "Navigator");
        counts.appeared("Firefox", "Navigator");
        assert_eq!(counts.class_count("Firefox"), 2);

        counts.removed("Firefox", "Navigator");
        assert_eq!(counts.class_count("Firefox"), 1);
        counts.removed("Firefox", "Navigator");
        assert_eq!(counts.class_count("Firefox"), 0);
        assert_eq!(counts.instance_count("Navigator"), 0);
    }

    #[test]
    fn remove_without_appear_is_a_noop() {
        let counts = WindowCounts::new();
        counts.removed("Ghost", "ghost");
        assert_eq!(counts.class_count("Ghost"), 0);
        // And the count can never go negative afterwards either.
        counts.appeared("Ghost", "ghost");
        counts.removed("Ghost", "ghost");
        counts.removed("Ghost", "ghost");
        assert_eq!(counts.class_count("Ghost"), 0);
    }

    #[test]
    fn exists_with_both_patterns_requires_both_to_match() {
        let counts = WindowCounts::new();
        counts.appeared("Firefox", "Navigator");
        counts.appeared("URxvt", "scratchpad");

        assert!(counts.exists("^Fire", "^Nav"));
        // Patterns match independently, not necessarily on the same window.
        assert!(counts.exists("^Fire", "^scratch"));
        assert!(!counts.exists("^Fire", "^nosuch"));
        assert!(!counts.exists("^nosuch", "^Nav"));
    }

    #[test]
    fn exists_with_one_pattern_uses_only_that_side() {
        let counts = WindowCounts::new();
        counts.appeared("Firefox", "Navigator");
        assert!(counts.exists("^Fire", ""));
        assert!(counts.exists("", "Navi"));
        assert!(!counts.exists("", "^Fire")); // instance map has no Firefox key
        assert!(!counts.exists("", ""));
    }

    #[test]
    fn invalid_pattern_is_no_match_not_a_panic() {
        let counts = WindowCounts::new();
        counts.appeared("Firefox", "Navigator");
        assert!(!counts.exists("(unclosed", ""));
        assert!(!counts.exists("(unclosed", "Navigator"));
    }

    #[test]
    fn empty_keys_are_not_tracked() {
        let counts = WindowCounts::new();
        counts.appeared("", "");
        assert!(!counts.exists(".*", ""));
    }
}
