//! Certificates displaced by a rebind

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Deduplicated set of certificate names displaced by a rotation
///
/// Never holds the name of the certificate being rotated in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupersededCertificates {
    names: BTreeSet<String>,
}

impl SupersededCertificates {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `previous` as displaced by `new_name`
    ///
    /// Returns `false` (and records nothing) when `previous` is `new_name`
    /// or is already present.
    pub fn record(&mut self, previous: &str, new_name: &str) -> bool {
        if previous == new_name {
            return false;
        }
        self.names.insert(previous.to_owned())
    }

    /// Whether `name` was recorded
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of distinct names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// No name recorded
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in lexical order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Names in lexical order, owned
    pub fn to_vec(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_previous_certificate_is_recorded_once() {
        let mut set = SupersededCertificates::new();
        assert!(set.record("old-1", "new-1"));
        assert!(!set.record("old-1", "new-1"));
        assert!(!set.record("old-1", "new-1"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn new_certificate_is_never_recorded() {
        let mut set = SupersededCertificates::new();
        assert!(!set.record("new-1", "new-1"));
        assert!(set.is_empty());
        assert!(!set.contains("new-1"));
    }

    #[test]
    fn iterates_in_lexical_order() {
        let mut set = SupersededCertificates::new();
        set.record("old-2", "new");
        set.record("old-1", "new");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["old-1", "old-2"]);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["old-1","old-2"]"#);
    }
}
