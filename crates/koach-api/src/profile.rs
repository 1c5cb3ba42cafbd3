//! Brand-profile snapshots and the newly-completed diff

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One fetch of a user's brand profile: field name to value, where a field
/// the backend knows about but has no value for yet comes back as null.
///
/// Snapshots are replaced wholesale on every fetch; the previous one is
/// only kept long enough to compute the diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileSnapshot(pub BTreeMap<String, Option<String>>);

impl ProfileSnapshot {
    /// Field names that transitioned absent/null in `previous` to present
    /// here. Value changes between two present values do not count; this
    /// feeds a one-time "new value saved" notification only.
    pub fn newly_completed(&self, previous: &ProfileSnapshot) -> BTreeSet<String> {
        self.0
            .iter()
            .filter(|(name, value)| {
                value.is_some() && previous.0.get(name.as_str()).is_none_or(Option::is_none)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Value of a field, if set
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field)?.as_deref()
    }

    /// Whether a field has a value
    pub fn is_complete(&self, field: &str) -> bool {
        self.get(field).is_some()
    }
}

impl FromIterator<(String, Option<String>)> for ProfileSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(fields: &[(&str, Option<&str>)]) -> ProfileSnapshot {
        fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.map(String::from)))
            .collect()
    }

    #[test]
    fn test_null_to_present_counts() {
        let previous = snapshot(&[("vision", None)]);
        let current = snapshot(&[("vision", Some("x"))]);
        let updated = current.newly_completed(&previous);
        assert_eq!(updated, BTreeSet::from(["vision".to_string()]));
    }

    #[test]
    fn test_absent_to_present_counts() {
        let previous = snapshot(&[]);
        let current = snapshot(&[("mission", Some("y"))]);
        assert_eq!(
            current.newly_completed(&previous),
            BTreeSet::from(["mission".to_string()])
        );
    }

    #[test]
    fn test_value_change_does_not_count() {
        let previous = snapshot(&[("vision", Some("x"))]);
        let current = snapshot(&[("vision", Some("y"))]);
        assert!(current.newly_completed(&previous).is_empty());
    }

    #[test]
    fn test_present_to_null_does_not_count() {
        let previous = snapshot(&[("vision", Some("x"))]);
        let current = snapshot(&[("vision", None)]);
        assert!(current.newly_completed(&previous).is_empty());
    }

    #[test]
    fn test_mixed_fields() {
        let previous = snapshot(&[("vision", None), ("mission", Some("m")), ("values", None)]);
        let current = snapshot(&[
            ("vision", Some("v")),
            ("mission", Some("changed")),
            ("values", None),
            ("voice", Some("warm")),
        ]);
        let updated = current.newly_completed(&previous);
        assert_eq!(
            updated,
            BTreeSet::from(["vision".to_string(), "voice".to_string()])
        );
    }

    #[test]
    fn test_deserializes_nullable_map() {
        let snapshot: ProfileSnapshot =
            serde_json::from_str(r#"{"vision":"x","mission":null}"#).unwrap();
        assert!(snapshot.is_complete("vision"));
        assert!(!snapshot.is_complete("mission"));
        assert!(!snapshot.is_complete("voice"));
    }
}
