//! Manual conflict resolutions chosen by the user.
//!
//! The [`ManualResolutions`] registry maps a path to the outcome the user
//! picked for it. Only explicit user actions write to it; classification only
//! ever borrows it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Outcome the user picked for one conflicted path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ManualResolution {
    /// Keep our side of the conflict.
    Ours,
    /// Take their side of the conflict.
    Theirs,
    /// The user edited the markers out and marked the file as resolved.
    MarkersRemoved,
    /// Marked resolved without choosing a side.
    None,
}

impl ManualResolution {
    /// Parse the short names accepted on the command line.
    pub fn from_str_val(s: &str) -> Option<Self> {
        match s {
            "ours" | "us" => Some(Self::Ours),
            "theirs" | "them" => Some(Self::Theirs),
            "markers_removed" | "edited" => Some(Self::MarkersRemoved),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

impl std::fmt::Display for ManualResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ours => write!(f, "ours"),
            Self::Theirs => write!(f, "theirs"),
            Self::MarkersRemoved => write!(f, "markers_removed"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Registry of manual resolutions for one conflict session, keyed by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualResolutions {
    entries: HashMap<String, ManualResolution>,
}

impl ManualResolutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the resolution for `path`, returning the
    /// previous choice if there was one.
    pub fn set(
        &mut self,
        path: impl Into<String>,
        resolution: ManualResolution,
    ) -> Option<ManualResolution> {
        let path = path.into();
        debug!(path = %path, %resolution, "recording manual resolution");
        self.entries.insert(path, resolution)
    }

    /// Forget the resolution for `path`.
    pub fn remove(&mut self, path: &str) -> Option<ManualResolution> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<ManualResolution> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ManualResolution)> {
        self.entries.iter().map(|(p, r)| (p.as_str(), *r))
    }
}

impl FromIterator<(String, ManualResolution)> for ManualResolutions {
    fn from_iter<T: IntoIterator<Item = (String, ManualResolution)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites_previous_choice() {
        let mut registry = ManualResolutions::new();
        assert_eq!(registry.set("a.rs", ManualResolution::Ours), None);
        assert_eq!(
            registry.set("a.rs", ManualResolution::Theirs),
            Some(ManualResolution::Ours)
        );
        assert_eq!(registry.get("a.rs"), Some(ManualResolution::Theirs));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut registry = ManualResolutions::new();
        registry.set("a.rs", ManualResolution::Ours);
        registry.set("b.rs", ManualResolution::None);
        assert_eq!(registry.remove("a.rs"), Some(ManualResolution::Ours));
        assert!(!registry.contains("a.rs"));
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!(
            ManualResolution::from_str_val("ours"),
            Some(ManualResolution::Ours)
        );
        assert_eq!(
            ManualResolution::from_str_val("them"),
            Some(ManualResolution::Theirs)
        );
        assert_eq!(ManualResolution::from_str_val("mine"), None);
        assert_eq!(ManualResolution::MarkersRemoved.to_string(), "markers_removed");
    }
}
