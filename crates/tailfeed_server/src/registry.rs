//! Registry of known resource names.

use std::collections::BTreeSet;

/// Read-only view of the resources known to the surrounding application.
///
/// Injected at server construction; sessions only ever read it.
pub trait ResourceRegistry: Send + Sync {
    /// Returns true if `name` is a known resource.
    fn contains(&self, name: &str) -> bool;

    /// Returns all known resource names.
    fn names(&self) -> Vec<String>;
}

/// A fixed set of resource names.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    names: BTreeSet<String>,
}

impl StaticRegistry {
    /// Creates a registry from resource names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a comma-separated list, skipping blank entries.
    pub fn from_list(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty()),
        )
    }

    /// Returns the number of resources.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl ResourceRegistry for StaticRegistry {
    fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}
