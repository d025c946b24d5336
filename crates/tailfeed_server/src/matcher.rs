//! Resource resolution, validation and namespace matching.

use crate::config::FeedConfig;
use crate::error::{FeedError, FeedResult};
use crate::registry::ResourceRegistry;

/// Resolves the resources a request subscribes to.
///
/// A feed fixed to a single resource ignores the request's `resources`
/// parameter. Otherwise the parameter is split on `,`, skipping empty
/// segments.
pub fn requested_resources(feed: &FeedConfig, resources_param: Option<&str>) -> Vec<String> {
    if let Some(ref single) = feed.single_resource {
        return vec![single.clone()];
    }
    resources_param
        .map(|param| {
            param
                .split(',')
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Validates requested resources.
///
/// Every unknown name is collected and reported together. A feed fixed
/// to a single resource only knows that resource.
pub fn validate(
    feed: &FeedConfig,
    requested: &[String],
    registry: &dyn ResourceRegistry,
) -> FeedResult<()> {
    if requested.is_empty() {
        return Err(FeedError::NoResources);
    }

    let missing: Vec<String> = requested
        .iter()
        .filter(|name| match feed.single_resource {
            Some(ref single) => *name != single,
            None => !registry.contains(name),
        })
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(FeedError::MissingResources(missing))
    }
}

/// Matches log namespaces against a set of resource names.
///
/// A namespace `"{db}.{collection}"` matches when its collection equals
/// one of the resources, ignoring case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceFilter {
    resources: Vec<String>,
}

impl NamespaceFilter {
    /// Builds a filter over the given resources.
    pub fn new<S: AsRef<str>>(resources: &[S]) -> Self {
        Self {
            resources: resources
                .iter()
                .map(|name| name.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Returns the lower-cased resource names.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Returns true if `namespace` belongs to one of the resources.
    pub fn matches(&self, namespace: &str) -> bool {
        let Some((_, collection)) = namespace.split_once('.') else {
            return false;
        };
        let collection = collection.to_lowercase();
        self.resources.iter().any(|name| *name == collection)
    }
}
