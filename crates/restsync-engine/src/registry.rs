//! Read-only, validated mapping from resource name to descriptor.

use std::collections::HashSet;

use restsync_types::resource::{ResourceDescriptor, WriteDisposition};

use crate::config::ConfigurationError;

/// Validated resource descriptors in declaration order.
///
/// Iteration order is the order resources were declared, which is the
/// order the orchestrator runs them in.
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    resources: Vec<ResourceDescriptor>,
}

impl ResourceRegistry {
    /// Validate `descriptors` and build the registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] listing every invalid descriptor and
    /// every duplicated name.
    pub fn new(descriptors: Vec<ResourceDescriptor>) -> Result<Self, ConfigurationError> {
        ConfigurationError::check(registry_problems(&descriptors))?;
        Ok(Self {
            resources: descriptors,
        })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|d| d.name.as_str() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl<'a> IntoIterator for &'a ResourceRegistry {
    type Item = &'a ResourceDescriptor;
    type IntoIter = std::slice::Iter<'a, ResourceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.iter()
    }
}

/// Problems across a whole descriptor set, including name collisions.
pub(crate) fn registry_problems(descriptors: &[ResourceDescriptor]) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();
    for desc in descriptors {
        if !desc.name.as_str().is_empty() && !seen.insert(desc.name.as_str()) {
            problems.push(format!("Duplicate resource name '{}'", desc.name));
        }
        problems.extend(descriptor_problems(desc));
    }
    problems
}

/// Problems with a single descriptor.
pub(crate) fn descriptor_problems(desc: &ResourceDescriptor) -> Vec<String> {
    let mut problems = Vec::new();
    let name = desc.name.as_str();

    if name.trim().is_empty() {
        problems.push("Resource has an empty name".to_string());
    }
    if desc.path.trim().is_empty() {
        problems.push(format!("Resource '{name}': path must not be empty"));
    }
    if desc.page_size == 0 {
        problems.push(format!("Resource '{name}': page_size must be greater than 0"));
    }
    if desc.primary_key.trim().is_empty() {
        if desc.write_disposition == WriteDisposition::Merge {
            problems.push(format!(
                "Resource '{name}': write_disposition 'merge' requires a primary_key"
            ));
        } else {
            problems.push(format!("Resource '{name}': primary_key must not be empty"));
        }
    }
    if desc.data_selector.trim().is_empty() {
        problems.push(format!("Resource '{name}': data_selector must not be empty"));
    }
    if desc.total_path.trim().is_empty() {
        problems.push(format!("Resource '{name}': total_path must not be empty"));
    }
    if desc.sort_field.trim().is_empty() {
        problems.push(format!("Resource '{name}': sort field must not be empty"));
    }
    if let Some(spec) = &desc.incremental {
        if spec.cursor_path.trim().is_empty() {
            problems.push(format!(
                "Resource '{name}': incremental cursor_path must not be empty"
            ));
        }
        if spec.initial_value.trim().is_empty() {
            problems.push(format!(
                "Resource '{name}': incremental initial_value must not be empty"
            ));
        }
        if desc.write_disposition == WriteDisposition::Replace {
            problems.push(format!(
                "Resource '{name}': write_disposition 'replace' cannot be incremental"
            ));
        }
    }
    problems
}
