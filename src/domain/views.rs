//! Categorised view definitions extracted from an architecture workspace.

use std::{collections::BTreeMap, fmt, sync::Arc};

use super::error::DomainError;

/// View categories in enumeration order. Exports visit categories in this
/// order, and `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViewCategory {
    SystemContext,
    Container,
    Component,
    Deployment,
    Landscape,
    Dynamic,
}

impl ViewCategory {
    pub const ALL: [ViewCategory; 6] = [
        ViewCategory::SystemContext,
        ViewCategory::Container,
        ViewCategory::Component,
        ViewCategory::Deployment,
        ViewCategory::Landscape,
        ViewCategory::Dynamic,
    ];

    /// Directory name used for this category inside export archives.
    pub fn archive_label(self) -> &'static str {
        match self {
            ViewCategory::SystemContext => "system_context_views",
            ViewCategory::Container => "container_views",
            ViewCategory::Component => "component_views",
            ViewCategory::Deployment => "deployment_views",
            ViewCategory::Landscape => "system_landscape_views",
            ViewCategory::Dynamic => "dynamic_views",
        }
    }
}

impl fmt::Display for ViewCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.archive_label())
    }
}

/// One renderable diagram. `definition` is opaque to the pipeline and only
/// interpreted by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDefinition {
    category: ViewCategory,
    key: String,
    definition: String,
}

impl ViewDefinition {
    pub fn new(
        category: ViewCategory,
        key: impl Into<String>,
        definition: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let key = key.into();
        let definition = definition.into();

        validate_path_component("view key", &key)?;
        if definition.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "view `{key}` in `{category}` has an empty definition"
            )));
        }

        Ok(Self {
            category,
            key,
            definition,
        })
    }

    pub fn category(&self) -> ViewCategory {
        self.category
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }
}

/// All views of one workspace, grouped by category in insertion order.
///
/// Views are shared behind `Arc` so render tasks can hold them without
/// copying definitions; they are never mutated once inserted.
#[derive(Debug, Clone)]
pub struct ViewCatalog {
    workspace_name: String,
    views: BTreeMap<ViewCategory, Vec<Arc<ViewDefinition>>>,
}

impl ViewCatalog {
    pub fn new(workspace_name: impl Into<String>) -> Result<Self, DomainError> {
        let workspace_name = workspace_name.into().trim().to_string();
        validate_path_component("workspace name", &workspace_name)?;
        Ok(Self {
            workspace_name,
            views: BTreeMap::new(),
        })
    }

    /// Append a view to its category. Keys must be unique per category so
    /// archive paths never collide.
    pub fn insert(&mut self, view: ViewDefinition) -> Result<(), DomainError> {
        let bucket = self.views.entry(view.category()).or_default();
        if bucket.iter().any(|existing| existing.key() == view.key()) {
            return Err(DomainError::validation(format!(
                "duplicate view key `{}` in `{}`",
                view.key(),
                view.category()
            )));
        }
        bucket.push(Arc::new(view));
        Ok(())
    }

    pub fn workspace_name(&self) -> &str {
        &self.workspace_name
    }

    pub fn views(&self, category: ViewCategory) -> &[Arc<ViewDefinition>] {
        self.views.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate categories in enumeration order, including empty ones.
    pub fn iter(&self) -> impl Iterator<Item = (ViewCategory, &[Arc<ViewDefinition>])> {
        ViewCategory::ALL
            .into_iter()
            .map(|category| (category, self.views(category)))
    }

    pub fn len(&self) -> usize {
        self.views.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate_path_component(what: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{what} must not be empty")));
    }
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(DomainError::validation(format!(
            "{what} `{value}` must not contain path separators"
        )));
    }
    Ok(())
}
