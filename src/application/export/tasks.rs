use std::sync::Arc;

use crate::domain::{ImageFormat, ViewCatalog, ViewCategory, ViewDefinition};

/// One view paired with its category, consumed exactly once by the pool.
#[derive(Debug, Clone)]
pub struct RenderTask {
    category: ViewCategory,
    view: Arc<ViewDefinition>,
}

impl RenderTask {
    pub fn new(view: Arc<ViewDefinition>) -> Self {
        Self {
            category: view.category(),
            view,
        }
    }

    pub fn category(&self) -> ViewCategory {
        self.category
    }

    pub fn view(&self) -> &Arc<ViewDefinition> {
        &self.view
    }

    pub fn view_key(&self) -> &str {
        self.view.key()
    }

    /// `{category}/{workspace}_{view}.{ext}`
    pub fn archive_path(&self, workspace_name: &str, format: ImageFormat) -> String {
        format!(
            "{}/{}_{}.{}",
            self.category.archive_label(),
            workspace_name,
            self.view.key(),
            format.extension()
        )
    }
}

/// Flatten a catalog into render tasks: categories in enumeration order, views
/// in their original order within each category.
pub fn flatten(catalog: &ViewCatalog) -> Vec<RenderTask> {
    catalog
        .iter()
        .flat_map(|(_, views)| views.iter().cloned().map(RenderTask::new))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(entries: &[(ViewCategory, &str)]) -> ViewCatalog {
        let mut catalog = ViewCatalog::new("Big Bank").expect("catalog");
        for (category, key) in entries {
            catalog
                .insert(ViewDefinition::new(*category, *key, "graph TD").expect("view"))
                .expect("insert");
        }
        catalog
    }

    #[test]
    fn empty_catalog_flattens_to_no_tasks() {
        assert!(flatten(&catalog(&[])).is_empty());
    }

    #[test]
    fn flattens_in_category_then_insertion_order() {
        let catalog = catalog(&[
            (ViewCategory::Dynamic, "SignIn"),
            (ViewCategory::Container, "Core"),
            (ViewCategory::SystemContext, "Context"),
            (ViewCategory::Container, "Api"),
        ]);

        let keys: Vec<_> = flatten(&catalog)
            .iter()
            .map(|task| (task.category(), task.view_key().to_string()))
            .collect();

        assert_eq!(
            keys,
            vec![
                (ViewCategory::SystemContext, "Context".to_string()),
                (ViewCategory::Container, "Core".to_string()),
                (ViewCategory::Container, "Api".to_string()),
                (ViewCategory::Dynamic, "SignIn".to_string()),
            ]
        );
    }

    #[test]
    fn archive_path_uses_category_label_workspace_and_extension() {
        let tasks = flatten(&catalog(&[(ViewCategory::Landscape, "Enterprise")]));
        assert_eq!(
            tasks[0].archive_path("Big Bank", ImageFormat::Png),
            "system_landscape_views/Big Bank_Enterprise.png"
        );
        assert_eq!(
            tasks[0].archive_path("Big Bank", ImageFormat::Svg),
            "system_landscape_views/Big Bank_Enterprise.svg"
        );
    }
}
