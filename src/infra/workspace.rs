//! JSON workspace documents.
//!
//! ```json
//! {"name": "Big Bank",
//!  "views": {"systemContextViews": [{"key": "Context", "definition": "..."}]}}
//! ```
//!
//! The name may also live in a `{"workspace": {"name": ...}}` envelope. Missing
//! category arrays are treated as empty.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    application::catalog::{CatalogError, CatalogExtractor},
    domain::{ViewCatalog, ViewCategory, ViewDefinition},
};

/// `(category, key inside "views", path used in error messages)`
const CATEGORY_FIELDS: [(ViewCategory, &str, &str); 6] = [
    (
        ViewCategory::SystemContext,
        "systemContextViews",
        "views.systemContextViews",
    ),
    (
        ViewCategory::Container,
        "containerViews",
        "views.containerViews",
    ),
    (
        ViewCategory::Component,
        "componentViews",
        "views.componentViews",
    ),
    (
        ViewCategory::Deployment,
        "deploymentViews",
        "views.deploymentViews",
    ),
    (
        ViewCategory::Landscape,
        "systemLandscapeViews",
        "views.systemLandscapeViews",
    ),
    (ViewCategory::Dynamic, "dynamicViews", "views.dynamicViews"),
];

#[derive(Debug, Deserialize)]
struct RawView {
    key: String,
    definition: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonWorkspaceExtractor;

impl JsonWorkspaceExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl CatalogExtractor for JsonWorkspaceExtractor {
    fn extract(&self, document: &str) -> Result<ViewCatalog, CatalogError> {
        if document.trim().is_empty() {
            return Err(CatalogError::Empty);
        }

        let root: Value =
            serde_json::from_str(document).map_err(|err| CatalogError::malformed(err.to_string()))?;
        let root = root.as_object().ok_or(CatalogError::WrongType {
            field: "document",
            expected: "an object",
        })?;

        let mut catalog = ViewCatalog::new(workspace_name(root)?)?;

        let views = match root.get("views") {
            Some(Value::Object(views)) => views,
            Some(_) => {
                return Err(CatalogError::WrongType {
                    field: "views",
                    expected: "an object",
                });
            }
            None => return Err(CatalogError::MissingField { field: "views" }),
        };

        for (category, key, path) in CATEGORY_FIELDS {
            let entries = match views.get(key) {
                None | Some(Value::Null) => continue,
                Some(Value::Array(entries)) => entries,
                Some(_) => {
                    return Err(CatalogError::WrongType {
                        field: path,
                        expected: "an array",
                    });
                }
            };

            for (index, entry) in entries.iter().enumerate() {
                let raw = RawView::deserialize(entry)
                    .map_err(|err| CatalogError::malformed(format!("{path}[{index}]: {err}")))?;
                catalog.insert(ViewDefinition::new(category, raw.key, raw.definition)?)?;
            }
        }

        Ok(catalog)
    }
}

fn workspace_name(root: &Map<String, Value>) -> Result<&str, CatalogError> {
    let name = match root.get("name") {
        Some(name) => Some(name),
        None => match root.get("workspace") {
            Some(Value::Object(workspace)) => workspace.get("name"),
            Some(_) => {
                return Err(CatalogError::WrongType {
                    field: "workspace",
                    expected: "an object",
                });
            }
            None => None,
        },
    };

    match name {
        Some(Value::String(name)) => Ok(name.as_str()),
        Some(_) => Err(CatalogError::WrongType {
            field: "name",
            expected: "a string",
        }),
        None => Err(CatalogError::MissingField { field: "name" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(document: &str) -> Result<ViewCatalog, CatalogError> {
        JsonWorkspaceExtractor::new().extract(document)
    }

    #[test]
    fn extracts_views_in_category_order() {
        let catalog = extract(
            r#"{
                "name": "Big Bank",
                "views": {
                    "dynamicViews": [{"key": "SignIn", "definition": "sequenceDiagram"}],
                    "systemContextViews": [
                        {"key": "Context", "definition": "graph TD"},
                        {"key": "Enterprise", "definition": "graph LR"}
                    ],
                    "componentViews": []
                }
            }"#,
        )
        .expect("catalog");

        assert_eq!(catalog.workspace_name(), "Big Bank");
        assert_eq!(catalog.len(), 3);
        let keys: Vec<_> = catalog
            .views(ViewCategory::SystemContext)
            .iter()
            .map(|view| view.key())
            .collect();
        assert_eq!(keys, ["Context", "Enterprise"]);
        assert_eq!(
            catalog.views(ViewCategory::Dynamic)[0].definition(),
            "sequenceDiagram"
        );
        assert!(catalog.views(ViewCategory::Deployment).is_empty());
    }

    #[test]
    fn accepts_workspace_envelope() {
        let catalog =
            extract(r#"{"workspace": {"name": "Envelope"}, "views": {}}"#).expect("catalog");
        assert_eq!(catalog.workspace_name(), "Envelope");
        assert!(catalog.is_empty());
    }

    #[test]
    fn rejects_views_given_as_array() {
        let err = extract(r#"{"workspace":{"name":"Invalid"},"views":[]}"#)
            .expect_err("views must be an object");
        assert!(matches!(
            err,
            CatalogError::WrongType {
                field: "views",
                ..
            }
        ));
    }

    #[test]
    fn rejects_blank_and_malformed_documents() {
        assert!(matches!(extract("  \n"), Err(CatalogError::Empty)));
        assert!(matches!(extract("{not json"), Err(CatalogError::Malformed { .. })));
        assert!(matches!(
            extract("[]"),
            Err(CatalogError::WrongType {
                field: "document",
                ..
            })
        ));
    }

    #[test]
    fn rejects_missing_or_blank_name() {
        assert!(matches!(
            extract(r#"{"views": {}}"#),
            Err(CatalogError::MissingField { field: "name" })
        ));
        assert!(matches!(
            extract(r#"{"name": 7, "views": {}}"#),
            Err(CatalogError::WrongType { field: "name", .. })
        ));
        assert!(matches!(
            extract(r#"{"name": "   ", "views": {}}"#),
            Err(CatalogError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_missing_views() {
        assert!(matches!(
            extract(r#"{"name": "Bank"}"#),
            Err(CatalogError::MissingField { field: "views" })
        ));
    }

    #[test]
    fn rejects_category_that_is_not_an_array() {
        let err = extract(r#"{"name": "Bank", "views": {"containerViews": {}}}"#)
            .expect_err("category must be an array");
        insta::assert_snapshot!(
            err.to_string(),
            @"workspace document field `views.containerViews` must be an array"
        );
    }

    #[test]
    fn rejects_malformed_view_entries() {
        let err = extract(r#"{"name": "Bank", "views": {"containerViews": [{"key": "Api"}]}}"#)
            .expect_err("definition is required");
        insta::assert_snapshot!(
            err.to_string(),
            @"workspace document is malformed: views.containerViews[0]: missing field `definition`"
        );
    }

    #[test]
    fn rejects_duplicate_and_unsafe_keys() {
        let duplicate = extract(
            r#"{"name": "Bank", "views": {"containerViews": [
                {"key": "Api", "definition": "graph TD"},
                {"key": "Api", "definition": "graph LR"}
            ]}}"#,
        )
        .expect_err("duplicate key");
        insta::assert_snapshot!(
            duplicate.to_string(),
            @"domain validation failed: duplicate view key `Api` in `container_views`"
        );

        assert!(matches!(
            extract(
                r#"{"name": "Bank", "views": {"containerViews": [{"key": "a/b", "definition": "x"}]}}"#
            ),
            Err(CatalogError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_blank_definitions() {
        assert!(matches!(
            extract(r#"{"name": "Bank", "views": {"dynamicViews": [{"key": "Flow", "definition": " "}]}}"#),
            Err(CatalogError::Invalid(_))
        ));
    }

    #[test]
    fn same_key_in_different_categories_is_allowed() {
        let catalog = extract(
            r#"{"name": "Bank", "views": {
                "containerViews": [{"key": "Core", "definition": "graph TD"}],
                "componentViews": [{"key": "Core", "definition": "graph TD"}]
            }}"#,
        )
        .expect("catalog");
        assert_eq!(catalog.len(), 2);
    }
}
