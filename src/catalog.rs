use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::WorkflowError;

/// One scored competency from the assessment catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub category: String,
    pub name: String,
    pub description: String,
}

/// The fixed item catalog. Loaded once at startup and immutable afterwards;
/// item names are the stable half of every per-item column name, so the
/// catalog must never change while cases are in flight.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    items: Vec<Item>,
}

impl Catalog {
    /// Items must have unique, non-empty names.
    pub fn new(items: Vec<Item>) -> Result<Self, WorkflowError> {
        if items.is_empty() {
            return Err(WorkflowError::Validation(
                "catalog must contain at least one item".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for item in &items {
            let name = item.name.trim();
            if name.is_empty() {
                return Err(WorkflowError::Validation(
                    "catalog item with empty name".to_string(),
                ));
            }
            if !seen.insert(name.to_string()) {
                return Err(WorkflowError::Validation(format!(
                    "duplicate catalog item '{name}'"
                )));
            }
        }
        Ok(Self { items })
    }

    /// The built-in twelve-item catalog.
    pub fn builtin() -> Self {
        let items = vec![
            item(
                "professional-skill",
                "chairside-assist",
                "Prepares instruments reliably; no major lapses during treatment.",
            ),
            item(
                "professional-skill",
                "front-desk",
                "Completes scheduling and clerical work accurately.",
            ),
            item(
                "core-conduct",
                "treatment-support",
                "Keeps treatment flowing; steps in without being asked.",
            ),
            item(
                "core-conduct",
                "patient-communication",
                "Communicates clearly with a professional, friendly manner.",
            ),
            item(
                "core-conduct",
                "attendance",
                "Observes rostering and leave rules.",
            ),
            item(
                "core-conduct",
                "training-participation",
                "Engages actively in training sessions.",
            ),
            item(
                "core-conduct",
                "peer-support",
                "Helps colleagues and offers support proactively.",
            ),
            item(
                "core-conduct",
                "mentoring",
                "Respects senior staff and guides newcomers.",
            ),
            item(
                "admin-competency",
                "crisis-handling",
                "Handles incidents promptly and heads off recurrences.",
            ),
            item(
                "admin-competency",
                "routine-admin",
                "Completes maintenance, supplies, and records work dependably.",
            ),
            item(
                "admin-competency",
                "advanced-admin",
                "Understands delegated tasks and finishes them efficiently.",
            ),
            item(
                "admin-competency",
                "adaptability",
                "Responds flexibly to ad-hoc demands.",
            ),
        ];
        Self::new(items).expect("built-in catalog is valid")
    }

    pub fn from_toml_str(content: &str) -> Result<Self, WorkflowError> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| WorkflowError::Validation(format!("invalid catalog file: {e}")))?;
        Self::new(file.items)
    }

    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, WorkflowError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            WorkflowError::Validation(format!(
                "cannot read catalog file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|item| item.name == name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn item(category: &str, name: &str, description: &str) -> Item {
    Item {
        category: category.to_string(),
        name: name.to_string(),
        description: description.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_unique_names() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.len(), 12);
        let mut names: Vec<_> = catalog.items().iter().map(|i| i.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 12);
    }

    #[test]
    fn duplicate_names_rejected() {
        let items = vec![
            item("a", "speed", "how fast"),
            item("b", "speed", "how fast again"),
        ];
        assert!(matches!(
            Catalog::new(items),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn empty_catalog_rejected() {
        assert!(Catalog::new(Vec::new()).is_err());
    }

    #[test]
    fn loads_from_toml() {
        let content = r#"
            [[items]]
            category = "skills"
            name = "accuracy"
            description = "Gets it right."

            [[items]]
            category = "conduct"
            name = "punctuality"
            description = "Shows up on time."
        "#;
        let catalog = Catalog::from_toml_str(content).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("accuracy"));
        assert!(!catalog.contains("speed"));
    }
}
