//! Task catalog generation.
//!
//! A catalog is built from an ordered category table. Tasks are laid out by
//! category in declaration order, then by sequence number, so the same table
//! always produces the same catalog.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use taskloop_core::{CategoryName, CategorySpec, Task};
use tracing::{debug, info};

use crate::error::ConfigurationError;

/// Category table plus the total it must add up to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Declared catalog size.
    pub total: u32,

    /// Categories in generation order.
    pub categories: Vec<CategorySpec>,
}

impl CatalogConfig {
    /// Create a config whose total is the sum of the category counts.
    ///
    /// A sum beyond `u32::MAX` saturates, which [`CatalogConfig::validate`]
    /// then rejects as a count mismatch.
    pub fn from_categories(categories: Vec<CategorySpec>) -> Self {
        let sum: u64 = categories.iter().map(|c| u64::from(c.count)).sum();
        let total = u32::try_from(sum).unwrap_or(u32::MAX);
        Self { total, categories }
    }

    /// Parse a catalog table from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a catalog table from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Check the table without generating tasks.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.categories.is_empty() {
            return Err(ConfigurationError::NoCategories);
        }

        let mut seen = HashSet::new();
        for spec in &self.categories {
            let name = spec.name.as_str();
            if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
                return Err(ConfigurationError::InvalidCategoryName(name.to_string()));
            }
            if !seen.insert(name) {
                return Err(ConfigurationError::DuplicateCategory(name.to_string()));
            }
        }

        let actual: u64 = self.categories.iter().map(|c| u64::from(c.count)).sum();
        if actual != u64::from(self.total) {
            return Err(ConfigurationError::CountMismatch {
                declared: self.total,
                actual,
            });
        }
        Ok(())
    }
}

/// The ordered task list for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    categories: Vec<CategorySpec>,
    tasks: Vec<Task>,
}

impl Catalog {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn categories(&self) -> &[CategorySpec] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of generated tasks per category, in declaration order.
    pub fn category_counts(&self) -> Vec<(CategoryName, usize)> {
        self.categories
            .iter()
            .map(|spec| {
                let count = self
                    .tasks
                    .iter()
                    .filter(|t| t.category == spec.name)
                    .count();
                (spec.name.clone(), count)
            })
            .collect()
    }

    /// Tasks in the order workers dequeue them: priority rank, then catalog
    /// number.
    pub fn queue_order(&self) -> Vec<&Task> {
        let mut ordered: Vec<&Task> = self.tasks.iter().collect();
        ordered.sort_by_key(|t| (t.priority.rank(), t.number));
        ordered
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}

/// Generate the catalog described by `config`.
pub fn generate(config: &CatalogConfig) -> Result<Catalog, ConfigurationError> {
    config.validate()?;

    let mut tasks = Vec::with_capacity(config.total as usize);
    let mut number = 1;
    for spec in &config.categories {
        for sequence in 1..=spec.count {
            tasks.push(Task::new(number, spec, sequence));
            number += 1;
        }
        debug!(
            category = %spec.name,
            count = spec.count,
            priority = %spec.priority,
            "Generated category tasks"
        );
    }

    info!(
        tasks = tasks.len(),
        categories = config.categories.len(),
        "Generated task catalog"
    );

    Ok(Catalog {
        categories: config.categories.clone(),
        tasks,
    })
}
