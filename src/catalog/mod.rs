//! Application catalog
//!
//! Resolves application names to the image and command a session container runs.

use serde::{Deserialize, Serialize};

/// One launchable application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDefinition {
    /// Name used in mapping requests
    pub name: String,

    /// Human readable name
    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Container image
    pub image: String,

    /// Command the container starts with (image default when empty)
    #[serde(default)]
    pub command: Vec<String>,
}

/// Source of application definitions
pub trait AppCatalog: Send + Sync {
    fn lookup(&self, name: &str) -> Option<AppDefinition>;

    fn list(&self) -> Vec<AppDefinition>;
}

/// Catalog fixed at startup from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    apps: Vec<AppDefinition>,
}

impl StaticCatalog {
    pub fn new(apps: Vec<AppDefinition>) -> Self {
        Self { apps }
    }
}

impl AppCatalog for StaticCatalog {
    fn lookup(&self, name: &str) -> Option<AppDefinition> {
        self.apps.iter().find(|app| app.name == name).cloned()
    }

    fn list(&self) -> Vec<AppDefinition> {
        self.apps.clone()
    }
}
