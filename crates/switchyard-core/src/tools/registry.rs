//! Tool catalog
//!
//! Holds the function declarations offered to the model, keyed by name.
//! Declarations come from the host or from a discovery command.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::discovery::discover_tools;
use crate::ai::types::ToolDeclaration;
use crate::error::Result;

/// Where a catalog entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSource {
    Registered,
    Discovered,
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    declaration: ToolDeclaration,
    source: ToolSource,
}

/// Catalog of tool declarations, cheap to clone and share
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Arc<RwLock<HashMap<String, CatalogEntry>>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration, replacing any existing one of the same name
    pub async fn register(&self, declaration: ToolDeclaration) {
        self.insert(declaration, ToolSource::Registered).await;
    }

    async fn insert(&self, declaration: ToolDeclaration, source: ToolSource) {
        let name = declaration.name.clone();
        let mut tools = self.tools.write().await;
        if tools.contains_key(&name) {
            warn!(tool = %name, "Overwriting tool declaration");
        }
        tools.insert(name, CatalogEntry { declaration, source });
    }

    pub async fn get(&self, name: &str) -> Option<ToolDeclaration> {
        let tools = self.tools.read().await;
        tools.get(name).map(|entry| entry.declaration.clone())
    }

    pub async fn source(&self, name: &str) -> Option<ToolSource> {
        let tools = self.tools.read().await;
        tools.get(name).map(|entry| entry.source)
    }

    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tools.read().await.is_empty()
    }

    /// Every declaration, sorted by name, ready for a request's `tools`
    pub async fn function_declarations(&self) -> Vec<ToolDeclaration> {
        let tools = self.tools.read().await;
        let mut declarations: Vec<ToolDeclaration> =
            tools.values().map(|entry| entry.declaration.clone()).collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }

    /// Replace previously discovered tools with the output of `command`
    ///
    /// On failure the catalog is left untouched. Returns the number of
    /// declarations discovered.
    pub async fn refresh_discovered(&self, command: &str) -> Result<usize> {
        let discovered = discover_tools(command).await?;

        let mut tools = self.tools.write().await;
        let stale: Vec<String> = tools
            .iter()
            .filter(|(_, entry)| entry.source == ToolSource::Discovered)
            .map(|(name, _)| name.clone())
            .collect();
        for name in stale {
            tools.remove(&name);
            debug!(tool = %name, "Removed previously discovered tool");
        }

        let count = discovered.len();
        for declaration in discovered {
            let name = declaration.name.clone();
            if tools.contains_key(&name) {
                warn!(tool = %name, "Discovered tool overwrites a registered declaration");
            }
            tools.insert(
                name,
                CatalogEntry {
                    declaration,
                    source: ToolSource::Discovered,
                },
            );
        }
        info!(count, total = tools.len(), "Tool catalog refreshed");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn declaration(name: &str, description: &str) -> ToolDeclaration {
        ToolDeclaration::new(name, description, json!({"type": "object", "properties": {}}))
    }

    fn discovery_command(output: &str) -> (tempfile::NamedTempFile, String) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(output.as_bytes()).unwrap();
        let command = format!("cat {}", shell_words::quote(&file.path().to_string_lossy()));
        (file, command)
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let catalog = ToolCatalog::new();
        assert!(catalog.is_empty().await);

        catalog.register(declaration("read_file", "Read a file")).await;
        let found = catalog.get("read_file").await.unwrap();
        assert_eq!(found.description, "Read a file");
        assert_eq!(catalog.source("read_file").await, Some(ToolSource::Registered));
        assert!(catalog.get("write_file").await.is_none());
    }

    #[tokio::test]
    async fn test_register_overwrites() {
        let catalog = ToolCatalog::new();
        catalog.register(declaration("shell", "v1")).await;
        catalog.register(declaration("shell", "v2")).await;
        assert_eq!(catalog.len().await, 1);
        assert_eq!(catalog.get("shell").await.unwrap().description, "v2");
    }

    #[tokio::test]
    async fn test_function_declarations_sorted() {
        let catalog = ToolCatalog::new();
        for name in ["write_file", "glob", "read_file"] {
            catalog.register(declaration(name, "")).await;
        }
        let names: Vec<String> = catalog
            .function_declarations()
            .await
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["glob", "read_file", "write_file"]);
    }

    #[tokio::test]
    async fn test_refresh_replaces_discovered_only() {
        let catalog = ToolCatalog::new();
        catalog.register(declaration("read_file", "builtin")).await;

        let (_first, command) = discovery_command(r#"[{"name": "deploy"}, {"name": "rollback"}]"#);
        assert_eq!(catalog.refresh_discovered(&command).await.unwrap(), 2);
        assert_eq!(catalog.len().await, 3);
        assert_eq!(catalog.source("deploy").await, Some(ToolSource::Discovered));

        let (_second, command) = discovery_command(r#"[{"function_declarations": [{"name": "deploy"}]}]"#);
        assert_eq!(catalog.refresh_discovered(&command).await.unwrap(), 1);
        assert!(catalog.get("rollback").await.is_none());
        assert!(catalog.get("deploy").await.is_some());
        assert_eq!(catalog.get("read_file").await.unwrap().description, "builtin");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_catalog() {
        let catalog = ToolCatalog::new();
        let (_file, command) = discovery_command(r#"[{"name": "deploy"}]"#);
        catalog.refresh_discovered(&command).await.unwrap();

        let (_bad, command) = discovery_command("not json");
        assert!(catalog.refresh_discovered(&command).await.is_err());
        assert!(catalog.get("deploy").await.is_some());
    }
}
