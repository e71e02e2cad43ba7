//! Template stores.
//!
//! A store is read-only from the renderer's point of view: `fetch` hands out
//! a freshly parsed (or cloned) [`Template`] that the caller owns and may
//! mutate freely.
//!
//! | Store | Named templates | Default (no name) |
//! |-------|-----------------|-------------------|
//! | [`SupabaseStore`] | `templates` table over PostgREST | local file |
//! | [`FileStore`] | `<dir>/<name>.json` | local file |
//! | [`MemoryStore`] | in-memory map | optional in-memory template |

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::PlacardError;
use crate::template::Template;

/// Source of template documents.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Fetch the template called `name`, or the default template for `None`.
    async fn fetch(&self, name: Option<&str>) -> Result<Template, PlacardError>;
}

/// Load the default template document from disk.
async fn load_default(path: &Path) -> Result<Template, PlacardError> {
    let json = match tokio::fs::read_to_string(path).await {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PlacardError::NotFound(
                "Default template file not found".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };
    let template = Template::from_json(&json)?;
    info!(path = %path.display(), "default template loaded");
    Ok(template)
}

// ============================================================================
// SUPABASE
// ============================================================================

/// Templates stored in a Supabase `templates` table (`name`, `template` columns).
pub struct SupabaseStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    default_path: PathBuf,
}

impl SupabaseStore {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        default_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            default_path: default_path.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/templates", self.base_url)
    }
}

#[async_trait]
impl TemplateStore for SupabaseStore {
    async fn fetch(&self, name: Option<&str>) -> Result<Template, PlacardError> {
        let Some(name) = name else {
            return load_default(&self.default_path).await;
        };

        info!(template = name, "fetching template");
        let filter = format!("eq.{}", name);
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("select", "template"), ("name", filter.as_str())])
            .header("apikey", self.api_key.as_str())
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                error!(template = name, error = %e, "template fetch failed");
                PlacardError::Dependency(format!("Error fetching template from database: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(template = name, %status, "template fetch rejected");
            return Err(PlacardError::Dependency(format!(
                "Error fetching template from database: HTTP {}",
                status
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            PlacardError::Dependency(format!("Error fetching template from database: {}", e))
        })?;
        let rows: Vec<serde_json::Value> = serde_json::from_slice(&body).map_err(|e| {
            PlacardError::Dependency(format!("Unexpected response from database: {}", e))
        })?;

        let document = rows
            .into_iter()
            .next()
            .and_then(|mut row| row.get_mut("template").map(serde_json::Value::take))
            .filter(|t| !t.is_null())
            .ok_or_else(|| PlacardError::NotFound("Template not found in the database".to_string()))?;

        let template = Template::from_value(document)?;
        info!(template = name, "template loaded from database");
        Ok(template)
    }
}

// ============================================================================
// FILES
// ============================================================================

/// Templates stored as JSON files.
pub struct FileStore {
    dir: Option<PathBuf>,
    default_path: PathBuf,
}

impl FileStore {
    /// Named templates resolve to `<dir>/<name>.json` when `dir` is set.
    pub fn new(dir: Option<PathBuf>, default_path: impl Into<PathBuf>) -> Self {
        Self {
            dir,
            default_path: default_path.into(),
        }
    }
}

#[async_trait]
impl TemplateStore for FileStore {
    async fn fetch(&self, name: Option<&str>) -> Result<Template, PlacardError> {
        let Some(name) = name else {
            return load_default(&self.default_path).await;
        };
        let not_found = || PlacardError::NotFound(format!("Template {} not found", name));

        let dir = self.dir.as_ref().ok_or_else(not_found)?;
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(not_found());
        }

        let path = dir.join(format!("{}.json", name));
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let template = Template::from_json(&json)?;
        info!(template = name, path = %path.display(), "template loaded from file");
        Ok(template)
    }
}

// ============================================================================
// MEMORY
// ============================================================================

/// Templates held in memory; every fetch returns a clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    templates: HashMap<String, Template>,
    default: Option<Template>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, name: impl Into<String>, template: Template) -> Self {
        self.templates.insert(name.into(), template);
        self
    }

    pub fn with_default(mut self, template: Template) -> Self {
        self.default = Some(template);
        self
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn fetch(&self, name: Option<&str>) -> Result<Template, PlacardError> {
        match name {
            Some(name) => self
                .templates
                .get(name)
                .cloned()
                .ok_or_else(|| PlacardError::NotFound("Template not found in the database".to_string())),
            None => self
                .default
                .clone()
                .ok_or_else(|| PlacardError::NotFound("Default template file not found".to_string())),
        }
    }
}
