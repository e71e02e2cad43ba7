//! # Render Pipeline
//!
//! One request runs through a fixed sequence of stages on its own working
//! copy of the template:
//!
//! ```text
//! Loading → Resolving → Fitting → Compositing → Rendering → Done
//!    └──────────┴──────────┴───────────┴────────────┴──→ Failed
//! ```
//!
//! Stages never overlap and nothing is retried. The first error ends the
//! request and is reported together with the stage it happened in; no
//! partial image is produced.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::PlacardError;
use crate::fonts::FontBook;
use crate::loader::{Assets, ImageLoader, is_image_reference};
use crate::render::{DEFAULT_PIXEL_RATIO, Renderer};
use crate::store::TemplateStore;
use crate::template::fit::fit_template;
use crate::template::mask::{ensure_masked_group, replace_masked_image};
use crate::template::placeholder::{resolve_template, template_tokens};
use crate::template::{DEFAULT_FONT_FAMILY, Template};

/// Query parameter carrying the access token.
pub const API_KEY_PARAM: &str = "apikey";

/// Query parameter naming the stored template.
pub const TEMPLATE_PARAM: &str = "dbtemplate";

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Resolving,
    Fitting,
    Compositing,
    Rendering,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loading => "loading",
            Stage::Resolving => "resolving",
            Stage::Fitting => "fitting",
            Stage::Compositing => "compositing",
            Stage::Rendering => "rendering",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A render request: which template, and the substitutions to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderRequest {
    /// Stored template name; `None` selects the default template.
    pub template: Option<String>,
    /// Substitution map with the reserved request controls removed.
    pub params: HashMap<String, String>,
}

impl RenderRequest {
    pub fn new(template: Option<String>, params: HashMap<String, String>) -> Self {
        Self { template, params }
    }

    /// Split raw query parameters into the template name and substitutions.
    pub fn from_query(mut query: HashMap<String, String>) -> Self {
        query.remove(API_KEY_PARAM);
        let template = query.remove(TEMPLATE_PARAM).filter(|t| !t.is_empty());
        Self {
            template,
            params: query,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Image substitutions among the keys no text token consumed.
    ///
    /// A key naming a masked group is a substitution whatever its value, so a
    /// bad URL fails the request. Any other key counts only when its value is
    /// an image URL. Ordered by key so compositing is deterministic.
    pub fn image_substitutions<'a>(
        &'a self,
        consumed: &BTreeSet<String>,
        template: &Template,
    ) -> BTreeMap<&'a str, &'a str> {
        self.params
            .iter()
            .filter(|(key, value)| {
                !consumed.contains(*key)
                    && (template.is_masked_group(key) || is_image_reference(value))
            })
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect()
    }
}

/// A failed request: the originating error and the stage it happened in.
#[derive(Debug, Error)]
#[error("{stage} failed: {error}")]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub error: PlacardError,
}

impl PipelineFailure {
    pub fn status_code(&self) -> axum::http::StatusCode {
        self.error.status_code()
    }
}

/// Attach the current stage to a fallible step.
trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, PipelineFailure>;
}

impl<T> AtStage<T> for Result<T, PlacardError> {
    fn at(self, stage: Stage) -> Result<T, PipelineFailure> {
        self.map_err(|error| PipelineFailure { stage, error })
    }
}

/// Tunables for a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Pause before Loading; zero disables it.
    pub render_delay: Duration,
    pub pixel_ratio: f32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            render_delay: Duration::from_millis(5000),
            pixel_ratio: DEFAULT_PIXEL_RATIO,
        }
    }
}

/// Orchestrates one render per call. Shared between requests; holds no
/// per-request state.
pub struct Pipeline {
    store: Arc<dyn TemplateStore>,
    loader: Arc<dyn ImageLoader>,
    fonts: Arc<RwLock<FontBook>>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn TemplateStore>,
        loader: Arc<dyn ImageLoader>,
        fonts: FontBook,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            loader,
            fonts: Arc::new(RwLock::new(fonts)),
            options,
        }
    }

    /// Validate `request` and render it to PNG bytes.
    ///
    /// A request without substitutions is rejected before the store is
    /// touched.
    pub async fn run(&self, request: RenderRequest) -> Result<Vec<u8>, PipelineFailure> {
        if request.is_empty() {
            return Err(PipelineFailure {
                stage: Stage::Loading,
                error: PlacardError::Validation("No parameters provided in the request".to_string()),
            });
        }
        self.execute(request).await
    }

    /// Render `request` without the parameter check.
    pub async fn execute(&self, request: RenderRequest) -> Result<Vec<u8>, PipelineFailure> {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "render",
            %request_id,
            template = request.template.as_deref().unwrap_or("default")
        );
        async {
            let result = self.stages(&request).await;
            match &result {
                Ok(png) => info!(stage = %Stage::Done, bytes = png.len(), "render complete"),
                Err(failure) => warn!(
                    stage = %Stage::Failed,
                    failed_in = %failure.stage,
                    error = %failure.error,
                    "render failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn stages(&self, request: &RenderRequest) -> Result<Vec<u8>, PipelineFailure> {
        if !self.options.render_delay.is_zero() {
            debug!(delay_ms = self.options.render_delay.as_millis() as u64, "delaying render");
            tokio::time::sleep(self.options.render_delay).await;
        }

        info!(stage = %Stage::Loading, "loading template");
        let mut template = self.load(request.template.as_deref()).await.at(Stage::Loading)?;

        info!(stage = %Stage::Resolving, params = request.params.len(), "substituting placeholders");
        let consumed = resolve_template(&mut template, &request.params);
        debug!(consumed = ?consumed, "placeholder keys consumed");
        let unresolved = template_tokens(&template);
        if !unresolved.is_empty() {
            debug!(unresolved = ?unresolved, "placeholders left verbatim");
        }

        info!(stage = %Stage::Fitting, "fitting text");
        let fonts = self.fonts.read().await.clone();
        let fitted = fit_template(&mut template, &fonts);
        debug!(fitted, "text nodes scaled to fit");

        info!(stage = %Stage::Compositing, "replacing masked images");
        let mut assets = Assets::new();
        self.composite(&mut template, &mut assets, request, &consumed)
            .await
            .at(Stage::Compositing)?;

        info!(stage = %Stage::Rendering, "rasterizing");
        self.rasterize(template, fonts, assets).await.at(Stage::Rendering)
    }

    async fn load(&self, name: Option<&str>) -> Result<Template, PlacardError> {
        let template = self.store.fetch(name).await?;
        let mut fonts = self.fonts.write().await;
        fonts.register_all(template.font_families());
        fonts.register(DEFAULT_FONT_FAMILY);
        Ok(template)
    }

    async fn composite(
        &self,
        template: &mut Template,
        assets: &mut Assets,
        request: &RenderRequest,
        consumed: &BTreeSet<String>,
    ) -> Result<(), PlacardError> {
        let substitutions = request.image_substitutions(consumed, template);

        // Every target must exist, then every value be fetchable, before any image is downloaded
        for id in substitutions.keys() {
            ensure_masked_group(template, id)?;
        }
        for (id, src) in &substitutions {
            if !is_image_reference(src) {
                return Err(PlacardError::Dependency(format!(
                    "Failed to load image for {}: unsupported image URL {:?}",
                    id, src
                )));
            }
        }

        for (id, src) in substitutions {
            let bitmap = self.loader.load(src).await?;
            replace_masked_image(template, id, src, bitmap.width(), bitmap.height())?;
            info!(id, width = bitmap.width(), height = bitmap.height(), "masked image replaced");
            assets.insert(src, bitmap);
        }
        Ok(())
    }

    async fn rasterize(
        &self,
        template: Template,
        fonts: FontBook,
        mut assets: Assets,
    ) -> Result<Vec<u8>, PlacardError> {
        let loaded = assets.preload(&template, self.loader.as_ref()).await?;
        debug!(loaded, "template images loaded");

        let pixel_ratio = self.options.pixel_ratio;
        tokio::task::spawn_blocking(move || {
            Renderer::new(&fonts, &assets)
                .pixel_ratio(pixel_ratio)
                .render_png(&template)
        })
        .await
        .map_err(|e| PlacardError::Render(format!("render task failed: {}", e)))?
    }
}
