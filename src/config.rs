//! Startup configuration.
//!
//! Every option is a command-line flag with an environment variable
//! fallback, so the server can be configured either way. The resulting
//! [`Config`] is built once in `main` and passed down explicitly.

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::PlacardError;
use crate::fonts::FontBook;
use crate::loader::HttpImageLoader;
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::store::{FileStore, SupabaseStore, TemplateStore};

/// Rendering options shared by the server and the one-shot `render` command.
#[derive(Args, Debug, Clone)]
pub struct RenderSettings {
    /// Directory holding `<Family>.ttf` font files
    #[arg(long, env = "FONT_DIR", default_value = "fonts")]
    pub font_dir: PathBuf,

    /// Font file used when a family is missing (built-in DejaVu Sans otherwise)
    #[arg(long, env = "DEFAULT_FONT", value_name = "FILE")]
    pub default_font: Option<PathBuf>,

    /// Output pixels per template unit
    #[arg(long, env = "PIXEL_RATIO", default_value_t = 2.0)]
    pub pixel_ratio: f32,
}

impl RenderSettings {
    /// Font book over `font_dir`, with the configured default font if any.
    pub fn font_book(&self) -> Result<FontBook, PlacardError> {
        let mut fonts = FontBook::new(&self.font_dir);
        match &self.default_font {
            Some(path) => fonts.load_fallback(path)?,
            None => debug!("using built-in default font"),
        }
        Ok(fonts)
    }
}

/// Server configuration.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Address to listen on (overrides --port)
    #[arg(long, env = "LISTEN_ADDR")]
    pub listen: Option<String>,

    /// Port to listen on, on all interfaces
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Pre-shared key expected in the `apikey` query parameter
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Supabase project URL for stored templates
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase API key
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// Directory of `<name>.json` templates, used when Supabase is not configured
    #[arg(long, env = "TEMPLATE_DIR")]
    pub template_dir: Option<PathBuf>,

    /// Template used when a request names none
    #[arg(long, env = "DEFAULT_TEMPLATE", default_value = "template.json")]
    pub default_template: PathBuf,

    /// Pause before each render, in milliseconds (0 disables)
    #[arg(long, env = "RENDER_DELAY_MS", default_value_t = 5000)]
    pub render_delay_ms: u64,

    #[command(flatten)]
    pub render: RenderSettings,
}

impl Config {
    pub fn listen_addr(&self) -> String {
        self.listen
            .clone()
            .unwrap_or_else(|| format!("0.0.0.0:{}", self.port))
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            render_delay: Duration::from_millis(self.render_delay_ms),
            pixel_ratio: self.render.pixel_ratio,
        }
    }

    /// Supabase when both URL and key are set, template files otherwise.
    pub fn template_store(&self, client: reqwest::Client) -> Arc<dyn TemplateStore> {
        match (&self.supabase_url, &self.supabase_key) {
            (Some(url), Some(key)) => {
                info!(url = %url, "using Supabase template store");
                Arc::new(SupabaseStore::new(
                    client,
                    url.as_str(),
                    key.as_str(),
                    &self.default_template,
                ))
            }
            _ => {
                info!(
                    dir = ?self.template_dir,
                    default = %self.default_template.display(),
                    "using file template store"
                );
                Arc::new(FileStore::new(
                    self.template_dir.clone(),
                    &self.default_template,
                ))
            }
        }
    }

    /// Assemble the render pipeline from this configuration.
    pub fn build_pipeline(&self) -> Result<Pipeline, PlacardError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("placard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlacardError::Dependency(format!("HTTP client error: {}", e)))?;
        Ok(Pipeline::new(
            self.template_store(client.clone()),
            Arc::new(HttpImageLoader::with_client(client)),
            self.render.font_book()?,
            self.pipeline_options(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use crate::template::fit::TextMeasure;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
    }

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["placard"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().config
    }

    #[test]
    fn test_explicit_flags() {
        let config = parse(&[
            "--port",
            "8080",
            "--api-key",
            "secret",
            "--render-delay-ms",
            "0",
            "--pixel-ratio",
            "3",
            "--font-dir",
            "/srv/fonts",
        ]);
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        let options = config.pipeline_options();
        assert!(options.render_delay.is_zero());
        assert_eq!(options.pixel_ratio, 3.0);
        assert_eq!(config.render.font_dir, PathBuf::from("/srv/fonts"));
    }

    #[test]
    fn test_listen_overrides_port() {
        let config = parse(&["--listen", "127.0.0.1:9000", "--port", "1234"]);
        assert_eq!(config.listen_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_builtin_default_font() {
        let config = parse(&[]);
        let fonts = config.render.font_book().unwrap();
        assert!(!fonts.has_custom_fallback());
        assert!(fonts.line_width(Some("Unknown Family"), 40.0, "Hello") > 0.0);
    }

    #[test]
    fn test_missing_default_font_is_error() {
        let config = parse(&["--default-font", "/no/such/font.ttf"]);
        assert!(config.render.font_book().is_err());
    }
}
