//! # Placard CLI
//!
//! Command-line interface for template image rendering.
//!
//! ## Usage
//!
//! ```bash
//! # Run the HTTP server
//! API_KEY=secret placard serve --port 3000
//!
//! # Render a local template once
//! placard render card.json --set name=World --set avatar=https://example.com/me.png -o card.png
//! ```

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use placard::{
    PlacardError, Pipeline, RenderRequest,
    config::{Config, RenderSettings},
    loader::HttpImageLoader,
    pipeline::PipelineOptions,
    server,
    store::FileStore,
};

/// Placard - render PNG images from canvas templates
#[derive(Parser, Debug)]
#[command(name = "placard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP render server
    Serve {
        #[command(flatten)]
        config: Config,
    },

    /// Render a local template file to PNG
    Render {
        /// Template JSON file
        template: PathBuf,

        /// Substitution, repeatable
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_substitution)]
        substitutions: Vec<(String, String)>,

        /// Output PNG file
        #[arg(short, long, value_name = "FILE", default_value = "out.png")]
        output: PathBuf,

        #[command(flatten)]
        settings: RenderSettings,
    },
}

fn parse_substitution(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", arg))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), PlacardError> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(execute(cli.command))
}

async fn execute(command: Commands) -> Result<(), PlacardError> {
    match command {
        Commands::Serve { config } => server::serve(config).await,
        Commands::Render {
            template,
            substitutions,
            output,
            settings,
        } => {
            let pipeline = Pipeline::new(
                Arc::new(FileStore::new(None, template)),
                Arc::new(HttpImageLoader::new()?),
                settings.font_book()?,
                PipelineOptions {
                    render_delay: Duration::ZERO,
                    pixel_ratio: settings.pixel_ratio,
                },
            );
            let params: HashMap<String, String> = substitutions.into_iter().collect();
            let png = pipeline
                .execute(RenderRequest::new(None, params))
                .await
                .map_err(|failure| failure.error)?;

            tokio::fs::write(&output, &png).await?;
            println!("Saved to {}", output.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_substitution() {
        assert_eq!(
            parse_substitution("name=World"),
            Ok(("name".to_string(), "World".to_string()))
        );
        assert_eq!(
            parse_substitution("url=https://x.test/?a=b"),
            Ok(("url".to_string(), "https://x.test/?a=b".to_string()))
        );
        assert!(parse_substitution("novalue").is_err());
        assert!(parse_substitution("=x").is_err());
    }

    #[test]
    fn test_cli_parses_render() {
        let cli = Cli::try_parse_from([
            "placard", "render", "card.json", "--set", "name=World", "-o", "x.png",
        ])
        .unwrap();
        let Commands::Render {
            substitutions,
            output,
            ..
        } = cli.command
        else {
            panic!("expected render command");
        };
        assert_eq!(substitutions, vec![("name".to_string(), "World".to_string())]);
        assert_eq!(output, PathBuf::from("x.png"));
    }
}
