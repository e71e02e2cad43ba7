//! Image loading: downloads and decodes bitmaps referenced by a scene.
//!
//! `ImageLoader` handles all fetching concerns so that the scene model stays
//! a pure data model with no HTTP knowledge. Decoded bitmaps live in
//! [`Assets`], keyed by the `src` string the scene uses.

use async_trait::async_trait;
use base64::Engine;
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::PlacardError;
use crate::template::Template;

/// A decoded RGBA bitmap, shared between the asset table and the renderer.
pub type Bitmap = Arc<RgbaImage>;

/// Loads and decodes an image from a reference (URL, data URL, path).
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, src: &str) -> Result<Bitmap, PlacardError>;
}

/// Whether `value` is an image URL the loader can fetch over the network or
/// decode inline. Values are taken as-is; surrounding whitespace disqualifies.
pub fn is_image_reference(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://") || value.starts_with("data:image/")
}

/// Default loader: `http(s)` URLs via reqwest, `data:` URLs inline, anything
/// else as a local file path.
#[derive(Clone)]
pub struct HttpImageLoader {
    client: reqwest::Client,
}

impl HttpImageLoader {
    pub fn new() -> Result<Self, PlacardError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("placard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlacardError::Dependency(format!("HTTP client error: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, PlacardError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PlacardError::Dependency(format!("Failed to download {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(PlacardError::Dependency(format!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PlacardError::Dependency(format!("Failed to read image data: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, src: &str) -> Result<Bitmap, PlacardError> {
        let bytes = if src.starts_with("data:") {
            decode_data_url(src)?
        } else if src.starts_with("http://") || src.starts_with("https://") {
            self.download(src).await?
        } else {
            tokio::fs::read(src)
                .await
                .map_err(|e| PlacardError::Dependency(format!("Failed to read {}: {}", src, e)))?
        };
        let bitmap = decode(&bytes, src)?;
        info!(src = %truncate(src), width = bitmap.width(), height = bitmap.height(), "image loaded");
        Ok(bitmap)
    }
}

/// Decode encoded image bytes (PNG, JPEG, ...) into RGBA.
pub fn decode(bytes: &[u8], src: &str) -> Result<Bitmap, PlacardError> {
    let image = image::load_from_memory(bytes).map_err(|e| {
        PlacardError::Dependency(format!("Failed to decode image {}: {}", truncate(src), e))
    })?;
    Ok(Arc::new(image.to_rgba8()))
}

/// Extract the payload of a base64 `data:` URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, PlacardError> {
    let (meta, payload) = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| PlacardError::Dependency("malformed data URL".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(PlacardError::Dependency(
            "only base64 data URLs are supported".to_string(),
        ));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| PlacardError::Dependency(format!("invalid base64 in data URL: {}", e)))
}

/// Keep data URLs out of log lines.
fn truncate(src: &str) -> &str {
    match src.char_indices().nth(64) {
        Some((idx, _)) => &src[..idx],
        None => src,
    }
}

/// Decoded bitmaps for one render, keyed by `src`.
#[derive(Debug, Clone, Default)]
pub struct Assets {
    bitmaps: HashMap<String, Bitmap>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, src: impl Into<String>, bitmap: Bitmap) {
        self.bitmaps.insert(src.into(), bitmap);
    }

    pub fn get(&self, src: &str) -> Option<&Bitmap> {
        self.bitmaps.get(src)
    }

    pub fn contains(&self, src: &str) -> bool {
        self.bitmaps.contains_key(src)
    }

    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
    }

    /// Load every image the scene references that is not loaded yet.
    ///
    /// Sequential; the first failure aborts.
    pub async fn preload(
        &mut self,
        template: &Template,
        loader: &dyn ImageLoader,
    ) -> Result<usize, PlacardError> {
        let mut loaded = 0;
        for src in template.image_sources() {
            if self.contains(&src) {
                continue;
            }
            debug!(src = %truncate(&src), "loading template image");
            let bitmap = loader.load(&src).await?;
            self.insert(src, bitmap);
            loaded += 1;
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_is_image_reference() {
        assert!(is_image_reference("https://example.com/a.png"));
        assert!(is_image_reference("http://example.com/a.png"));
        assert!(is_image_reference("data:image/png;base64,AAAA"));
        assert!(!is_image_reference("Hello World"));
        assert!(!is_image_reference("ftp://example.com/a.png"));
        assert!(!is_image_reference("//cdn.example.com/a.png"));
        assert!(!is_image_reference(" https://example.com/a.png"));
    }

    #[test]
    fn test_decode_data_url() {
        let png = png_bytes(3, 2);
        let url = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&png)
        );
        assert_eq!(decode_data_url(&url).unwrap(), png);

        assert!(decode_data_url("data:image/png,rawbytes").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
    }

    #[tokio::test]
    async fn test_loader_data_url() {
        let url = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png_bytes(4, 5))
        );
        let loader = HttpImageLoader::new().unwrap();
        let bitmap = loader.load(&url).await.unwrap();
        assert_eq!(bitmap.dimensions(), (4, 5));
        assert_eq!(bitmap.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[tokio::test]
    async fn test_loader_rejects_garbage() {
        let url = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(b"not an image")
        );
        let loader = HttpImageLoader::new().unwrap();
        let err = loader.load(&url).await.unwrap_err();
        assert!(matches!(err, PlacardError::Dependency(_)));
    }

    #[tokio::test]
    async fn test_loader_missing_file() {
        let loader = HttpImageLoader::new().unwrap();
        let err = loader.load("/no/such/image.png").await.unwrap_err();
        assert!(matches!(err, PlacardError::Dependency(_)));
    }

    #[test]
    fn test_truncate_long_sources() {
        let long = "x".repeat(200);
        assert_eq!(truncate(&long).len(), 64);
        assert_eq!(truncate("short"), "short");
    }
}
