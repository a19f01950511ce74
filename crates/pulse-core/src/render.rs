use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping, SwashCache, Weight};
use image::DynamicImage;
use reqwest::Client;
use std::sync::Mutex;
use tiny_skia::{IntSize, Pixmap};

/// Font selection for a run of text, like a canvas `font` string
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub size: f32,
    pub weight: u16,
}

impl FontSpec {
    pub const fn new(size: f32, weight: u16) -> Self {
        Self { size, weight }
    }
}

/// Measures the advance width of a single line of text
pub trait TextMeasure {
    fn measure(&self, text: &str, font: FontSpec) -> f32;
}

/// Straight (non-premultiplied) RGBA
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Sans-serif shaping and rasterisation over the system font database
pub struct TextEngine {
    inner: Mutex<(FontSystem, SwashCache)>,
}

impl Default for TextEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextEngine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new((FontSystem::new(), SwashCache::new())),
        }
    }

    fn shape(font_system: &mut FontSystem, text: &str, font: FontSpec) -> Buffer {
        let mut buffer = Buffer::new(font_system, Metrics::new(font.size, font.size * 1.2));
        buffer.set_size(font_system, None, None);
        let attrs = Attrs::new()
            .family(Family::SansSerif)
            .weight(Weight(font.weight));
        buffer.set_text(font_system, text, attrs, Shaping::Advanced);
        buffer.shape_until_scroll(font_system, false);
        buffer
    }

    /// Draw one line with its alphabetic baseline at `baseline_y`
    pub fn fill_text(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        font: FontSpec,
        color: Rgba,
        x: f32,
        baseline_y: f32,
    ) {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let (font_system, cache) = &mut *guard;
        let buffer = Self::shape(font_system, text, font);

        let Some(ascent) = buffer.layout_runs().next().map(|run| run.line_y) else {
            return;
        };
        let origin_x = x.round() as i32;
        let origin_y = (baseline_y - ascent).round() as i32;
        let text_color = cosmic_text::Color::rgba(color.r, color.g, color.b, color.a);

        buffer.draw(font_system, cache, text_color, |gx, gy, w, h, c| {
            for dy in 0..h as i32 {
                for dx in 0..w as i32 {
                    blend_pixel(
                        pixmap,
                        origin_x + gx + dx,
                        origin_y + gy + dy,
                        Rgba::new(c.r(), c.g(), c.b(), c.a()),
                    );
                }
            }
        });
    }
}

impl TextMeasure for TextEngine {
    fn measure(&self, text: &str, font: FontSpec) -> f32 {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let (font_system, _) = &mut *guard;
        let buffer = Self::shape(font_system, text, font);
        buffer.layout_runs().map(|run| run.line_w).fold(0.0, f32::max)
    }
}

/// Source-over blend of one straight-alpha pixel into a premultiplied pixmap
fn blend_pixel(pixmap: &mut Pixmap, x: i32, y: i32, color: Rgba) {
    if color.a == 0 || x < 0 || y < 0 || x >= pixmap.width() as i32 || y >= pixmap.height() as i32 {
        return;
    }
    let idx = (y as usize * pixmap.width() as usize + x as usize) * 4;
    let data = pixmap.data_mut();
    let sa = color.a as u32;
    let inv = 255 - sa;
    let src = [color.r, color.g, color.b];
    for (channel, value) in src.iter().enumerate() {
        let premul = *value as u32 * sa / 255;
        data[idx + channel] = (premul + data[idx + channel] as u32 * inv / 255) as u8;
    }
    data[idx + 3] = (sa + data[idx + 3] as u32 * inv / 255) as u8;
}

/// Convert a decoded image into a premultiplied pixmap
pub fn pixmap_from_image(image: &DynamicImage) -> Option<Pixmap> {
    let rgba = image.to_rgba8();
    let size = IntSize::from_wh(rgba.width(), rgba.height())?;
    let mut data = rgba.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u32;
        for c in &mut px[..3] {
            *c = (*c as u32 * a / 255) as u8;
        }
    }
    Pixmap::from_vec(data, size)
}

/// Fetches and decodes an image referenced by URL
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, src: &str) -> Result<DynamicImage>;
}

/// Loads `data:` URLs, `http(s)` URLs and local file paths
pub struct SourceImageLoader {
    client: Client,
}

impl SourceImageLoader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    async fn fetch_bytes(&self, src: &str) -> Result<Vec<u8>> {
        if let Some(rest) = src.strip_prefix("data:") {
            return decode_data_url(rest);
        }

        if src.starts_with("http://") || src.starts_with("https://") {
            let response = self
                .client
                .get(src)
                .send()
                .await
                .with_context(|| format!("Failed to fetch image {}", src))?;
            let status = response.status();
            if !status.is_success() {
                anyhow::bail!("HTTP error {} for image {}", status, src);
            }
            let bytes = response.bytes().await.context("Failed to read image body")?;
            return Ok(bytes.to_vec());
        }

        tokio::fs::read(src)
            .await
            .with_context(|| format!("Failed to read image file {}", src))
    }
}

#[async_trait]
impl ImageLoader for SourceImageLoader {
    async fn load(&self, src: &str) -> Result<DynamicImage> {
        let bytes = self.fetch_bytes(src).await?;
        image::load_from_memory(&bytes).context("Failed to decode image")
    }
}

/// Payload of a `data:[mime];base64,...` URL (without the `data:` prefix)
fn decode_data_url(rest: &str) -> Result<Vec<u8>> {
    let (meta, payload) = rest.split_once(',').context("Malformed data URL")?;
    if !meta.ends_with(";base64") {
        anyhow::bail!("Only base64 data URLs are supported");
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .context("Invalid base64 in data URL")
}
