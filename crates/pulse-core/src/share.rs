use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tiny_skia::{
    Color, FilterQuality, GradientStop, LinearGradient, Paint, Pixmap, PixmapPaint, Point, Rect,
    SpreadMode, Transform,
};

use crate::models::DailyEdition;
use crate::render::{pixmap_from_image, FontSpec, ImageLoader, Rgba, TextEngine, TextMeasure};

pub const CANVAS_WIDTH: u32 = 1200;
pub const CANVAS_HEIGHT: u32 = 1600;

const BACKGROUND: Rgba = Rgba::new(0x18, 0x18, 0x1b, 255);
const PADDING: f32 = 80.0;
const BOTTOM_MARGIN: f32 = 160.0;
const HEADLINE_FONT: FontSpec = FontSpec::new(72.0, 800);
const LINE_HEIGHT: f32 = 72.0 * 1.15;
pub const MAX_LINES: usize = 6;
const EYEBROW_FONT: FontSpec = FontSpec::new(28.0, 700);
const EYEBROW_GAP: f32 = 70.0;
pub const ELLIPSIS: &str = "...";

/// How an over-long headline is cut on its last retained line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EllipsisMode {
    /// Drop characters until the line plus ellipsis fits the content width
    #[default]
    FitWidth,
    /// Replace the last three characters regardless of width (legacy output)
    TrimChars,
}

/// Aspect-fill placement of a source image over the canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverFit {
    pub scale: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub fn cover_fit(canvas_w: f32, canvas_h: f32, img_w: f32, img_h: f32) -> CoverFit {
    let scale = (canvas_w / img_w).max(canvas_h / img_h);
    CoverFit {
        scale,
        x: canvas_w / 2.0 - img_w / 2.0 * scale,
        y: canvas_h / 2.0 - img_h / 2.0 * scale,
        width: img_w * scale,
        height: img_h * scale,
    }
}

/// Greedy word wrap: a word joins the current line while the result stays under `max_width`
pub fn wrap_lines(
    measure: &dyn TextMeasure,
    text: &str,
    font: FontSpec,
    max_width: f32,
) -> Vec<String> {
    let mut words = text.split(' ');
    let mut lines = Vec::new();
    let mut current = words.next().unwrap_or_default().to_string();

    for word in words {
        let candidate = format!("{} {}", current, word);
        if measure.measure(&candidate, font) < max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    lines.push(current);
    lines
}

/// Cap `lines` at `max_lines`, marking the cut with an ellipsis
pub fn truncate_lines(
    measure: &dyn TextMeasure,
    mut lines: Vec<String>,
    max_lines: usize,
    font: FontSpec,
    max_width: f32,
    mode: EllipsisMode,
) -> Vec<String> {
    if lines.len() <= max_lines || max_lines == 0 {
        lines.truncate(max_lines);
        return lines;
    }
    lines.truncate(max_lines);

    let last = &mut lines[max_lines - 1];
    if last.ends_with(ELLIPSIS) {
        return lines;
    }

    match mode {
        EllipsisMode::TrimChars => {
            let keep = last.chars().count().saturating_sub(3);
            let end = last.char_indices().nth(keep).map(|(i, _)| i).unwrap_or(last.len());
            last.truncate(end);
            last.push_str(ELLIPSIS);
        }
        EllipsisMode::FitWidth => {
            loop {
                let trimmed_len = last.trim_end().len();
                last.truncate(trimmed_len);
                let candidate = format!("{}{}", last, ELLIPSIS);
                if last.is_empty() || measure.measure(&candidate, font) < max_width {
                    break;
                }
                last.pop();
            }
            last.push_str(ELLIPSIS);
        }
    }
    lines
}

/// Headline lines and baselines, computed bottom-up
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlineLayout {
    pub lines: Vec<String>,
    /// Baseline of the first headline line
    pub start_y: f32,
    pub line_height: f32,
    pub eyebrow_y: f32,
}

impl HeadlineLayout {
    pub fn baselines(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| (line.as_str(), self.start_y + i as f32 * self.line_height))
    }
}

pub fn layout_headline(measure: &dyn TextMeasure, text: &str, mode: EllipsisMode) -> HeadlineLayout {
    let max_width = CANVAS_WIDTH as f32 - PADDING * 2.0;
    // Line breaks in the source would be drawn as extra lines by the shaper
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let wrapped = wrap_lines(measure, &text, HEADLINE_FONT, max_width);
    let lines = truncate_lines(measure, wrapped, MAX_LINES, HEADLINE_FONT, max_width, mode);

    let text_height = lines.len() as f32 * LINE_HEIGHT;
    let start_y = CANVAS_HEIGHT as f32 - BOTTOM_MARGIN - text_height + HEADLINE_FONT.size;

    HeadlineLayout {
        lines,
        start_y,
        line_height: LINE_HEIGHT,
        eyebrow_y: start_y - EYEBROW_GAP,
    }
}

/// Upper-cased short date, e.g. `JAN 3, 2025`
pub fn eyebrow_text(edition: &DailyEdition) -> String {
    match edition.timestamp() {
        Some(ts) => ts.format("%b %-d, %Y").to_string().to_uppercase(),
        None => edition.date.to_uppercase(),
    }
}

/// A rendered share image with the metadata a share sheet needs
#[derive(Debug, Clone)]
pub struct ShareArtifact {
    pub png: Vec<u8>,
    pub file_name: String,
    pub title: String,
    pub text: String,
    pub url: String,
}

impl ShareArtifact {
    pub fn new(edition: &DailyEdition, png: Vec<u8>, share_url: &str) -> Self {
        Self {
            png,
            file_name: share_file_name(edition),
            title: edition.share_title().to_string(),
            text: default_share_text(edition),
            url: share_url.to_string(),
        }
    }

    /// Download fallback when no share sheet is available
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.png)
            .with_context(|| format!("Failed to write share image: {}", path.display()))?;
        Ok(path)
    }
}

pub fn share_file_name(edition: &DailyEdition) -> String {
    format!("pulse-edition-{}.png", edition.id)
}

pub fn default_share_text(edition: &DailyEdition) -> String {
    let date = edition
        .timestamp()
        .map(|ts| ts.format("%b %-d").to_string())
        .unwrap_or_else(|| edition.date.clone());
    format!(
        "Look what I found on Pulse by {} - checking out the {} edition.",
        edition.author_name(),
        date
    )
}

/// Renders an edition to a 1200x1600 PNG
pub struct ShareCompositor {
    loader: Box<dyn ImageLoader>,
    text: TextEngine,
    ellipsis: EllipsisMode,
}

impl ShareCompositor {
    pub fn new(loader: Box<dyn ImageLoader>) -> Self {
        Self {
            loader,
            text: TextEngine::new(),
            ellipsis: EllipsisMode::default(),
        }
    }

    pub fn with_ellipsis(mut self, mode: EllipsisMode) -> Self {
        self.ellipsis = mode;
        self
    }

    /// PNG bytes for `edition`, or `None` if no drawing surface is available.
    ///
    /// A missing or undecodable cover image only leaves the background flat.
    pub async fn compose(&self, edition: &DailyEdition) -> Option<Vec<u8>> {
        let Some(mut pixmap) = Pixmap::new(CANVAS_WIDTH, CANVAS_HEIGHT) else {
            tracing::error!(edition_id = %edition.id, "Could not allocate share canvas");
            return None;
        };
        let width = CANVAS_WIDTH as f32;
        let height = CANVAS_HEIGHT as f32;

        pixmap.fill(Color::from_rgba8(BACKGROUND.r, BACKGROUND.g, BACKGROUND.b, BACKGROUND.a));

        match edition.cover_image_url() {
            Some(src) => {
                if let Err(e) = self.draw_cover(&mut pixmap, src).await {
                    tracing::warn!(edition_id = %edition.id, error = %e, "Failed to load cover image");
                }
            }
            None => tracing::warn!(edition_id = %edition.id, "No cover image for share"),
        }

        draw_overlays(&mut pixmap, width, height);

        let layout = layout_headline(&self.text, edition.headline().text(), self.ellipsis);
        for (line, y) in layout.baselines() {
            self.text
                .fill_text(&mut pixmap, line, HEADLINE_FONT, Rgba::new(255, 255, 255, 255), PADDING, y);
        }
        self.text.fill_text(
            &mut pixmap,
            &eyebrow_text(edition),
            EYEBROW_FONT,
            Rgba::new(255, 255, 255, 204),
            PADDING,
            layout.eyebrow_y,
        );

        match pixmap.encode_png() {
            Ok(png) => Some(png),
            Err(e) => {
                tracing::error!(edition_id = %edition.id, error = %e, "Failed to encode share image");
                None
            }
        }
    }

    /// Compose and wrap the image with share metadata
    pub async fn share(&self, edition: &DailyEdition, share_url: &str) -> Option<ShareArtifact> {
        let png = self.compose(edition).await?;
        Some(ShareArtifact::new(edition, png, share_url))
    }

    async fn draw_cover(&self, pixmap: &mut Pixmap, src: &str) -> Result<()> {
        let image = self.loader.load(src).await?;
        let source = pixmap_from_image(&image).context("Cover image has no pixels")?;

        let fit = cover_fit(
            pixmap.width() as f32,
            pixmap.height() as f32,
            source.width() as f32,
            source.height() as f32,
        );
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        pixmap.draw_pixmap(
            0,
            0,
            source.as_ref(),
            &paint,
            Transform::from_row(fit.scale, 0.0, 0.0, fit.scale, fit.x, fit.y),
            None,
        );
        Ok(())
    }
}

/// Flat darken, then a bottom-up black gradient fading out above 40% height
fn draw_overlays(pixmap: &mut Pixmap, width: f32, height: f32) {
    let Some(full) = Rect::from_xywh(0.0, 0.0, width, height) else {
        return;
    };

    let mut darken = Paint::default();
    darken.set_color_rgba8(0, 0, 0, 102);
    pixmap.fill_rect(full, &darken, Transform::identity(), None);

    let gradient = LinearGradient::new(
        Point::from_xy(0.0, height),
        Point::from_xy(0.0, height * 0.4),
        vec![
            GradientStop::new(0.0, Color::from_rgba8(0, 0, 0, 242)),
            GradientStop::new(1.0, Color::from_rgba8(0, 0, 0, 0)),
        ],
        SpreadMode::Pad,
        Transform::identity(),
    );
    if let Some(shader) = gradient {
        let paint = Paint {
            shader,
            ..Paint::default()
        };
        pixmap.fill_rect(full, &paint, Transform::identity(), None);
    }
}
