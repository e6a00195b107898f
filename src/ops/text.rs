use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::components::layers::{Layer, LayerKind, TextStyle};
use crate::error::{EditError, EditResult};

/// Cache for rasterized glyph pixel data. Key: (GlyphId, font_size_bits).
/// Value: (pixels as (u32, u32, f32), bounds_min_x_at_origin_zero, bounds_min_y_at_origin_zero).
pub type GlyphPixelCache = HashMap<(GlyphId, u32), (Vec<(u32, u32, f32)>, f32, f32)>;

/// A rendered overlay: straight-alpha RGBA pixels plus the offset of the
/// buffer's top-left corner from the layer's paint origin.
#[derive(Clone, Debug)]
pub struct Sprite {
    pub pixels: RgbaImage,
    pub off_x: i32,
    pub off_y: i32,
}

impl Sprite {
    pub fn empty() -> Self {
        Self { pixels: RgbaImage::new(0, 0), off_x: 0, off_y: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.width() == 0 || self.pixels.height() == 0
    }
}

/// Turns a layer into pixels. The compositor only knows this seam, so the
/// glyph backend can be swapped (or stubbed in tests) without touching flatten.
pub trait OverlayRenderer: Send + Sync {
    fn render(&self, layer: &Layer) -> EditResult<Sprite>;
}

/// Lay out a single line of text, returning positioned glyphs.
/// Glyph y is the baseline, placed at `ascent` so the glyph box starts at y = 0.
/// Returns `(glyphs, total_width)`.
pub fn layout_line(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();

    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x, ascent));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    (glyphs, cursor_x)
}

/// Rasterize `text` with its glyph box anchored at the top-left origin.
///
/// Supports multiline text via '\n'. Coverage is max-combined, so
/// overlapping glyph edges do not double up.
pub fn rasterize_text(
    font: &FontArc,
    text: &str,
    font_size: f32,
    color: [u8; 4],
    glyph_cache: &mut GlyphPixelCache,
) -> Sprite {
    let line_height = font.as_scaled(font_size).height();

    let mut all_glyphs: Vec<(GlyphId, f32, f32)> = Vec::new();
    for (line_idx, line) in text.split('\n').enumerate() {
        let y_offset = line_idx as f32 * line_height;
        let (glyphs, _) = layout_line(font, line, font_size);
        all_glyphs.extend(glyphs.into_iter().map(|(id, x, y)| (id, x, y + y_offset)));
    }

    if all_glyphs.is_empty() {
        return Sprite::empty();
    }

    // Bounding box of all glyphs (no outlining needed)
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for &(glyph_id, gx, gy) in &all_glyphs {
        let glyph = glyph_id.with_scale_and_position(font_size, point(gx, gy));
        let bounds = font.glyph_bounds(&glyph);
        min_x = min_x.min(bounds.min.x);
        min_y = min_y.min(bounds.min.y);
        max_x = max_x.max(bounds.max.x);
        max_y = max_y.max(bounds.max.y);
    }
    if min_x >= max_x || min_y >= max_y {
        return Sprite::empty();
    }

    let pad = 2.0;
    let x0 = (min_x - pad).floor() as i32;
    let y0 = (min_y - pad).floor() as i32;
    let x1 = (max_x + pad).ceil() as i32;
    let y1 = (max_y + pad).ceil() as i32;
    let buf_w = (x1 - x0).max(0) as u32;
    let buf_h = (y1 - y0).max(0) as u32;
    if buf_w == 0 || buf_h == 0 {
        return Sprite::empty();
    }

    let mut coverage = vec![0.0f32; buf_w as usize * buf_h as usize];

    // Glyphs are cached at position (0,0) and shifted to their layout position.
    let font_size_key = font_size.to_bits();
    for &(glyph_id, gx, gy) in &all_glyphs {
        let draw_x = gx.round();
        let draw_y = gy.round();
        let cache_key = (glyph_id, font_size_key);

        let (pixels, base_bx, base_by) = glyph_cache.entry(cache_key).or_insert_with(|| {
            let base_glyph = glyph_id.with_scale_and_position(font_size, point(0.0, 0.0));
            let mut px_list = Vec::new();
            match font.outline_glyph(base_glyph) {
                Some(outlined) => {
                    let b = outlined.px_bounds();
                    outlined.draw(|px, py, cov| px_list.push((px, py, cov)));
                    (px_list, b.min.x, b.min.y)
                }
                None => (px_list, 0.0, 0.0),
            }
        });

        for &(px, py, cov) in pixels.iter() {
            let ix = (px as f32 + *base_bx + draw_x).round() as i32 - x0;
            let iy = (py as f32 + *base_by + draw_y).round() as i32 - y0;
            if ix >= 0 && iy >= 0 && (ix as u32) < buf_w && (iy as u32) < buf_h {
                let idx = iy as usize * buf_w as usize + ix as usize;
                coverage[idx] = coverage[idx].max(cov);
            }
        }
    }

    let mut buf = RgbaImage::new(buf_w, buf_h);
    for (i, px) in buf.pixels_mut().enumerate() {
        let cov = coverage[i];
        if cov > 0.001 {
            let a = (color[3] as f32 * cov.min(1.0)).round().min(255.0) as u8;
            *px = Rgba([color[0], color[1], color[2], a]);
        }
    }

    Sprite { pixels: buf, off_x: x0, off_y: y0 }
}

/// Load a font by family name from the system. Falls back to the generic
/// sans-serif family when the name is unknown.
pub fn load_system_font(family: &str) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let source = SystemSource::new();
    let handle = source
        .select_best_match(
            &[FamilyName::Title(family.to_string()), FamilyName::SansSerif],
            &Properties::new(),
        )
        .ok()?;

    let font_data = handle.load().ok()?;
    let bytes: Vec<u8> = (*font_data.copy_font_data()?).clone();
    FontArc::try_from_vec(bytes).ok()
}

/// Glyph renderer backed by `ab_glyph`, resolving families through the
/// system font source and caching both fonts and glyph coverage.
#[derive(Default)]
pub struct GlyphRenderer {
    fonts: Mutex<HashMap<String, FontArc>>,
    glyphs: Mutex<HashMap<String, GlyphPixelCache>>,
}

impl GlyphRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `font` available under `family` without touching the system source.
    pub fn register_font(&self, family: &str, font: FontArc) {
        if let Ok(mut fonts) = self.fonts.lock() {
            fonts.insert(family.to_string(), font);
        }
    }

    fn resolve(&self, family: &str) -> EditResult<FontArc> {
        let mut fonts = self
            .fonts
            .lock()
            .map_err(|_| EditError::RenderTargetUnavailable("font cache poisoned".into()))?;
        if let Some(font) = fonts.get(family) {
            return Ok(font.clone());
        }
        let font = load_system_font(family).ok_or_else(|| {
            EditError::RenderTargetUnavailable(format!("no font available for '{}'", family))
        })?;
        log::debug!("Loaded font family '{}'", family);
        fonts.insert(family.to_string(), font.clone());
        Ok(font)
    }

    fn render_text(&self, style: &TextStyle) -> EditResult<Sprite> {
        if style.content.is_empty() {
            return Ok(Sprite::empty());
        }
        let font = self.resolve(&style.font_family)?;
        let mut caches = self
            .glyphs
            .lock()
            .map_err(|_| EditError::RenderTargetUnavailable("glyph cache poisoned".into()))?;
        let cache = caches.entry(style.font_family.clone()).or_default();
        Ok(rasterize_text(&font, &style.content, style.font_size, style.color, cache))
    }
}

impl OverlayRenderer for GlyphRenderer {
    fn render(&self, layer: &Layer) -> EditResult<Sprite> {
        match &layer.kind {
            LayerKind::Text(style) => self.render_text(style),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::layers::{LayerId, LayerKind};
    use crate::geometry::Point;

    fn text_layer(content: &str) -> Layer {
        Layer {
            id: LayerId::new(),
            kind: LayerKind::Text(TextStyle { content: content.into(), ..TextStyle::default() }),
            position: Point::ZERO,
            opacity: 1.0,
            visible: true,
        }
    }

    #[test]
    fn empty_text_renders_nothing_without_a_font() {
        let sprite = GlyphRenderer::new().render(&text_layer("")).unwrap();
        assert!(sprite.is_empty());
    }

    #[test]
    fn sprite_emptiness() {
        assert!(Sprite::empty().is_empty());
        let sprite = Sprite { pixels: RgbaImage::new(3, 0), off_x: 1, off_y: 1 };
        assert!(sprite.is_empty());
    }
}
