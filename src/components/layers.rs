// ============================================================================
// LAYER MODEL: ordered, transient text overlays above the base raster
// ============================================================================
//
// Storage order is top-most-first: index 0 is visually on top.
// Painting (live display and flatten alike) goes through `paint_order`,
// which walks the sequence in reverse so index 0 is painted last.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EditError, EditResult};
use crate::geometry::Point;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(pub Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Text attributes, also used as the defaults for new text layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub content: String,
    pub font_family: String,
    pub font_size: f32,
    /// Straight (non-premultiplied) RGBA.
    pub color: [u8; 4],
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            content: "Your Text Here".to_string(),
            font_family: "Arial".to_string(),
            font_size: 48.0,
            color: [255, 255, 255, 255],
        }
    }
}

/// Overlay variants. Only text exists today.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LayerKind {
    Text(TextStyle),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub kind: LayerKind,
    /// Top-left paint origin.
    pub position: Point,
    /// In `[0, 1]`.
    pub opacity: f32,
    pub visible: bool,
}

impl Layer {
    pub fn text(&self) -> Option<&TextStyle> {
        match &self.kind {
            LayerKind::Text(style) => Some(style),
        }
    }

    pub fn label(&self) -> String {
        match &self.kind {
            LayerKind::Text(style) => format!("Text: {}", style.content),
        }
    }
}

/// Partial attribute update for `LayerModel::update_layer`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerPatch {
    pub content: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    pub color: Option<[u8; 4]>,
    pub position: Option<Point>,
    pub opacity: Option<f32>,
    pub visible: Option<bool>,
}

impl LayerPatch {
    pub fn position(position: Point) -> Self {
        Self { position: Some(position), ..Self::default() }
    }

    pub fn visible(visible: bool) -> Self {
        Self { visible: Some(visible), ..Self::default() }
    }

    pub fn opacity(opacity: f32) -> Self {
        Self { opacity: Some(opacity), ..Self::default() }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Self::default() }
    }

    fn apply(self, layer: &mut Layer) {
        let LayerKind::Text(style) = &mut layer.kind;
        if let Some(content) = self.content {
            style.content = content;
        }
        if let Some(family) = self.font_family {
            style.font_family = family;
        }
        if let Some(size) = self.font_size {
            style.font_size = size.max(1.0);
        }
        if let Some(color) = self.color {
            style.color = color;
        }
        if let Some(position) = self.position {
            layer.position = position;
        }
        if let Some(opacity) = self.opacity {
            layer.opacity = opacity.clamp(0.0, 1.0);
        }
        if let Some(visible) = self.visible {
            layer.visible = visible;
        }
    }
}

/// Layers in paint order: reverse of storage order, so index 0 paints last
/// and ends up on top. Shared by live display and flatten/export.
pub fn paint_order(layers: &[Layer]) -> impl Iterator<Item = &Layer> {
    layers.iter().rev()
}

/// Ordered overlay collection plus the single selection.
#[derive(Clone, Debug, Default)]
pub struct LayerModel {
    layers: Vec<Layer>,
    selected: Option<LayerId>,
}

impl LayerModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a text layer from `defaults` at `position`, put it on top and select it.
    pub fn add_text_layer(&mut self, defaults: &TextStyle, position: Point) -> LayerId {
        let id = LayerId::new();
        self.layers.insert(
            0,
            Layer {
                id,
                kind: LayerKind::Text(defaults.clone()),
                position,
                opacity: 1.0,
                visible: true,
            },
        );
        self.selected = Some(id);
        id
    }

    /// Merge `patch` into the layer with `id`. Returns `false` if absent.
    pub fn update_layer(&mut self, id: LayerId, patch: LayerPatch) -> bool {
        match self.layers.iter_mut().find(|l| l.id == id) {
            Some(layer) => {
                patch.apply(layer);
                true
            }
            None => false,
        }
    }

    /// Remove the layer; clears the selection if it was selected.
    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let idx = self.index_of(id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.layers.remove(idx))
    }

    /// Move the element at `source` to `dest` (both storage indices).
    pub fn reorder(&mut self, source: usize, dest: usize) -> EditResult<()> {
        let len = self.layers.len();
        for index in [source, dest] {
            if index >= len {
                return Err(EditError::LayerIndexOutOfRange { index, len });
            }
        }
        let layer = self.layers.remove(source);
        self.layers.insert(dest, layer);
        Ok(())
    }

    /// Select a layer by id, or clear the selection with `None`.
    /// Selecting an unknown id clears the selection.
    pub fn select(&mut self, id: Option<LayerId>) {
        self.selected = id.filter(|id| self.index_of(*id).is_some());
    }

    pub fn selected(&self) -> Option<LayerId> {
        self.selected
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn clear(&mut self) {
        self.layers.clear();
        self.selected = None;
    }
}

/// Parse `#RRGGBB` or `#RRGGBBAA`.
pub fn parse_hex_color(hex: &str) -> Option<[u8; 4]> {
    let hex = hex.trim().trim_start_matches('#');
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        6 => Some([channel(0)?, channel(2)?, channel(4)?, 255]),
        8 => Some([channel(0)?, channel(2)?, channel(4)?, channel(6)?]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with(n: usize) -> (LayerModel, Vec<LayerId>) {
        let mut m = LayerModel::new();
        let ids = (0..n)
            .map(|i| m.add_text_layer(&TextStyle::default(), Point::new(i as f32, 0.0)))
            .collect();
        (m, ids)
    }

    #[test]
    fn new_layer_is_on_top_and_selected() {
        let (m, ids) = model_with(2);
        assert_eq!(m.layers()[0].id, ids[1]);
        assert_eq!(m.selected(), Some(ids[1]));
        let layer = m.get(ids[1]).unwrap();
        assert_eq!(layer.text().unwrap().content, "Your Text Here");
        assert_eq!(layer.opacity, 1.0);
        assert!(layer.visible);
    }

    #[test]
    fn removing_selected_clears_selection() {
        let (mut m, ids) = model_with(2);
        m.remove_layer(ids[0]);
        assert_eq!(m.selected(), Some(ids[1]));
        m.remove_layer(ids[1]);
        assert_eq!(m.selected(), None);
        assert!(m.remove_layer(ids[1]).is_none());
    }

    #[test]
    fn update_merges_and_clamps() {
        let (mut m, ids) = model_with(1);
        assert!(m.update_layer(ids[0], LayerPatch { opacity: Some(1.7), content: Some("Hi".into()), ..Default::default() }));
        let layer = m.get(ids[0]).unwrap();
        assert_eq!(layer.opacity, 1.0);
        assert_eq!(layer.text().unwrap().content, "Hi");
        assert_eq!(layer.text().unwrap().font_family, "Arial");
        assert!(!m.update_layer(LayerId::new(), LayerPatch::visible(false)));
    }

    #[test]
    fn reorder_moves_one_element() {
        let (mut m, ids) = model_with(3);
        // storage: [ids2, ids1, ids0]
        m.reorder(0, 2).unwrap();
        let order: Vec<_> = m.layers().iter().map(|l| l.id).collect();
        assert_eq!(order, vec![ids[1], ids[0], ids[2]]);
        assert!(matches!(m.reorder(0, 3), Err(EditError::LayerIndexOutOfRange { index: 3, len: 3 })));
    }

    #[test]
    fn paint_order_is_reverse_of_storage() {
        let (m, ids) = model_with(3);
        let painted: Vec<_> = paint_order(m.layers()).map(|l| l.id).collect();
        assert_eq!(painted, ids);
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#ff8000"), Some([255, 128, 0, 255]));
        assert_eq!(parse_hex_color("00000080"), Some([0, 0, 0, 128]));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn layer_id_survives_toml() {
        #[derive(Serialize, Deserialize)]
        struct Saved {
            id: LayerId,
        }
        let id = LayerId::new();
        let text = toml::to_string(&Saved { id }).unwrap();
        assert!(text.contains(&id.0.to_string()));
        let back: Saved = toml::from_str(&text).unwrap();
        assert_eq!(back.id, id);
    }
}
