#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgba, RgbaImage};
use retouch::{
    CollaboratorError, CollaboratorReply, EditCollaborator, EditInstruction, EditResult, Layer, OverlayRenderer,
    Raster, Settings, Session, Sprite, Suggestion,
};
use std::sync::Arc;

/// Draws every text layer as a solid block: `4 px * chars` wide,
/// `font_size` tall, in the layer's color.
pub struct BlockRenderer;

impl OverlayRenderer for BlockRenderer {
    fn render(&self, layer: &Layer) -> EditResult<Sprite> {
        let style = layer.text().expect("text layer");
        let w = style.content.chars().count() as u32 * 4;
        let h = style.font_size as u32;
        Ok(Sprite {
            pixels: RgbaImage::from_pixel(w, h, Rgba(style.color)),
            off_x: 0,
            off_y: 0,
        })
    }
}

/// Returns a fresh raster of the same size filled with `color`,
/// or two suggestions for analysis requests.
pub struct FillCollaborator {
    pub color: [u8; 4],
    pub calls: AtomicUsize,
}

impl FillCollaborator {
    pub fn new(color: [u8; 4]) -> Self {
        Self { color, calls: AtomicUsize::new(0) }
    }
}

impl EditCollaborator for FillCollaborator {
    fn request_edit(
        &self,
        current: Option<&Raster>,
        instruction: &EditInstruction,
    ) -> Result<CollaboratorReply, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let EditInstruction::Analyze = instruction {
            return Ok(CollaboratorReply::Suggestions(vec![
                Suggestion { title: "Warm it up".into(), prompt: "warmer".into() },
                Suggestion { title: "Boost colors".into(), prompt: "vivid".into() },
            ]));
        }
        let (w, h) = current.map(|r| r.dimensions()).unwrap_or((16, 9));
        Ok(CollaboratorReply::Raster(Raster::filled(w, h, self.color)))
    }
}

/// Always fails with the given message.
pub struct FailingCollaborator(pub &'static str);

impl EditCollaborator for FailingCollaborator {
    fn request_edit(
        &self,
        _current: Option<&Raster>,
        _instruction: &EditInstruction,
    ) -> Result<CollaboratorReply, CollaboratorError> {
        Err(CollaboratorError::new(self.0))
    }
}

pub struct PanickingCollaborator;

impl EditCollaborator for PanickingCollaborator {
    fn request_edit(
        &self,
        _current: Option<&Raster>,
        _instruction: &EditInstruction,
    ) -> Result<CollaboratorReply, CollaboratorError> {
        panic!("model exploded");
    }
}

pub fn session_with(collaborator: impl EditCollaborator + 'static) -> Session {
    Session::new(&Settings::default(), Arc::new(collaborator), Arc::new(BlockRenderer))
}

pub fn loaded_session(collaborator: impl EditCollaborator + 'static, w: u32, h: u32) -> Session {
    let mut s = session_with(collaborator);
    s.load_image(Raster::filled(w, h, [0, 0, 0, 255]), "Original").expect("load");
    s
}
