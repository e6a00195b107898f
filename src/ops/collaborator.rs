// ============================================================================
// COLLABORATOR CONTRACT: "submit raster + instructions, get a raster back"
// ============================================================================
//
// Anything that produces a new base raster from an old one (generative
// retouch, filters, upscaling, text-to-image) lives behind this trait.
// The session never retries a failed request.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EditError;
use crate::geometry::PixelPoint;
use crate::ops::adjustments;
use crate::raster::Raster;

/// Human-readable failure reported by a collaborator.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<CollaboratorError> for EditError {
    fn from(e: CollaboratorError) -> Self {
        EditError::CollaboratorFailure(e.0)
    }
}

/// Aspect ratios accepted by text-to-image generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationAspect {
    #[default]
    Square,
    Landscape,
    Portrait,
    Standard,
    Tall,
}

impl GenerationAspect {
    pub fn all() -> &'static [GenerationAspect] {
        &[
            GenerationAspect::Square,
            GenerationAspect::Landscape,
            GenerationAspect::Portrait,
            GenerationAspect::Standard,
            GenerationAspect::Tall,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            GenerationAspect::Square => "1:1",
            GenerationAspect::Landscape => "16:9",
            GenerationAspect::Portrait => "9:16",
            GenerationAspect::Standard => "4:3",
            GenerationAspect::Tall => "3:4",
        }
    }
}

/// One suggestion returned by image analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    /// Instruction to send back when the suggestion is applied.
    pub prompt: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    LocalizedEdit,
    Filter,
    Adjustment,
    AutoEnhance,
    Upscale,
    Generate,
    GenerateWithReferences,
    Analyze,
    ApplySuggestion,
}

impl InstructionKind {
    /// Generation kinds produce a brand-new history instead of a commit.
    pub fn is_generation(&self) -> bool {
        matches!(self, InstructionKind::Generate | InstructionKind::GenerateWithReferences)
    }

    /// Kinds that need a current raster to work on.
    pub fn needs_image(&self) -> bool {
        !self.is_generation()
    }
}

#[derive(Clone, Debug)]
pub enum EditInstruction {
    /// Retouch around a natural-space point.
    LocalizedEdit { hotspot: PixelPoint, prompt: String },
    Filter { prompt: String },
    Adjustment { prompt: String },
    AutoEnhance,
    Upscale { factor: u32 },
    Generate { prompt: String, aspect: GenerationAspect },
    GenerateWithReferences { prompt: String, aspect: GenerationAspect, references: Vec<Raster> },
    Analyze,
    ApplySuggestion { suggestion: Suggestion },
}

impl EditInstruction {
    pub fn kind(&self) -> InstructionKind {
        match self {
            EditInstruction::LocalizedEdit { .. } => InstructionKind::LocalizedEdit,
            EditInstruction::Filter { .. } => InstructionKind::Filter,
            EditInstruction::Adjustment { .. } => InstructionKind::Adjustment,
            EditInstruction::AutoEnhance => InstructionKind::AutoEnhance,
            EditInstruction::Upscale { .. } => InstructionKind::Upscale,
            EditInstruction::Generate { .. } => InstructionKind::Generate,
            EditInstruction::GenerateWithReferences { .. } => InstructionKind::GenerateWithReferences,
            EditInstruction::Analyze => InstructionKind::Analyze,
            EditInstruction::ApplySuggestion { .. } => InstructionKind::ApplySuggestion,
        }
    }

    /// History label for the raster this instruction produces.
    pub fn description(&self) -> String {
        match self {
            EditInstruction::LocalizedEdit { prompt, .. } => format!("Retouch: {}", prompt),
            EditInstruction::Filter { prompt } => format!("Filter: {}", prompt),
            EditInstruction::Adjustment { prompt } => format!("Adjust: {}", prompt),
            EditInstruction::AutoEnhance => "Auto Enhance".to_string(),
            EditInstruction::Upscale { factor } => format!("Upscale {}x", factor),
            EditInstruction::Generate { prompt, .. }
            | EditInstruction::GenerateWithReferences { prompt, .. } => format!("Generated: {}", prompt),
            EditInstruction::Analyze => "Analysis".to_string(),
            EditInstruction::ApplySuggestion { suggestion } => format!("Suggestion: {}", suggestion.title),
        }
    }
}

/// What a collaborator hands back.
#[derive(Clone, Debug)]
pub enum CollaboratorReply {
    Raster(Raster),
    Suggestions(Vec<Suggestion>),
}

/// The external content-edit collaborator.
///
/// Called off the session's thread; implementations must be thread-safe.
pub trait EditCollaborator: Send + Sync {
    fn request_edit(
        &self,
        current: Option<&Raster>,
        instruction: &EditInstruction,
    ) -> Result<CollaboratorReply, CollaboratorError>;
}

// ============================================================================
// LOCAL COLLABORATOR: in-process pixel operations, no generative model
// ============================================================================

/// Serves filters, adjustments, auto-enhance and upscale locally.
/// Generative kinds (retouch, generation, analysis) report a failure.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalCollaborator;

impl LocalCollaborator {
    pub fn new() -> Self {
        Self
    }

    fn filter(src: &image::RgbaImage, prompt: &str) -> Result<image::RgbaImage, CollaboratorError> {
        let p = prompt.to_lowercase();
        let out = if p.contains("gray") || p.contains("grey") || p.contains("black and white") {
            adjustments::grayscale(src)
        } else if p.contains("sepia") || p.contains("vintage") {
            adjustments::sepia(src)
        } else if p.contains("invert") || p.contains("negative") {
            adjustments::invert_colors(src)
        } else if p.contains("blur") || p.contains("soft") {
            adjustments::gaussian_blur(src, 3.0)
        } else if p.contains("sharpen") {
            adjustments::sharpen(src, 1.5, 2)
        } else {
            return Err(CollaboratorError::new(format!("Unknown filter '{}'.", prompt)));
        };
        Ok(out)
    }

    /// Accepts `key=value` tokens (brightness, contrast, saturation,
    /// exposure, temperature) or a few plain-language keywords.
    fn adjustment(src: &image::RgbaImage, prompt: &str) -> Result<image::RgbaImage, CollaboratorError> {
        let mut brightness = 0.0f32;
        let mut contrast = 0.0f32;
        let mut saturation = 0.0f32;
        let mut exposure = 0.0f32;
        let mut temperature = 0.0f32;
        let mut recognized = false;

        for token in prompt.to_lowercase().split(|c: char| c.is_whitespace() || c == ',') {
            if token.is_empty() {
                continue;
            }
            if let Some((key, val)) = token.split_once('=') {
                let Ok(v) = val.trim().parse::<f32>() else {
                    return Err(CollaboratorError::new(format!("Invalid value in '{}'.", token)));
                };
                match key.trim() {
                    "brightness" => brightness = v,
                    "contrast" => contrast = v,
                    "saturation" => saturation = v,
                    "exposure" => exposure = v,
                    "temperature" => temperature = v,
                    other => return Err(CollaboratorError::new(format!("Unknown adjustment '{}'.", other))),
                }
                recognized = true;
                continue;
            }
            match token {
                "brighter" => brightness += 25.0,
                "darker" => brightness -= 25.0,
                "warmer" => temperature += 30.0,
                "cooler" => temperature -= 30.0,
                "vivid" | "saturated" => saturation += 30.0,
                "muted" => saturation -= 30.0,
                "contrast" | "punchy" => contrast += 25.0,
                _ => continue,
            }
            recognized = true;
        }

        if !recognized {
            return Err(CollaboratorError::new(format!("Could not understand adjustment '{}'.", prompt)));
        }

        let mut out = adjustments::brightness_contrast(src, brightness, contrast);
        if saturation != 0.0 {
            out = adjustments::saturation(&out, saturation);
        }
        if exposure != 0.0 {
            out = adjustments::exposure(&out, exposure);
        }
        if temperature != 0.0 {
            out = adjustments::temperature(&out, temperature);
        }
        Ok(out)
    }
}

impl EditCollaborator for LocalCollaborator {
    fn request_edit(
        &self,
        current: Option<&Raster>,
        instruction: &EditInstruction,
    ) -> Result<CollaboratorReply, CollaboratorError> {
        let kind = instruction.kind();
        let src = match current {
            Some(raster) => raster.pixels(),
            None if kind.needs_image() => return Err(CollaboratorError::new("No image to edit.")),
            None => {
                return Err(CollaboratorError::new("Image generation is not available in local mode."));
            }
        };

        let out = match instruction {
            EditInstruction::Filter { prompt } => Self::filter(src, prompt)?,
            EditInstruction::Adjustment { prompt } => Self::adjustment(src, prompt)?,
            EditInstruction::AutoEnhance => adjustments::auto_levels(src),
            EditInstruction::Upscale { factor } => adjustments::upscale(src, *factor),
            _ => {
                return Err(CollaboratorError::new(format!(
                    "{:?} is not available in local mode.",
                    kind
                )));
            }
        };
        Ok(CollaboratorReply::Raster(Raster::from_rgba(out)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_raster(reply: CollaboratorReply) -> Raster {
        match reply {
            CollaboratorReply::Raster(r) => r,
            CollaboratorReply::Suggestions(_) => panic!("expected raster"),
        }
    }

    #[test]
    fn local_filter_by_keyword() {
        let src = Raster::filled(2, 2, [200, 100, 50, 255]);
        let reply = LocalCollaborator
            .request_edit(Some(&src), &EditInstruction::Filter { prompt: "Make it Grayscale".into() })
            .unwrap();
        let out = reply_raster(reply);
        let p = out.pixel(0, 0).unwrap();
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
        assert_ne!(out, src);
    }

    #[test]
    fn local_adjustment_parses_pairs() {
        let src = Raster::filled(1, 1, [100, 100, 100, 255]);
        let reply = LocalCollaborator
            .request_edit(Some(&src), &EditInstruction::Adjustment { prompt: "brightness=20".into() })
            .unwrap();
        assert_eq!(reply_raster(reply).pixel(0, 0), Some([120, 120, 120, 255]));

        let err = LocalCollaborator
            .request_edit(Some(&src), &EditInstruction::Adjustment { prompt: "glow=3".into() })
            .unwrap_err();
        assert!(err.0.contains("glow"));
    }

    #[test]
    fn generative_kinds_fail_locally() {
        let src = Raster::filled(1, 1, [0, 0, 0, 255]);
        let retouch = EditInstruction::LocalizedEdit {
            hotspot: PixelPoint { x: 0, y: 0 },
            prompt: "remove".into(),
        };
        assert!(LocalCollaborator.request_edit(Some(&src), &retouch).is_err());
        let generate = EditInstruction::Generate { prompt: "cat".into(), aspect: GenerationAspect::Square };
        assert!(LocalCollaborator.request_edit(None, &generate).is_err());
    }

    #[test]
    fn upscale_description_and_kind() {
        let i = EditInstruction::Upscale { factor: 4 };
        assert_eq!(i.kind(), InstructionKind::Upscale);
        assert_eq!(i.description(), "Upscale 4x");
        assert!(InstructionKind::Generate.is_generation());
        assert!(!InstructionKind::Generate.needs_image());
    }
}
