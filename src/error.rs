// ============================================================================
// ERROR TAXONOMY: every recoverable failure of the edit-session engine
// ============================================================================

use thiserror::Error;

use crate::session::Mode;

/// Errors raised by the history, layer, compositor and session layers.
///
/// None of these are fatal. The session records the message and leaves
/// history and layers untouched so the user can retry.
#[derive(Debug, Error)]
pub enum EditError {
    /// An editing operation was attempted with an empty history.
    #[error("No image loaded to edit.")]
    NoImageLoaded,

    /// A required input (prompt, hotspot, crop selection, ...) is absent.
    #[error("Missing input: {0}")]
    MissingInput(&'static str),

    /// Crop rectangle with a non-positive width or height.
    #[error("Invalid crop region ({width} x {height}).")]
    InvalidRegion { width: f32, height: f32 },

    /// The external edit/generation collaborator failed or returned nothing usable.
    #[error("{0}")]
    CollaboratorFailure(String),

    /// Flatten/export could not produce a drawing surface.
    #[error("Render target unavailable: {0}")]
    RenderTargetUnavailable(String),

    /// Another content-altering request is still in flight.
    #[error("Another edit is still in progress.")]
    Busy,

    #[error("Layer index {index} out of range (len {len}).")]
    LayerIndexOutOfRange { index: usize, len: usize },

    #[error("Operation requires {expected:?} mode, session is in {actual:?} mode.")]
    WrongMode { expected: Mode, actual: Mode },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl EditError {
    /// Whether the session should surface this error as its current message.
    /// `Busy` is a gating violation (the UI should never let it happen), not a
    /// user-facing failure.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, EditError::Busy)
    }
}

pub type EditResult<T> = Result<T, EditError>;
